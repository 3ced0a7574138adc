use crate::PersistError;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::{self, create_dir_all, File};
use std::io::{BufReader, Write};
use std::path::{Path, PathBuf};

/// Well-known snapshot locations under a data directory.
#[derive(Debug, Clone)]
pub struct DataPaths {
    pub root: PathBuf,
}

impl DataPaths {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self { root: root.as_ref().to_path_buf() }
    }
    pub fn index(&self) -> PathBuf { self.root.join("index.json") }
    pub fn frontier(&self) -> PathBuf { self.root.join("crawler.json") }
}

fn io_err(path: &Path, source: std::io::Error) -> PersistError {
    PersistError::Io { path: path.display().to_string(), source }
}

fn json_err(path: &Path, source: serde_json::Error) -> PersistError {
    PersistError::Json { path: path.display().to_string(), source }
}

/// Serialize `value` next to `path` and rename it into place, so a reader sees
/// either the previous snapshot or the complete new one.
pub fn write_json_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), PersistError> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        create_dir_all(dir).map_err(|e| io_err(dir, e))?;
    }
    let bytes = serde_json::to_vec(value).map_err(|e| json_err(path, e))?;
    let mut tmp_name = path.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp_path = PathBuf::from(tmp_name);

    let mut f = File::create(&tmp_path).map_err(|e| io_err(&tmp_path, e))?;
    f.write_all(&bytes).map_err(|e| io_err(&tmp_path, e))?;
    f.sync_all().map_err(|e| io_err(&tmp_path, e))?;
    drop(f);
    fs::rename(&tmp_path, path).map_err(|e| io_err(path, e))?;
    Ok(())
}

pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, PersistError> {
    let f = File::open(path).map_err(|e| io_err(path, e))?;
    serde_json::from_reader(BufReader::new(f)).map_err(|e| json_err(path, e))
}
