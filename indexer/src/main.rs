use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use serde::Deserialize;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use tracing_subscriber::{fmt, EnvFilter};
use trawl_core::{DataPaths, Field, InvertedIndex, Searcher};
use walkdir::WalkDir;

/// A pre-fetched page to index without crawling it.
#[derive(Debug, Deserialize)]
struct InputDoc {
    url: String,
    #[serde(default)]
    title: String,
    body: String,
}

#[derive(Parser)]
#[command(name = "indexer")]
#[command(about = "Search and maintain the inverted index", long_about = None)]
struct Cli {
    /// Directory holding index.json
    #[arg(long, global = true, default_value = ".")]
    data_dir: String,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Search the index and print the ranked answers
    Search {
        /// The search query
        #[arg(required = true)]
        query: Vec<String>,
    },
    /// Print index statistics
    Stats,
    /// Remove a url from the index
    Remove {
        #[arg(long)]
        url: String,
    },
    /// Index JSON/JSONL records of the form {"url", "title", "body"} from a file or directory
    Import {
        /// Input path (file or directory)
        #[arg(long)]
        input: String,
        /// Add to the existing index instead of starting a new one
        #[arg(long, default_value_t = false)]
        restart: bool,
    },
}

fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let cli = Cli::parse();
    let paths = DataPaths::new(&cli.data_dir);

    match cli.command {
        Commands::Search { query } => search(&paths, &query.join(" ")),
        Commands::Stats => stats(&paths),
        Commands::Remove { url } => {
            let mut index = InvertedIndex::load(paths.index())?;
            index.remove_document(&url);
            index.dump()?;
            Ok(())
        }
        Commands::Import { input, restart } => {
            let mut index = InvertedIndex::open(restart, paths.index())?;
            let count = import(&mut index, Path::new(&input))?;
            index.dump()?;
            tracing::info!(count, urls = index.indexed_url_count(), "import complete");
            Ok(())
        }
    }
}

fn search(paths: &DataPaths, query: &str) -> Result<()> {
    let index = InvertedIndex::load(paths.index())?;
    let answers = Searcher::new(&index).query(query.trim())?;
    println!("\n{} answers for \"{}\"", answers.len(), query.trim());
    for answer in answers {
        let indexed = index
            .document(&answer.url)
            .and_then(|m| OffsetDateTime::from_unix_timestamp(m.indexed_at).ok())
            .and_then(|t| t.format(&Rfc3339).ok())
            .unwrap_or_default();
        println!(
            "\n{}\nScored {:.4}, indexed {}\n{}\n{}",
            answer.title, answer.score, indexed, answer.url, answer.snippet
        );
    }
    Ok(())
}

fn stats(paths: &DataPaths) -> Result<()> {
    let index = InvertedIndex::load(paths.index())?;
    println!("urls indexed:          {}", index.indexed_url_count());
    println!("title tokens:          {}", index.entry_count(Field::Title));
    println!("body tokens:           {}", index.entry_count(Field::Body));
    println!("average title length:  {:.2}", index.average_title_length());
    println!("average body length:   {:.2}", index.average_body_length());
    Ok(())
}

fn import(index: &mut InvertedIndex, input: &Path) -> Result<usize> {
    let mut files: Vec<PathBuf> = Vec::new();
    if input.is_dir() {
        for entry in WalkDir::new(input).into_iter().filter_map(|e| e.ok()) {
            let p = entry.path();
            if p.is_file() && matches!(extension(p), Some("json" | "jsonl")) {
                files.push(p.to_path_buf());
            }
        }
        files.sort();
    } else if input.is_file() {
        files.push(input.to_path_buf());
    } else {
        return Err(anyhow!("input {} does not exist", input.display()));
    }

    let mut count = 0;
    for file in files {
        let docs = if extension(&file) == Some("jsonl") { read_jsonl(&file)? } else { read_json(&file)? };
        tracing::info!(file = %file.display(), docs = docs.len(), "importing");
        for doc in docs {
            index.add_document(&doc.url, &doc.title, &doc.body);
            count += 1;
        }
    }
    Ok(count)
}

fn extension(p: &Path) -> Option<&str> {
    p.extension().and_then(|s| s.to_str())
}

fn read_jsonl(file: &Path) -> Result<Vec<InputDoc>> {
    let reader = BufReader::new(File::open(file)?);
    let mut docs = Vec::new();
    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() { continue; }
        docs.push(serde_json::from_str(&line)?);
    }
    Ok(docs)
}

fn read_json(file: &Path) -> Result<Vec<InputDoc>> {
    let reader = BufReader::new(File::open(file)?);
    let json: serde_json::Value = serde_json::from_reader(reader)?;
    match json {
        serde_json::Value::Array(_) => Ok(serde_json::from_value(json)?),
        serde_json::Value::Object(_) => Ok(vec![serde_json::from_value(json)?]),
        _ => Ok(Vec::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn imports_json_and_jsonl_from_a_directory() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("in");
        fs::create_dir_all(input.join("nested")).unwrap();
        fs::write(
            input.join("one.json"),
            r#"[{"url": "http://a.com/", "title": "A", "body": "alpha"}, {"url": "http://b.com/", "body": "beta"}]"#,
        )
        .unwrap();
        fs::write(
            input.join("nested").join("two.jsonl"),
            "{\"url\": \"http://c.com/\", \"title\": \"C\", \"body\": \"gamma\"}\n\n",
        )
        .unwrap();
        fs::write(input.join("notes.txt"), "ignored").unwrap();

        let mut index = InvertedIndex::new();
        let count = import(&mut index, &input).unwrap();
        assert_eq!(count, 3);
        assert_eq!(index.indexed_url_count(), 3);
        assert_eq!(index.title("http://b.com/"), "");
        assert_eq!(Searcher::new(&index).query("gamma").unwrap()[0].url, "http://c.com/");
    }

    #[test]
    fn missing_input_is_an_error() {
        let dir = tempdir().unwrap();
        let mut index = InvertedIndex::new();
        assert!(import(&mut index, &dir.path().join("absent")).is_err());
    }
}
