use crate::persist::{read_json, write_json_atomic};
use crate::tokenizer::{normalize, tokenize_with_positions, Position};
use crate::PersistError;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

pub type DocId = u64;

/// An index shared between one writer (the crawl loop) and many readers (queries).
pub type SharedIndex = Arc<RwLock<InvertedIndex>>;

/// Number of `add_document` calls between two automatic snapshots.
pub const DUMP_INTERVAL: usize = 20;

const ELLIPSIS: &str = "\u{2026}";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Title,
    Body,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocMeta {
    pub id: DocId,
    /// Seconds since the Unix epoch.
    pub indexed_at: i64,
    pub title: String,
    pub title_length: usize,
    /// Normalized body text; snippets are cut from it.
    pub body: String,
    pub body_length: usize,
}

/// token -> url -> positions of the token in that url's text, in insertion order.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldIndex {
    postings: HashMap<String, HashMap<String, Vec<Position>>>,
}

impl FieldIndex {
    pub fn add(&mut self, url: &str, token: &str, position: Position) {
        self.postings
            .entry(token.to_string())
            .or_default()
            .entry(url.to_string())
            .or_default()
            .push(position);
    }

    /// Drop every posting of `url`, and tokens left without any url.
    pub fn remove_url(&mut self, url: &str) {
        self.postings.retain(|_, urls| {
            urls.remove(url);
            !urls.is_empty()
        });
    }

    /// Number of distinct tokens.
    pub fn entry_count(&self) -> usize { self.postings.len() }

    pub fn matching_urls(&self, token: &str) -> HashSet<&str> {
        self.postings
            .get(token)
            .map(|urls| urls.keys().map(String::as_str).collect())
            .unwrap_or_default()
    }

    pub fn matching_url_count(&self, token: &str) -> usize {
        self.postings.get(token).map_or(0, HashMap::len)
    }

    pub fn match_positions(&self, url: &str, token: &str) -> &[Position] {
        self.postings
            .get(token)
            .and_then(|urls| urls.get(url))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn match_count(&self, url: &str, token: &str) -> usize {
        self.match_positions(url, token).len()
    }
}

/// Title and body postings plus per-url metadata, persisted as one JSON snapshot.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct InvertedIndex {
    urls: HashMap<String, DocMeta>,
    title_index: FieldIndex,
    body_index: FieldIndex,
    average_title_length: f64,
    average_body_length: f64,
    #[serde(default)]
    next_doc_id: DocId,
    #[serde(skip)]
    snapshot: Option<PathBuf>,
    #[serde(skip)]
    added_since_dump: usize,
}

impl InvertedIndex {
    /// An in-memory index that never dumps on its own.
    pub fn new() -> Self { Self::default() }

    /// An empty index whose snapshots go to `path`.
    pub fn with_snapshot(path: impl Into<PathBuf>) -> Self {
        Self { snapshot: Some(path.into()), ..Self::default() }
    }

    /// Load a snapshot written by [`InvertedIndex::dump`]; later dumps overwrite it.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, PersistError> {
        let path = path.into();
        info!(path = %path.display(), "loading inverted index");
        let mut index: InvertedIndex = read_json(&path)?;
        let max_id = index.urls.values().map(|m| m.id).max().unwrap_or(0);
        index.next_doc_id = index.next_doc_id.max(max_id + 1);
        index.snapshot = Some(path);
        info!(
            entries = index.body_index.entry_count(),
            urls = index.indexed_url_count(),
            "inverted index loaded"
        );
        Ok(index)
    }

    /// Open the index for a crawl session: load it on restart, start empty otherwise.
    pub fn open(restart: bool, path: impl Into<PathBuf>) -> Result<Self, PersistError> {
        if restart { Self::load(path) } else { Ok(Self::with_snapshot(path)) }
    }

    pub fn into_shared(self) -> SharedIndex { Arc::new(RwLock::new(self)) }

    pub fn snapshot_path(&self) -> Option<&Path> { self.snapshot.as_deref() }

    pub fn field(&self, field: Field) -> &FieldIndex {
        match field {
            Field::Title => &self.title_index,
            Field::Body => &self.body_index,
        }
    }

    /// Index `url`, replacing whatever was indexed for it before.
    pub fn add_document(&mut self, url: &str, title: &str, body: &str) {
        let id = match self.urls.get(url) {
            Some(prev) => {
                let days = (now() - prev.indexed_at) / 86_400;
                info!(url, days, "url already indexed, replacing it");
                self.title_index.remove_url(url);
                self.body_index.remove_url(url);
                prev.id
            }
            None => {
                let id = self.next_doc_id.max(1);
                self.next_doc_id = id + 1;
                id
            }
        };

        let title_length = title.split_whitespace().count();
        if title.is_empty() {
            warn!(url, "no title to index");
        }
        for (token, pos) in tokenize_with_positions(title) {
            self.title_index.add(url, &token, pos);
        }

        let body = normalize(body);
        let body_length = body.split_whitespace().count();
        if body_length == 0 {
            warn!(url, "no text to index");
        }
        for (token, pos) in tokenize_with_positions(&body) {
            self.body_index.add(url, &token, pos);
        }

        self.urls.insert(
            url.to_string(),
            DocMeta {
                id,
                indexed_at: now(),
                title: title.to_string(),
                title_length,
                body,
                body_length,
            },
        );

        // Approximate running averages: divided by the current url count, not a true mean.
        let count = self.urls.len() as f64;
        self.average_title_length += title_length as f64 / count;
        self.average_body_length += body_length as f64 / count;

        self.added_since_dump += 1;
        if self.added_since_dump >= DUMP_INTERVAL {
            self.added_since_dump = 0;
            if let Some(path) = &self.snapshot {
                if let Err(err) = self.dump_to(path) {
                    warn!(error = %err, "periodic index dump failed");
                }
            }
        }
    }

    /// Forget `url` entirely. Unknown urls are ignored.
    pub fn remove_document(&mut self, url: &str) {
        if self.urls.remove(url).is_none() {
            debug!(url, "remove of a url that is not indexed");
            return;
        }
        self.title_index.remove_url(url);
        self.body_index.remove_url(url);
    }

    pub fn matching_urls(&self, field: Field, token: &str) -> HashSet<&str> {
        self.field(field).matching_urls(token)
    }

    pub fn match_positions(&self, field: Field, url: &str, token: &str) -> &[Position] {
        self.field(field).match_positions(url, token)
    }

    /// Distinct token count of a field. Ranking uses it as the collection size.
    pub fn entry_count(&self, field: Field) -> usize { self.field(field).entry_count() }

    pub fn indexed_url_count(&self) -> usize { self.urls.len() }

    pub fn document(&self, url: &str) -> Option<&DocMeta> { self.urls.get(url) }

    /// Title of `url`, empty when unknown.
    pub fn title(&self, url: &str) -> &str {
        self.urls.get(url).map_or("", |m| m.title.as_str())
    }

    pub fn average_title_length(&self) -> f64 { self.average_title_length }
    pub fn average_body_length(&self) -> f64 { self.average_body_length }

    /// Cut word windows around body matches of `tokens`.
    ///
    /// Positions are taken token by token in the order given, only the first
    /// `max_matches` are used, and each window spans `context_before` words
    /// before to `context_after` words after the match, both ends included.
    /// Windows are neither sorted nor merged; each one is followed by an ellipsis.
    pub fn make_snippet<S: AsRef<str>>(
        &self,
        url: &str,
        tokens: &[S],
        context_before: usize,
        context_after: usize,
        max_matches: usize,
    ) -> String {
        let Some(meta) = self.urls.get(url) else { return String::new() };
        let words: Vec<&str> = meta.body.split_whitespace().collect();
        if words.is_empty() {
            return String::new();
        }
        let last = words.len() - 1;

        let mut snippet: Vec<&str> = Vec::new();
        let positions = tokens
            .iter()
            .flat_map(|t| self.body_index.match_positions(url, t.as_ref()))
            .take(max_matches);
        for &pos in positions {
            let pos = pos as usize;
            let lower = pos.saturating_sub(context_before);
            let upper = (pos + context_after).min(last);
            if lower > upper {
                continue;
            }
            snippet.extend_from_slice(&words[lower..=upper]);
            snippet.push(ELLIPSIS);
        }
        snippet.join(" ")
    }

    /// Write the snapshot to the bound path.
    pub fn dump(&self) -> Result<(), PersistError> {
        match &self.snapshot {
            Some(path) => self.dump_to(path),
            None => Err(PersistError::Unbound),
        }
    }

    pub fn dump_to(&self, path: &Path) -> Result<(), PersistError> {
        info!(
            path = %path.display(),
            entries = self.body_index.entry_count(),
            urls = self.indexed_url_count(),
            "dumping inverted index"
        );
        write_json_atomic(path, self)
    }
}

impl PartialEq for InvertedIndex {
    fn eq(&self, other: &Self) -> bool {
        self.urls == other.urls
            && self.title_index == other.title_index
            && self.body_index == other.body_index
            && self.average_title_length == other.average_title_length
            && self.average_body_length == other.average_body_length
            && self.next_doc_id == other.next_doc_id
    }
}

fn now() -> i64 { time::OffsetDateTime::now_utc().unix_timestamp() }

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remove_prunes_empty_tokens() {
        let mut fi = FieldIndex::default();
        fi.add("u1", "cat", 0);
        fi.add("u2", "cat", 3);
        fi.add("u1", "dog", 1);
        fi.remove_url("u1");
        assert_eq!(fi.entry_count(), 1);
        assert_eq!(fi.matching_urls("cat"), HashSet::from(["u2"]));
        assert!(fi.match_positions("u1", "dog").is_empty());
    }

    #[test]
    fn ids_are_never_reused() {
        let mut index = InvertedIndex::new();
        index.add_document("u1", "", "a b");
        index.add_document("u2", "", "c d");
        index.remove_document("u2");
        index.add_document("u3", "", "e f");
        index.add_document("u1", "", "g h");
        assert_eq!(index.document("u1").unwrap().id, 1);
        assert_eq!(index.document("u3").unwrap().id, 3);
    }
}
