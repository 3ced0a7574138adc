use crate::index::{Field, InvertedIndex};
use crate::tokenizer::tokenize;
use crate::SearchError;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use tracing::{debug, info};

const K1: f64 = 1.2;
const SNIPPET_CONTEXT_BEFORE: usize = 5;
const SNIPPET_CONTEXT_AFTER: usize = 8;
const SNIPPET_MAX_MATCHES: usize = 5;

/// One ranked result. Highlights are indices into the whitespace-split words
/// of `title` and `snippet`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Answer {
    pub url: String,
    pub score: f64,
    pub title: String,
    pub title_highlights: Vec<usize>,
    pub snippet: String,
    pub snippet_highlights: Vec<usize>,
}

pub struct Searcher<'a> {
    index: &'a InvertedIndex,
}

impl<'a> Searcher<'a> {
    pub fn new(index: &'a InvertedIndex) -> Self {
        Self { index }
    }

    /// Rank every url matching at least one query token in its title or body.
    pub fn query(&self, text: &str) -> Result<Vec<Answer>, SearchError> {
        if text.trim().is_empty() {
            return Err(SearchError::EmptyQuery);
        }
        let tokens = tokenize(text);
        info!(query = text, tokens = %tokens.join(" "), "searching");

        let mut scores: HashMap<&str, f64> = HashMap::new();
        for field in [Field::Title, Field::Body] {
            let matching: HashSet<&str> = tokens
                .iter()
                .flat_map(|t| self.index.matching_urls(field, t))
                .collect();
            for url in matching {
                let score = self.bm25(url, &tokens, field);
                debug!(url, ?field, score, "field score");
                *scores.entry(url).or_insert(0.0) += score;
            }
        }

        let mut ranked: Vec<(&str, f64)> = scores.into_iter().collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| b.0.cmp(a.0)));

        let answers = ranked
            .into_iter()
            .map(|(url, score)| {
                let title = self.index.title(url).to_string();
                let snippet = self.index.make_snippet(
                    url,
                    &tokens,
                    SNIPPET_CONTEXT_BEFORE,
                    SNIPPET_CONTEXT_AFTER,
                    SNIPPET_MAX_MATCHES,
                );
                Answer {
                    url: url.to_string(),
                    score,
                    title_highlights: find_highlights(&tokens, &title),
                    snippet_highlights: find_highlights(&tokens, &snippet),
                    title,
                    snippet,
                }
            })
            .collect();
        Ok(answers)
    }

    /// Field score of `url`. This is a modified BM25: the collection size `N`
    /// is the field's distinct token count, and the sum is squashed to
    /// `0.5 + sum / (2 * |tokens|)`.
    pub fn bm25<S: AsRef<str>>(&self, url: &str, tokens: &[S], field: Field) -> f64 {
        let fi = self.index.field(field);
        let big_n = fi.entry_count() as f64;
        let mut sum = 0.0;
        for token in tokens {
            let token = token.as_ref();
            let tf = fi.match_count(url, token) as f64;
            if tf == 0.0 {
                continue;
            }
            let n = fi.matching_url_count(token) as f64;
            let idf = ((big_n - n + 1.0) / n).ln() / (1.0 + big_n).ln();
            sum += tf * idf / (tf + K1);
        }
        0.5 + sum / (2.0 * tokens.len() as f64)
    }
}

/// Indices of the words of `text` containing any token, case-insensitively.
/// A word is listed once per token it contains.
pub fn find_highlights<S: AsRef<str>>(tokens: &[S], text: &str) -> Vec<usize> {
    let words: Vec<String> = text.split_whitespace().map(str::to_lowercase).collect();
    let mut highlights = Vec::new();
    for token in tokens {
        let token = token.as_ref().to_lowercase();
        for (pos, word) in words.iter().enumerate() {
            if word.contains(&token) {
                highlights.push(pos);
            }
        }
    }
    highlights
}
