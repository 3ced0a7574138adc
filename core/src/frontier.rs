//! Crawl frontier: urls waiting to be visited, urls already visited, and the
//! url admission policy.

use crate::persist::{read_json, write_json_atomic};
use crate::{fetch_page, Fetch, FrontierError, HtmlPage, PersistError};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

const BLACKLISTED_WORDS: &[&str] = &[
    "shareit.com", "sybase.com", "gravatar", "facebook", "theme.wordpress.com", "youtube.com",
    "porn", "sex", "avventura", "debtag", ".debian.org", "launchpad.net", "logon",
];

const PROHIBITED_FRAGMENTS: &[&str] = &[
    ".png", ".jpg", ".JPG", ".exe", ".pdf", ".doc", ".js", ".zip", ".tar", ".gz", ".msi", ".txt",
    ".css", ".tiff", ".mp2", ".mp3", ".mp4", ".wav", ".avi", ".mov", ".mpeg", ".ram", ".wmv",
    ".swf", ".rar", ".aspx",
];

const ALLOWED_SUFFIXES: &[&str] = &[".com", ".fr", ".org", ".net", ".co.uk"];

/// Substring-based url admission. All checks are case-sensitive containment tests.
#[derive(Debug, Clone)]
pub struct UrlPolicy {
    pub blacklist: Vec<String>,
    pub prohibited: Vec<String>,
    pub allowed: Vec<String>,
}

impl Default for UrlPolicy {
    fn default() -> Self {
        let owned = |words: &[&str]| words.iter().map(|w| w.to_string()).collect();
        Self {
            blacklist: owned(BLACKLISTED_WORDS),
            prohibited: owned(PROHIBITED_FRAGMENTS),
            allowed: owned(ALLOWED_SUFFIXES),
        }
    }
}

impl UrlPolicy {
    pub fn is_valid(&self, url: &str) -> bool {
        if let Some(word) = self.blacklist.iter().find(|w| url.contains(w.as_str())) {
            debug!(url, word = word.as_str(), "rejecting blacklisted url");
            return false;
        }
        if let Some(fragment) = self.prohibited.iter().find(|f| url.contains(f.as_str())) {
            debug!(url, fragment = fragment.as_str(), "rejecting prohibited extension");
            return false;
        }
        let valid = self.allowed.iter().any(|s| url.contains(s.as_str()));
        if !valid {
            debug!(url, "rejecting url without an allowed suffix");
        }
        valid
    }
}

/// To-crawl and crawled url sets of one crawl session.
///
/// Candidates handed out by [`Frontier::next_candidate`] stay in flight until
/// [`Frontier::mark_crawled`] or [`Frontier::mark_failed`] settles them, which
/// lets a single owner drive several fetches at once. The three sets are
/// always disjoint. Dropping the frontier writes the pending urls to its
/// snapshot file.
#[derive(Debug)]
pub struct Frontier {
    to_crawl: HashSet<String>,
    crawled: HashSet<String>,
    in_flight: HashSet<String>,
    seed: Option<String>,
    policy: UrlPolicy,
    snapshot: PathBuf,
}

impl Frontier {
    /// Start a session with the default admission policy.
    ///
    /// A fresh session (`restart == false`) needs a seed. A restarted session
    /// loads the pending urls from `snapshot` and fails if that file is
    /// missing or corrupt.
    pub fn new(restart: bool, seed: Option<&str>, snapshot: impl Into<PathBuf>) -> Result<Self, FrontierError> {
        Self::with_policy(restart, seed, snapshot, UrlPolicy::default())
    }

    pub fn with_policy(
        restart: bool,
        seed: Option<&str>,
        snapshot: impl Into<PathBuf>,
        policy: UrlPolicy,
    ) -> Result<Self, FrontierError> {
        let snapshot = snapshot.into();
        if seed.is_none() && !restart {
            return Err(FrontierError::MissingSeed);
        }
        if let Some(seed) = seed {
            if !policy.is_valid(seed) {
                return Err(FrontierError::InvalidSeed(seed.to_string()));
            }
        }
        let mut to_crawl = HashSet::new();
        if restart {
            let urls: Vec<String> = read_json(&snapshot)?;
            info!(count = urls.len(), path = %snapshot.display(), "restored urls to crawl");
            to_crawl.extend(urls);
        }
        if let Some(seed) = seed {
            to_crawl.remove(seed);
        }
        Ok(Self {
            to_crawl,
            crawled: HashSet::new(),
            in_flight: HashSet::new(),
            seed: seed.map(str::to_string),
            policy,
            snapshot,
        })
    }

    pub fn to_crawl_len(&self) -> usize { self.to_crawl.len() }
    pub fn crawled_len(&self) -> usize { self.crawled.len() }
    pub fn in_flight_len(&self) -> usize { self.in_flight.len() }
    pub fn is_crawled(&self, url: &str) -> bool { self.crawled.contains(url) }
    pub fn is_queued(&self, url: &str) -> bool { self.to_crawl.contains(url) }
    pub fn snapshot_path(&self) -> &Path { &self.snapshot }

    /// Nothing left to hand out: no seed and an empty to-crawl set.
    pub fn is_exhausted(&self) -> bool { self.seed.is_none() && self.to_crawl.is_empty() }

    /// Hand out the next admitted url, seed first. Rejected urls are dropped on
    /// the way; every iteration consumes one url so this always terminates.
    pub fn next_candidate(&mut self) -> Option<String> {
        loop {
            let url = match self.seed.take() {
                Some(seed) => seed,
                None => {
                    let url = self.to_crawl.iter().next()?.clone();
                    self.to_crawl.remove(&url);
                    url
                }
            };
            if self.crawled.contains(&url) || self.in_flight.contains(&url) {
                debug!(%url, "skipping url already visited");
                continue;
            }
            if !self.policy.is_valid(&url) {
                info!(%url, "skipping url");
                continue;
            }
            self.in_flight.insert(url.clone());
            return Some(url);
        }
    }

    /// Record a successful visit and queue its unseen, admitted links.
    pub fn mark_crawled(&mut self, page: &HtmlPage) {
        for url in [&page.url, &page.final_url] {
            self.in_flight.remove(url);
            self.to_crawl.remove(url);
            self.crawled.insert(url.clone());
        }
        let mut queued = 0usize;
        for link in &page.links {
            if self.crawled.contains(link) || self.in_flight.contains(link) {
                continue;
            }
            if self.policy.is_valid(link) && self.to_crawl.insert(link.clone()) {
                queued += 1;
            }
        }
        debug!(url = %page.url, queued, pending = self.to_crawl.len(), "page crawled");
    }

    /// Give up on an in-flight candidate. It is not retried.
    pub fn mark_failed(&mut self, url: &str) {
        self.in_flight.remove(url);
    }

    /// Fetch candidates until one yields a page. `None` marks the end of the
    /// frontier, and every later call returns `None` as well.
    pub async fn next<F: Fetch>(&mut self, fetcher: &F) -> Option<HtmlPage> {
        while let Some(url) = self.next_candidate() {
            info!(%url, "crawling");
            match fetch_page(fetcher, &url).await {
                Ok(page) => {
                    if !page.title.is_empty() {
                        info!(title = %page.title, "fetched page");
                    }
                    self.mark_crawled(&page);
                    return Some(page);
                }
                Err(err) => {
                    warn!(%url, error = %err, "skipping page");
                    self.mark_failed(&url);
                }
            }
        }
        info!("reached the end of the frontier");
        None
    }

    /// Write the pending urls (queued and in flight) as a JSON array.
    pub fn dump(&self) -> Result<(), PersistError> {
        let mut urls: Vec<&String> = self.to_crawl.iter().chain(self.in_flight.iter()).collect();
        urls.sort();
        info!(count = urls.len(), path = %self.snapshot.display(), "dumping urls to crawl");
        write_json_atomic(&self.snapshot, &urls)
    }
}

impl Drop for Frontier {
    fn drop(&mut self) {
        if let Err(err) = self.dump() {
            warn!(error = %err, "frontier snapshot not written");
        }
    }
}
