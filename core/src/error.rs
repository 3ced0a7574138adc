use thiserror::Error;

/// The markup of a page could not be turned into a tag stream.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("malformed markup: {0}")]
    MalformedMarkup(String),
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request to {url} timed out")]
    Timeout { url: String },

    #[error("HTTP {status} at {url}")]
    Status { url: String, status: u16 },

    #[error("connection error at {url}: {message}")]
    Connection { url: String, message: String },

    #[error("{url} is not HTML ({content_type})")]
    NotHtml { url: String, content_type: String },

    #[error("{url} body exceeds {limit} bytes")]
    TooLarge { url: String, limit: usize },
}

/// Why a single candidate page was skipped during a crawl.
#[derive(Debug, Error)]
pub enum PageError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("{url}: {source}")]
    Markup { url: String, source: ExtractError },
}

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("snapshot I/O error at {path}: {source}")]
    Io { path: String, source: std::io::Error },

    #[error("invalid snapshot at {path}: {source}")]
    Json { path: String, source: serde_json::Error },

    #[error("no snapshot path bound to this index")]
    Unbound,
}

#[derive(Debug, Error)]
pub enum FrontierError {
    #[error("a seed url is required when not restarting a crawl session")]
    MissingSeed,

    #[error("seed url rejected by the admission policy: {0}")]
    InvalidSeed(String),

    #[error(transparent)]
    Snapshot(#[from] PersistError),
}

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("empty query")]
    EmptyQuery,
}
