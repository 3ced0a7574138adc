pub mod error;
pub mod extract;
pub mod fetch;
pub mod frontier;
pub mod index;
pub mod persist;
pub mod search;
pub mod tokenizer;

pub use error::{ExtractError, FetchError, FrontierError, PageError, PersistError, SearchError};
pub use extract::{extract, ExtractedPage};
pub use fetch::{fetch_page, Fetch, Fetched, HtmlPage};
pub use frontier::{Frontier, UrlPolicy};
pub use index::*;
pub use persist::DataPaths;
pub use search::{Answer, Searcher};
