use crate::{extract, FetchError, PageError};
use std::collections::HashSet;
use std::future::Future;

/// Raw response of a fetch.
#[derive(Debug, Clone)]
pub struct Fetched {
    pub status: u16,
    pub body: Vec<u8>,
    /// Url after redirects.
    pub final_url: String,
}

/// Network access used by the frontier. Implementations should bound each
/// request with a timeout and report it as [`FetchError::Timeout`].
pub trait Fetch {
    fn fetch(&self, url: &str) -> impl Future<Output = Result<Fetched, FetchError>> + Send;
}

/// A fetched and extracted page, ready for indexing.
#[derive(Debug, Clone)]
pub struct HtmlPage {
    /// Url the page was requested with; the document key in the index.
    pub url: String,
    pub final_url: String,
    pub title: String,
    pub body: String,
    pub links: HashSet<String>,
}

/// Fetch `url` and extract its content. Links resolve against the final url.
pub async fn fetch_page<F: Fetch>(fetcher: &F, url: &str) -> Result<HtmlPage, PageError> {
    let fetched = fetcher.fetch(url).await?;
    if !(200..300).contains(&fetched.status) {
        return Err(FetchError::Status { url: url.to_string(), status: fetched.status }.into());
    }
    let html = String::from_utf8_lossy(&fetched.body);
    let page = extract(&fetched.final_url, &html)
        .map_err(|source| PageError::Markup { url: url.to_string(), source })?;
    Ok(HtmlPage {
        url: url.to_string(),
        final_url: fetched.final_url,
        title: page.title,
        body: page.body,
        links: page.links,
    })
}
