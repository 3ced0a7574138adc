use reqwest::{header, redirect, Client};
use std::time::Duration;
use tokio::task::JoinSet;
use tracing::{error, info, warn};
use trawl_core::{fetch_page, Fetch, FetchError, Fetched, Frontier, HtmlPage, PageError, SharedIndex};

/// Pages larger than this are skipped.
pub const MAX_BODY_BYTES: usize = 2 * 1024 * 1024;

/// [`Fetch`] over HTTP. Requests time out after the configured duration.
#[derive(Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(user_agent: &str, timeout: Duration) -> reqwest::Result<Self> {
        let client = Client::builder()
            .user_agent(user_agent)
            .redirect(redirect::Policy::limited(5))
            .timeout(timeout)
            .build()?;
        Ok(Self { client })
    }
}

fn classify(url: &str, err: reqwest::Error) -> FetchError {
    if err.is_timeout() {
        FetchError::Timeout { url: url.to_string() }
    } else {
        FetchError::Connection { url: url.to_string(), message: err.to_string() }
    }
}

impl Fetch for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<Fetched, FetchError> {
        let resp = self.client.get(url).send().await.map_err(|e| classify(url, e))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::Status { url: url.to_string(), status: status.as_u16() });
        }
        if let Some(ct) = resp.headers().get(header::CONTENT_TYPE).and_then(|v| v.to_str().ok()) {
            if !ct.starts_with("text/html") {
                return Err(FetchError::NotHtml { url: url.to_string(), content_type: ct.to_string() });
            }
        }
        let final_url = resp.url().to_string();
        let body = resp.bytes().await.map_err(|e| classify(url, e))?;
        if body.len() > MAX_BODY_BYTES {
            return Err(FetchError::TooLarge { url: url.to_string(), limit: MAX_BODY_BYTES });
        }
        Ok(Fetched { status: status.as_u16(), body: body.to_vec(), final_url })
    }
}

#[derive(Debug, Clone)]
pub struct CrawlOptions {
    /// Stop once this many pages have been indexed.
    pub max_pages: usize,
    /// Fetches in flight at once.
    pub concurrency: usize,
}

impl Default for CrawlOptions {
    fn default() -> Self {
        Self { max_pages: 1000, concurrency: 8 }
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CrawlReport {
    pub indexed: usize,
    pub skipped: usize,
}

/// Crawl until `max_pages` pages are indexed or the frontier runs dry.
///
/// Fetching and extraction run in spawned tasks; this function is the only
/// writer of the frontier and of the index, which it updates once a page has
/// been fully extracted.
pub async fn run_crawl<F>(
    frontier: &mut Frontier,
    index: &SharedIndex,
    fetcher: F,
    options: &CrawlOptions,
) -> CrawlReport
where
    F: Fetch + Clone + Send + Sync + 'static,
{
    let concurrency = options.concurrency.max(1);
    let mut inflight: JoinSet<(String, Result<HtmlPage, PageError>)> = JoinSet::new();
    let mut report = CrawlReport::default();

    loop {
        while inflight.len() < concurrency && report.indexed + inflight.len() < options.max_pages {
            let Some(url) = frontier.next_candidate() else { break };
            info!(%url, "crawling");
            let fetcher = fetcher.clone();
            inflight.spawn(async move {
                let result = fetch_page(&fetcher, &url).await;
                (url, result)
            });
        }

        let Some(joined) = inflight.join_next().await else { break };
        match joined {
            Ok((_, Ok(page))) => {
                if !page.title.is_empty() {
                    info!(url = %page.url, title = %page.title, "fetched page");
                }
                frontier.mark_crawled(&page);
                index.write().add_document(&page.url, &page.title, &page.body);
                report.indexed += 1;
                if report.indexed % 100 == 0 {
                    info!(
                        indexed = report.indexed,
                        pending = frontier.to_crawl_len(),
                        "progress"
                    );
                }
            }
            Ok((url, Err(err))) => {
                warn!(%url, error = %err, "skipping page");
                frontier.mark_failed(&url);
                report.skipped += 1;
            }
            Err(err) => error!(error = %err, "crawl task failed"),
        }
    }

    if frontier.is_exhausted() {
        info!("reached the end of the frontier");
    }
    report
}
