use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use trawl_core::{Fetch, FetchError, Fetched};

/// In-memory web: url -> (status, html). Unknown urls fail to connect.
#[derive(Clone, Default)]
pub struct StubWeb {
    pages: Arc<HashMap<String, (u16, String)>>,
    calls: Arc<Mutex<Vec<String>>>,
}

impl StubWeb {
    pub fn new<'a>(pages: impl IntoIterator<Item = (&'a str, u16, &'a str)>) -> Self {
        let pages = pages
            .into_iter()
            .map(|(url, status, html)| (url.to_string(), (status, html.to_string())))
            .collect();
        Self { pages: Arc::new(pages), calls: Arc::default() }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }
}

impl Fetch for StubWeb {
    async fn fetch(&self, url: &str) -> Result<Fetched, FetchError> {
        self.calls.lock().push(url.to_string());
        match self.pages.get(url) {
            Some((status, html)) => Ok(Fetched {
                status: *status,
                body: html.as_bytes().to_vec(),
                final_url: url.to_string(),
            }),
            None => Err(FetchError::Connection { url: url.to_string(), message: "unreachable".into() }),
        }
    }
}
