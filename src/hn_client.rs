use reqwest::blocking::Client;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::AppConfig;
use crate::error::FetchError;
use crate::models::ResultPage;

/// Anything that can run one page of a search. Shared with worker threads.
pub trait SearchTransport: Send + Sync {
    fn search(&self, term: &str, page: u32) -> Result<ResultPage, FetchError>;
}

pub struct HackerNewsSearchClient {
    client: Client,
    base_url: String,
    hits_per_page: u32,
}

impl HackerNewsSearchClient {
    pub fn new(config: &AppConfig) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            hits_per_page: config.hits_per_page,
        })
    }

    fn search_url(&self) -> String {
        format!("{}/search", self.base_url)
    }
}

impl SearchTransport for HackerNewsSearchClient {
    fn search(&self, term: &str, page: u32) -> Result<ResultPage, FetchError> {
        debug!(term, page, "requesting search page");

        let response = self
            .client
            .get(self.search_url())
            .query(&[
                ("query", term.to_string()),
                ("page", page.to_string()),
                ("hitsPerPage", self.hits_per_page.to_string()),
            ])
            .send()?;

        let status = response.status();
        if !status.is_success() {
            warn!(term, page, %status, "search endpoint returned an error status");
            return Err(FetchError::FetchFailed(format!("unexpected status {}", status)));
        }

        let result: ResultPage = response.json()?;
        debug!(term, page, hits = result.hits.len(), "search page decoded");
        Ok(result)
    }
}
