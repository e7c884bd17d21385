//! HTTP page source backed by a blocking ureq agent.

use super::page_source::{
    parse_lookup_body, parse_page_body, LookupRequest, PageRequest, PageResponse, PageSource,
};
use crate::error::TableError;
use crate::model::row::RowId;
use std::time::Duration;

const USER_AGENT: &str = concat!("telemetry-table/", env!("CARGO_PKG_VERSION"));

/// Talks to `GET <api_url>?offset=..&limit=..` and `GET <api_url>/search?field=..&value=..`
pub struct HttpPageSource {
    agent: ureq::Agent,
    api_url: String,
    search_url: String,
}

impl HttpPageSource {
    pub fn new(api_url: &str, timeout: Duration) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build();
        let api_url = api_url.trim_end_matches('/').to_string();
        let search_url = format!("{api_url}/search");
        Self {
            agent,
            api_url,
            search_url,
        }
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    fn get(&self, url: &str, pairs: &[(String, String)]) -> Result<String, TableError> {
        let mut request = self.agent.get(url).set("Accept", "application/json");
        for (key, value) in pairs {
            request = request.query(key, value);
        }

        match request.call() {
            Ok(response) => response.into_string().map_err(|e| {
                TableError::NetworkFailure(format!("Failed to read response body: {e}"))
            }),
            Err(ureq::Error::Status(code, response)) => {
                tracing::debug!("HTTP {} from {}", code, response.get_url());
                let message = format!("HTTP status {code}");
                if (400..500).contains(&code) {
                    Err(TableError::Rejected(message))
                } else {
                    Err(TableError::NetworkFailure(message))
                }
            }
            Err(ureq::Error::Transport(transport)) => {
                tracing::debug!("HTTP request failed: {}", transport);
                Err(TableError::NetworkFailure(format!(
                    "HTTP request failed: {transport}"
                )))
            }
        }
    }
}

impl PageSource for HttpPageSource {
    fn fetch_page(&self, request: &PageRequest) -> Result<PageResponse, TableError> {
        tracing::debug!(
            "Fetching page {} (offset {}, limit {}) from {}",
            request.page,
            request.offset,
            request.limit,
            self.api_url
        );
        let body = self.get(&self.api_url, &request.query_pairs())?;
        parse_page_body(&body)
    }

    fn lookup(&self, request: &LookupRequest) -> Result<Option<RowId>, TableError> {
        tracing::debug!("Searching {}={}", request.field, request.value);
        let body = self.get(&self.search_url, &request.query_pairs())?;
        parse_lookup_body(&body)
    }
}
