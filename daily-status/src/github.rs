//! # GitHub adapter
//!
//! Implements [`ItemSource`] against the GitHub REST API with `reqwest`:
//!
//! - `GET /user` for the contributor,
//! - `GET /search/issues?q=...` for issues and pull requests,
//! - `GET /gists` for gists. The REST API cannot filter gists, so the gist
//!   query is only logged.
//!
//! The base URL is configurable so tests can point the client at a local mock
//! server.

use async_trait::async_trait;
use daily_status_core::contract::ItemSource;
use daily_status_core::error::BoxError;
use daily_status_core::item::{Contributor, WorkItem};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, error};

const PER_PAGE: &str = "100";

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    items: Vec<WorkItem>,
}

#[derive(Debug, Clone)]
pub struct GitHubClient {
    http: reqwest::Client,
    base_url: String,
    token: String,
}

impl GitHubClient {
    pub const DEFAULT_BASE_URL: &'static str = "https://api.github.com";

    pub fn new(base_url: &str, token: &str) -> Result<Self, reqwest::Error> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/vnd.github+json"),
        );
        let http = reqwest::Client::builder()
            .user_agent(concat!("daily-status/", env!("CARGO_PKG_VERSION")))
            .default_headers(headers)
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
        })
    }

    async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T, BoxError> {
        let url = format!("{}{path}", self.base_url);
        debug!(%url, ?query, "GitHub request");
        let response = self
            .http
            .get(&url)
            .header("Authorization", format!("token {}", self.token))
            .query(query)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!(%url, %status, "GitHub request failed");
            return Err(format!("GET {path} returned {status}: {body}").into());
        }
        Ok(response.json::<T>().await?)
    }
}

#[async_trait]
impl ItemSource for GitHubClient {
    async fn current_user(&self) -> Result<Contributor, BoxError> {
        self.get("/user", &[]).await
    }

    async fn search_items(&self, query: &str) -> Result<Vec<WorkItem>, BoxError> {
        let response: SearchResponse = self
            .get("/search/issues", &[("q", query), ("per_page", PER_PAGE)])
            .await?;
        debug!(query, count = response.items.len(), "GitHub search finished");
        Ok(response.items)
    }

    async fn gists(&self, query: &str) -> Result<Vec<WorkItem>, BoxError> {
        if !query.trim().is_empty() {
            debug!(query, "GitHub cannot filter gists, listing all of them");
        }
        self.get("/gists", &[("per_page", PER_PAGE)]).await
    }
}
