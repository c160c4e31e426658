//! Twitter API v2 recent-search client.
//!
//! One request per call, no pagination: the page size caps how many posts a
//! single call can ever see. Every failure is reported as a
//! [`TidewatchError`] so callers can decide whether it is fatal.

mod wire;

use std::time::Duration;

use reqwest::Client;
use tracing::{debug, info, instrument};
use url::Url;

use tidewatch_shared::{Result, SearchItem, TidewatchError, TwitterConfig};

/// Path of the recent-search endpoint, relative to the API origin.
const SEARCH_RECENT_PATH: &str = "2/tweets/search/recent";

/// Smallest page size the endpoint accepts.
pub const MIN_PAGE_SIZE: u32 = 10;

/// Largest page size the endpoint accepts.
pub const MAX_PAGE_SIZE: u32 = 100;

/// Maximum number of redirects to follow.
const MAX_REDIRECTS: usize = 3;

/// User-Agent string for search requests.
const USER_AGENT: &str = concat!("Tidewatch/", env!("CARGO_PKG_VERSION"));

// ---------------------------------------------------------------------------
// SearchField
// ---------------------------------------------------------------------------

/// Optional post fields that can be requested via `tweet.fields`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchField {
    CreatedAt,
    Text,
    AuthorId,
    Geo,
}

impl SearchField {
    /// Fields the ingestion loop always asks for.
    pub const INGEST: [SearchField; 4] = [
        SearchField::CreatedAt,
        SearchField::Text,
        SearchField::AuthorId,
        SearchField::Geo,
    ];

    /// Name used by the API.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::CreatedAt => "created_at",
            Self::Text => "text",
            Self::AuthorId => "author_id",
            Self::Geo => "geo",
        }
    }
}

// ---------------------------------------------------------------------------
// Client options
// ---------------------------------------------------------------------------

/// Settings needed to build a [`TwitterClient`].
#[derive(Clone)]
pub struct SearchClientConfig {
    /// API origin, e.g. `https://api.twitter.com`.
    pub base_url: String,
    /// App-only bearer token.
    pub bearer_token: String,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl SearchClientConfig {
    /// Combine the `[twitter]` config section with a resolved token.
    pub fn from_config(config: &TwitterConfig, bearer_token: String) -> Self {
        Self {
            base_url: config.api_base_url.clone(),
            bearer_token,
            timeout: Duration::from_secs(config.timeout_secs),
        }
    }
}

// ---------------------------------------------------------------------------
// TwitterClient
// ---------------------------------------------------------------------------

/// HTTP client for the recent-search endpoint. Cheap to share by reference;
/// built once at startup.
#[derive(Clone)]
pub struct TwitterClient {
    client: Client,
    endpoint: Url,
    bearer_token: String,
}

impl TwitterClient {
    /// Build a client. Fails with a config error for an empty token or an
    /// unusable base URL.
    pub fn new(config: SearchClientConfig) -> Result<Self> {
        if config.bearer_token.trim().is_empty() {
            return Err(TidewatchError::config("bearer token is empty"));
        }

        let base = Url::parse(&config.base_url).map_err(|e| {
            TidewatchError::config(format!("invalid API base URL '{}': {e}", config.base_url))
        })?;
        let endpoint = base.join(SEARCH_RECENT_PATH).map_err(|e| {
            TidewatchError::config(format!("cannot build search URL from '{base}': {e}"))
        })?;

        let client = build_client(config.timeout)?;
        info!(%endpoint, "search client ready");

        Ok(Self {
            client,
            endpoint,
            bearer_token: config.bearer_token,
        })
    }

    /// Run one recent-search request and return matching posts in API order.
    ///
    /// `max_results` is clamped to what the endpoint accepts.
    #[instrument(skip_all, fields(max_results = tracing::field::Empty))]
    pub async fn search_recent(
        &self,
        query: &str,
        max_results: u32,
        fields: &[SearchField],
    ) -> Result<Vec<SearchItem>> {
        let page_size = clamp_page_size(max_results);
        tracing::Span::current().record("max_results", page_size);

        let field_list = fields
            .iter()
            .map(|f| f.as_str())
            .collect::<Vec<_>>()
            .join(",");

        let mut params: Vec<(&str, String)> = vec![
            ("query", query.to_string()),
            ("max_results", page_size.to_string()),
        ];
        if !field_list.is_empty() {
            params.push(("tweet.fields", field_list));
        }

        debug!(endpoint = %self.endpoint, "sending search request");

        let response = self
            .client
            .get(self.endpoint.clone())
            .bearer_auth(&self.bearer_token)
            .query(&params)
            .send()
            .await
            .map_err(|e| TidewatchError::Network(format!("{}: {e}", self.endpoint)))?;

        let status = response.status();
        let body = response.text().await.map_err(|e| {
            TidewatchError::Network(format!("{}: failed to read body: {e}", self.endpoint))
        })?;

        if !status.is_success() {
            return Err(TidewatchError::Api {
                status: status.as_u16(),
                message: wire::error_message(&body),
            });
        }

        let items = wire::decode_search_body(&body)?;
        debug!(count = items.len(), "search response decoded");
        Ok(items)
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Build a reqwest client with appropriate settings.
fn build_client(timeout: Duration) -> Result<Client> {
    Client::builder()
        .user_agent(USER_AGENT)
        .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
        .timeout(timeout)
        .build()
        .map_err(|e| TidewatchError::Network(format!("failed to build HTTP client: {e}")))
}

fn clamp_page_size(requested: u32) -> u32 {
    let clamped = requested.clamp(MIN_PAGE_SIZE, MAX_PAGE_SIZE);
    if clamped != requested {
        debug!(requested, clamped, "page size outside accepted range");
    }
    clamped
}
