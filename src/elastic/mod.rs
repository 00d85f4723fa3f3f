//! Elasticsearch access: request body construction and the `_search` call.

pub mod query;
pub mod types;

use std::fmt;

use reqwest::Client;
use tracing::{debug, warn};

use types::{ErrorResponse, IndexTarget, SearchRequest, SearchResponse};

pub const DEFAULT_URL: &str = "http://localhost:9200";

#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    #[error("search hit is missing content field '{field}'")]
    MissingField { field: String },

    #[error("no content field configured for index '{0}'")]
    UnmappedIndex(String),

    #[error("Elasticsearch error ({code}): {message}")]
    Api { code: u16, message: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
}

/// A ranked-document store exposing the `_search` shape.
/// Implemented by `ElasticClient`; mock implementations used in tests.
pub trait SearchBackend {
    async fn search(
        &self,
        index: &IndexTarget,
        body: &SearchRequest,
    ) -> Result<SearchResponse, SearchError>;
}

#[derive(Clone)]
struct ApiKey(String);

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

/// HTTP client for the Elasticsearch search API.
#[derive(Debug, Clone)]
pub struct ElasticClient {
    http: Client,
    base_url: String,
    api_key: Option<ApiKey>,
}

impl ElasticClient {
    pub fn new(http: Client, base_url: &str, api_key: Option<String>) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.map(ApiKey),
        }
    }
}

impl SearchBackend for ElasticClient {
    async fn search(
        &self,
        index: &IndexTarget,
        body: &SearchRequest,
    ) -> Result<SearchResponse, SearchError> {
        let url = format!("{}/{index}/_search", self.base_url);

        let mut request = self
            .http
            .post(&url)
            .header("User-Agent", crate::USER_AGENT)
            .json(body);
        if let Some(key) = &self.api_key {
            request = request.header("Authorization", format!("ApiKey {}", key.0));
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let classified = classify_error(status.as_u16(), &text);
            warn!(error = %classified, "Elasticsearch search failed");
            return Err(classified);
        }

        let parsed: SearchResponse = response.json().await?;
        debug!(%index, hits = parsed.hits.hits.len(), "search complete");
        Ok(parsed)
    }
}

fn classify_error(status: u16, text: &str) -> SearchError {
    if let Ok(body) = serde_json::from_str::<ErrorResponse>(text)
        && let Some(cause) = body.error
    {
        let kind = cause.kind.unwrap_or_else(|| "unknown".to_string());
        let reason = cause.reason.unwrap_or_else(|| "no reason given".to_string());
        return SearchError::Api {
            code: body.status.unwrap_or(status),
            message: format!("{kind}: {reason}"),
        };
    }
    let end = text.floor_char_boundary(200);
    SearchError::Api {
        code: status,
        message: format!("HTTP {status}: {}", &text[..end]),
    }
}
