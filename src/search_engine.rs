//! Full-text search backend (Elasticsearch JSON over HTTP)

use crate::config::SearchConfig;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::time::Instant;
use thiserror::Error;
use tracing::info;

/// Indexes searched when the caller names none
pub const DEFAULT_INDEXES: &str = "semantica.*";

/// Search errors
#[derive(Error, Debug)]
pub enum SearchError {
    /// Search endpoint unreachable
    #[error("Access to backend service failed. {0}")]
    Network(String),

    /// Search endpoint answered with a non-success status
    #[error("Access to backend service failed. HTTP {status}\nResponse:\n{body}")]
    Endpoint { status: u16, body: String },

    /// Response was not JSON
    #[error("Invalid search engine response: {0}")]
    Serialization(String),

    /// Client could not be built
    #[error("Configuration error: {0}")]
    Config(String),
}

pub type SearchResult<T> = Result<T, SearchError>;

/// Query access to the search engine
#[async_trait]
pub trait SearchEngine: Send + Sync {
    /// Run a query DSL body against `indexes` (all gateway indexes when empty)
    async fn search(&self, body: &Value, indexes: &[String]) -> SearchResult<Value>;
}

/// Elasticsearch `_search` client
pub struct ElasticsearchClient {
    client: Client,
    endpoint: String,
}

impl ElasticsearchClient {
    pub fn new(config: &SearchConfig) -> SearchResult<Self> {
        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| SearchError::Config(e.to_string()))?;

        Ok(Self {
            client,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
        })
    }

    /// `<endpoint>/<index,index>/_search`
    pub fn request_url(&self, indexes: &[String]) -> String {
        let indexes = if indexes.is_empty() {
            DEFAULT_INDEXES.to_string()
        } else {
            indexes.join(",")
        };
        format!("{}/{}/_search", self.endpoint, indexes)
    }
}

#[async_trait]
impl SearchEngine for ElasticsearchClient {
    async fn search(&self, body: &Value, indexes: &[String]) -> SearchResult<Value> {
        let url = self.request_url(indexes);
        let started = Instant::now();

        let resp = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| SearchError::Network(e.to_string()))?;
        info!(
            "ELASTICSEARCH - {} - POST [tempo: {:?}] - QUERY - {}",
            url,
            started.elapsed(),
            body
        );

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(SearchError::Endpoint {
                status: status.as_u16(),
                body,
            });
        }

        resp.json()
            .await
            .map_err(|e| SearchError::Serialization(e.to_string()))
    }
}

/// Hits of a search response
pub fn hits(response: &Value) -> &[Value] {
    response["hits"]["hits"]
        .as_array()
        .map(|hits| hits.as_slice())
        .unwrap_or_default()
}

/// Total hit count; accepts both the plain number and the `{"value": n}` form
pub fn total_hits(response: &Value) -> u64 {
    let total = &response["hits"]["total"];
    total
        .as_u64()
        .or_else(|| total["value"].as_u64())
        .unwrap_or(0)
}

/// First string of a `_source` field that may be a string or a list
pub fn source_text<'a>(hit: &'a Value, field: &str) -> Option<&'a str> {
    match &hit["_source"][field] {
        Value::String(s) => Some(s.as_str()),
        Value::Array(items) => items.iter().find_map(Value::as_str),
        _ => None,
    }
}
