use super::{IndexStatus, SearchSink, SinkError};
use crate::config::types::SearchConfig;
use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::StatusCode;
use tracing::{debug, info};

const ALREADY_EXISTS: &str = "resource_already_exists_exception";

/// Elasticsearch (or OpenSearch) over its REST API
#[derive(Debug, Clone)]
pub struct ElasticsearchSink {
    base_url: String,
    client: reqwest::Client,
}

impl ElasticsearchSink {
    pub fn new(config: &SearchConfig) -> Result<Self, SinkError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;

        Ok(Self {
            base_url: config.url.trim_end_matches('/').to_string(),
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn index_url(&self, index: &str) -> String {
        format!("{}/{}", self.base_url, index)
    }

    async fn error_status(response: reqwest::Response) -> SinkError {
        SinkError::Status {
            status: response.status().as_u16(),
            message: response.text().await.unwrap_or_default(),
        }
    }
}

/// Elasticsearch error bodies look like `{"error": {"type": "...", ...}, "status": 400}`
fn error_type(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    value
        .pointer("/error/type")
        .and_then(serde_json::Value::as_str)
        .map(str::to_string)
}

#[async_trait]
impl SearchSink for ElasticsearchSink {
    async fn index_exists(&self, index: &str) -> Result<bool, SinkError> {
        let response = self.client.head(self.index_url(index)).send().await?;

        match response.status() {
            StatusCode::OK => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            _ => Err(Self::error_status(response).await),
        }
    }

    async fn ensure_index(&self, index: &str) -> Result<IndexStatus, SinkError> {
        let response = self.client.put(self.index_url(index)).send().await?;

        if response.status().is_success() {
            info!(index = %index, "Created search index");
            return Ok(IndexStatus::Created);
        }

        let status = response.status().as_u16();
        let message = response.text().await.unwrap_or_default();
        if error_type(&message).as_deref() == Some(ALREADY_EXISTS) {
            debug!(index = %index, "Search index already exists");
            return Ok(IndexStatus::AlreadyExists);
        }

        Err(SinkError::Status { status, message })
    }

    async fn bulk(&self, index: &str, body: String) -> Result<(), SinkError> {
        let url = format!("{}/_bulk?refresh=false", self.index_url(index));
        let response = self
            .client
            .post(&url)
            .header(CONTENT_TYPE, "application/x-ndjson")
            .body(body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::error_status(response).await);
        }
        Ok(())
    }
}
