use crate::config::ClientConfig;
use crate::record::Poem;
use crate::reindex::PipelineRun;
use crate::web::api::{HealthResponse, JobAccepted, ReindexRequest, StatusResponse};
use reqwest::StatusCode;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("ingestion service returned status {status}: {message}")]
    Rejected { status: u16, message: String },
}

impl ClientError {
    /// Nothing was listening at the service address
    pub fn is_unreachable(&self) -> bool {
        matches!(self, ClientError::Http(e) if e.is_connect())
    }

    /// The service's queue was full; the same job can be sent again later
    pub fn is_backpressure(&self) -> bool {
        matches!(self, ClientError::Rejected { status, .. } if *status == StatusCode::SERVICE_UNAVAILABLE.as_u16())
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;

/// HTTP client for the ingestion service
#[derive(Debug, Clone)]
pub struct WorkerClient {
    base_url: String,
    client: reqwest::Client,
    reindex_timeout: Duration,
}

impl WorkerClient {
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()?;

        Ok(Self {
            base_url: config.url.trim_end_matches('/').to_string(),
            client,
            reindex_timeout: config.reindex_timeout,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Submit poems as one job. Only a 202 counts as accepted.
    pub async fn submit_job(&self, poems: &[Poem]) -> Result<JobAccepted> {
        let url = format!("{}/jobs", self.base_url);
        let response = self.client.post(&url).json(poems).send().await?;

        if response.status() != StatusCode::ACCEPTED {
            return Err(rejected(response).await);
        }

        Ok(response.json().await?)
    }

    pub async fn status(&self) -> Result<StatusResponse> {
        let url = format!("{}/status", self.base_url);
        let response = self.client.get(&url).send().await?;

        if !response.status().is_success() {
            return Err(rejected(response).await);
        }

        Ok(response.json().await?)
    }

    /// Run a reindex inside the service and wait for its summary
    pub async fn reindex(&self, request: &ReindexRequest) -> Result<PipelineRun> {
        let url = format!("{}/reindex", self.base_url);
        let response = self
            .client
            .post(&url)
            .timeout(self.reindex_timeout)
            .json(request)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(rejected(response).await);
        }

        Ok(response.json().await?)
    }

    pub async fn health(&self) -> Result<HealthResponse> {
        let url = format!("{}/health", self.base_url);
        let response = self.client.get(&url).send().await?;

        if !response.status().is_success() {
            return Err(rejected(response).await);
        }

        Ok(response.json().await?)
    }
}

/// Pull the `{"error": ...}` message out of a failed response, falling back to the raw body
async fn rejected(response: reqwest::Response) -> ClientError {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<serde_json::Value>(&body)
        .ok()
        .and_then(|v| v.get("error").and_then(|e| e.as_str()).map(str::to_string))
        .unwrap_or(body);

    ClientError::Rejected { status, message }
}
