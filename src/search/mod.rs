pub mod elasticsearch;

pub use self::elasticsearch::ElasticsearchSink;

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("search engine returned status {status}: {message}")]
    Status { status: u16, message: String },
}

/// Outcome of an idempotent index creation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexStatus {
    Created,
    AlreadyExists,
}

/// Search engine that documents are republished into.
///
/// Implementations must be safe for concurrent use from many workers.
#[async_trait]
pub trait SearchSink: Send + Sync {
    async fn index_exists(&self, index: &str) -> Result<bool, SinkError>;

    /// Create `index` unless it is already there. Losing a creation race is
    /// reported as `AlreadyExists`, not as an error.
    async fn ensure_index(&self, index: &str) -> Result<IndexStatus, SinkError>;

    /// Send one newline-delimited bulk body. The outcome covers the whole
    /// batch; per-item results are not inspected.
    async fn bulk(&self, index: &str, body: String) -> Result<(), SinkError>;
}
