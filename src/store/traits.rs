use crate::record::Poem;
use async_trait::async_trait;
use futures::stream::BoxStream;

/// Lazy, forward-only sequence of poems. Restart by issuing the query again.
pub type PoemStream = BoxStream<'static, Result<Poem, StoreError>>;

/// Persistent document store holding every ingested poem
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn init_schema(&self) -> Result<(), StoreError>;

    /// Insert a single poem, returning its assigned id
    async fn insert_one(&self, poem: &Poem) -> Result<String, StoreError>;

    /// Insert a batch of poems atomically, returning how many were written
    async fn insert_many(&self, poems: &[Poem]) -> Result<usize, StoreError>;

    /// Stream every poem belonging to `dataset`
    async fn find_by_dataset(&self, dataset: &str) -> Result<PoemStream, StoreError>;

    /// Distinct dataset names, sorted
    async fn datasets(&self) -> Result<Vec<String>, StoreError>;

    async fn count(&self, dataset: Option<&str>) -> Result<u64, StoreError>;
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(String),

    #[error("invalid stored record: {0}")]
    Decode(String),

    #[error("encoding error: {0}")]
    Encoding(#[from] serde_json::Error),

    #[error("task join error: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl From<::duckdb::Error> for StoreError {
    fn from(e: ::duckdb::Error) -> Self {
        StoreError::Database(e.to_string())
    }
}
