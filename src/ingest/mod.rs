use crate::config::IngestConfig;
use crate::pipeline::{
    BatchWriter, BoundedQueue, PoolError, PoolReport, QueueError, WorkerPool, WriteError,
};
use crate::record::Poem;
use crate::store::DocumentStore;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum IngestError {
    #[error("no poems provided")]
    EmptyBatch,

    #[error(transparent)]
    Queue(#[from] QueueError),

    #[error(transparent)]
    Pool(#[from] PoolError),
}

impl IngestError {
    /// Whether the caller should retry later rather than fix the request
    pub fn is_capacity(&self) -> bool {
        matches!(self, IngestError::Queue(_))
    }
}

/// A batch of poems waiting to be persisted
#[derive(Debug, Clone)]
pub struct IngestJob {
    pub job_id: Uuid,
    pub poems: Vec<Poem>,
    pub received_at: DateTime<Utc>,
}

/// Receipt for an accepted job
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Admission {
    pub job_id: Uuid,
    pub poem_count: usize,
    pub queue_depth: usize,
}

#[derive(Debug, Clone)]
pub struct IngestStatus {
    pub queue_depth: usize,
    pub capacity: usize,
    pub timestamp: DateTime<Utc>,
}

/// Persists a whole job with one batch insert.
///
/// The insert runs as one transaction on the blocking pool. If the pool's
/// write timeout fires first, the transaction is not rolled back and may still
/// commit after the job has been counted as failed.
pub struct PersistWriter {
    store: Arc<dyn DocumentStore>,
}

impl PersistWriter {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl BatchWriter<IngestJob> for PersistWriter {
    async fn write(&self, job: IngestJob) -> Result<(), WriteError> {
        let inserted = self.store.insert_many(&job.poems).await?;
        debug!(
            job_id = %job.job_id,
            poems = inserted,
            waited_ms = (Utc::now() - job.received_at).num_milliseconds(),
            "Job persisted"
        );
        Ok(())
    }
}

/// Owns the ingestion queue and the worker pool that drains it.
///
/// One instance is built at startup and shared by handle with the HTTP layer.
pub struct IngestService {
    queue: Arc<BoundedQueue<IngestJob>>,
    pool: WorkerPool<IngestJob>,
    workers: usize,
}

impl IngestService {
    pub fn new(store: Arc<dyn DocumentStore>, config: &IngestConfig) -> Self {
        let queue = Arc::new(BoundedQueue::new(config.queue_capacity));
        let pool = WorkerPool::<IngestJob>::new(
            "ingest",
            Arc::clone(&queue),
            Arc::new(PersistWriter::new(store)),
            config.write_timeout,
        );

        Self {
            queue,
            pool,
            workers: config.workers,
        }
    }

    pub fn start(&self) -> Result<(), IngestError> {
        self.pool.start(self.workers)?;
        Ok(())
    }

    /// Queue a batch of poems for persistence without waiting.
    ///
    /// Empty batches are rejected before the queue is touched; a full queue
    /// rejects with [`QueueError::Full`].
    pub fn submit(&self, poems: Vec<Poem>) -> Result<Admission, IngestError> {
        if poems.is_empty() {
            return Err(IngestError::EmptyBatch);
        }

        let job_id = Uuid::new_v4();
        let poem_count = poems.len();
        let job = IngestJob {
            job_id,
            poems,
            received_at: Utc::now(),
        };

        match self.queue.submit(job) {
            Ok(queue_depth) => {
                info!(%job_id, poems = poem_count, queue_depth, "Job accepted");
                Ok(Admission {
                    job_id,
                    poem_count,
                    queue_depth,
                })
            }
            Err(e) => {
                warn!(%job_id, poems = poem_count, error = %e, "Job rejected");
                Err(e.into())
            }
        }
    }

    pub fn status(&self) -> IngestStatus {
        IngestStatus {
            queue_depth: self.queue.depth(),
            capacity: self.queue.capacity(),
            timestamp: Utc::now(),
        }
    }

    pub fn is_running(&self) -> bool {
        self.pool.is_running()
    }

    /// Refuse new jobs, stop the workers and report what was left behind.
    ///
    /// Workers finish the job they hold; jobs still queued are dropped and
    /// counted as abandoned.
    pub async fn shutdown(&self) -> PoolReport {
        self.queue.close();
        let report = self.pool.stop().await;

        let abandoned = self.queue.drain();
        if !abandoned.is_empty() {
            let poems: usize = abandoned.iter().map(|job| job.poems.len()).sum();
            warn!(
                jobs = abandoned.len(),
                poems = poems,
                "Discarding queued jobs at shutdown"
            );
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{DuckDbStore, PoemStream, StoreError};
    use std::time::Duration;

    /// Rejects any batch containing a poem titled "reject", delegating the rest
    struct PickyStore {
        inner: DuckDbStore,
    }

    #[async_trait]
    impl DocumentStore for PickyStore {
        async fn init_schema(&self) -> Result<(), StoreError> {
            self.inner.init_schema().await
        }
        async fn insert_one(&self, poem: &Poem) -> Result<String, StoreError> {
            self.inner.insert_one(poem).await
        }
        async fn insert_many(&self, poems: &[Poem]) -> Result<usize, StoreError> {
            if poems.iter().any(|p| p.title == "reject") {
                return Err(StoreError::Database("constraint violated".to_string()));
            }
            self.inner.insert_many(poems).await
        }
        async fn find_by_dataset(&self, dataset: &str) -> Result<PoemStream, StoreError> {
            self.inner.find_by_dataset(dataset).await
        }
        async fn datasets(&self) -> Result<Vec<String>, StoreError> {
            self.inner.datasets().await
        }
        async fn count(&self, dataset: Option<&str>) -> Result<u64, StoreError> {
            self.inner.count(dataset).await
        }
    }

    fn poem(title: &str) -> Poem {
        Poem {
            id: None,
            dataset: "api".to_string(),
            dataset_id: String::new(),
            title: title.to_string(),
            poem: "Because I could not stop for Death".to_string(),
            poet: "Emily Dickinson".to_string(),
            tags: vec![],
            language: "english".to_string(),
        }
    }

    fn config(capacity: usize, workers: usize) -> IngestConfig {
        IngestConfig {
            queue_capacity: capacity,
            workers,
            write_timeout: Duration::from_secs(10),
        }
    }

    async fn memory_store() -> Arc<DuckDbStore> {
        let store = Arc::new(DuckDbStore::in_memory().unwrap());
        store.init_schema().await.unwrap();
        store
    }

    async fn wait_for_count(store: &dyn DocumentStore, expected: u64) {
        tokio::time::timeout(Duration::from_secs(10), async {
            while store.count(None).await.unwrap() < expected {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("poems were not persisted in time");
    }

    #[tokio::test]
    async fn test_empty_batch_is_rejected_before_queueing() {
        let service = IngestService::new(memory_store().await, &config(1, 1));
        assert_eq!(service.submit(vec![]), Err(IngestError::EmptyBatch));
        assert_eq!(service.status().queue_depth, 0);
    }

    #[tokio::test]
    async fn test_full_queue_rejects_without_blocking() {
        let service = IngestService::new(memory_store().await, &config(2, 1));

        assert_eq!(service.submit(vec![poem("a")]).unwrap().queue_depth, 1);
        assert_eq!(service.submit(vec![poem("b"), poem("c")]).unwrap().queue_depth, 2);

        let err = service.submit(vec![poem("d")]).unwrap_err();
        assert_eq!(err, IngestError::Queue(QueueError::Full { capacity: 2 }));
        assert!(err.is_capacity());
        assert!(!IngestError::EmptyBatch.is_capacity());

        let status = service.status();
        assert_eq!(status.queue_depth, 2);
        assert_eq!(status.capacity, 2);
    }

    #[tokio::test]
    async fn test_accepted_jobs_are_persisted() {
        let store = memory_store().await;
        let service = IngestService::new(store.clone(), &config(10, 3));
        service.start().unwrap();

        let admission = service.submit(vec![poem("one"), poem("two")]).unwrap();
        assert_eq!(admission.poem_count, 2);
        service.submit(vec![poem("three")]).unwrap();

        wait_for_count(store.as_ref(), 3).await;
        let report = service.shutdown().await;
        assert_eq!(report.completed, 2);
        assert_eq!(report.abandoned, 0);
        assert!(!service.is_running());
    }

    #[tokio::test]
    async fn test_persistence_failure_does_not_block_later_jobs() {
        let store = Arc::new(PickyStore {
            inner: DuckDbStore::in_memory().unwrap(),
        });
        store.init_schema().await.unwrap();
        let service = IngestService::new(store.clone(), &config(10, 1));
        service.start().unwrap();

        service.submit(vec![poem("reject"), poem("lost")]).unwrap();
        service.submit(vec![poem("kept")]).unwrap();

        wait_for_count(store.as_ref(), 1).await;
        let report = service.shutdown().await;
        assert_eq!(report.failed, 1);
        assert_eq!(report.completed, 1);
        assert_eq!(store.count(None).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_start_twice_is_rejected() {
        let service = IngestService::new(memory_store().await, &config(4, 2));
        service.start().unwrap();
        assert_eq!(
            service.start(),
            Err(IngestError::Pool(PoolError::AlreadyRunning("ingest".to_string())))
        );
        service.shutdown().await;
    }

    #[tokio::test]
    async fn test_shutdown_abandons_queued_jobs_and_refuses_new_ones() {
        let service = IngestService::new(memory_store().await, &config(4, 1));
        service.submit(vec![poem("a")]).unwrap();
        service.submit(vec![poem("b")]).unwrap();

        let report = service.shutdown().await;
        assert_eq!(report.abandoned, 2);
        assert_eq!(service.status().queue_depth, 0);
        assert_eq!(
            service.submit(vec![poem("c")]),
            Err(IngestError::Queue(QueueError::Closed))
        );

        // A second shutdown is harmless.
        let report = service.shutdown().await;
        assert_eq!(report.abandoned, 0);
    }
}
