use crate::config::ReindexConfig;
use crate::pipeline::{
    AccumulatorError, BatchAccumulator, BatchWriter, BoundedQueue, BulkBatch, PoolError,
    QueueError, WorkerPool, WriteError,
};
use crate::search::{IndexStatus, SearchSink, SinkError};
use crate::store::{DocumentStore, StoreError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum ReindexError {
    #[error("failed to ensure index '{index}': {source}")]
    Index {
        index: String,
        #[source]
        source: SinkError,
    },

    #[error("failed to read source documents: {0}")]
    Store(#[from] StoreError),

    #[error(transparent)]
    Serialize(#[from] AccumulatorError),

    #[error("bulk write failed: {0}")]
    Sink(#[from] WriteError),

    #[error(transparent)]
    Pool(#[from] PoolError),

    #[error("failed to enqueue batch: {0}")]
    Queue(#[from] QueueError),
}

#[derive(Debug, Clone)]
pub struct ReindexOptions {
    pub batch_threshold_bytes: usize,
    pub workers: usize,
    /// Unset means one slot per worker
    pub queue_capacity: Option<usize>,
    pub write_timeout: Duration,
}

impl From<&ReindexConfig> for ReindexOptions {
    fn from(config: &ReindexConfig) -> Self {
        Self {
            batch_threshold_bytes: config.batch_threshold_bytes,
            workers: config.workers,
            queue_capacity: config.queue_capacity,
            write_timeout: config.write_timeout,
        }
    }
}

impl ReindexOptions {
    /// Override the worker count. The queue follows unless it was sized explicitly.
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn queue_capacity(&self) -> usize {
        self.queue_capacity.unwrap_or(self.workers)
    }
}

/// Summary of a completed reindex run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineRun {
    pub run_id: Uuid,
    pub dataset: String,
    pub index: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub index_created: bool,
    pub documents_read: usize,
    pub batches_flushed: usize,
    pub batches_written: usize,
}

/// Writes one sealed bulk body to the search sink
pub struct BulkIndexWriter {
    sink: Arc<dyn SearchSink>,
    index: String,
}

impl BulkIndexWriter {
    pub fn new(sink: Arc<dyn SearchSink>, index: impl Into<String>) -> Self {
        Self {
            sink,
            index: index.into(),
        }
    }
}

#[async_trait]
impl BatchWriter<BulkBatch> for BulkIndexWriter {
    async fn write(&self, batch: BulkBatch) -> Result<(), WriteError> {
        let documents = batch.documents();
        let bytes = batch.len();
        self.sink.bulk(&self.index, batch.into_body()).await?;
        debug!(
            index = %self.index,
            batch_documents = documents,
            batch_bytes = bytes,
            "Bulk batch written"
        );
        Ok(())
    }
}

enum Production {
    Exhausted,
    SinkFailed,
}

#[derive(Default)]
struct Produced {
    documents: usize,
    batches: usize,
}

/// Streams one dataset out of the document store into a search index.
///
/// The store cursor feeds a [`BatchAccumulator`]; sealed batches are queued
/// for a [`WorkerPool`] of bulk writers. The first failure of any kind ends
/// the run: production stops, no further bulk write is started, and the error
/// is returned.
pub struct Reindexer {
    store: Arc<dyn DocumentStore>,
    sink: Arc<dyn SearchSink>,
    options: ReindexOptions,
}

impl Reindexer {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        sink: Arc<dyn SearchSink>,
        options: ReindexOptions,
    ) -> Self {
        Self {
            store,
            sink,
            options,
        }
    }

    pub async fn run(&self, dataset: &str, index: &str) -> Result<PipelineRun, ReindexError> {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        info!(%run_id, dataset = %dataset, index = %index, "Starting reindex");

        let status = self
            .sink
            .ensure_index(index)
            .await
            .map_err(|source| ReindexError::Index {
                index: index.to_string(),
                source,
            })?;

        let queue = Arc::new(BoundedQueue::new(self.options.queue_capacity()));
        let writer: Arc<dyn BatchWriter<BulkBatch>> =
            Arc::new(BulkIndexWriter::new(Arc::clone(&self.sink), index));
        let pool = WorkerPool::new(
            format!("reindex-{}", index),
            Arc::clone(&queue),
            writer,
            self.options.write_timeout,
        )
        .stop_on_failure();
        pool.start(self.options.workers)?;

        let failed = pool.failure_signal();
        let mut produced = Produced::default();
        let outcome = self
            .produce(dataset, index, &queue, &failed, &mut produced)
            .await;
        queue.close();

        let report = match outcome {
            Ok(Production::Exhausted) => pool.join().await,
            Ok(Production::SinkFailed) | Err(_) => pool.stop().await,
        };

        if let Some(err) = pool.take_first_failure() {
            warn!(
                %run_id,
                written = report.completed,
                abandoned = report.abandoned,
                error = %err,
                "Reindex aborted by a failed bulk write"
            );
            return Err(err.into());
        }
        outcome?;

        let run = PipelineRun {
            run_id,
            dataset: dataset.to_string(),
            index: index.to_string(),
            started_at,
            finished_at: Utc::now(),
            index_created: status == IndexStatus::Created,
            documents_read: produced.documents,
            batches_flushed: produced.batches,
            batches_written: report.completed,
        };
        info!(
            %run_id,
            documents = run.documents_read,
            batches = run.batches_written,
            "Reindex finished"
        );
        Ok(run)
    }

    async fn produce(
        &self,
        dataset: &str,
        index: &str,
        queue: &BoundedQueue<BulkBatch>,
        failed: &CancellationToken,
        produced: &mut Produced,
    ) -> Result<Production, ReindexError> {
        let mut cursor = self.store.find_by_dataset(dataset).await?;
        let mut accumulator = BatchAccumulator::new(index, self.options.batch_threshold_bytes);

        loop {
            let next = tokio::select! {
                biased;
                _ = failed.cancelled() => return Ok(Production::SinkFailed),
                next = cursor.next() => next,
            };
            let Some(poem) = next else { break };
            let poem = poem?;

            produced.documents += 1;
            if let Some(batch) = accumulator.push(&poem.search_document())? {
                if !enqueue(queue, batch, failed, produced).await? {
                    return Ok(Production::SinkFailed);
                }
            }
        }

        if let Some(batch) = accumulator.finish() {
            if !enqueue(queue, batch, failed, produced).await? {
                return Ok(Production::SinkFailed);
            }
        }
        Ok(Production::Exhausted)
    }
}

/// Returns `false` if a worker failure cancelled the wait for queue space
async fn enqueue(
    queue: &BoundedQueue<BulkBatch>,
    batch: BulkBatch,
    failed: &CancellationToken,
    produced: &mut Produced,
) -> Result<bool, QueueError> {
    let documents = batch.documents();
    match queue.send(batch, failed).await {
        Ok(depth) => {
            produced.batches += 1;
            debug!(batch_documents = documents, queue_depth = depth, "Batch queued");
            Ok(true)
        }
        Err(QueueError::Cancelled) => Ok(false),
        Err(e) => Err(e),
    }
}
