use crate::pipeline::queue::BoundedQueue;
use crate::search::SinkError;
use crate::store::StoreError;
use async_trait::async_trait;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Failure of a single external write performed by a worker
#[derive(Debug, Error)]
pub enum WriteError {
    #[error("store write failed: {0}")]
    Store(#[from] StoreError),

    #[error("search sink write failed: {0}")]
    Sink(#[from] SinkError),

    #[error("write timed out after {0:?}")]
    Timeout(Duration),
}

/// Errors from pool lifecycle operations
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PoolError {
    #[error("worker pool '{0}' is already running")]
    AlreadyRunning(String),

    #[error("worker pool needs at least one worker")]
    NoWorkers,
}

/// Performs the external bulk write for one job.
///
/// Implementations are shared by every worker of a pool and must be safe for
/// concurrent use.
///
/// A write that overruns the pool's timeout is abandoned, not cancelled: its
/// future is dropped, but blocking work it already handed off (a store
/// transaction on the blocking thread pool, a request the server has received)
/// may still complete. A job counted as failed after a timeout can therefore
/// have been persisted. Writers must tolerate the same job being written again.
#[async_trait]
pub trait BatchWriter<J>: Send + Sync {
    async fn write(&self, job: J) -> Result<(), WriteError>;
}

/// What a single worker did before it exited
#[derive(Debug, Clone, Default)]
pub struct WorkerReport {
    pub worker: String,
    pub completed: usize,
    pub failed: usize,
}

/// Aggregated outcome of a pool run, produced by `stop` or `join`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PoolReport {
    pub workers: usize,
    pub completed: usize,
    pub failed: usize,
    /// Items still sitting in the queue when the workers exited
    pub abandoned: usize,
}

struct Running {
    shutdown: CancellationToken,
    workers: Vec<JoinHandle<WorkerReport>>,
}

impl Drop for Running {
    fn drop(&mut self) {
        // Dropping a running pool without stop still tells the workers to exit.
        self.shutdown.cancel();
    }
}

/// First write failure seen by any worker, plus a signal that fires when it is recorded
struct Failures {
    first: Mutex<Option<WriteError>>,
    signal: CancellationToken,
}

impl Failures {
    fn record(&self, err: WriteError) {
        let mut first = self.first.lock().unwrap_or_else(PoisonError::into_inner);
        if first.is_none() {
            *first = Some(err);
            self.signal.cancel();
        }
    }
}

/// Fixed set of workers draining a [`BoundedQueue`] through a [`BatchWriter`].
///
/// The pool owns its workers: `start` spawns them, `stop` broadcasts shutdown
/// and joins every one of them before returning. A failing or timed-out write
/// is logged and counted; the worker then moves on to the next item, unless
/// the pool was built with [`WorkerPool::stop_on_failure`]. Nothing is retried.
pub struct WorkerPool<J> {
    name: String,
    queue: Arc<BoundedQueue<J>>,
    writer: Arc<dyn BatchWriter<J>>,
    write_timeout: Duration,
    stop_on_failure: bool,
    running: Mutex<Option<Running>>,
    failures: Arc<Failures>,
}

impl<J: Send + 'static> WorkerPool<J> {
    pub fn new(
        name: impl Into<String>,
        queue: Arc<BoundedQueue<J>>,
        writer: Arc<dyn BatchWriter<J>>,
        write_timeout: Duration,
    ) -> Self {
        Self {
            name: name.into(),
            queue,
            writer,
            write_timeout,
            stop_on_failure: false,
            running: Mutex::new(None),
            failures: Arc::new(Failures {
                first: Mutex::new(None),
                signal: CancellationToken::new(),
            }),
        }
    }

    /// Make the first failed write shut the whole pool down.
    ///
    /// The failing worker broadcasts shutdown before it takes another item, so
    /// no worker starts a write after the failure. Writes already in flight on
    /// other workers finish; everything still queued is abandoned.
    pub fn stop_on_failure(mut self) -> Self {
        self.stop_on_failure = true;
        self
    }

    fn lock_running(&self) -> MutexGuard<'_, Option<Running>> {
        self.running.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn queue(&self) -> &Arc<BoundedQueue<J>> {
        &self.queue
    }

    pub fn is_running(&self) -> bool {
        self.lock_running().is_some()
    }

    /// Spawn `workers` workers. Fails if the pool is already running.
    pub fn start(&self, workers: usize) -> Result<(), PoolError> {
        if workers == 0 {
            return Err(PoolError::NoWorkers);
        }

        let mut running = self.lock_running();
        if running.is_some() {
            return Err(PoolError::AlreadyRunning(self.name.clone()));
        }

        let shutdown = CancellationToken::new();
        let handles = (0..workers)
            .map(|id| {
                let worker = Worker {
                    name: format!("{}-{}", self.name, id),
                    queue: Arc::clone(&self.queue),
                    writer: Arc::clone(&self.writer),
                    write_timeout: self.write_timeout,
                    stop_on_failure: self.stop_on_failure,
                    failures: Arc::clone(&self.failures),
                };
                tokio::spawn(worker.run(shutdown.clone()))
            })
            .collect();

        *running = Some(Running {
            shutdown,
            workers: handles,
        });

        info!(
            pool = %self.name,
            workers = workers,
            capacity = self.queue.capacity(),
            "Worker pool started"
        );
        Ok(())
    }

    /// Signal every worker to stop and wait for all of them to exit.
    ///
    /// Workers finish the item they are currently writing; items still queued
    /// are left where they are and reported as abandoned.
    pub async fn stop(&self) -> PoolReport {
        let running = self.lock_running().take();
        let Some(mut running) = running else {
            return PoolReport {
                abandoned: self.queue.depth(),
                ..PoolReport::default()
            };
        };

        info!(pool = %self.name, "Stopping worker pool");
        running.shutdown.cancel();
        let handles = std::mem::take(&mut running.workers);
        self.collect(handles).await
    }

    /// Wait for workers to exit on their own, i.e. after the queue is closed and drained
    pub async fn join(&self) -> PoolReport {
        let handles = match self.lock_running().as_mut() {
            Some(running) => std::mem::take(&mut running.workers),
            None => Vec::new(),
        };

        let report = self.collect(handles).await;
        self.lock_running().take();
        report
    }

    async fn collect(&self, handles: Vec<JoinHandle<WorkerReport>>) -> PoolReport {
        let mut report = PoolReport {
            workers: handles.len(),
            ..PoolReport::default()
        };

        for handle in handles {
            match handle.await {
                Ok(worker) => {
                    report.completed += worker.completed;
                    report.failed += worker.failed;
                }
                Err(e) => error!(pool = %self.name, error = %e, "Worker task join error"),
            }
        }

        report.abandoned = self.queue.depth();
        if report.abandoned > 0 {
            warn!(
                pool = %self.name,
                abandoned = report.abandoned,
                "Workers exited with items still queued"
            );
        }
        info!(
            pool = %self.name,
            completed = report.completed,
            failed = report.failed,
            "Worker pool stopped"
        );
        report
    }

    /// Token cancelled as soon as any worker records a failed write
    pub fn failure_signal(&self) -> CancellationToken {
        self.failures.signal.clone()
    }

    /// Take the first write failure recorded since the pool was created
    pub fn take_first_failure(&self) -> Option<WriteError> {
        self.failures
            .first
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }
}

struct Worker<J> {
    name: String,
    queue: Arc<BoundedQueue<J>>,
    writer: Arc<dyn BatchWriter<J>>,
    write_timeout: Duration,
    stop_on_failure: bool,
    failures: Arc<Failures>,
}

impl<J: Send + 'static> Worker<J> {
    async fn run(self, shutdown: CancellationToken) -> WorkerReport {
        debug!(worker = %self.name, "Worker started");

        let mut report = WorkerReport {
            worker: self.name.clone(),
            ..WorkerReport::default()
        };

        while let Some(job) = self.queue.take(&shutdown).await {
            let started = Instant::now();
            let outcome = match tokio::time::timeout(self.write_timeout, self.writer.write(job)).await
            {
                Ok(result) => result,
                Err(_) => Err(WriteError::Timeout(self.write_timeout)),
            };

            match outcome {
                Ok(()) => {
                    report.completed += 1;
                    debug!(
                        worker = %self.name,
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        "Job completed"
                    );
                }
                Err(e) if self.stop_on_failure => {
                    report.failed += 1;
                    error!(worker = %self.name, error = %e, "Job failed, stopping pool");
                    self.failures.record(e);
                    shutdown.cancel();
                }
                Err(e) => {
                    report.failed += 1;
                    error!(worker = %self.name, error = %e, "Job failed, moving on to next job");
                    self.failures.record(e);
                }
            }
        }

        debug!(
            worker = %self.name,
            completed = report.completed,
            failed = report.failed,
            "Worker stopping"
        );
        report
    }
}
