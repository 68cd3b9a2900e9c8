pub mod accumulator;
pub mod pool;
pub mod queue;

pub use accumulator::{AccumulatorError, BatchAccumulator, BulkBatch};
pub use pool::{BatchWriter, PoolError, PoolReport, WorkerPool, WorkerReport, WriteError};
pub use queue::{BoundedQueue, QueueError};
