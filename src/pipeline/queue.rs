use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};
use thiserror::Error;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

/// Errors returned when admitting an item into a [`BoundedQueue`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum QueueError {
    #[error("worker queue is full (capacity {capacity}), job rejected")]
    Full { capacity: usize },

    #[error("worker queue is closed, job rejected")]
    Closed,

    #[error("cancelled while waiting for queue space")]
    Cancelled,
}

struct State<T> {
    items: VecDeque<T>,
    closed: bool,
}

/// Fixed-capacity FIFO shared between producers and a worker pool.
///
/// `submit` never waits: a full queue rejects the item immediately, which is
/// the backpressure signal handed back to callers. Workers block in `take`
/// until an item arrives, the queue is closed, or their shutdown token fires.
/// Items still queued after close are handed out until the queue is empty.
pub struct BoundedQueue<T> {
    capacity: usize,
    state: Mutex<State<T>>,
    item_ready: Notify,
    space_ready: Notify,
}

impl<T> BoundedQueue<T> {
    /// Create a queue holding at most `capacity` items (minimum 1)
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            state: Mutex::new(State {
                items: VecDeque::with_capacity(capacity),
                closed: false,
            }),
            item_ready: Notify::new(),
            space_ready: Notify::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    // The state is never left half-updated, so a poisoned lock is still usable.
    fn lock(&self) -> MutexGuard<'_, State<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn try_push(&self, item: T) -> Result<usize, (QueueError, T)> {
        let depth = {
            let mut state = self.lock();
            if state.closed {
                return Err((QueueError::Closed, item));
            }
            if state.items.len() >= self.capacity {
                return Err((
                    QueueError::Full {
                        capacity: self.capacity,
                    },
                    item,
                ));
            }
            state.items.push_back(item);
            state.items.len()
        };

        self.item_ready.notify_one();
        Ok(depth)
    }

    /// Admit an item without waiting. Returns the depth after admission.
    pub fn submit(&self, item: T) -> Result<usize, QueueError> {
        self.try_push(item).map_err(|(err, _)| err)
    }

    /// Admit an item, waiting for space while the queue is full.
    ///
    /// Used by single-producer pipelines whose only drain is the worker pool.
    /// Returns `QueueError::Cancelled` if `cancel` fires before space frees up.
    pub async fn send(&self, item: T, cancel: &CancellationToken) -> Result<usize, QueueError> {
        let mut item = item;
        loop {
            let space = self.space_ready.notified();
            tokio::pin!(space);
            space.as_mut().enable();

            match self.try_push(item) {
                Ok(depth) => return Ok(depth),
                Err((QueueError::Full { .. }, returned)) => item = returned,
                Err((err, _)) => return Err(err),
            }

            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(QueueError::Cancelled),
                _ = &mut space => {}
            }
        }
    }

    /// Wait for the next item.
    ///
    /// Returns `None` once `shutdown` is cancelled (even if items remain) or
    /// once the queue is closed and empty.
    pub async fn take(&self, shutdown: &CancellationToken) -> Option<T> {
        loop {
            if shutdown.is_cancelled() {
                return None;
            }

            let ready = self.item_ready.notified();
            tokio::pin!(ready);
            ready.as_mut().enable();

            {
                let mut state = self.lock();
                if let Some(item) = state.items.pop_front() {
                    drop(state);
                    self.space_ready.notify_one();
                    return Some(item);
                }
                if state.closed {
                    return None;
                }
            }

            tokio::select! {
                biased;
                _ = shutdown.cancelled() => return None,
                _ = &mut ready => {}
            }
        }
    }

    /// Close the queue to further admissions.
    ///
    /// Returns `true` for the call that actually closed it; later calls are no-ops.
    pub fn close(&self) -> bool {
        let newly_closed = {
            let mut state = self.lock();
            !std::mem::replace(&mut state.closed, true)
        };

        if newly_closed {
            self.item_ready.notify_waiters();
            self.space_ready.notify_waiters();
        }
        newly_closed
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    /// Instantaneous item count. Advisory only: it may be stale by the time it is read.
    pub fn depth(&self) -> usize {
        self.lock().items.len()
    }

    /// Remove and return everything still queued
    pub fn drain(&self) -> Vec<T> {
        let drained: Vec<T> = self.lock().items.drain(..).collect();
        if !drained.is_empty() {
            self.space_ready.notify_waiters();
        }
        drained
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn test_submissions_up_to_capacity_succeed() {
        for capacity in 1..=8 {
            let queue = BoundedQueue::new(capacity);
            for n in 0..capacity {
                assert_eq!(queue.submit(n).unwrap(), n + 1);
            }
            assert_eq!(queue.depth(), capacity);
        }
    }

    #[test]
    fn test_submission_past_capacity_is_rejected() {
        let queue = BoundedQueue::new(3);
        for n in 0..3 {
            queue.submit(n).unwrap();
        }

        let err = queue.submit(3).unwrap_err();
        assert_eq!(err, QueueError::Full { capacity: 3 });
        assert_eq!(err.to_string(), "worker queue is full (capacity 3), job rejected");
        assert_eq!(queue.depth(), 3);
    }

    #[test]
    fn test_zero_capacity_is_clamped() {
        let queue = BoundedQueue::new(0);
        assert_eq!(queue.capacity(), 1);
        assert!(queue.submit("a").is_ok());
        assert!(queue.submit("b").is_err());
    }

    #[test]
    fn test_close_is_idempotent() {
        let queue = BoundedQueue::new(2);
        queue.submit(1).unwrap();

        assert!(queue.close());
        assert!(!queue.close());
        assert!(!queue.close());
        assert!(queue.is_closed());

        assert_eq!(queue.submit(2), Err(QueueError::Closed));
        assert_eq!(queue.depth(), 1);
    }

    #[test]
    fn test_drain_returns_items_in_order() {
        let queue = BoundedQueue::new(4);
        queue.submit("a").unwrap();
        queue.submit("b").unwrap();
        queue.submit("c").unwrap();

        assert_eq!(queue.drain(), vec!["a", "b", "c"]);
        assert_eq!(queue.depth(), 0);
    }

    #[tokio::test]
    async fn test_take_preserves_fifo_order() {
        let queue = BoundedQueue::new(4);
        let shutdown = CancellationToken::new();
        for n in 0..4 {
            queue.submit(n).unwrap();
        }

        for expected in 0..4 {
            assert_eq!(queue.take(&shutdown).await, Some(expected));
        }
    }

    #[tokio::test]
    async fn test_take_drains_then_ends_after_close() {
        let queue = BoundedQueue::new(4);
        let shutdown = CancellationToken::new();
        queue.submit(1).unwrap();
        queue.submit(2).unwrap();
        queue.close();

        assert_eq!(queue.take(&shutdown).await, Some(1));
        assert_eq!(queue.take(&shutdown).await, Some(2));
        assert_eq!(queue.take(&shutdown).await, None);
    }

    #[tokio::test]
    async fn test_take_ignores_items_after_shutdown() {
        let queue = BoundedQueue::new(4);
        let shutdown = CancellationToken::new();
        queue.submit(1).unwrap();
        shutdown.cancel();

        assert_eq!(queue.take(&shutdown).await, None);
        assert_eq!(queue.depth(), 1);
    }

    #[tokio::test]
    async fn test_waiting_take_wakes_on_submit() {
        let queue = Arc::new(BoundedQueue::new(2));
        let shutdown = CancellationToken::new();

        let waiter = {
            let queue = Arc::clone(&queue);
            let shutdown = shutdown.clone();
            tokio::spawn(async move { queue.take(&shutdown).await })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        queue.submit(42).unwrap();

        let taken = tokio::time::timeout(Duration::from_secs(5), waiter)
            .await
            .expect("take should wake up")
            .unwrap();
        assert_eq!(taken, Some(42));
    }

    #[tokio::test]
    async fn test_waiting_take_wakes_on_shutdown_and_close() {
        let queue = Arc::new(BoundedQueue::<u32>::new(2));
        let shutdown = CancellationToken::new();

        let cancelled = {
            let queue = Arc::clone(&queue);
            let shutdown = shutdown.clone();
            tokio::spawn(async move { queue.take(&shutdown).await })
        };
        let closed = {
            let queue = Arc::clone(&queue);
            tokio::spawn(async move { queue.take(&CancellationToken::new()).await })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        shutdown.cancel();
        queue.close();

        let wait = Duration::from_secs(5);
        assert_eq!(tokio::time::timeout(wait, cancelled).await.unwrap().unwrap(), None);
        assert_eq!(tokio::time::timeout(wait, closed).await.unwrap().unwrap(), None);
    }

    #[tokio::test]
    async fn test_send_waits_for_space() {
        let queue = Arc::new(BoundedQueue::new(1));
        let cancel = CancellationToken::new();
        queue.submit(1).unwrap();

        let sender = {
            let queue = Arc::clone(&queue);
            let cancel = cancel.clone();
            tokio::spawn(async move { queue.send(2, &cancel).await })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!sender.is_finished());

        assert_eq!(queue.take(&CancellationToken::new()).await, Some(1));
        let depth = tokio::time::timeout(Duration::from_secs(5), sender)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(depth, 1);
        assert_eq!(queue.drain(), vec![2]);
    }

    #[tokio::test]
    async fn test_send_is_cancellable() {
        let queue = BoundedQueue::new(1);
        let cancel = CancellationToken::new();
        queue.submit(1).unwrap();
        cancel.cancel();

        assert_eq!(queue.send(2, &cancel).await, Err(QueueError::Cancelled));
        assert_eq!(queue.depth(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_submissions_respect_capacity() {
        let capacity = 10;
        let attempts = 64;
        let queue = Arc::new(BoundedQueue::new(capacity));

        let mut handles = Vec::new();
        for n in 0..attempts {
            let queue = Arc::clone(&queue);
            handles.push(tokio::spawn(async move {
                let result = queue.submit(n);
                assert!(queue.depth() <= capacity);
                result
            }));
        }

        let mut accepted = 0;
        let mut rejected = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(depth) => {
                    assert!(depth <= capacity);
                    accepted += 1;
                }
                Err(QueueError::Full { .. }) => rejected += 1,
                Err(other) => panic!("unexpected error: {other}"),
            }
        }

        assert_eq!(accepted, capacity);
        assert_eq!(rejected, attempts - capacity);
        assert_eq!(queue.depth(), capacity);
    }
}
