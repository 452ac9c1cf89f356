//! Bounded FIFO of requests waiting for an in-flight slot.

use super::config::QueueConfig;
use crate::logging::millis;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::debug;

/// Bounded request queue with an in-flight counter.
///
/// `take` counts the item as active until the matching `complete`. Closing
/// the queue refuses further `add`s; items already queued can still be taken.
pub struct RequestQueue<T> {
    tx: Mutex<Option<flume::Sender<T>>>,
    rx: flume::Receiver<T>,
    capacity: usize,
    queue_timeout: Duration,
    active: Mutex<usize>,
    total_enqueued: AtomicU64,
    total_refused: AtomicU64,
}

impl<T> std::fmt::Debug for RequestQueue<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestQueue")
            .field("len", &self.len())
            .field("capacity", &self.capacity)
            .field("active", &self.active_requests())
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl<T> RequestQueue<T> {
    /// Create a queue holding at most `capacity` items. A zero capacity is
    /// treated as one.
    #[must_use]
    pub fn new(capacity: usize, queue_timeout: Duration) -> Self {
        let capacity = capacity.max(1);
        let (tx, rx) = flume::bounded(capacity);
        Self {
            tx: Mutex::new(Some(tx)),
            rx,
            capacity,
            queue_timeout,
            active: Mutex::new(0),
            total_enqueued: AtomicU64::new(0),
            total_refused: AtomicU64::new(0),
        }
    }

    /// Create a queue from configuration.
    #[must_use]
    pub fn from_config(config: &QueueConfig) -> Self {
        Self::new(config.max_queue_size, config.queue_timeout)
    }

    /// Enqueue `item`, waiting up to the queue timeout for room.
    ///
    /// Returns `false` (dropping the item) if the queue stayed full for the
    /// whole timeout or is closed.
    pub async fn add(&self, item: T) -> bool {
        let Some(tx) = self.tx.lock().clone() else {
            self.total_refused.fetch_add(1, Ordering::Relaxed);
            return false;
        };

        match tokio::time::timeout(self.queue_timeout, tx.send_async(item)).await {
            Ok(Ok(())) => {
                self.total_enqueued.fetch_add(1, Ordering::Relaxed);
                true
            }
            Ok(Err(_)) | Err(_) => {
                self.total_refused.fetch_add(1, Ordering::Relaxed);
                debug!(
                    capacity = self.capacity,
                    timeout_ms = millis(self.queue_timeout),
                    "queue full, request refused"
                );
                false
            }
        }
    }

    /// Wait for the next item and count it as active.
    ///
    /// Returns `None` once the queue is closed and empty.
    pub async fn take(&self) -> Option<T> {
        let item = self.rx.recv_async().await.ok()?;
        *self.active.lock() += 1;
        Some(item)
    }

    /// Mark one taken item as finished.
    pub fn complete(&self) {
        let mut active = self.active.lock();
        *active = active.saturating_sub(1);
    }

    /// Remove and return every waiting item without counting them as active.
    ///
    /// Items of `add`s blocked on a full queue are taken too, so those calls
    /// return `true`.
    pub fn drain(&self) -> Vec<T> {
        self.rx.try_iter().collect()
    }

    /// Refuse further `add`s. Waiting items stay takeable.
    pub fn close(&self) {
        self.tx.lock().take();
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.tx.lock().is_none()
    }

    /// Number of waiting items.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rx.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Items taken but not yet completed.
    #[must_use]
    pub fn active_requests(&self) -> usize {
        *self.active.lock()
    }

    #[must_use]
    pub fn total_enqueued(&self) -> u64 {
        self.total_enqueued.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn total_refused(&self) -> u64 {
        self.total_refused.load(Ordering::Relaxed)
    }
}
