//! The bounded, multi-consumer queue used between stages.
//!
//! Backed by `flume`: unlike `tokio::sync::mpsc`, a `flume::Receiver` may be
//! cloned and polled from many tasks at once, which is required for a stage
//! with more than one worker to share a single input queue.

use crate::signal::Signal;

pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;

#[derive(Debug)]
pub struct QueueClosed;

/// The sending half of a stage's input queue.
pub struct QueueSender<T> {
    inner: flume::Sender<Signal<T>>,
}

impl<T> Clone for QueueSender<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

/// The receiving half of a stage's input queue. Cloning yields another
/// handle onto the same underlying channel (MPMC), not an independent copy.
pub struct QueueReceiver<T> {
    inner: flume::Receiver<Signal<T>>,
}

impl<T> Clone for QueueReceiver<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

pub fn bounded<T>(capacity: usize) -> (QueueSender<T>, QueueReceiver<T>) {
    let (tx, rx) = flume::bounded(capacity);
    (QueueSender { inner: tx }, QueueReceiver { inner: rx })
}

impl<T> QueueSender<T> {
    /// Enqueues an item, waiting asynchronously if the queue is full.
    pub async fn put(&self, item: T) -> Result<(), QueueClosed> {
        self.inner
            .send_async(Signal::Item(item))
            .await
            .map_err(|_| QueueClosed)
    }

    /// Enqueues the shutdown sentinel.
    pub async fn put_term(&self) -> Result<(), QueueClosed> {
        self.inner
            .send_async(Signal::Term)
            .await
            .map_err(|_| QueueClosed)
    }

    /// Non-blocking enqueue, used in tests and by the visualizer's depth
    /// sampling harness.
    pub fn try_put(&self, item: T) -> Result<(), QueueClosed> {
        self.inner
            .try_send(Signal::Item(item))
            .map_err(|_| QueueClosed)
    }

    /// Best-effort queue depth. Never used for correctness, only to inform
    /// load-balancing and autoscaling decisions.
    pub fn size(&self) -> usize {
        self.inner.len()
    }
}

impl<T> QueueReceiver<T> {
    /// Dequeues the next item or sentinel, waiting asynchronously if the
    /// queue is empty. Returns `None` once every sender has been dropped.
    pub async fn get(&self) -> Option<Signal<T>> {
        self.inner.recv_async().await.ok()
    }

    pub fn size(&self) -> usize {
        self.inner.len()
    }
}
