//! Bounded, thread-safe FIFO coupling producers to the pipeline consumer.
//! Content-hash deduplication window plus batch-ready signaling.

use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio::sync::Notify;

use super::types::IngestItem;
use crate::vault::store::content_hash16;

/// Pragmatic backpressure limit: puts are shed past this many pending
/// items (producers must never block on a full queue).
const MAX_PENDING: usize = 10_000;

struct Inner {
    items: VecDeque<IngestItem>,
    dedup: HashMap<String, Instant>,
}

pub struct IngestQueue {
    batch_size: usize,
    flush_interval: Duration,
    dedup_window: Duration,
    inner: Mutex<Inner>,
    notify: Notify,
}

impl IngestQueue {
    pub fn new(batch_size: usize, flush_interval: Duration, dedup_window: Duration) -> Self {
        Self {
            batch_size,
            flush_interval,
            dedup_window,
            inner: Mutex::new(Inner {
                items: VecDeque::new(),
                dedup: HashMap::new(),
            }),
            notify: Notify::new(),
        }
    }

    /// Enqueue an item. Returns `false` if it was dropped (duplicate
    /// within the dedup window, or the queue is over capacity).
    pub fn put(&self, item: IngestItem) -> bool {
        let hash = content_hash16(&item.text);
        let now = Instant::now();

        let ready = {
            let mut inner = self.inner.lock();
            inner
                .dedup
                .retain(|_, inserted| now.duration_since(*inserted) < self.dedup_window);

            if inner.dedup.contains_key(&hash) {
                return false;
            }
            if inner.items.len() >= MAX_PENDING {
                return false;
            }

            inner.dedup.insert(hash, now);
            inner.items.push_back(item);
            inner.items.len() >= self.batch_size
        };

        if ready {
            self.notify.notify_one();
        }
        true
    }

    pub fn pending_count(&self) -> usize {
        self.inner.lock().items.len()
    }

    /// Wait up to `timeout` (or the configured flush interval if `None`)
    /// for a batch-ready signal, then drain up to `batch_size` items.
    /// An empty return is legal (idle interval).
    pub async fn get_batch(&self, timeout: Option<Duration>) -> Vec<IngestItem> {
        let timeout = timeout.unwrap_or(self.flush_interval);

        {
            let mut inner = self.inner.lock();
            if inner.items.len() >= self.batch_size {
                return drain(&mut inner, self.batch_size);
            }
        }

        let _ = tokio::time::timeout(timeout, self.notify.notified()).await;

        let mut inner = self.inner.lock();
        drain(&mut inner, self.batch_size)
    }
}

fn drain(inner: &mut Inner, batch_size: usize) -> Vec<IngestItem> {
    let n = inner.items.len().min(batch_size);
    inner.items.drain(..n).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::types::Source;

    fn queue(batch_size: usize) -> IngestQueue {
        IngestQueue::new(
            batch_size,
            Duration::from_millis(300),
            Duration::from_secs(60),
        )
    }

    #[test]
    fn test_dedup_within_window() {
        let q = queue(10);
        assert!(q.put(IngestItem::new("hello", Source::Note)));
        assert!(!q.put(IngestItem::new("hello", Source::Clipboard)));
        assert_eq!(q.pending_count(), 1);
    }

    #[tokio::test]
    async fn test_batch_by_count() {
        let q = queue(10);
        for i in 0..10 {
            assert!(q.put(IngestItem::new(format!("item-{i}"), Source::Note)));
        }
        let batch = q.get_batch(Some(Duration::from_secs(2))).await;
        assert_eq!(batch.len(), 10);
        for (i, item) in batch.iter().enumerate() {
            assert_eq!(item.text, format!("item-{i}"));
        }
    }

    #[tokio::test]
    async fn test_batch_by_timeout() {
        let q = queue(10);
        q.put(IngestItem::new("lonely", Source::Note));
        let batch = q.get_batch(Some(Duration::from_millis(500))).await;
        assert_eq!(batch.len(), 1);
    }

    #[tokio::test]
    async fn test_empty_queue_zero_timeout() {
        let q = queue(10);
        let batch = q.get_batch(Some(Duration::from_millis(0))).await;
        assert!(batch.is_empty());
    }

    #[test]
    fn test_ready_transition_boundary() {
        let q = queue(3);
        assert!(q.put(IngestItem::new("a", Source::Note)));
        assert!(q.put(IngestItem::new("b", Source::Note)));
        assert_eq!(q.pending_count(), 2);
        assert!(q.put(IngestItem::new("c", Source::Note)));
        assert_eq!(q.pending_count(), 3);
    }
}
