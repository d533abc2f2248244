//! The bounded worker pool and queue (spec §4.6). A configurable number of
//! tool calls run concurrently; beyond that, additional calls queue up to a
//! bounded depth; beyond that, the transport answers `ServerBusy` instead
//! of enqueuing at all.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};

#[derive(Clone)]
pub struct WorkerPool {
    semaphore: Arc<Semaphore>,
    queue_depth: usize,
    waiting: Arc<AtomicUsize>,
}

impl WorkerPool {
    pub fn new(concurrency: usize, queue_depth: usize) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(concurrency.max(1))),
            queue_depth,
            waiting: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Reserves a slot to run a tool call. Returns `None` immediately
    /// (without ever awaiting) if the queue is already at capacity — the
    /// caller turns that into a `ServerBusy` JSON-RPC error.
    pub async fn acquire(&self) -> Option<OwnedSemaphorePermit> {
        loop {
            let current = self.waiting.load(Ordering::SeqCst);
            if current >= self.queue_depth {
                return None;
            }
            if self
                .waiting
                .compare_exchange(current, current + 1, Ordering::SeqCst, Ordering::SeqCst)
                .is_ok()
            {
                break;
            }
        }
        let permit = self.semaphore.clone().acquire_owned().await.ok();
        self.waiting.fetch_sub(1, Ordering::SeqCst);
        permit
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn busy_when_queue_is_saturated() {
        let pool = WorkerPool::new(1, 0);
        let _permit = pool.acquire().await.unwrap();
        // concurrency is saturated and queue depth is zero: a second
        // acquire must not block waiting for the first to release.
        assert!(pool.acquire().await.is_none());
    }

    #[tokio::test]
    async fn queued_calls_eventually_run() {
        let pool = WorkerPool::new(1, 4);
        let permit = pool.acquire().await.unwrap();
        let pool2 = pool.clone();
        let handle = tokio::spawn(async move { pool2.acquire().await });
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        drop(permit);
        let acquired = handle.await.unwrap();
        assert!(acquired.is_some());
    }
}
