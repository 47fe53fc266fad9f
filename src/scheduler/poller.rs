//! Trigger poller.
//!
//! Runs on a fixed period (default 60s). Each tick atomically claims every
//! pending scheduled call whose trigger time has passed — the conditional
//! `pending -> queued` update guarantees that a slow executor combined
//! with the next tick cannot promote the same occurrence twice — and
//! enqueues one scheduled message per claim. If an enqueue fails the claim
//! is released so the next tick retries that call.
//!
//! A tick that cannot reach the store is logged and skipped; the loop
//! never crashes.

use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

use crate::storage::{JobStore, StoreError};

use super::job::QueueMessage;
use super::queue::WorkQueue;

/// Promotes due scheduled calls onto the work queue.
pub struct TriggerPoller {
    store: Arc<dyn JobStore>,
    queue: Arc<dyn WorkQueue>,
    interval: Duration,
}

impl TriggerPoller {
    /// Creates a poller over the given store and queue.
    pub fn new(store: Arc<dyn JobStore>, queue: Arc<dyn WorkQueue>, interval: Duration) -> Self {
        Self {
            store,
            queue,
            interval,
        }
    }

    /// Runs one poll tick and returns the number of messages enqueued.
    ///
    /// Claims are taken in creation order, so two calls due at the same
    /// instant are enqueued in the order they were scheduled.
    pub async fn tick(&self) -> Result<usize, StoreError> {
        let now = Utc::now();
        let due = self.store.claim_due_calls(now).await?;
        let mut enqueued = 0;

        for call in due {
            let message = QueueMessage::scheduled(call.clone());
            match self.queue.enqueue(&message).await {
                Ok(()) => {
                    debug!(job_id = call.id, message_id = %message.id, "Due call enqueued");
                    enqueued += 1;
                }
                Err(e) => {
                    warn!(job_id = call.id, error = %e, "Failed to enqueue due call, releasing claim");
                    if let Err(release_err) = self.store.release_claim(call.id).await {
                        error!(job_id = call.id, error = %release_err, "Failed to release claim");
                    }
                }
            }
        }

        Ok(enqueued)
    }

    /// Main poller loop.
    ///
    /// Ticks on the configured interval until a shutdown signal is
    /// received. Tick failures are logged; the next tick retries.
    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        info!(interval_secs = self.interval.as_secs(), "Trigger poller started");

        let mut ticker = tokio::time::interval(self.interval);

        loop {
            tokio::select! {
                _ = shutdown.recv() => {
                    info!("Trigger poller received shutdown signal");
                    break;
                }
                _ = ticker.tick() => {
                    match self.tick().await {
                        Ok(0) => {}
                        Ok(count) => info!(enqueued = count, "Poll tick promoted due calls"),
                        Err(e) => error!(error = %e, "Poll tick failed"),
                    }
                }
            }
        }

        info!("Trigger poller stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::job::{JobStatus, MessagePayload, Recurrence};
    use crate::scheduler::test_support::{past_call, MemoryQueue, MemoryStore};
    use chrono::Duration as ChronoDuration;

    fn poller(store: &Arc<MemoryStore>, queue: &Arc<MemoryQueue>) -> TriggerPoller {
        TriggerPoller::new(
            Arc::clone(store) as Arc<dyn JobStore>,
            Arc::clone(queue) as Arc<dyn WorkQueue>,
            Duration::from_secs(60),
        )
    }

    #[tokio::test]
    async fn test_tick_enqueues_due_calls_in_creation_order() {
        let store = Arc::new(MemoryStore::new());
        let queue = Arc::new(MemoryQueue::new());

        // Two owners, same trigger time
        let first = store.insert_call(past_call(1, Recurrence::None)).await;
        let second = {
            let mut call = past_call(2, Recurrence::None);
            call.schedule_time = first.schedule_time;
            store.insert_call(call).await
        };

        let enqueued = poller(&store, &queue).tick().await.expect("tick should succeed");
        assert_eq!(enqueued, 2);

        let head = queue.dequeue().await.unwrap().expect("first message");
        let next = queue.dequeue().await.unwrap().expect("second message");
        match (head.payload, next.payload) {
            (MessagePayload::Scheduled(a), MessagePayload::Scheduled(b)) => {
                assert_eq!(a.id, first.id);
                assert_eq!(b.id, second.id);
            }
            _ => panic!("expected scheduled payloads"),
        }
    }

    #[tokio::test]
    async fn test_tick_skips_future_and_cancelled_calls() {
        let store = Arc::new(MemoryStore::new());
        let queue = Arc::new(MemoryQueue::new());

        let mut future = past_call(1, Recurrence::None);
        future.schedule_time = Utc::now() + ChronoDuration::hours(1);
        store.insert_call(future).await;

        let mut cancelled = past_call(2, Recurrence::None);
        cancelled.status = JobStatus::Cancelled;
        store.insert_call(cancelled).await;

        let enqueued = poller(&store, &queue).tick().await.expect("tick should succeed");
        assert_eq!(enqueued, 0);
        assert_eq!(queue.len().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_second_tick_does_not_duplicate_claimed_call() {
        let store = Arc::new(MemoryStore::new());
        let queue = Arc::new(MemoryQueue::new());

        let call = store.insert_call(past_call(1, Recurrence::None)).await;
        let poller = poller(&store, &queue);

        assert_eq!(poller.tick().await.unwrap(), 1);
        assert_eq!(store.call(call.id).await.status, JobStatus::Queued);

        // The executor has not finished yet; a second tick must not
        // promote the same occurrence again.
        assert_eq!(poller.tick().await.unwrap(), 0);
        assert_eq!(queue.len().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_failed_enqueue_releases_claim() {
        let store = Arc::new(MemoryStore::new());
        let queue = Arc::new(MemoryQueue::new());

        let call = store.insert_call(past_call(1, Recurrence::None)).await;
        let poller = poller(&store, &queue);

        queue.fail_next_enqueue();
        assert_eq!(poller.tick().await.unwrap(), 0);
        assert_eq!(store.call(call.id).await.status, JobStatus::Pending);

        // Queue recovered: the next tick picks the call up again.
        assert_eq!(poller.tick().await.unwrap(), 1);
        assert_eq!(store.call(call.id).await.status, JobStatus::Queued);
    }
}
