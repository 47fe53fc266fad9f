//! Executor: drains the work queue and places calls.
//!
//! The executor is the single consumer of the queue. It processes one
//! message at a time — call-placement concurrency is deliberately bounded
//! to 1 — dispatching each to the call-placement collaborator under a
//! bounded-retry policy, then records the terminal outcome:
//!
//! - success: job status `completed` (scheduled jobs only), one history
//!   row with the external call id, one owner notification
//! - failure: job status `failed`, one history row with a NULL call id,
//!   one owner notification with the error summary
//!
//! When the queue is empty the loop sleeps for the idle interval;
//! otherwise it keeps draining.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

use crate::dialer::{CallDialer, CallPlacement, DialError, PlacedCall};
use crate::notify::Notifier;
use crate::storage::{JobStore, StoreError};

use super::job::{CallOutcome, JobStatus, MessagePayload, NewHistoryRecord, QueueMessage};
use super::queue::WorkQueue;

/// Bounded-retry policy for call dispatch: up to `max_attempts` tries with
/// a fixed delay in between. The first success short-circuits; exhausting
/// all attempts surfaces the last error.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Maximum number of dial attempts per message.
    pub max_attempts: u32,
    /// Fixed delay between attempts.
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay: Duration::from_secs(1),
        }
    }
}

/// Counters accumulated over the executor's lifetime.
#[derive(Debug, Default)]
pub struct ExecutorStats {
    completed: AtomicU64,
    failed: AtomicU64,
}

impl ExecutorStats {
    /// Number of messages that ended completed.
    pub fn completed(&self) -> u64 {
        self.completed.load(Ordering::SeqCst)
    }

    /// Number of messages that ended failed.
    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::SeqCst)
    }

    fn record(&self, outcome: CallOutcome) {
        match outcome {
            CallOutcome::Completed => self.completed.fetch_add(1, Ordering::SeqCst),
            CallOutcome::Failed => self.failed.fetch_add(1, Ordering::SeqCst),
        };
    }
}

/// The queue consumer.
pub struct Executor {
    queue: Arc<dyn WorkQueue>,
    store: Arc<dyn JobStore>,
    dialer: Arc<dyn CallDialer>,
    notifier: Arc<dyn Notifier>,
    idle_interval: Duration,
    retry: RetryPolicy,
    stats: Arc<ExecutorStats>,
}

impl Executor {
    /// Creates an executor over the given collaborators.
    pub fn new(
        queue: Arc<dyn WorkQueue>,
        store: Arc<dyn JobStore>,
        dialer: Arc<dyn CallDialer>,
        notifier: Arc<dyn Notifier>,
        idle_interval: Duration,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            queue,
            store,
            dialer,
            notifier,
            idle_interval,
            retry,
            stats: Arc::new(ExecutorStats::default()),
        }
    }

    /// Returns a handle to the executor's counters.
    pub fn stats(&self) -> Arc<ExecutorStats> {
        Arc::clone(&self.stats)
    }

    /// Main drain loop.
    ///
    /// Processes messages until a shutdown signal is received. Store
    /// failures abort the current message and are logged; the loop moves
    /// on to the next one.
    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        info!("Executor started");

        loop {
            // Check for shutdown signal (non-blocking)
            match shutdown.try_recv() {
                Ok(()) | Err(broadcast::error::TryRecvError::Closed) => {
                    info!("Executor received shutdown signal");
                    break;
                }
                Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
                Err(broadcast::error::TryRecvError::Empty) => {}
            }

            match self.queue.dequeue().await {
                Ok(Some(message)) => {
                    if let Err(e) = self.process_message(message).await {
                        error!(error = %e, "Failed to record message outcome");
                    }
                }
                Ok(None) => {
                    debug!("Queue empty");
                    tokio::time::sleep(self.idle_interval).await;
                }
                Err(e) => {
                    error!(error = %e, "Failed to dequeue message");
                    tokio::time::sleep(self.idle_interval).await;
                }
            }
        }

        info!("Executor stopped");
    }

    /// Processes a single queue message through dispatch, recording and
    /// notification.
    pub async fn process_message(&self, message: QueueMessage) -> Result<CallOutcome, StoreError> {
        info!(
            message_id = %message.id,
            to = message.phone_number(),
            "Processing queue message"
        );

        let outcome = match message.payload {
            MessagePayload::Scheduled(call) => {
                let placement = build_placement(
                    &call.phone_number,
                    call.message.as_deref(),
                    &call.language,
                    call.platform.as_deref(),
                );

                match self.dispatch_with_retry(&placement).await {
                    Ok(placed) => {
                        // Unconditional write: a completion landing after a
                        // cancellation overwrites it; last write wins.
                        self.store.set_status(call.id, JobStatus::Completed).await?;
                        self.store
                            .append_history(&NewHistoryRecord::completed(
                                call.user_id,
                                &call.phone_number,
                                &placed.sid,
                            ))
                            .await?;
                        self.notify_best_effort(
                            call.user_id,
                            &format!(
                                "Scheduled call (ID: {}) to {} completed. Call SID: {}",
                                call.id, call.phone_number, placed.sid
                            ),
                        )
                        .await;
                        info!(job_id = call.id, call_sid = %placed.sid, "Scheduled call executed");
                        CallOutcome::Completed
                    }
                    Err(e) => {
                        self.store.set_status(call.id, JobStatus::Failed).await?;
                        self.store
                            .append_history(&NewHistoryRecord::failed(
                                call.user_id,
                                &call.phone_number,
                            ))
                            .await?;
                        self.notify_best_effort(
                            call.user_id,
                            &format!(
                                "Scheduled call (ID: {}) to {} failed. Error: {}",
                                call.id, call.phone_number, e
                            ),
                        )
                        .await;
                        warn!(job_id = call.id, error = %e, "Scheduled call failed");
                        CallOutcome::Failed
                    }
                }
            }
            MessagePayload::Immediate(request) => {
                let placement = build_placement(
                    &request.phone_number,
                    request.message.as_deref(),
                    &request.language,
                    request.platform.as_deref(),
                );

                match self.dispatch_with_retry(&placement).await {
                    Ok(placed) => {
                        self.store
                            .append_history(&NewHistoryRecord::completed(
                                request.user_id,
                                &request.phone_number,
                                &placed.sid,
                            ))
                            .await?;
                        self.notify_best_effort(
                            request.user_id,
                            &format!(
                                "Immediate call to {} completed. Call SID: {}",
                                request.phone_number, placed.sid
                            ),
                        )
                        .await;
                        info!(to = %request.phone_number, call_sid = %placed.sid, "Immediate call executed");
                        CallOutcome::Completed
                    }
                    Err(e) => {
                        self.store
                            .append_history(&NewHistoryRecord::failed(
                                request.user_id,
                                &request.phone_number,
                            ))
                            .await?;
                        self.notify_best_effort(
                            request.user_id,
                            &format!(
                                "Immediate call to {} failed. Error: {}",
                                request.phone_number, e
                            ),
                        )
                        .await;
                        warn!(to = %request.phone_number, error = %e, "Immediate call failed");
                        CallOutcome::Failed
                    }
                }
            }
        };

        self.stats.record(outcome);
        Ok(outcome)
    }

    /// Dispatches a placement under the bounded-retry policy.
    async fn dispatch_with_retry(&self, placement: &CallPlacement) -> Result<PlacedCall, DialError> {
        let mut attempt = 1;
        loop {
            match self.dialer.place_call(placement).await {
                Ok(placed) => return Ok(placed),
                Err(e) if attempt >= self.retry.max_attempts => return Err(e),
                Err(e) => {
                    warn!(attempt, error = %e, "Dial attempt failed, retrying");
                    tokio::time::sleep(self.retry.delay).await;
                    attempt += 1;
                }
            }
        }
    }

    /// Delivers a notification, logging and swallowing any failure.
    async fn notify_best_effort(&self, user_id: i64, text: &str) {
        if let Err(e) = self.notifier.notify(user_id, text).await {
            warn!(user_id, error = %e, "Failed to deliver notification");
        }
    }
}

/// Builds a dialer placement from message payload fields.
fn build_placement(
    to: &str,
    message: Option<&str>,
    language: &str,
    platform: Option<&str>,
) -> CallPlacement {
    let mut placement = CallPlacement::new(to).with_language(language);
    if let Some(text) = message {
        placement = placement.with_message(text);
    }
    if let Some(hint) = platform {
        placement = placement.with_platform(hint);
    }
    placement
}
