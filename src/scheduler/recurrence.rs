//! Recurrence engine.
//!
//! A recurring call re-arms itself independently of the trigger poller:
//! each recurring job owns one spawned timer task that computes the next
//! occurrence from the job's original schedule time, sleeps until it, and
//! enqueues a fresh scheduled message. Fires deliberately bypass the
//! store's pending/queued lifecycle — the single stored row records the
//! outcome of the latest occurrence, nothing more.
//!
//! Handles live in an in-process registry owned by the engine instance and
//! are rebuilt from the job store at startup. Cancelling a job aborts its
//! handle; rescheduling replaces the handle with one computed from the new
//! base time.

use chrono::{DateTime, Datelike, Duration as ChronoDuration, NaiveTime, Timelike, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::storage::{JobStore, StoreError};

use super::job::{QueueMessage, Recurrence, ScheduledCall};
use super::queue::WorkQueue;

/// Computes the first occurrence strictly after `after`.
///
/// Daily recurrence fires at the base time's hour:minute every day; weekly
/// recurrence fires at the base time's hour:minute on the base time's
/// weekday. Returns `None` for non-recurring jobs.
pub fn next_occurrence(
    recurrence: Recurrence,
    base: DateTime<Utc>,
    after: DateTime<Utc>,
) -> Option<DateTime<Utc>> {
    let fire_time = NaiveTime::from_hms_opt(base.hour(), base.minute(), 0)?;

    match recurrence {
        Recurrence::None => None,
        Recurrence::Daily => {
            let mut candidate = after.date_naive().and_time(fire_time).and_utc();
            if candidate <= after {
                candidate += ChronoDuration::days(1);
            }
            Some(candidate)
        }
        Recurrence::Weekly => {
            let candidate = after.date_naive().and_time(fire_time).and_utc();
            let target = base.weekday().num_days_from_monday() as i64;
            let current = candidate.weekday().num_days_from_monday() as i64;
            let mut delta = (target - current).rem_euclid(7);
            if delta == 0 && candidate <= after {
                delta = 7;
            }
            Some(candidate + ChronoDuration::days(delta))
        }
    }
}

/// In-process registry of per-job recurrence timers.
pub struct RecurrenceEngine {
    queue: Arc<dyn WorkQueue>,
    handles: Mutex<HashMap<i64, JoinHandle<()>>>,
}

impl RecurrenceEngine {
    /// Creates an engine producing onto the given queue.
    pub fn new(queue: Arc<dyn WorkQueue>) -> Self {
        Self {
            queue,
            handles: Mutex::new(HashMap::new()),
        }
    }

    /// Arms (or replaces) the recurrence handle for a job.
    ///
    /// Non-recurring jobs are ignored. An existing handle for the same job
    /// id is aborted and replaced entirely — a reschedule must not keep
    /// firing on the old rule.
    pub async fn arm(&self, call: &ScheduledCall) {
        if !call.recurrence.is_recurring() {
            return;
        }

        let snapshot = call.clone();
        let queue = Arc::clone(&self.queue);
        let handle = tokio::spawn(async move {
            fire_loop(queue, snapshot).await;
        });

        let mut handles = self.handles.lock().await;
        if let Some(previous) = handles.insert(call.id, handle) {
            previous.abort();
            debug!(job_id = call.id, "Replaced recurrence handle");
        } else {
            info!(job_id = call.id, recurrence = %call.recurrence, "Armed recurrence handle");
        }
    }

    /// Cancels the recurrence handle for a job, if one exists.
    ///
    /// After this returns no further occurrences fire for the job.
    pub async fn cancel(&self, job_id: i64) -> bool {
        let mut handles = self.handles.lock().await;
        match handles.remove(&job_id) {
            Some(handle) => {
                handle.abort();
                info!(job_id, "Cancelled recurrence handle");
                true
            }
            None => false,
        }
    }

    /// Rebuilds all handles from the job store.
    ///
    /// Called once at process start: every stored job with a recurrence
    /// other than `none` that has not been cancelled gets a fresh handle.
    /// Returns the number of handles armed.
    pub async fn rebuild(&self, store: &dyn JobStore) -> Result<usize, StoreError> {
        let calls = store.active_recurring_calls().await?;
        for call in &calls {
            self.arm(call).await;
        }
        info!(count = calls.len(), "Rebuilt recurrence handles from store");
        Ok(calls.len())
    }

    /// Returns the number of armed handles.
    pub async fn active_handles(&self) -> usize {
        self.handles.lock().await.len()
    }

    /// Aborts every handle. Used on shutdown.
    pub async fn shutdown(&self) {
        let mut handles = self.handles.lock().await;
        for (_, handle) in handles.drain() {
            handle.abort();
        }
    }
}

/// Timer loop for one recurring job: sleep until the next occurrence,
/// enqueue a fresh snapshot, repeat until aborted.
async fn fire_loop(queue: Arc<dyn WorkQueue>, call: ScheduledCall) {
    let base = call.schedule_time;

    loop {
        let now = Utc::now();
        let Some(next) = next_occurrence(call.recurrence, base, now) else {
            return;
        };

        let wait = (next - now).to_std().unwrap_or(Duration::ZERO);
        tokio::time::sleep(wait).await;

        let message = QueueMessage::scheduled(call.clone());
        match queue.enqueue(&message).await {
            Ok(()) => {
                info!(
                    job_id = call.id,
                    message_id = %message.id,
                    fired_at = %next,
                    "Recurring occurrence enqueued"
                );
            }
            Err(e) => {
                // Missed occurrence; the loop re-arms for the next one.
                warn!(job_id = call.id, error = %e, "Failed to enqueue recurring occurrence");
            }
        }
    }
}
