//! Request-side scheduling API.
//!
//! `CallScheduler` is what the messaging front-end (or the CLI) talks to:
//! it validates requests synchronously, writes scheduling intent to the
//! store, arms recurrence handles, and answers status/history queries.
//! The time-based machinery lives elsewhere — the trigger poller promotes
//! due work and the executor drains it; this type never places calls
//! itself.
//!
//! All collaborators are injected at construction; the service owns no
//! globals and performs no lazy lookup.

use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

use crate::error::ValidationError;
use crate::notify::Notifier;
use crate::storage::{HistoryPage, JobStore, StoreError};

use super::job::{
    CallOutcome, CallRequest, CallStats, HistoryRecord, JobStatus, QueueMessage, ScheduleRequest,
    ScheduledCall, DEFAULT_LANGUAGE,
};
use super::queue::{QueueError, WorkQueue};
use super::recurrence::RecurrenceEngine;

/// History page size shown to owners.
const HISTORY_PAGE_SIZE: u32 = 5;

/// Errors returned by scheduling operations.
#[derive(Debug, Error)]
pub enum ScheduleError {
    /// The request was malformed; nothing was enqueued or stored.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The job store failed.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// The work queue failed.
    #[error("Queue error: {0}")]
    Queue(#[from] QueueError),

    /// No call with this id exists for the requesting owner.
    #[error("Call {0} not found or not authorized")]
    NotFound(i64),

    /// The call already executed; rescheduling it would run it twice.
    #[error("Scheduled call {0} has already completed and cannot be rescheduled")]
    AlreadyCompleted(i64),
}

/// Status lookup result: a call is either still scheduled or already in
/// history.
#[derive(Debug, Clone)]
pub enum CallStatusView {
    /// The call has a scheduled_calls row.
    Scheduled(ScheduledCall),
    /// The call only exists as an executed history row.
    History(HistoryRecord),
}

/// The scheduling service handed to the messaging front-end.
pub struct CallScheduler {
    store: Arc<dyn JobStore>,
    queue: Arc<dyn WorkQueue>,
    notifier: Arc<dyn Notifier>,
    recurrence: Arc<RecurrenceEngine>,
}

impl CallScheduler {
    /// Creates a scheduler over the given collaborators.
    pub fn new(
        store: Arc<dyn JobStore>,
        queue: Arc<dyn WorkQueue>,
        notifier: Arc<dyn Notifier>,
        recurrence: Arc<RecurrenceEngine>,
    ) -> Self {
        Self {
            store,
            queue,
            notifier,
            recurrence,
        }
    }

    /// Schedules a call for later (possibly recurring) execution.
    ///
    /// The stored row starts `pending`; the trigger poller promotes it
    /// once the trigger time passes. Recurring requests also get a
    /// recurrence handle armed immediately.
    pub async fn schedule_call(
        &self,
        request: ScheduleRequest,
    ) -> Result<ScheduledCall, ScheduleError> {
        crate::error::validate_phone_number(&request.phone_number)?;
        if request.message.is_none() && request.platform.is_none() {
            return Err(ValidationError::MissingPayload.into());
        }

        let call = self.store.create_scheduled_call(&request).await?;

        if call.recurrence.is_recurring() {
            self.recurrence.arm(&call).await;
        }

        self.notify_best_effort(
            call.user_id,
            &format!(
                "Call scheduled to {} at {} (ID: {}).",
                call.phone_number, call.schedule_time, call.id
            ),
        )
        .await;

        info!(
            job_id = call.id,
            to = %call.phone_number,
            schedule_time = %call.schedule_time,
            recurrence = %call.recurrence,
            "Call scheduled"
        );
        Ok(call)
    }

    /// Queues an immediate call. Its only durable trace is the history
    /// row the executor writes after dispatch.
    pub async fn place_call_now(&self, request: CallRequest) -> Result<(), ScheduleError> {
        crate::error::validate_phone_number(&request.phone_number)?;
        if request.message.is_none() && request.platform.is_none() {
            return Err(ValidationError::MissingPayload.into());
        }

        let message = QueueMessage::immediate(request);
        self.queue.enqueue(&message).await?;

        info!(message_id = %message.id, to = message.phone_number(), "Immediate call queued");
        Ok(())
    }

    /// Queues one immediate call per destination. Every destination is
    /// validated before anything is enqueued. Returns the queued count.
    pub async fn broadcast(
        &self,
        destinations: &[String],
        message: String,
        language: String,
        user_id: i64,
    ) -> Result<usize, ScheduleError> {
        for destination in destinations {
            crate::error::validate_phone_number(destination)?;
        }

        for destination in destinations {
            let request = CallRequest {
                phone_number: destination.clone(),
                message: Some(message.clone()),
                language: language.clone(),
                platform: None,
                user_id,
            };
            self.queue.enqueue(&QueueMessage::immediate(request)).await?;
        }

        info!(count = destinations.len(), user_id, "Broadcast queued");
        Ok(destinations.len())
    }

    /// Cancels a scheduled call.
    ///
    /// Cancellation only prevents future enqueues: the status write stops
    /// the poller and the handle abort stops recurrence fires. A message
    /// already on the queue or dispatched is not recalled, and its
    /// completion write will overwrite the cancelled status.
    pub async fn cancel(&self, id: i64, user_id: i64) -> Result<(), ScheduleError> {
        let call = self
            .store
            .get_scheduled_call(id, user_id)
            .await?
            .ok_or(ScheduleError::NotFound(id))?;

        self.store.set_status(call.id, JobStatus::Cancelled).await?;
        self.recurrence.cancel(call.id).await;

        self.notify_best_effort(
            user_id,
            &format!("Scheduled call (ID: {}) has been cancelled.", call.id),
        )
        .await;

        info!(job_id = call.id, "Scheduled call cancelled");
        Ok(())
    }

    /// Moves a scheduled call to a new trigger time and resets it to
    /// `pending`.
    ///
    /// A completed call cannot be rescheduled — it already executed, and
    /// resetting it would run it again. Failed and cancelled calls may be
    /// rescheduled. A recurring call gets its handle replaced with one
    /// derived from the new base time.
    pub async fn reschedule(
        &self,
        id: i64,
        new_time: chrono::DateTime<chrono::Utc>,
        user_id: i64,
    ) -> Result<ScheduledCall, ScheduleError> {
        let call = self
            .store
            .get_scheduled_call(id, user_id)
            .await?
            .ok_or(ScheduleError::NotFound(id))?;

        if call.status == JobStatus::Completed {
            return Err(ScheduleError::AlreadyCompleted(id));
        }

        self.store.update_schedule(call.id, new_time).await?;

        let mut updated = call;
        updated.schedule_time = new_time;
        updated.status = JobStatus::Pending;

        if updated.recurrence.is_recurring() {
            self.recurrence.arm(&updated).await;
        }

        self.notify_best_effort(
            user_id,
            &format!(
                "Scheduled call (ID: {}) rescheduled to {}.",
                updated.id, updated.schedule_time
            ),
        )
        .await;

        info!(job_id = updated.id, new_time = %updated.schedule_time, "Call rescheduled");
        Ok(updated)
    }

    /// Looks up a call by id for the owner: a still-scheduled row first,
    /// then the execution history.
    pub async fn status(
        &self,
        id: i64,
        user_id: i64,
    ) -> Result<Option<CallStatusView>, ScheduleError> {
        if let Some(call) = self.store.get_scheduled_call(id, user_id).await? {
            return Ok(Some(CallStatusView::Scheduled(call)));
        }
        if let Some(record) = self.store.get_history_record(id, user_id).await? {
            return Ok(Some(CallStatusView::History(record)));
        }
        Ok(None)
    }

    /// Returns one page of the owner's call history, newest first.
    pub async fn history(&self, user_id: i64, page: u32) -> Result<HistoryPage, ScheduleError> {
        Ok(self.store.list_history(user_id, page, HISTORY_PAGE_SIZE).await?)
    }

    /// Returns the recording reference of an executed call, if one has
    /// been attached.
    pub async fn recording(
        &self,
        history_id: i64,
        user_id: i64,
    ) -> Result<Option<String>, ScheduleError> {
        let record = self
            .store
            .get_history_record(history_id, user_id)
            .await?
            .ok_or(ScheduleError::NotFound(history_id))?;
        Ok(record.recording_url)
    }

    /// Returns the owner's call statistics.
    pub async fn stats(&self, user_id: i64) -> Result<CallStats, ScheduleError> {
        Ok(self.store.user_stats(user_id).await?)
    }

    /// Re-queues a failed historical call as a fresh immediate call.
    pub async fn retry_failed(&self, history_id: i64, user_id: i64) -> Result<(), ScheduleError> {
        let record = self
            .store
            .get_history_record(history_id, user_id)
            .await?
            .filter(|record| record.status == CallOutcome::Failed)
            .ok_or(ScheduleError::NotFound(history_id))?;

        let request = CallRequest {
            phone_number: record.phone_number.clone(),
            message: None,
            language: DEFAULT_LANGUAGE.to_string(),
            platform: None,
            user_id,
        };
        self.queue.enqueue(&QueueMessage::immediate(request)).await?;

        info!(history_id, to = %record.phone_number, "Failed call re-queued");
        Ok(())
    }

    /// Delivers a notification, logging and swallowing any failure.
    async fn notify_best_effort(&self, user_id: i64, text: &str) {
        if let Err(e) = self.notifier.notify(user_id, text).await {
            warn!(user_id, error = %e, "Failed to deliver notification");
        }
    }
}
