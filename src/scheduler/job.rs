//! Job definitions for the call-scheduling engine.
//!
//! This module defines the core types moved between the store, the queue
//! and the executor:
//!
//! - `ScheduledCall`: a persisted scheduled unit of outbound-call work
//! - `CallRequest`: an immediate call that never gets a scheduled row
//! - `QueueMessage`: the envelope handed from producers to the executor
//! - `Recurrence` / `JobStatus` / `CallOutcome`: lifecycle vocabulary

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::ValidationError;

/// Default language for call payloads when none is given.
pub const DEFAULT_LANGUAGE: &str = "en";

/// Recurrence pattern governing re-arming of a scheduled call after its
/// first occurrence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Recurrence {
    /// Fire once at the scheduled time.
    None,
    /// Fire at the same hour:minute every day.
    Daily,
    /// Fire at the same hour:minute on the same weekday every week.
    Weekly,
}

impl Recurrence {
    /// Returns the stored text form of this recurrence.
    pub fn as_str(&self) -> &'static str {
        match self {
            Recurrence::None => "none",
            Recurrence::Daily => "daily",
            Recurrence::Weekly => "weekly",
        }
    }

    /// Returns whether this recurrence re-arms after firing.
    pub fn is_recurring(&self) -> bool {
        !matches!(self, Recurrence::None)
    }
}

impl fmt::Display for Recurrence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Recurrence {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(Recurrence::None),
            "daily" => Ok(Recurrence::Daily),
            "weekly" => Ok(Recurrence::Weekly),
            other => Err(ValidationError::InvalidRecurrence(other.to_string())),
        }
    }
}

/// Status of a scheduled call.
///
/// Transitions only move forward, with two exceptions owned by the trigger
/// poller: it claims `pending -> queued` before enqueueing and releases
/// `queued -> pending` if the enqueue fails. `cancelled`, `completed` and
/// `failed` are terminal for an occurrence; a reschedule resets a
/// non-completed call back to `pending`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    /// Waiting for its trigger time.
    Pending,
    /// Claimed by the poller and promoted onto the queue.
    Queued,
    /// The latest occurrence was dispatched successfully.
    Completed,
    /// The latest occurrence exhausted its dial attempts.
    Failed,
    /// Cancelled by the owner; no future enqueues.
    Cancelled,
}

impl JobStatus {
    /// Returns the stored text form of this status.
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Queued => "queued",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
            JobStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(JobStatus::Pending),
            "queued" => Ok(JobStatus::Queued),
            "completed" => Ok(JobStatus::Completed),
            "failed" => Ok(JobStatus::Failed),
            "cancelled" => Ok(JobStatus::Cancelled),
            other => Err(format!("unknown job status '{}'", other)),
        }
    }
}

/// Terminal outcome of one executed call attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CallOutcome {
    /// The call was initiated by the placement collaborator.
    Completed,
    /// All dial attempts were exhausted.
    Failed,
}

impl CallOutcome {
    /// Returns the stored text form of this outcome.
    pub fn as_str(&self) -> &'static str {
        match self {
            CallOutcome::Completed => "completed",
            CallOutcome::Failed => "failed",
        }
    }
}

impl fmt::Display for CallOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CallOutcome {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "completed" => Ok(CallOutcome::Completed),
            "failed" => Ok(CallOutcome::Failed),
            other => Err(format!("unknown call outcome '{}'", other)),
        }
    }
}

/// A persisted scheduled call, one row in `scheduled_calls`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduledCall {
    /// Unique identifier, assigned by the store on creation.
    pub id: i64,
    /// Destination number in E.164 format.
    pub phone_number: String,
    /// Message text to speak, if any.
    pub message: Option<String>,
    /// Language of the message payload.
    pub language: String,
    /// Opaque platform hint passed through to the placement collaborator.
    pub platform: Option<String>,
    /// Wall-clock instant the call becomes due.
    pub schedule_time: DateTime<Utc>,
    /// Recurrence pattern derived from the schedule time.
    pub recurrence: Recurrence,
    /// Current lifecycle status.
    pub status: JobStatus,
    /// Owner identity notified about outcomes.
    pub user_id: i64,
}

/// Parameters for creating a scheduled call.
#[derive(Debug, Clone)]
pub struct ScheduleRequest {
    /// Destination number in E.164 format.
    pub phone_number: String,
    /// Message text to speak, if any.
    pub message: Option<String>,
    /// Language of the message payload.
    pub language: String,
    /// Opaque platform hint passed through to the placement collaborator.
    pub platform: Option<String>,
    /// Wall-clock instant the call becomes due.
    pub schedule_time: DateTime<Utc>,
    /// Recurrence pattern.
    pub recurrence: Recurrence,
    /// Owner identity.
    pub user_id: i64,
}

/// An immediate call request. Never stored in `scheduled_calls`; its only
/// durable trace is the history row written after execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallRequest {
    /// Destination number in E.164 format.
    pub phone_number: String,
    /// Message text to speak, if any.
    pub message: Option<String>,
    /// Language of the message payload.
    pub language: String,
    /// Opaque platform hint passed through to the placement collaborator.
    pub platform: Option<String>,
    /// Owner identity.
    pub user_id: i64,
}

/// Payload of a queue message: a snapshot of the work to execute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "call", rename_all = "lowercase")]
pub enum MessagePayload {
    /// A due occurrence of a scheduled call.
    Scheduled(ScheduledCall),
    /// A fire-and-forget immediate call.
    Immediate(CallRequest),
}

/// Envelope moved from producers (poller, recurrence engine) to the
/// executor. Ephemeral: it exists only between enqueue and dequeue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueMessage {
    /// Correlation id for this occurrence, used in log lines.
    pub id: Uuid,
    /// When the message was put on the queue.
    pub enqueued_at: DateTime<Utc>,
    /// The work snapshot.
    #[serde(flatten)]
    pub payload: MessagePayload,
}

impl QueueMessage {
    /// Creates a message for a due occurrence of a scheduled call.
    pub fn scheduled(call: ScheduledCall) -> Self {
        Self {
            id: Uuid::new_v4(),
            enqueued_at: Utc::now(),
            payload: MessagePayload::Scheduled(call),
        }
    }

    /// Creates a message for an immediate call.
    pub fn immediate(request: CallRequest) -> Self {
        Self {
            id: Uuid::new_v4(),
            enqueued_at: Utc::now(),
            payload: MessagePayload::Immediate(request),
        }
    }

    /// Returns the owner the outcome notification goes to.
    pub fn user_id(&self) -> i64 {
        match &self.payload {
            MessagePayload::Scheduled(call) => call.user_id,
            MessagePayload::Immediate(request) => request.user_id,
        }
    }

    /// Returns the destination number of this message.
    pub fn phone_number(&self) -> &str {
        match &self.payload {
            MessagePayload::Scheduled(call) => &call.phone_number,
            MessagePayload::Immediate(request) => &request.phone_number,
        }
    }
}

/// One row of `call_history`: the durable, append-only record of one
/// executed attempt. Never mutated except to attach a recording reference
/// delivered later by the callback collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryRecord {
    /// Unique identifier, assigned by the store.
    pub id: i64,
    /// Owner identity.
    pub user_id: i64,
    /// Destination number.
    pub phone_number: String,
    /// External call id returned by the placement collaborator; NULL when
    /// the dispatch failed.
    pub call_sid: Option<String>,
    /// Terminal outcome of the attempt.
    pub status: CallOutcome,
    /// When the attempt finished.
    pub timestamp: DateTime<Utc>,
    /// Recording reference, filled asynchronously by the callback
    /// collaborator.
    pub recording_url: Option<String>,
}

/// Parameters for appending a history row.
#[derive(Debug, Clone)]
pub struct NewHistoryRecord {
    /// Owner identity.
    pub user_id: i64,
    /// Destination number.
    pub phone_number: String,
    /// External call id, if the dispatch succeeded.
    pub call_sid: Option<String>,
    /// Terminal outcome of the attempt.
    pub status: CallOutcome,
    /// When the attempt finished.
    pub timestamp: DateTime<Utc>,
}

impl NewHistoryRecord {
    /// Creates a completed history entry with the external call id.
    pub fn completed(user_id: i64, phone_number: impl Into<String>, call_sid: impl Into<String>) -> Self {
        Self {
            user_id,
            phone_number: phone_number.into(),
            call_sid: Some(call_sid.into()),
            status: CallOutcome::Completed,
            timestamp: Utc::now(),
        }
    }

    /// Creates a failed history entry. No external call id exists on this
    /// path.
    pub fn failed(user_id: i64, phone_number: impl Into<String>) -> Self {
        Self {
            user_id,
            phone_number: phone_number.into(),
            call_sid: None,
            status: CallOutcome::Failed,
            timestamp: Utc::now(),
        }
    }
}

/// Per-owner call statistics derived from history and scheduled rows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallStats {
    /// Total executed attempts recorded in history.
    pub total_calls: u64,
    /// Attempts that completed.
    pub completed_calls: u64,
    /// Scheduled calls still waiting for their trigger time.
    pub pending_scheduled: u64,
}

impl CallStats {
    /// Returns the completion rate as a percentage.
    pub fn success_rate(&self) -> f64 {
        if self.total_calls == 0 {
            return 0.0;
        }
        (self.completed_calls as f64 / self.total_calls as f64) * 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_call() -> ScheduledCall {
        ScheduledCall {
            id: 7,
            phone_number: "+15551234567".to_string(),
            message: Some("Your appointment is tomorrow".to_string()),
            language: DEFAULT_LANGUAGE.to_string(),
            platform: None,
            schedule_time: "2023-10-10T10:00:00Z".parse().expect("valid time"),
            recurrence: Recurrence::None,
            status: JobStatus::Pending,
            user_id: 42,
        }
    }

    #[test]
    fn test_recurrence_parse() {
        assert_eq!("none".parse::<Recurrence>().unwrap(), Recurrence::None);
        assert_eq!("daily".parse::<Recurrence>().unwrap(), Recurrence::Daily);
        assert_eq!("weekly".parse::<Recurrence>().unwrap(), Recurrence::Weekly);
        assert!("monthly".parse::<Recurrence>().is_err());
        assert!("Daily".parse::<Recurrence>().is_err());
    }

    #[test]
    fn test_recurrence_is_recurring() {
        assert!(!Recurrence::None.is_recurring());
        assert!(Recurrence::Daily.is_recurring());
        assert!(Recurrence::Weekly.is_recurring());
    }

    #[test]
    fn test_job_status_roundtrip() {
        for status in [
            JobStatus::Pending,
            JobStatus::Queued,
            JobStatus::Completed,
            JobStatus::Failed,
            JobStatus::Cancelled,
        ] {
            assert_eq!(status.as_str().parse::<JobStatus>().unwrap(), status);
        }
        assert!("running".parse::<JobStatus>().is_err());
    }

    #[test]
    fn test_call_outcome_display() {
        assert_eq!(format!("{}", CallOutcome::Completed), "completed");
        assert_eq!(format!("{}", CallOutcome::Failed), "failed");
    }

    #[test]
    fn test_queue_message_wire_format() {
        let message = QueueMessage::scheduled(sample_call());
        let json = serde_json::to_value(&message).expect("serialization should work");

        assert_eq!(json["type"], "scheduled");
        assert_eq!(json["call"]["phone_number"], "+15551234567");
        assert_eq!(json["call"]["recurrence"], "none");
        assert!(json["id"].is_string());

        let immediate = QueueMessage::immediate(CallRequest {
            phone_number: "+3312345678".to_string(),
            message: None,
            language: "fr".to_string(),
            platform: Some("desk".to_string()),
            user_id: 9,
        });
        let json = serde_json::to_value(&immediate).expect("serialization should work");
        assert_eq!(json["type"], "immediate");
        assert_eq!(json["call"]["user_id"], 9);
    }

    #[test]
    fn test_queue_message_accessors() {
        let message = QueueMessage::scheduled(sample_call());
        assert_eq!(message.user_id(), 42);
        assert_eq!(message.phone_number(), "+15551234567");
    }

    #[test]
    fn test_history_record_constructors() {
        let completed = NewHistoryRecord::completed(1, "+15551234567", "CA123");
        assert_eq!(completed.status, CallOutcome::Completed);
        assert_eq!(completed.call_sid.as_deref(), Some("CA123"));

        let failed = NewHistoryRecord::failed(1, "+15551234567");
        assert_eq!(failed.status, CallOutcome::Failed);
        assert!(failed.call_sid.is_none());
    }

    #[test]
    fn test_call_stats_success_rate() {
        let stats = CallStats {
            total_calls: 10,
            completed_calls: 8,
            pending_scheduled: 3,
        };
        assert!((stats.success_rate() - 80.0).abs() < f64::EPSILON);

        let empty = CallStats::default();
        assert!((empty.success_rate() - 0.0).abs() < f64::EPSILON);
    }
}
