//! Call scheduling and queue processing.
//!
//! This module provides the engine that turns scheduling intent into
//! executed calls:
//!
//! - **CallScheduler**: request-side API (schedule, cancel, reschedule, ...)
//! - **TriggerPoller**: promotes due scheduled calls onto the queue
//! - **RecurrenceEngine**: re-arms daily/weekly calls independently
//! - **Executor**: drains the queue and dispatches with bounded retry
//! - **RedisQueue**: the single FIFO hand-off between producers and consumer
//!
//! # Architecture
//!
//! ```text
//!   ┌───────────────┐   schedule/cancel   ┌──────────────┐
//!   │ CallScheduler │ ──────────────────▶ │   Postgres   │
//!   └──────┬────────┘                     │  (job store) │
//!          │ immediate                    └──────▲───────┘
//!          ▼                                     │ claim due /
//!   ┌──────────────┐   enqueue   ┌───────────────┴──┐
//!   │    Redis     │ ◀────────── │  TriggerPoller   │
//!   │   (queue)    │ ◀────────── │ RecurrenceEngine │
//!   └──────┬───────┘             └──────────────────┘
//!          │ dequeue
//!          ▼
//!   ┌──────────────┐   place_call   ┌────────────┐
//!   │   Executor   │ ─────────────▶ │   Dialer   │
//!   └──────┬───────┘                └────────────┘
//!          │ outcome + history + notify
//!          ▼
//!   ┌──────────────┐
//!   │   Notifier   │
//!   └──────────────┘
//! ```
//!
//! # Delivery semantics
//!
//! A due occurrence is enqueued at least once. The poller's atomic claim
//! closes the double-enqueue window between ticks, but a message popped
//! from the queue and lost to a crash before its outcome is recorded is
//! gone — history recording is idempotent per occurrence, not exactly-once
//! end to end.

pub mod executor;
pub mod job;
pub mod poller;
pub mod queue;
pub mod recurrence;
pub mod service;

#[cfg(test)]
pub(crate) mod test_support;

// Re-export main types for convenience
pub use executor::{Executor, ExecutorStats, RetryPolicy};
pub use job::{
    CallOutcome, CallRequest, CallStats, HistoryRecord, JobStatus, MessagePayload,
    NewHistoryRecord, QueueMessage, Recurrence, ScheduleRequest, ScheduledCall,
};
pub use poller::TriggerPoller;
pub use queue::{QueueError, RedisQueue, WorkQueue};
pub use recurrence::{next_occurrence, RecurrenceEngine};
pub use service::{CallScheduler, CallStatusView, ScheduleError};
