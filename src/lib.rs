//! callforge: scheduled outbound voice-call engine.
//!
//! This library persists scheduling intent for outbound calls, promotes
//! due work onto a queue, and executes queued work against a
//! call-placement collaborator with bounded retry, durable outcome
//! history and owner notifications.

// Core modules
pub mod cli;
pub mod config;
pub mod dialer;
pub mod error;
pub mod notify;
pub mod scheduler;
pub mod storage;

// Re-export commonly used types
pub use config::{ConfigError, EngineConfig};
pub use error::ValidationError;
pub use scheduler::{CallScheduler, Executor, RecurrenceEngine, TriggerPoller};
