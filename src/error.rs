//! Request-boundary validation for callforge operations.
//!
//! Validation errors are rejected synchronously when a request enters the
//! system; invalid work is never enqueued. Each subsystem defines its own
//! operational error type next to its implementation (`QueueError`,
//! `StoreError`, `DialError`, ...); this module only covers what a caller
//! can get wrong when describing a call.

use chrono::{DateTime, NaiveDateTime, Utc};
use regex::Regex;
use std::sync::LazyLock;
use thiserror::Error;

/// E.164 destination format: a plus sign, then 2 to 15 digits.
static PHONE_NUMBER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\+[1-9]\d{1,14}$").expect("Invalid phone number regex"));

/// Errors produced while validating an incoming scheduling or call request.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Invalid destination '{0}': expected E.164 format (e.g. +15551234567)")]
    InvalidPhoneNumber(String),

    #[error("Invalid schedule time '{0}': expected an ISO-8601 timestamp (e.g. 2023-10-10T10:00:00Z)")]
    InvalidScheduleTime(String),

    #[error("Invalid recurrence '{0}': expected 'none', 'daily' or 'weekly'")]
    InvalidRecurrence(String),

    #[error("A message or a platform hint is required")]
    MissingPayload,
}

/// Validates a destination number against the E.164 format.
pub fn validate_phone_number(input: &str) -> Result<(), ValidationError> {
    if PHONE_NUMBER_RE.is_match(input) {
        Ok(())
    } else {
        Err(ValidationError::InvalidPhoneNumber(input.to_string()))
    }
}

/// Parses a schedule time from an ISO-8601 string.
///
/// Accepts a full RFC 3339 timestamp with offset, or a naive
/// `YYYY-MM-DDTHH:MM:SS` value which is interpreted as UTC (the form the
/// messaging front-end sends).
pub fn parse_schedule_time(input: &str) -> Result<DateTime<Utc>, ValidationError> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(input) {
        return Ok(dt.with_timezone(&Utc));
    }

    NaiveDateTime::parse_from_str(input, "%Y-%m-%dT%H:%M:%S")
        .map(|naive| naive.and_utc())
        .map_err(|_| ValidationError::InvalidScheduleTime(input.to_string()))
}
