//! Database schema constants.
//!
//! This module contains the SQL schema definitions for the PostgreSQL
//! storage backend: scheduled calls and the append-only call history.

/// SQL schema for creating the scheduled_calls table.
pub const CREATE_SCHEDULED_CALLS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS scheduled_calls (
    id BIGSERIAL PRIMARY KEY,
    phone_number VARCHAR(20) NOT NULL,
    message TEXT,
    language VARCHAR(16) NOT NULL DEFAULT 'en',
    platform VARCHAR(64),
    schedule_time TIMESTAMPTZ NOT NULL,
    recurrence VARCHAR(10) NOT NULL DEFAULT 'none',
    status VARCHAR(10) NOT NULL DEFAULT 'pending',
    user_id BIGINT NOT NULL
)
"#;

/// SQL schema for creating the call_history table.
pub const CREATE_CALL_HISTORY_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS call_history (
    id BIGSERIAL PRIMARY KEY,
    user_id BIGINT NOT NULL,
    phone_number VARCHAR(20) NOT NULL,
    call_sid VARCHAR(64),
    status VARCHAR(10) NOT NULL,
    timestamp TIMESTAMPTZ NOT NULL,
    recording_url TEXT
)
"#;

/// SQL for creating all required indexes.
pub const CREATE_INDEXES: &str = r#"
CREATE INDEX IF NOT EXISTS idx_scheduled_calls_user_id ON scheduled_calls(user_id);
CREATE INDEX IF NOT EXISTS idx_scheduled_calls_due ON scheduled_calls(status, schedule_time);
CREATE INDEX IF NOT EXISTS idx_call_history_user_id ON call_history(user_id);
CREATE INDEX IF NOT EXISTS idx_call_history_call_sid ON call_history(call_sid)
"#;

/// Returns all schema creation statements in the correct order.
pub fn all_schema_statements() -> Vec<&'static str> {
    vec![
        CREATE_SCHEDULED_CALLS_TABLE,
        CREATE_CALL_HISTORY_TABLE,
        CREATE_INDEXES,
    ]
}

/// Table names in the schema.
pub mod tables {
    /// Scheduled calls table name.
    pub const SCHEDULED_CALLS: &str = "scheduled_calls";
    /// Call history table name.
    pub const CALL_HISTORY: &str = "call_history";
}
