//! Engine configuration.
//!
//! This module provides configuration for the call-scheduling engine:
//! store and queue endpoints, loop intervals, the dial retry policy, and
//! credentials for the call-placement and messaging collaborators.

use std::time::Duration;
use thiserror::Error;

/// Errors that can occur during configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required environment variable is missing.
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),

    /// An environment variable has an invalid value.
    #[error("Invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    /// Configuration validation failed.
    #[error("Configuration validation failed: {0}")]
    ValidationFailed(String),
}

/// Configuration for the call-scheduling engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    // Storage settings
    /// PostgreSQL connection URL for scheduled calls and call history.
    pub database_url: String,
    /// Redis connection URL for the work queue.
    pub redis_url: String,
    /// Name of the Redis list used as the work queue.
    pub queue_name: String,

    // Loop settings
    /// How often the trigger poller scans for due scheduled calls.
    pub poll_interval: Duration,
    /// How long the executor sleeps when the queue is empty.
    pub executor_idle_interval: Duration,

    // Dial settings
    /// Maximum attempts per call dispatch before recording a failure.
    pub dial_max_attempts: u32,
    /// Fixed delay between dial attempts.
    pub dial_retry_delay: Duration,
    /// Timeout for a single call-placement request.
    pub dial_timeout: Duration,

    // Call-placement collaborator (Twilio)
    /// Twilio account SID.
    pub twilio_account_sid: String,
    /// Twilio auth token.
    pub twilio_auth_token: String,
    /// Caller number presented on outbound calls.
    pub twilio_from_number: String,
    /// Public base URL Twilio calls back with recording/status events.
    pub twilio_callback_url: String,

    // Messaging collaborator (Telegram)
    /// Bot token used to deliver outcome notifications.
    pub telegram_bot_token: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            database_url: "postgres://localhost/callforge".to_string(),
            redis_url: "redis://localhost:6379".to_string(),
            queue_name: "call_queue".to_string(),
            poll_interval: Duration::from_secs(60),
            executor_idle_interval: Duration::from_secs(1),
            dial_max_attempts: 3,
            dial_retry_delay: Duration::from_secs(1),
            dial_timeout: Duration::from_secs(30),
            twilio_account_sid: String::new(),
            twilio_auth_token: String::new(),
            twilio_from_number: String::new(),
            twilio_callback_url: String::new(),
            telegram_bot_token: String::new(),
        }
    }
}

impl EngineConfig {
    /// Creates a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `DATABASE_URL`: PostgreSQL connection URL (required)
    /// - `REDIS_URL`: Redis connection URL (default: redis://localhost:6379)
    /// - `CALLFORGE_QUEUE_NAME`: Redis list name (default: call_queue)
    /// - `CALLFORGE_POLL_INTERVAL_SECS`: Poller period (default: 60)
    /// - `CALLFORGE_EXECUTOR_IDLE_SECS`: Executor idle sleep (default: 1)
    /// - `CALLFORGE_DIAL_MAX_ATTEMPTS`: Dial attempts per message (default: 3)
    /// - `CALLFORGE_DIAL_RETRY_DELAY_SECS`: Delay between attempts (default: 1)
    /// - `CALLFORGE_DIAL_TIMEOUT_SECS`: Per-request dial timeout (default: 30)
    /// - `TWILIO_ACCOUNT_SID`: Twilio account SID (required)
    /// - `TWILIO_AUTH_TOKEN`: Twilio auth token (required)
    /// - `TWILIO_PHONE_NUMBER`: Caller number (required)
    /// - `TWILIO_CALLBACK_URL`: Public callback base URL (required)
    /// - `TELEGRAM_BOT_TOKEN`: Messaging bot token (required)
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or have
    /// invalid values.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        config.database_url = require_env("DATABASE_URL")?;

        if let Ok(val) = std::env::var("REDIS_URL") {
            config.redis_url = val;
        }

        if let Ok(val) = std::env::var("CALLFORGE_QUEUE_NAME") {
            config.queue_name = val;
        }

        if let Ok(val) = std::env::var("CALLFORGE_POLL_INTERVAL_SECS") {
            let secs: u64 = parse_env_value(&val, "CALLFORGE_POLL_INTERVAL_SECS")?;
            config.poll_interval = Duration::from_secs(secs);
        }

        if let Ok(val) = std::env::var("CALLFORGE_EXECUTOR_IDLE_SECS") {
            let secs: u64 = parse_env_value(&val, "CALLFORGE_EXECUTOR_IDLE_SECS")?;
            config.executor_idle_interval = Duration::from_secs(secs);
        }

        if let Ok(val) = std::env::var("CALLFORGE_DIAL_MAX_ATTEMPTS") {
            config.dial_max_attempts = parse_env_value(&val, "CALLFORGE_DIAL_MAX_ATTEMPTS")?;
        }

        if let Ok(val) = std::env::var("CALLFORGE_DIAL_RETRY_DELAY_SECS") {
            let secs: u64 = parse_env_value(&val, "CALLFORGE_DIAL_RETRY_DELAY_SECS")?;
            config.dial_retry_delay = Duration::from_secs(secs);
        }

        if let Ok(val) = std::env::var("CALLFORGE_DIAL_TIMEOUT_SECS") {
            let secs: u64 = parse_env_value(&val, "CALLFORGE_DIAL_TIMEOUT_SECS")?;
            config.dial_timeout = Duration::from_secs(secs);
        }

        config.twilio_account_sid = require_env("TWILIO_ACCOUNT_SID")?;
        config.twilio_auth_token = require_env("TWILIO_AUTH_TOKEN")?;
        config.twilio_from_number = require_env("TWILIO_PHONE_NUMBER")?;
        config.twilio_callback_url = require_env("TWILIO_CALLBACK_URL")?;
        config.telegram_bot_token = require_env("TELEGRAM_BOT_TOKEN")?;

        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationFailed` if any values are invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.database_url.is_empty() {
            return Err(ConfigError::ValidationFailed(
                "database_url cannot be empty".to_string(),
            ));
        }

        if self.redis_url.is_empty() {
            return Err(ConfigError::ValidationFailed(
                "redis_url cannot be empty".to_string(),
            ));
        }

        if self.queue_name.is_empty() {
            return Err(ConfigError::ValidationFailed(
                "queue_name cannot be empty".to_string(),
            ));
        }

        if self.poll_interval.as_secs() == 0 {
            return Err(ConfigError::ValidationFailed(
                "poll_interval must be greater than 0".to_string(),
            ));
        }

        if self.executor_idle_interval.is_zero() {
            return Err(ConfigError::ValidationFailed(
                "executor_idle_interval must be greater than 0".to_string(),
            ));
        }

        if self.dial_max_attempts == 0 {
            return Err(ConfigError::ValidationFailed(
                "dial_max_attempts must be greater than 0".to_string(),
            ));
        }

        if self.dial_timeout.is_zero() {
            return Err(ConfigError::ValidationFailed(
                "dial_timeout must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Builder method to set the database URL.
    pub fn with_database_url(mut self, url: impl Into<String>) -> Self {
        self.database_url = url.into();
        self
    }

    /// Builder method to set the Redis URL.
    pub fn with_redis_url(mut self, url: impl Into<String>) -> Self {
        self.redis_url = url.into();
        self
    }

    /// Builder method to set the queue name.
    pub fn with_queue_name(mut self, name: impl Into<String>) -> Self {
        self.queue_name = name.into();
        self
    }

    /// Builder method to set the poller interval.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Builder method to set the executor idle interval.
    pub fn with_executor_idle_interval(mut self, interval: Duration) -> Self {
        self.executor_idle_interval = interval;
        self
    }

    /// Builder method to set the dial attempt limit.
    pub fn with_dial_max_attempts(mut self, attempts: u32) -> Self {
        self.dial_max_attempts = attempts;
        self
    }

    /// Builder method to set the delay between dial attempts.
    pub fn with_dial_retry_delay(mut self, delay: Duration) -> Self {
        self.dial_retry_delay = delay;
        self
    }

    /// Builder method to set the per-request dial timeout.
    pub fn with_dial_timeout(mut self, timeout: Duration) -> Self {
        self.dial_timeout = timeout;
        self
    }
}

/// Reads a required environment variable.
fn require_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Parse an environment variable value into a type.
fn parse_env_value<T: std::str::FromStr>(value: &str, key: &str) -> Result<T, ConfigError> {
    value.parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        message: format!("could not parse '{}'", value),
    })
}
