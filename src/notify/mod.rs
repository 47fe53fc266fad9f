//! Outcome notification to the messaging front-end.
//!
//! Every terminal outcome (completed, failed, cancelled) produces exactly
//! one notification to the owning user. Delivery is best-effort: call
//! sites log a failed notify and move on — a notification failure never
//! rolls back or retries the job and history writes already committed.

mod telegram;

use async_trait::async_trait;
use thiserror::Error;

pub use telegram::TelegramNotifier;

/// Errors that can occur while delivering a notification.
#[derive(Debug, Error)]
pub enum NotifyError {
    /// The HTTP request to the messaging front-end failed.
    #[error("Notification request failed: {0}")]
    RequestFailed(String),

    /// The messaging front-end rejected the request.
    #[error("Notification API error ({code}): {message}")]
    ApiError { code: u16, message: String },
}

/// Delivers outcome and status messages to an owner.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Sends a text message to the given owner.
    async fn notify(&self, user_id: i64, text: &str) -> Result<(), NotifyError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_notify_error_display() {
        let err = NotifyError::RequestFailed("dns failure".to_string());
        assert!(err.to_string().contains("dns failure"));

        let err = NotifyError::ApiError {
            code: 403,
            message: "bot was blocked".to_string(),
        };
        assert!(err.to_string().contains("403"));
        assert!(err.to_string().contains("blocked"));
    }
}
