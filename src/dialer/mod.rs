//! Call-placement collaborator interface.
//!
//! The engine never talks to a telephony provider directly; it dispatches
//! through the [`CallDialer`] trait. The production implementation is
//! [`TwilioDialer`]; tests substitute stubs. A dialer only *initiates* a
//! call — the physical call completes (or not) long after `place_call`
//! returns, and its delivery status arrives through the callback
//! collaborator.

mod twilio;

use async_trait::async_trait;
use thiserror::Error;

pub use twilio::TwilioDialer;

/// Errors that can occur while placing a call.
#[derive(Debug, Error)]
pub enum DialError {
    /// The HTTP request to the provider failed.
    #[error("Call placement request failed: {0}")]
    RequestFailed(String),

    /// The provider rejected the request.
    #[error("Call placement API error ({code}): {message}")]
    ApiError { code: u16, message: String },

    /// The provider's response could not be parsed.
    #[error("Failed to parse call placement response: {0}")]
    InvalidResponse(String),
}

/// Input to a call placement: destination plus payload options.
#[derive(Debug, Clone, PartialEq)]
pub struct CallPlacement {
    /// Destination number in E.164 format.
    pub to: String,
    /// Message text to speak, if any.
    pub message: Option<String>,
    /// Language of the message payload.
    pub language: String,
    /// Opaque platform hint, passed through untouched.
    pub platform: Option<String>,
}

/// A successfully initiated call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlacedCall {
    /// External call identifier assigned by the provider.
    pub sid: String,
}

/// Places outbound voice calls.
#[async_trait]
pub trait CallDialer: Send + Sync {
    /// Initiates a call and returns the provider's call identifier.
    ///
    /// Implementations must be time-bounded; the executor wraps this in
    /// its own bounded-retry policy and treats the last error as the
    /// attempt's failure.
    async fn place_call(&self, placement: &CallPlacement) -> Result<PlacedCall, DialError>;
}

impl CallPlacement {
    /// Creates a placement for a destination with a spoken message.
    pub fn new(to: impl Into<String>) -> Self {
        Self {
            to: to.into(),
            message: None,
            language: crate::scheduler::job::DEFAULT_LANGUAGE.to_string(),
            platform: None,
        }
    }

    /// Sets the message text.
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Sets the payload language.
    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    /// Sets the opaque platform hint.
    pub fn with_platform(mut self, platform: impl Into<String>) -> Self {
        self.platform = Some(platform.into());
        self
    }
}
