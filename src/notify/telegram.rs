//! Telegram implementation of the notification collaborator.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use super::{NotifyError, Notifier};

/// Base URL of the Telegram Bot API.
const TELEGRAM_API_BASE: &str = "https://api.telegram.org";

/// Per-request timeout. Notifications are best-effort and must never
/// stall the executor.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Telegram Bot API notifier.
pub struct TelegramNotifier {
    /// HTTP client for API requests.
    client: Client,
    /// Bot token used for authentication.
    bot_token: String,
    /// Base URL of the API (overridable for tests/proxies).
    base_url: String,
}

/// Error response body of a Bot API request.
#[derive(Debug, Deserialize)]
struct TelegramErrorResponse {
    description: Option<String>,
}

impl TelegramNotifier {
    /// Creates a new notifier with the given bot token.
    pub fn new(bot_token: impl Into<String>) -> Self {
        Self {
            client: Client::builder()
                .timeout(REQUEST_TIMEOUT)
                .build()
                .expect("Failed to build HTTP client - system TLS configuration error"),
            bot_token: bot_token.into(),
            base_url: TELEGRAM_API_BASE.to_string(),
        }
    }

    /// Overrides the API base URL. Useful for tests and proxies.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn notify(&self, user_id: i64, text: &str) -> Result<(), NotifyError> {
        let url = format!("{}/bot{}/sendMessage", self.base_url, self.bot_token);

        let response = self
            .client
            .post(&url)
            .json(&serde_json::json!({
                "chat_id": user_id,
                "text": text,
            }))
            .send()
            .await
            .map_err(|e| NotifyError::RequestFailed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .json::<TelegramErrorResponse>()
                .await
                .ok()
                .and_then(|body| body.description)
                .unwrap_or_else(|| status.to_string());

            return Err(NotifyError::ApiError {
                code: status.as_u16(),
                message,
            });
        }

        debug!(user_id, "Notification delivered");
        Ok(())
    }
}
