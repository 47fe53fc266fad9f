//! Twilio implementation of the call-placement collaborator.
//!
//! Places outbound calls through the Twilio Calls API with a minimal TwiML
//! document built from the message text. Recording is enabled and status
//! events are delivered to the configured callback URL, where the callback
//! collaborator fills in recording references asynchronously.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info};

use crate::config::EngineConfig;

use super::{CallDialer, CallPlacement, DialError, PlacedCall};

/// Base URL of the Twilio REST API.
const TWILIO_API_BASE: &str = "https://api.twilio.com/2010-04-01";

/// Seconds Twilio lets the destination ring before giving up.
const RING_TIMEOUT_SECS: u32 = 30;

/// Maximum recording length in seconds.
const RECORD_MAX_LENGTH_SECS: u32 = 30;

/// Default per-request timeout.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Spoken fallback when a placement carries no message text.
const DEFAULT_GREETING: &str = "Hello! This is your scheduled call.";

/// Twilio call-placement client.
pub struct TwilioDialer {
    /// HTTP client for API requests.
    client: Client,
    /// Twilio account SID.
    account_sid: String,
    /// Twilio auth token.
    auth_token: String,
    /// Caller number presented on outbound calls.
    from_number: String,
    /// Public base URL for recording/status callbacks.
    callback_url: String,
    /// Base URL of the API (overridable for tests/proxies).
    base_url: String,
}

/// Successful response body of a Calls request.
#[derive(Debug, Deserialize)]
struct CallResponse {
    sid: String,
}

/// Error response body of a Calls request.
#[derive(Debug, Deserialize)]
struct TwilioErrorResponse {
    message: Option<String>,
}

impl TwilioDialer {
    /// Creates a new dialer with the default request timeout.
    pub fn new(
        account_sid: impl Into<String>,
        auth_token: impl Into<String>,
        from_number: impl Into<String>,
        callback_url: impl Into<String>,
    ) -> Self {
        Self::with_timeout(account_sid, auth_token, from_number, callback_url, REQUEST_TIMEOUT)
    }

    /// Creates a new dialer with a custom request timeout.
    pub fn with_timeout(
        account_sid: impl Into<String>,
        auth_token: impl Into<String>,
        from_number: impl Into<String>,
        callback_url: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            client: Client::builder()
                .timeout(timeout)
                .build()
                .expect("Failed to build HTTP client - system TLS configuration error"),
            account_sid: account_sid.into(),
            auth_token: auth_token.into(),
            from_number: from_number.into(),
            callback_url: callback_url.into(),
            base_url: TWILIO_API_BASE.to_string(),
        }
    }

    /// Creates a dialer from engine configuration.
    pub fn from_config(config: &EngineConfig) -> Self {
        Self::with_timeout(
            &config.twilio_account_sid,
            &config.twilio_auth_token,
            &config.twilio_from_number,
            &config.twilio_callback_url,
            config.dial_timeout,
        )
    }

    /// Overrides the API base URL. Useful for tests and proxies.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Builds the TwiML document spoken on answer.
    fn build_twiml(&self, placement: &CallPlacement) -> String {
        let text = placement.message.as_deref().unwrap_or(DEFAULT_GREETING);
        format!(
            r#"<Response><Say language="{}">{}</Say><Record maxLength="{}" action="{}/recording"/></Response>"#,
            xml_escape(&placement.language),
            xml_escape(text),
            RECORD_MAX_LENGTH_SECS,
            self.callback_url,
        )
    }
}

#[async_trait]
impl CallDialer for TwilioDialer {
    async fn place_call(&self, placement: &CallPlacement) -> Result<PlacedCall, DialError> {
        let url = format!("{}/Accounts/{}/Calls.json", self.base_url, self.account_sid);
        let twiml = self.build_twiml(placement);

        if let Some(platform) = &placement.platform {
            debug!(to = %placement.to, platform = %platform, "Placing call with platform hint");
        }

        let form: Vec<(&str, String)> = vec![
            ("To", placement.to.clone()),
            ("From", self.from_number.clone()),
            ("Twiml", twiml),
            ("Timeout", RING_TIMEOUT_SECS.to_string()),
            ("Record", "true".to_string()),
            ("StatusCallback", format!("{}/status", self.callback_url)),
            ("StatusCallbackEvent", "initiated".to_string()),
            ("StatusCallbackEvent", "ringing".to_string()),
            ("StatusCallbackEvent", "answered".to_string()),
            ("StatusCallbackEvent", "completed".to_string()),
        ];

        let response = self
            .client
            .post(&url)
            .basic_auth(&self.account_sid, Some(&self.auth_token))
            .form(&form)
            .send()
            .await
            .map_err(|e| DialError::RequestFailed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .json::<TwilioErrorResponse>()
                .await
                .ok()
                .and_then(|body| body.message)
                .unwrap_or_else(|| status.to_string());

            return Err(DialError::ApiError {
                code: status.as_u16(),
                message,
            });
        }

        let call: CallResponse = response
            .json()
            .await
            .map_err(|e| DialError::InvalidResponse(e.to_string()))?;

        info!(to = %placement.to, call_sid = %call.sid, "Outbound call initiated");
        Ok(PlacedCall { sid: call.sid })
    }
}

/// Escapes text for embedding in a TwiML document.
fn xml_escape(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            other => escaped.push(other),
        }
    }
    escaped
}
