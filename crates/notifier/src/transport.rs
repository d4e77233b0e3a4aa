//! Email transports.
//!
//! `EmailTransport` is the seam between the dispatcher and the provider:
//! `ResendTransport` talks to a Resend-compatible HTTP API in production,
//! `RecordingTransport` captures messages in memory for tests (`test-util`).

#[cfg(any(test, feature = "test-util"))]
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

/// JSON body accepted by the provider's `POST /emails` endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutboundEmail {
    pub from: String,
    pub to: Vec<String>,
    pub subject: String,
    pub html: String,
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("provider returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("request to provider failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{0}")]
    Other(String),
}

/// Abstraction over an email provider. One call is one delivery attempt.
#[async_trait]
pub trait EmailTransport: Send + Sync {
    async fn send(&self, email: &OutboundEmail) -> Result<(), TransportError>;
}

// =============================================================================
// ResendTransport: HTTPS delivery
// =============================================================================

pub struct ResendTransport {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
}

impl ResendTransport {
    /// Build a transport posting to `{base_url}/emails`.
    pub fn new(base_url: &str, api_key: String, timeout: Duration) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("herald/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            endpoint: format!("{}/emails", base_url.trim_end_matches('/')),
            api_key,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl EmailTransport for ResendTransport {
    async fn send(&self, email: &OutboundEmail) -> Result<(), TransportError> {
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(email)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        Err(TransportError::Status {
            status: status.as_u16(),
            body,
        })
    }
}

// =============================================================================
// RecordingTransport: in-memory capture (tests)
// =============================================================================

/// Records every email it is asked to send.
///
/// Can be configured to fail or stall so callers can exercise the
/// dispatcher's error and timeout paths. Only built for tests and the
/// `test-util` feature.
#[cfg(any(test, feature = "test-util"))]
#[derive(Default)]
pub struct RecordingTransport {
    sent: Mutex<Vec<OutboundEmail>>,
    fail_with: Option<u16>,
    delay: Option<Duration>,
}

#[cfg(any(test, feature = "test-util"))]
impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every send is recorded, then rejected with this HTTP status.
    pub fn failing(status: u16) -> Self {
        Self {
            fail_with: Some(status),
            ..Self::default()
        }
    }

    /// Every send sleeps for `delay` before succeeding.
    pub fn stalled(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    pub fn sent(&self) -> Vec<OutboundEmail> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }

    pub fn call_count(&self) -> usize {
        self.sent.lock().map(|s| s.len()).unwrap_or_default()
    }
}

#[cfg(any(test, feature = "test-util"))]
#[async_trait]
impl EmailTransport for RecordingTransport {
    async fn send(&self, email: &OutboundEmail) -> Result<(), TransportError> {
        self.sent
            .lock()
            .map_err(|_| TransportError::Other("recording transport poisoned".to_string()))?
            .push(email.clone());

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        match self.fail_with {
            Some(status) => Err(TransportError::Status {
                status,
                body: "rejected by recording transport".to_string(),
            }),
            None => Ok(()),
        }
    }
}
