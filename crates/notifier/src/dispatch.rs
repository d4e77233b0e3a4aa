//! Delivery dispatcher. One attempt per message, fire-and-forget.
//!
//! With a configured provider and a resolvable recipient the message is sent
//! exactly once, bounded by a timeout. Otherwise a dry-run record is logged
//! instead. Provider failures are logged and counted but never propagated.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde_json::Value;

use crate::metrics::DeliveryMetrics;
use crate::render::RenderedMessage;
use crate::request::NotificationKind;
use crate::transport::{EmailTransport, OutboundEmail};

/// Result of a single dispatch. Only used for logging and counters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Sent,
    DryRun,
    ProviderError(String),
}

/// Why a message was logged rather than sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DryRunReason {
    ProviderUnconfigured,
    NoRecipient,
}

/// Structured record logged in place of a delivery.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DryRunRecord {
    pub kind: NotificationKind,
    pub reason: DryRunReason,
    pub subject: String,
    pub recipients: Vec<String>,
    pub details: Value,
}

/// What the dispatcher will do with a message.
#[derive(Debug, Clone, PartialEq)]
pub enum DeliveryPlan {
    Send(OutboundEmail),
    DryRun(DryRunRecord),
}

pub struct Dispatcher {
    transport: Option<Arc<dyn EmailTransport>>,
    from: String,
    timeout: Duration,
    metrics: Arc<DeliveryMetrics>,
}

impl Dispatcher {
    /// `transport` is `None` when no provider credentials are configured.
    pub fn new(
        transport: Option<Arc<dyn EmailTransport>>,
        from: String,
        timeout: Duration,
        metrics: Arc<DeliveryMetrics>,
    ) -> Self {
        Self {
            transport,
            from,
            timeout,
            metrics,
        }
    }

    pub fn metrics(&self) -> &DeliveryMetrics {
        &self.metrics
    }

    /// Decide between sending and a dry-run without touching the network.
    pub fn plan(&self, message: &RenderedMessage) -> DeliveryPlan {
        let reason = if self.transport.is_none() {
            Some(DryRunReason::ProviderUnconfigured)
        } else if message.recipients.is_empty() {
            Some(DryRunReason::NoRecipient)
        } else {
            None
        };

        match reason {
            Some(reason) => DeliveryPlan::DryRun(DryRunRecord {
                kind: message.kind,
                reason,
                subject: message.subject.clone(),
                recipients: message.recipients.clone(),
                details: message.details.clone(),
            }),
            None => DeliveryPlan::Send(OutboundEmail {
                from: self.from.clone(),
                to: message.recipients.clone(),
                subject: message.subject.clone(),
                html: message.html.clone(),
            }),
        }
    }

    pub async fn dispatch(&self, message: &RenderedMessage) -> DeliveryOutcome {
        let (transport, email) = match (&self.transport, self.plan(message)) {
            (Some(transport), DeliveryPlan::Send(email)) => (transport, email),
            (_, plan) => {
                if let DeliveryPlan::DryRun(record) = plan {
                    log_dry_run(&record);
                }
                self.metrics.record_dry_run();
                return DeliveryOutcome::DryRun;
            }
        };

        let result = tokio::time::timeout(self.timeout, transport.send(&email)).await;

        let detail = match result {
            Ok(Ok(())) => {
                tracing::info!(
                    kind = %message.kind,
                    subject = %email.subject,
                    recipients = email.to.len(),
                    "Notification email sent"
                );
                self.metrics.record_sent();
                return DeliveryOutcome::Sent;
            }
            Ok(Err(e)) => e.to_string(),
            Err(_) => format!("provider call timed out after {}ms", self.timeout.as_millis()),
        };

        self.metrics.record_failed();
        tracing::error!(
            event = "notification_lost",
            kind = %message.kind,
            subject = %email.subject,
            error = %detail,
            details = %message.details,
            "Failed to deliver notification email - non-fatal"
        );
        DeliveryOutcome::ProviderError(detail)
    }
}

fn log_dry_run(record: &DryRunRecord) {
    match record.reason {
        DryRunReason::ProviderUnconfigured => tracing::info!(
            kind = %record.kind,
            subject = %record.subject,
            recipients = ?record.recipients,
            details = %record.details,
            "Email provider not configured, logging notification instead of sending"
        ),
        DryRunReason::NoRecipient => tracing::warn!(
            kind = %record.kind,
            subject = %record.subject,
            details = %record.details,
            "No recipient resolvable for notification, skipping delivery"
        ),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::transport::RecordingTransport;

    fn message(recipients: &[&str]) -> RenderedMessage {
        RenderedMessage {
            kind: NotificationKind::OpsFailure,
            subject: "URGENT: payment_failed".to_string(),
            html: "<p>payment_failed</p>".to_string(),
            recipients: recipients.iter().map(|r| r.to_string()).collect(),
            details: json!({"topic": "payment_failed", "context": {"orderId": "X1"}}),
        }
    }

    fn dispatcher(transport: Option<Arc<RecordingTransport>>, timeout: Duration) -> Dispatcher {
        Dispatcher::new(
            transport.map(|t| t as Arc<dyn EmailTransport>),
            "Shop <n@shop.test>".to_string(),
            timeout,
            Arc::new(DeliveryMetrics::default()),
        )
    }

    #[tokio::test]
    async fn test_unconfigured_provider_is_dry_run() {
        let d = dispatcher(None, Duration::from_secs(1));
        let msg = message(&["ops@shop.test"]);

        match d.plan(&msg) {
            DeliveryPlan::DryRun(record) => {
                assert_eq!(record.reason, DryRunReason::ProviderUnconfigured);
                assert!(serde_json::to_string(&record).unwrap().contains("payment_failed"));
            }
            other => panic!("expected dry-run, got {:?}", other),
        }

        assert_eq!(d.dispatch(&msg).await, DeliveryOutcome::DryRun);
        assert_eq!(d.metrics().snapshot().dry_run, 1);
    }

    #[tokio::test]
    async fn test_missing_recipient_skips_provider() {
        let transport = Arc::new(RecordingTransport::new());
        let d = dispatcher(Some(transport.clone()), Duration::from_secs(1));

        let outcome = d.dispatch(&message(&[])).await;
        assert_eq!(outcome, DeliveryOutcome::DryRun);
        assert_eq!(transport.call_count(), 0);
    }

    #[tokio::test]
    async fn test_configured_provider_sends_once() {
        let transport = Arc::new(RecordingTransport::new());
        let d = dispatcher(Some(transport.clone()), Duration::from_secs(1));

        let outcome = d.dispatch(&message(&["ops@shop.test"])).await;
        assert_eq!(outcome, DeliveryOutcome::Sent);

        let sent = transport.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].from, "Shop <n@shop.test>");
        assert_eq!(sent[0].to, vec!["ops@shop.test".to_string()]);
        assert_eq!(sent[0].subject, "URGENT: payment_failed");
        assert_eq!(d.metrics().snapshot().sent, 1);
    }

    #[tokio::test]
    async fn test_provider_error_is_swallowed_and_counted() {
        let transport = Arc::new(RecordingTransport::failing(500));
        let d = dispatcher(Some(transport.clone()), Duration::from_secs(1));

        let outcome = d.dispatch(&message(&["ops@shop.test"])).await;
        match outcome {
            DeliveryOutcome::ProviderError(detail) => assert!(detail.contains("500")),
            other => panic!("expected provider error, got {:?}", other),
        }
        assert_eq!(transport.call_count(), 1);
        assert_eq!(d.metrics().snapshot().failed, 1);
    }

    #[tokio::test]
    async fn test_slow_provider_times_out() {
        let transport = Arc::new(RecordingTransport::stalled(Duration::from_secs(5)));
        let d = dispatcher(Some(transport.clone()), Duration::from_millis(50));

        let outcome = d.dispatch(&message(&["ops@shop.test"])).await;
        match outcome {
            DeliveryOutcome::ProviderError(detail) => assert!(detail.contains("timed out")),
            other => panic!("expected timeout, got {:?}", other),
        }
        assert_eq!(transport.call_count(), 1);
    }
}
