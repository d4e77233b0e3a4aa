//! The per-invocation pipeline: normalize → render → dispatch.

use std::sync::Arc;
use std::time::Duration;

use herald_common::config::AppConfig;

use crate::dispatch::{DeliveryOutcome, Dispatcher};
use crate::metrics::DeliveryMetrics;
use crate::render::Renderer;
use crate::request::{NotificationKind, NotificationRequest};
use crate::transport::{EmailTransport, ResendTransport};

/// Composes the notification pipeline. Holds no per-request state.
pub struct NotificationService {
    renderer: Renderer,
    dispatcher: Dispatcher,
}

impl NotificationService {
    pub fn new(renderer: Renderer, dispatcher: Dispatcher) -> Self {
        Self {
            renderer,
            dispatcher,
        }
    }

    /// Wire the pipeline from configuration.
    ///
    /// Without `RESEND_API_KEY` no transport is built and every delivery is a dry-run.
    pub fn from_config(config: &AppConfig) -> anyhow::Result<Self> {
        let timeout = Duration::from_secs(config.email_timeout_secs);

        let transport: Option<Arc<dyn EmailTransport>> = match &config.resend_api_key {
            Some(api_key) => {
                let transport = ResendTransport::new(&config.email_api_url, api_key.clone(), timeout)?;
                tracing::info!(endpoint = %transport.endpoint(), "Email delivery enabled");
                Some(Arc::new(transport))
            }
            None => {
                tracing::warn!("RESEND_API_KEY not set, notifications will be logged as dry-runs");
                None
            }
        };

        if config.ops_email.is_none() {
            tracing::warn!("OPS_EMAIL not set, ops notifications have no recipient");
        }

        Self::with_transport(config, transport)
    }

    /// Wire the pipeline from configuration around an explicit transport.
    pub fn with_transport(
        config: &AppConfig,
        transport: Option<Arc<dyn EmailTransport>>,
    ) -> anyhow::Result<Self> {
        let renderer = Renderer::new(config.ops_email.clone())?;
        let dispatcher = Dispatcher::new(
            transport,
            config.email_from.clone(),
            Duration::from_secs(config.email_timeout_secs),
            Arc::new(DeliveryMetrics::default()),
        );
        Ok(Self::new(renderer, dispatcher))
    }

    /// Run one notification through the pipeline. Never fails.
    pub async fn process(&self, kind: NotificationKind, body: &str) -> DeliveryOutcome {
        let request = NotificationRequest::normalize(kind, body);
        let message = self.renderer.render(&request);
        self.dispatcher.dispatch(&message).await
    }

    pub fn metrics(&self) -> &DeliveryMetrics {
        self.dispatcher.metrics()
    }
}
