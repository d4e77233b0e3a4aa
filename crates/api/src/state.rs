//! Shared application state for the Axum API server.

use std::sync::Arc;

use herald_common::config::AppConfig;
use herald_notifier::NotificationService;

/// Application state shared across all route handlers via Axum `State`.
#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub notifier: Arc<NotificationService>,
}

impl AppState {
    pub fn new(config: AppConfig, notifier: NotificationService) -> Self {
        Self {
            config,
            notifier: Arc::new(notifier),
        }
    }
}
