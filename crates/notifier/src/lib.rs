//! Notification pipeline for the storefront's operational and transactional email.
//!
//! Each invocation is independent: a raw body is normalized into a
//! [`request::NotificationRequest`], rendered into a [`render::RenderedMessage`]
//! and handed to the [`dispatch::Dispatcher`], which either sends it through an
//! [`transport::EmailTransport`] or logs a dry-run record.

pub mod dispatch;
pub mod metrics;
pub mod render;
pub mod request;
pub mod service;
pub mod transport;

pub use dispatch::DeliveryOutcome;
pub use request::NotificationKind;
pub use service::NotificationService;
