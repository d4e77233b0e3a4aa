//! Notification webhook routes, one per notification kind.
//!
//! Every route accepts any method so the auth gate, not the router, decides
//! between 405 and 401. Once past the gate the response is always
//! `200 {"ok":true}`: delivery trouble is logged, never returned to the caller.
//!
//! Bodies are read only after the gate accepts the caller. A body that is too
//! large or fails to read is treated like a malformed payload.

use axum::body::{Body, Bytes};
use axum::extract::State;
use axum::routing::any;
use axum::{Json, Router};
use serde_json::{Value, json};
use tracing::Instrument;
use uuid::Uuid;

use herald_notifier::NotificationKind;

use crate::middleware::auth::InternalCaller;
use crate::state::AppState;

/// Webhook payloads are small JSON documents.
pub const MAX_BODY_BYTES: usize = 64 * 1024;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/notify/ops-failure", any(ops_failure))
        .route("/api/notify/fulfillment-issue", any(fulfillment_issue))
        .route("/api/notify/donation-thanks", any(donation_thanks))
}

/// POST /api/notify/ops-failure: Alert the ops inbox about a failed operation.
async fn ops_failure(
    State(state): State<AppState>,
    _caller: InternalCaller,
    body: Body,
) -> Json<Value> {
    notify(&state, NotificationKind::OpsFailure, body).await
}

/// POST /api/notify/fulfillment-issue: Flag a paid order that can't ship as-is.
async fn fulfillment_issue(
    State(state): State<AppState>,
    _caller: InternalCaller,
    body: Body,
) -> Json<Value> {
    notify(&state, NotificationKind::FulfillmentIssue, body).await
}

/// POST /api/notify/donation-thanks: Send a thank-you email to a donor.
async fn donation_thanks(
    State(state): State<AppState>,
    _caller: InternalCaller,
    body: Body,
) -> Json<Value> {
    notify(&state, NotificationKind::DonationThanks, body).await
}

async fn notify(state: &AppState, kind: NotificationKind, body: Body) -> Json<Value> {
    let span = tracing::info_span!("notification", invocation_id = %Uuid::new_v4(), kind = %kind);

    async {
        let bytes = read_body(body).await;
        let body = String::from_utf8_lossy(&bytes);
        let outcome = state.notifier.process(kind, &body).await;
        tracing::debug!(outcome = ?outcome, "Notification processed");
    }
    .instrument(span)
    .await;

    Json(json!({ "ok": true }))
}

async fn read_body(body: Body) -> Bytes {
    match axum::body::to_bytes(body, MAX_BODY_BYTES).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!(
                error = %e,
                limit = MAX_BODY_BYTES,
                "Unreadable notification body, using defaults"
            );
            Bytes::new()
        }
    }
}
