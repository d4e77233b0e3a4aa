//! Shared-secret gate for internal webhook callers.
//!
//! Provides the `authorize` predicate plus an `InternalCaller` Axum extractor
//! that applies it to every notification route.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::{HeaderMap, Method};
use subtle::ConstantTimeEq;

use herald_common::error::AppError;

use crate::state::AppState;

/// Header carrying the shared secret.
pub const INTERNAL_AUTH_HEADER: &str = "x-internal-auth";

/// Check method and shared secret for an inbound notification request.
///
/// The method is checked first, so a non-POST request is rejected with 405
/// whatever its headers. A missing or empty configured secret rejects
/// every request.
pub fn authorize(method: &Method, headers: &HeaderMap, secret: Option<&str>) -> Result<(), AppError> {
    if method != Method::POST {
        return Err(AppError::MethodNotAllowed(method.to_string()));
    }

    let Some(secret) = secret.filter(|s| !s.is_empty()) else {
        return Err(AppError::Unauthorized(
            "Internal authentication is not configured".to_string(),
        ));
    };

    let provided = headers
        .get(INTERNAL_AUTH_HEADER)
        .map(|v| v.as_bytes())
        .unwrap_or_default();

    // Length mismatch compares unequal without inspecting the bytes.
    if provided.ct_eq(secret.as_bytes()).into() {
        Ok(())
    } else {
        Err(AppError::Unauthorized(format!(
            "Missing or invalid {} header",
            INTERNAL_AUTH_HEADER
        )))
    }
}

/// A caller that passed the shared-secret gate.
///
/// Use as an Axum extractor ahead of the body extractor:
/// ```ignore
/// async fn handler(_caller: InternalCaller, body: Bytes) -> impl IntoResponse {
///     // only reached for authorized POSTs
/// }
/// ```
#[derive(Debug, Clone, Copy)]
pub struct InternalCaller;

impl FromRequestParts<AppState> for InternalCaller {
    type Rejection = AppError;

    fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> impl std::future::Future<Output = Result<Self, Self::Rejection>> + Send {
        let result = authorize(
            &parts.method,
            &parts.headers,
            state.config.internal_auth_secret.as_deref(),
        );

        async move {
            if let Err(e) = &result {
                tracing::warn!(error = %e, "Rejected notification request");
            }
            result.map(|()| InternalCaller)
        }
    }
}
