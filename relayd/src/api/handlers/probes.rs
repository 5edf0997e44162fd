//! Liveness and readiness probes.

use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;

use crate::AppState;
use crate::secrets::SecretError;

/// GET /health/live - the process is up and serving
pub async fn live() -> StatusCode {
    StatusCode::OK
}

/// GET /health/ready - the credential record must be reachable in the secret
/// store. A missing record still counts as reachable; only store transport
/// failures fail readiness.
pub async fn ready(State(state): State<AppState>) -> Response {
    match state.store.load(&state.config.secret_name).await {
        Ok(_) | Err(SecretError::NotFound { .. }) => StatusCode::OK.into_response(),
        Err(e) => {
            tracing::warn!(error = %e, "Readiness check failed: secret store unreachable");
            (StatusCode::SERVICE_UNAVAILABLE, Json(json!({ "error": e.to_string() }))).into_response()
        }
    }
}
