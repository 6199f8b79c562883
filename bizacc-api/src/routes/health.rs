/// Health check endpoint
///
/// # Endpoint
///
/// ```text
/// GET /health
/// ```
///
/// # Response
///
/// ```json
/// {
///   "status": "healthy",
///   "version": "0.1.0",
///   "store": "memory",
///   "store_status": "connected"
/// }
/// ```

use crate::app::AppState;
use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Health check response
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    /// `healthy` or `degraded`
    pub status: String,

    pub version: String,

    /// Record store backend name
    pub store: String,

    /// `connected` or `disconnected`
    pub store_status: String,
}

/// Reports service health; `503` when the record store is unreachable
pub async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let healthy = match state.store.health().await {
        Ok(()) => true,
        Err(e) => {
            warn!(error = %e, "Record store health check failed");
            false
        }
    };

    let status = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(HealthResponse {
            status: if healthy { "healthy" } else { "degraded" }.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            store: state.store.backend_name().to_string(),
            store_status: if healthy { "connected" } else { "disconnected" }.to_string(),
        }),
    )
}
