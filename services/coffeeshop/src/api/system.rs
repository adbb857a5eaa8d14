//! Health API handler.
//!
//! # Key invariants and assumptions
//! - Health checks are fast, unauthenticated, and side-effect free.
//! - The identity provider is not probed; key set trouble surfaces as `503`
//!   on guarded routes instead.
use crate::api::error::{ApiError, api_internal};
use crate::api::types::{ErrorResponse, HealthStatus};
use crate::app::AppState;
use axum::Json;
use axum::extract::State;

#[utoipa::path(
    get,
    path = "/health",
    tag = "system",
    responses(
        (status = 200, description = "Service health", body = HealthStatus),
        (status = 500, description = "Storage unavailable", body = ErrorResponse)
    )
)]
pub(crate) async fn health(State(state): State<AppState>) -> Result<Json<HealthStatus>, ApiError> {
    if let Err(err) = state.store.health_check().await {
        return Err(api_internal("storage unavailable", &err));
    }
    Ok(Json(HealthStatus {
        success: true,
        status: "ok".to_string(),
    }))
}
