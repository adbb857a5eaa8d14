//! Coffee shop HTTP API module.
//!
//! # Purpose
//! Exposes route handler modules and the shared authorization helper every
//! guarded handler calls first.
pub mod drinks;
pub mod error;
pub mod openapi;
pub mod system;
pub mod types;

use crate::api::error::{ApiError, api_auth};
use crate::app::AppState;
use axum::http::HeaderMap;
use coffee_authz::ClaimSet;

pub(crate) async fn authorize(
    state: &AppState,
    headers: &HeaderMap,
    required_permission: &str,
) -> Result<ClaimSet, ApiError> {
    state
        .auth
        .authorize(headers, required_permission)
        .await
        .map_err(|err| api_auth(&err))
}
