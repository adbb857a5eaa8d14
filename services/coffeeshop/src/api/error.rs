//! API error type and helpers.
//!
//! # Purpose and responsibility
//! Builds the uniform `{"success": false, "error", "message"}` body for every
//! failing request and translates auth and store failures into it.
//!
//! # Key invariants and assumptions
//! - `body.error` always equals the HTTP status.
//! - Only auth failures carry a `code`; it is the stable reason code.
//!
//! # Security considerations
//! - Store failures are logged server-side and answered with a generic message.
//! - Auth messages come from [`AuthError::human_message`] and never echo the
//!   token.
use crate::api::types::ErrorResponse;
use crate::store::StoreError;
use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use coffee_authz::AuthError;

/// Structured API error returned by handlers.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub body: ErrorResponse,
}

impl ApiError {
    fn new(status: StatusCode, message: &str) -> Self {
        Self {
            status,
            body: ErrorResponse {
                success: false,
                error: status.as_u16(),
                message: message.to_string(),
                code: None,
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        (self.status, Json(self.body)).into_response()
    }
}

pub fn api_bad_request(message: &str) -> ApiError {
    ApiError::new(StatusCode::BAD_REQUEST, message)
}

pub fn api_not_found(message: &str) -> ApiError {
    ApiError::new(StatusCode::NOT_FOUND, message)
}

/// 422 for well-formed requests the store refuses, e.g. a duplicate title.
pub fn api_unprocessable(message: &str) -> ApiError {
    ApiError::new(StatusCode::UNPROCESSABLE_ENTITY, message)
}

/// Build a 500 from a store error, logging the detail.
pub fn api_internal(message: &str, err: &StoreError) -> ApiError {
    tracing::error!(error = ?err, "drink storage error");
    ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, message)
}

/// Translate a rejected authorization into its status and reason code.
pub fn api_auth(err: &AuthError) -> ApiError {
    let mut api = ApiError::new(err.http_status(), &err.human_message());
    api.body.code = Some(err.reason_code().to_string());
    api
}

/// 400 for a body that is not JSON or does not match the expected shape.
pub fn api_invalid_body(rejection: &JsonRejection) -> ApiError {
    tracing::debug!(error = %rejection.body_text(), "rejected request body");
    api_bad_request("request body is not valid JSON for this endpoint")
}
