//! Auth failure taxonomy.
//!
//! # Purpose
//! Every way a protected request can be rejected by the auth core, with a
//! stable reason code and the HTTP status the boundary must surface.
//!
//! # Key invariants
//! - Every variant is terminal for the current request; nothing here is
//!   retried by the auth core.
//! - Display strings are safe to return to clients: they never contain token
//!   material or upstream transport details.
use http::StatusCode;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("authorization header is expected")]
    MissingHeader,
    #[error("{0}")]
    MalformedHeader(&'static str),
    #[error("unable to parse authentication token: {0}")]
    MalformedToken(String),
    #[error("unable to find the appropriate key")]
    KeyNotFound { kid: String },
    #[error("identity provider key set is unavailable")]
    KeySetUnavailable { detail: String },
    #[error("token signature is invalid")]
    InvalidSignature,
    #[error("token expired")]
    ExpiredToken,
    #[error("incorrect claims, please check the audience and issuer: {0}")]
    InvalidClaims(String),
    #[error("permissions not included in the token")]
    PermissionsClaimMissing,
    #[error("not permitted to use this feature")]
    PermissionDenied { required: String },
}

pub type AuthResult<T> = Result<T, AuthError>;

/// Serializable view of an [`AuthError`] for callers that persist or forward
/// auth decisions (audit logs, structured responses).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthFailure {
    pub reason_code: &'static str,
    pub human_message: String,
    pub http_status: u16,
}

impl AuthError {
    /// Stable, machine-readable identifier for the failure class.
    pub fn reason_code(&self) -> &'static str {
        match self {
            AuthError::MissingHeader => "missing_header",
            AuthError::MalformedHeader(_) => "malformed_header",
            AuthError::MalformedToken(_) => "malformed_token",
            AuthError::KeyNotFound { .. } => "key_not_found",
            AuthError::KeySetUnavailable { .. } => "key_set_unavailable",
            AuthError::InvalidSignature => "invalid_signature",
            AuthError::ExpiredToken => "token_expired",
            AuthError::InvalidClaims(_) => "invalid_claims",
            AuthError::PermissionsClaimMissing => "permissions_missing",
            AuthError::PermissionDenied { .. } => "permission_denied",
        }
    }

    /// Status the HTTP boundary must answer with.
    ///
    /// Malformed client input is `400`. A provider outage is `503` so clients
    /// and operators can tell it apart from a rejected credential. Everything
    /// else is `401`.
    pub fn http_status(&self) -> StatusCode {
        match self {
            AuthError::MalformedHeader(_) | AuthError::MalformedToken(_) => {
                StatusCode::BAD_REQUEST
            }
            AuthError::KeySetUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::UNAUTHORIZED,
        }
    }

    pub fn human_message(&self) -> String {
        self.to_string()
    }

    pub fn failure(&self) -> AuthFailure {
        AuthFailure {
            reason_code: self.reason_code(),
            human_message: self.human_message(),
            http_status: self.http_status().as_u16(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping_matches_taxonomy() {
        let cases = vec![
            (AuthError::MissingHeader, 401),
            (AuthError::MalformedHeader("bad"), 400),
            (AuthError::MalformedToken("bad".to_string()), 400),
            (
                AuthError::KeyNotFound {
                    kid: "X".to_string(),
                },
                401,
            ),
            (
                AuthError::KeySetUnavailable {
                    detail: "connect refused".to_string(),
                },
                503,
            ),
            (AuthError::InvalidSignature, 401),
            (AuthError::ExpiredToken, 401),
            (AuthError::InvalidClaims("iss".to_string()), 401),
            (AuthError::PermissionsClaimMissing, 401),
            (
                AuthError::PermissionDenied {
                    required: "delete:drinks".to_string(),
                },
                401,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(err.http_status().as_u16(), status, "{err:?}");
            assert!(!err.reason_code().is_empty());
        }
    }

    #[test]
    fn key_set_unavailable_hides_transport_detail() {
        let err = AuthError::KeySetUnavailable {
            detail: "error sending request for url (https://10.0.0.7/jwks)".to_string(),
        };
        assert!(!err.human_message().contains("10.0.0.7"));
    }

    #[test]
    fn failure_record_carries_code_message_and_status() {
        let failure = AuthError::PermissionDenied {
            required: "delete:drinks".to_string(),
        }
        .failure();
        assert_eq!(failure.reason_code, "permission_denied");
        assert_eq!(failure.http_status, 401);
        assert_eq!(failure.human_message, "not permitted to use this feature");
    }
}
