//! The composed entry point called before every protected operation.
//!
//! # Purpose
//! Runs `extract header -> verify token -> check permission` for one request
//! and hands the verified claims back to the caller, or the first failure.
//!
//! # Key invariants
//! - Stages run in order and a failure ends the pipeline; the verifier is never
//!   called without a well-formed bearer header, and the permission check never
//!   sees claims that did not verify.
//! - The gate holds no per-request state; the only shared state it reaches is
//!   the key set cache behind the verifier.
//!
//! # How to use
//! ```rust,no_run
//! use coffee_authz::{AuthGate, permission};
//!
//! # async fn handler(gate: AuthGate, headers: http::HeaderMap) {
//! match gate.authorize(&headers, permission::PATCH_DRINKS).await {
//!     Ok(claims) => { let _ = claims.subject; }
//!     Err(err) => { let _ = (err.http_status(), err.human_message()); }
//! }
//! # }
//! ```
use crate::errors::{AuthError, AuthResult};
use crate::key_cache::KeySetCache;
use crate::permission;
use crate::settings::{AuthSettings, KeySetCacheSettings};
use crate::token::{ClaimSet, TokenVerifier, VerifyToken};
use http::HeaderMap;
use http::header::AUTHORIZATION;
use std::sync::Arc;

#[derive(Clone)]
pub struct AuthGate {
    verifier: Arc<dyn VerifyToken>,
}

impl AuthGate {
    pub fn new(verifier: Arc<dyn VerifyToken>) -> Self {
        Self { verifier }
    }

    /// Gate backed by the provider's HTTPS key set endpoint.
    pub fn from_settings(
        auth: AuthSettings,
        cache: &KeySetCacheSettings,
    ) -> Result<Self, reqwest::Error> {
        let keys = Arc::new(KeySetCache::from_settings(cache)?);
        Ok(Self::new(Arc::new(TokenVerifier::new(keys, auth))))
    }

    /// Authorize a request that needs `required_permission`.
    ///
    /// # Errors
    /// Any [`AuthError`]; header failures come from [`extract_bearer`], the
    /// rest are propagated unchanged from the verifier and permission check.
    pub async fn authorize(
        &self,
        headers: &HeaderMap,
        required_permission: &str,
    ) -> AuthResult<ClaimSet> {
        let result = self.run(headers, required_permission).await;
        record_decision(required_permission, &result);
        result
    }

    async fn run(&self, headers: &HeaderMap, required_permission: &str) -> AuthResult<ClaimSet> {
        let token = extract_bearer(headers)?;
        let claims = self.verifier.verify(token).await?;
        permission::check(required_permission, &claims)?;
        Ok(claims)
    }
}

/// Pull the token out of `Authorization: Bearer <token>`.
///
/// The scheme is matched case-insensitively; the value must be exactly two
/// whitespace-separated parts.
pub fn extract_bearer(headers: &HeaderMap) -> AuthResult<&str> {
    let value = headers
        .get(AUTHORIZATION)
        .ok_or(AuthError::MissingHeader)?;
    let value = value
        .to_str()
        .map_err(|_| AuthError::MalformedHeader("authorization header is not valid text"))?;
    let parts: Vec<&str> = value.split_whitespace().collect();
    match parts.as_slice() {
        [] => Err(AuthError::MalformedHeader("authorization header is empty")),
        [scheme, ..] if !scheme.eq_ignore_ascii_case("bearer") => Err(AuthError::MalformedHeader(
            "authorization header must start with \"Bearer\"",
        )),
        [_] => Err(AuthError::MalformedHeader(
            "invalid header, must contain a token",
        )),
        [_, token] => Ok(token),
        _ => Err(AuthError::MalformedHeader(
            "invalid header, must contain bearer and token only",
        )),
    }
}

fn stage(err: &AuthError) -> &'static str {
    match err {
        AuthError::MissingHeader | AuthError::MalformedHeader(_) => "extract",
        AuthError::PermissionsClaimMissing | AuthError::PermissionDenied { .. } => "permission",
        _ => "verify",
    }
}

fn record_decision(required_permission: &str, result: &AuthResult<ClaimSet>) {
    match result {
        Ok(claims) => {
            metrics::counter!(
                "coffee_auth_decisions_total",
                "outcome" => "granted",
                "reason" => "ok"
            )
            .increment(1);
            tracing::debug!(
                permission = required_permission,
                subject = claims.subject.as_deref().unwrap_or("-"),
                "request authorized"
            );
        }
        Err(err) => {
            metrics::counter!(
                "coffee_auth_decisions_total",
                "outcome" => "rejected",
                "reason" => err.reason_code()
            )
            .increment(1);
            tracing::info!(
                permission = required_permission,
                stage = stage(err),
                reason = err.reason_code(),
                status = err.http_status().as_u16(),
                "request rejected"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{
        TEST_AUDIENCE, TEST_ISSUER, TEST_KID, mint_token, provider_claims, test_jwks,
        token_with_unsigned_header,
    };
    use async_trait::async_trait;
    use http::HeaderValue;
    use jsonwebtoken::Algorithm;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct RecordingVerifier {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl VerifyToken for RecordingVerifier {
        async fn verify(&self, _raw_token: &str) -> AuthResult<ClaimSet> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(AuthError::InvalidSignature)
        }
    }

    fn headers_with(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_str(value).expect("header"));
        headers
    }

    fn gate() -> AuthGate {
        let keys = Arc::new(KeySetCache::preloaded(test_jwks(&[TEST_KID])));
        let verifier = TokenVerifier::new(
            keys,
            AuthSettings {
                issuer: TEST_ISSUER.to_string(),
                audience: TEST_AUDIENCE.to_string(),
                algorithms: vec![Algorithm::RS256],
                leeway_seconds: 0,
            },
        );
        AuthGate::new(Arc::new(verifier))
    }

    #[tokio::test]
    async fn missing_header_never_reaches_verifier() {
        let verifier = Arc::new(RecordingVerifier::default());
        let gate = AuthGate::new(verifier.clone());
        let err = gate
            .authorize(&HeaderMap::new(), permission::POST_DRINKS)
            .await
            .unwrap_err();
        assert_eq!(err, AuthError::MissingHeader);
        assert_eq!(err.http_status().as_u16(), 401);
        assert_eq!(verifier.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn malformed_headers_never_reach_verifier() {
        let verifier = Arc::new(RecordingVerifier::default());
        let gate = AuthGate::new(verifier.clone());
        for value in ["", "Basic abc", "Bearer", "Bearer a b", "Token abc"] {
            let err = gate
                .authorize(&headers_with(value), permission::POST_DRINKS)
                .await
                .unwrap_err();
            assert!(matches!(err, AuthError::MalformedHeader(_)), "{value}: {err:?}");
            assert_eq!(err.http_status().as_u16(), 400);
        }
        assert_eq!(verifier.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn verifier_failure_is_propagated_verbatim() {
        let verifier = Arc::new(RecordingVerifier::default());
        let gate = AuthGate::new(verifier.clone());
        let err = gate
            .authorize(&headers_with("Bearer abc.def.ghi"), permission::POST_DRINKS)
            .await
            .unwrap_err();
        assert_eq!(err, AuthError::InvalidSignature);
        assert_eq!(verifier.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn bearer_scheme_is_case_insensitive() {
        assert_eq!(extract_bearer(&headers_with("bearer tok")), Ok("tok"));
        assert_eq!(extract_bearer(&headers_with("BEARER tok")), Ok("tok"));
        assert_eq!(extract_bearer(&headers_with("  Bearer   tok  ")), Ok("tok"));
    }

    #[test]
    fn non_text_header_is_malformed() {
        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_bytes(b"Bearer \xFF").expect("header"),
        );
        assert!(matches!(
            extract_bearer(&headers),
            Err(AuthError::MalformedHeader(_))
        ));
    }

    #[tokio::test]
    async fn scenario_unknown_kid_is_key_not_found() {
        let token = token_with_unsigned_header(&json!({"alg": "RS256", "kid": "X"}));
        let err = gate()
            .authorize(&headers_with(&format!("Bearer {token}")), permission::GET_DRINKS_DETAIL)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::KeyNotFound { .. }));
        assert_eq!(err.http_status().as_u16(), 401);
    }

    #[tokio::test]
    async fn scenario_basic_scheme_is_malformed_header() {
        let err = gate()
            .authorize(&headers_with("Basic abc"), permission::GET_DRINKS_DETAIL)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::MalformedHeader(_)));
        assert_eq!(err.http_status().as_u16(), 400);
    }

    #[tokio::test]
    async fn scenario_issuer_mismatch_is_invalid_claims() {
        let mut claims = provider_claims(&[permission::GET_DRINKS_DETAIL], 300);
        claims["iss"] = json!("https://other-tenant.auth0.com/");
        let token = mint_token(TEST_KID, &claims);
        let err = gate()
            .authorize(&headers_with(&format!("Bearer {token}")), permission::GET_DRINKS_DETAIL)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::InvalidClaims(_)));
        assert_eq!(err.http_status().as_u16(), 401);
    }

    #[tokio::test]
    async fn scenario_insufficient_permission_is_denied() {
        let token = mint_token(TEST_KID, &provider_claims(&["get:drinks"], 300));
        let err = gate()
            .authorize(&headers_with(&format!("Bearer {token}")), permission::DELETE_DRINKS)
            .await
            .unwrap_err();
        assert_eq!(
            err,
            AuthError::PermissionDenied {
                required: permission::DELETE_DRINKS.to_string()
            }
        );
        assert_eq!(err.http_status().as_u16(), 401);
    }

    #[tokio::test]
    async fn valid_token_without_permissions_claim_is_reported_as_missing() {
        let mut claims = provider_claims(&[], 300);
        claims.as_object_mut().expect("object").remove("permissions");
        let token = mint_token(TEST_KID, &claims);
        let err = gate()
            .authorize(&headers_with(&format!("Bearer {token}")), permission::POST_DRINKS)
            .await
            .unwrap_err();
        assert_eq!(err, AuthError::PermissionsClaimMissing);
    }

    #[tokio::test]
    async fn repeated_authorization_is_idempotent() {
        let gate = gate();
        let token = mint_token(TEST_KID, &provider_claims(&[permission::PATCH_DRINKS], 300));
        let headers = headers_with(&format!("Bearer {token}"));
        let first = gate
            .authorize(&headers, permission::PATCH_DRINKS)
            .await
            .expect("first");
        let second = gate
            .authorize(&headers, permission::PATCH_DRINKS)
            .await
            .expect("second");
        assert_eq!(first, second);
    }
}
