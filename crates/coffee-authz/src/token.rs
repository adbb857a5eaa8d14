//! Bearer token verification against the provider's published keys.
//!
//! # Purpose
//! Turns a raw bearer token into a [`ClaimSet`] only after its signature,
//! issuer, audience, and expiry have all been checked.
//!
//! # Security model
//! - The header is parsed before verification because the `kid` selects the
//!   key. Nothing else read before the signature check can grant access: the
//!   unverified payload is consulted only to reject an already-expired token
//!   early.
//! - The algorithm is pinned to the configured RSA allow-list; the header's
//!   `alg` is never trusted to pick a verification scheme outside it.
//! - Error messages describe the failure class and never echo token content.
use crate::errors::{AuthError, AuthResult};
use crate::key_cache::KeySetCache;
use crate::settings::{AuthSettings, MAX_LEEWAY_SECONDS};
use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Header, Validation, decode, decode_header};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use std::sync::Arc;

/// `aud` may be a single string or a list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Audience {
    One(String),
    Many(Vec<String>),
}

impl Audience {
    pub fn contains(&self, audience: &str) -> bool {
        match self {
            Audience::One(value) => value == audience,
            Audience::Many(values) => values.iter().any(|value| value == audience),
        }
    }
}

/// Verified token payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClaimSet {
    #[serde(rename = "iss")]
    pub issuer: String,
    #[serde(rename = "aud")]
    pub audience: Audience,
    #[serde(rename = "exp")]
    pub expiry: i64,
    #[serde(rename = "sub", default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    #[serde(rename = "iat", default, skip_serializing_if = "Option::is_none")]
    pub issued_at: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permissions: Option<BTreeSet<String>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Seam between the auth gate and token verification.
#[async_trait]
pub trait VerifyToken: Send + Sync {
    async fn verify(&self, raw_token: &str) -> AuthResult<ClaimSet>;
}

pub struct TokenVerifier {
    keys: Arc<KeySetCache>,
    settings: AuthSettings,
}

impl TokenVerifier {
    pub fn new(keys: Arc<KeySetCache>, mut settings: AuthSettings) -> Self {
        if settings.leeway_seconds > MAX_LEEWAY_SECONDS {
            tracing::warn!(
                requested = settings.leeway_seconds,
                max = MAX_LEEWAY_SECONDS,
                "token leeway clamped"
            );
            settings.leeway_seconds = MAX_LEEWAY_SECONDS;
        }
        Self { keys, settings }
    }

    /// Verify `raw_token` and return its claims.
    ///
    /// # Errors
    /// - `MalformedToken`: not a three-part token, undecodable header,
    ///   algorithm outside the allow-list, or no `kid`.
    /// - `KeyNotFound` / `KeySetUnavailable`: from the key set cache.
    /// - `ExpiredToken`: `exp` is not strictly in the future.
    /// - `InvalidSignature`: signature does not verify with the resolved key.
    /// - `InvalidClaims`: issuer/audience mismatch, required claim missing, or
    ///   a claim of the wrong shape.
    pub async fn verify(&self, raw_token: &str) -> AuthResult<ClaimSet> {
        // Step 1: structural parse of the header to select the key.
        let header = parse_header(raw_token)?;
        if !self.settings.algorithms.contains(&header.alg) {
            return Err(AuthError::MalformedToken(
                "unsupported signing algorithm".to_string(),
            ));
        }
        let kid = header
            .kid
            .as_deref()
            .ok_or_else(|| AuthError::MalformedToken("key id not found in token".to_string()))?;

        // Step 2: resolve the key, fetching the key set on a miss.
        let key = self.keys.get_key(kid).await?;

        // Step 3: an expired token is rejected whatever its signature or key says.
        reject_if_expired(raw_token, self.settings.leeway_seconds)?;
        if !key.supports(header.alg) {
            return Err(AuthError::InvalidSignature);
        }

        // Step 4: signature, issuer, audience, and expiry.
        let mut validation = Validation::new(header.alg);
        validation.algorithms = self.settings.algorithms.clone();
        validation.set_issuer(&[self.settings.issuer.as_str()]);
        validation.set_audience(&[self.settings.audience.as_str()]);
        validation.set_required_spec_claims(&["exp", "iss", "aud"]);
        validation.leeway = self.settings.leeway_seconds;

        let token = decode::<ClaimSet>(raw_token, key.decoding_key(), &validation)
            .map_err(map_jwt_error)?;
        Ok(token.claims)
    }
}

#[async_trait]
impl VerifyToken for TokenVerifier {
    async fn verify(&self, raw_token: &str) -> AuthResult<ClaimSet> {
        TokenVerifier::verify(self, raw_token).await
    }
}

fn parse_header(raw_token: &str) -> AuthResult<Header> {
    let segments: Vec<&str> = raw_token.split('.').collect();
    if segments.len() != 3 || segments.iter().any(|segment| segment.is_empty()) {
        return Err(AuthError::MalformedToken(
            "token must have three segments".to_string(),
        ));
    }
    decode_header(raw_token)
        .map_err(|_| AuthError::MalformedToken("token header is not decodable".to_string()))
}

fn reject_if_expired(raw_token: &str, leeway_seconds: u64) -> AuthResult<()> {
    // Denial-only: an undecodable payload falls through to full verification.
    let Some(exp) = unverified_expiry(raw_token) else {
        return Ok(());
    };
    let leeway = i64::try_from(leeway_seconds).unwrap_or(i64::MAX);
    if exp <= chrono::Utc::now().timestamp().saturating_sub(leeway) {
        return Err(AuthError::ExpiredToken);
    }
    Ok(())
}

fn unverified_expiry(raw_token: &str) -> Option<i64> {
    let payload = raw_token.split('.').nth(1)?;
    let bytes = URL_SAFE_NO_PAD.decode(payload).ok()?;
    let claims: Value = serde_json::from_slice(&bytes).ok()?;
    claims.get("exp")?.as_i64()
}

fn map_jwt_error(err: jsonwebtoken::errors::Error) -> AuthError {
    match err.kind() {
        ErrorKind::ExpiredSignature => AuthError::ExpiredToken,
        ErrorKind::InvalidIssuer => AuthError::InvalidClaims("issuer".to_string()),
        ErrorKind::InvalidAudience => AuthError::InvalidClaims("audience".to_string()),
        ErrorKind::MissingRequiredClaim(claim) => {
            AuthError::InvalidClaims(format!("missing {claim}"))
        }
        ErrorKind::ImmatureSignature => AuthError::InvalidClaims("not yet valid".to_string()),
        // Only reachable once the signature has verified.
        ErrorKind::Json(_) => AuthError::InvalidClaims("claim has unexpected shape".to_string()),
        ErrorKind::InvalidSignature | ErrorKind::InvalidRsaKey(_) | ErrorKind::RsaFailedSigning => {
            AuthError::InvalidSignature
        }
        ErrorKind::InvalidAlgorithm => {
            AuthError::MalformedToken("unsupported signing algorithm".to_string())
        }
        _ => AuthError::MalformedToken("unable to parse authentication token".to_string()),
    }
}
