//! Bearer token authorization for the coffee shop API.
//!
//! # Purpose
//! Decides whether an HTTP request carries a valid access token issued by the
//! configured OIDC provider and whether that token grants the permission an
//! operation requires.
//!
//! # How it fits
//! The service builds one [`AuthGate`] at startup and calls
//! [`AuthGate::authorize`] at the top of every protected handler. The gate
//! composes header extraction, [`TokenVerifier`] and [`permission::check`];
//! the verifier resolves signing keys through a shared [`KeySetCache`] that
//! fetches the provider's JWKS lazily.
//!
//! # Key invariants
//! - Only RSA algorithms from the configured allow-list are accepted.
//! - No claim is trusted before the signature verifies; the unverified
//!   payload can only cause an early expiry rejection.
//! - Every failure maps to exactly one [`AuthError`] with a stable reason code
//!   and HTTP status.
//!
//! # Important configuration
//! - [`AuthSettings`]: issuer, audience, algorithm allow-list, clock skew.
//! - [`KeySetCacheSettings`]: JWKS URL, TTL, refetch throttle, fetch timeout.
//!
//! # Common pitfalls
//! - The issuer must keep its trailing slash; providers compare it verbatim.
//! - A zero refetch interval lets unknown-`kid` traffic trigger one JWKS fetch
//!   per burst; raise it for internet-facing deployments.

mod errors;
mod gate;
mod jwks;
mod key_cache;
pub mod permission;
mod settings;
mod token;

#[cfg(any(test, feature = "testutil"))]
pub mod testutil;

pub use errors::{AuthError, AuthFailure, AuthResult};
pub use gate::{AuthGate, extract_bearer};
pub use jwks::{Jwk, Jwks, KeySet, SigningKey};
pub use key_cache::{HttpKeySetSource, KeySetCache, KeySetSource, StaticKeySetSource};
pub use settings::{
    AuthSettings, KeySetCacheSettings, MAX_LEEWAY_SECONDS, issuer_for_domain, jwks_url_for_domain,
    parse_rsa_algorithm,
};
pub use token::{Audience, ClaimSet, TokenVerifier, VerifyToken};
