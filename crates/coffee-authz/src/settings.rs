//! Verifier and key set cache settings.
use jsonwebtoken::Algorithm;
use std::time::Duration;

/// Largest clock skew the verifier will apply to `exp`.
pub const MAX_LEEWAY_SECONDS: u64 = 300;

/// Claims and algorithm policy enforced by the token verifier.
#[derive(Debug, Clone)]
pub struct AuthSettings {
    /// Exact `iss` value expected in every token, e.g. `https://tenant.auth0.com/`.
    pub issuer: String,
    /// Value that must appear in the token's `aud` claim.
    pub audience: String,
    pub algorithms: Vec<Algorithm>,
    /// Clock skew tolerated on `exp`. Zero means the token is rejected at its
    /// expiry second. Values above [`MAX_LEEWAY_SECONDS`] are clamped.
    pub leeway_seconds: u64,
}

impl AuthSettings {
    /// Settings for an identity provider tenant reachable at `domain`, accepting
    /// RS256 only.
    pub fn for_domain(domain: &str, audience: impl Into<String>) -> Self {
        Self {
            issuer: issuer_for_domain(domain),
            audience: audience.into(),
            algorithms: vec![Algorithm::RS256],
            leeway_seconds: 0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct KeySetCacheSettings {
    pub jwks_url: String,
    /// Maximum age of a fetched key set. `None` keeps it for the life of the
    /// process and only refetches on a `kid` miss.
    pub ttl: Option<Duration>,
    /// Minimum spacing between miss-driven refetches.
    pub min_refresh_interval: Duration,
    pub fetch_timeout: Duration,
}

impl KeySetCacheSettings {
    pub fn for_domain(domain: &str) -> Self {
        Self {
            jwks_url: jwks_url_for_domain(domain),
            ttl: Some(Duration::from_secs(3600)),
            min_refresh_interval: Duration::ZERO,
            fetch_timeout: Duration::from_secs(5),
        }
    }
}

pub fn issuer_for_domain(domain: &str) -> String {
    format!("https://{}/", domain.trim_end_matches('/'))
}

pub fn jwks_url_for_domain(domain: &str) -> String {
    format!(
        "https://{}/.well-known/jwks.json",
        domain.trim_end_matches('/')
    )
}

/// Parse a configured algorithm name. Only RSA families are accepted because
/// published keys are `{n, e}` RSA keys.
pub fn parse_rsa_algorithm(name: &str) -> Option<Algorithm> {
    match name.trim().to_ascii_uppercase().as_str() {
        "RS256" => Some(Algorithm::RS256),
        "RS384" => Some(Algorithm::RS384),
        "RS512" => Some(Algorithm::RS512),
        "PS256" => Some(Algorithm::PS256),
        "PS384" => Some(Algorithm::PS384),
        "PS512" => Some(Algorithm::PS512),
        _ => None,
    }
}
