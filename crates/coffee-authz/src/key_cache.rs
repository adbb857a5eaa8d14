//! Process-wide cache of the identity provider's signing keys.
//!
//! # Purpose
//! Resolves a token's `kid` to a verified-usable RSA key, fetching the
//! provider's published key set lazily and again whenever a `kid` is missing
//! or the cached set has outlived its TTL.
//!
//! # Concurrency model
//! - The cached key set is an immutable `Arc` snapshot held in an
//!   `ArcSwapOption`. A fetch builds a new snapshot and swaps it in whole, so
//!   lookups never block and see either the old set or the new one.
//! - Fetches are single-flight: tasks that miss queue on `refresh_gate`. A
//!   waiter that finds a snapshot newer than the one it missed on uses it, and
//!   a waiter whose queued time was covered by a failed fetch gets that
//!   failure. Either way it does not fetch again.
//! - Dropping a pending `get_key` future (request cancelled) aborts its fetch
//!   and releases the gate; the previous snapshot stays in place.
//!
//! # Failure classes
//! - Provider unreachable / non-2xx / undecodable body: `KeySetUnavailable`.
//! - Provider reachable but `kid` absent after a fresh fetch: `KeyNotFound`.
use crate::errors::{AuthError, AuthResult};
use crate::jwks::{Jwks, KeySet, SigningKey};
use crate::settings::KeySetCacheSettings;
use arc_swap::ArcSwapOption;
use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

/// Where a key set comes from.
#[async_trait]
pub trait KeySetSource: Send + Sync {
    async fn fetch(&self) -> AuthResult<Jwks>;
}

/// Fetches the key set from the provider's well-known endpoint.
#[derive(Debug, Clone)]
pub struct HttpKeySetSource {
    client: reqwest::Client,
    url: String,
}

impl HttpKeySetSource {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }

}

#[async_trait]
impl KeySetSource for HttpKeySetSource {
    async fn fetch(&self) -> AuthResult<Jwks> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(key_set_unavailable)?;
        response.json::<Jwks>().await.map_err(key_set_unavailable)
    }
}

fn key_set_unavailable(err: reqwest::Error) -> AuthError {
    AuthError::KeySetUnavailable {
        detail: err.to_string(),
    }
}

/// Serves a fixed key set. Used for tests and offline deployments.
#[derive(Debug, Clone)]
pub struct StaticKeySetSource {
    jwks: Jwks,
}

impl StaticKeySetSource {
    pub fn new(jwks: Jwks) -> Self {
        Self { jwks }
    }
}

#[async_trait]
impl KeySetSource for StaticKeySetSource {
    async fn fetch(&self) -> AuthResult<Jwks> {
        Ok(self.jwks.clone())
    }
}

#[derive(Debug)]
struct CachedKeySet {
    keys: KeySet,
    fetched_at: Instant,
    generation: u64,
}

/// Outcome of the latest fetch. Only touched while `refresh_gate` is held.
#[derive(Debug, Default)]
struct RefreshState {
    last_failure: Option<AuthError>,
}

pub struct KeySetCache {
    source: Arc<dyn KeySetSource>,
    current: ArcSwapOption<CachedKeySet>,
    refresh_gate: Mutex<RefreshState>,
    // Completed fetches, failed ones included.
    attempts: AtomicU64,
    ttl: Option<Duration>,
    min_refresh_interval: Duration,
}

impl KeySetCache {
    /// Empty cache that fetches on first use and never expires its snapshot.
    pub fn new(source: Arc<dyn KeySetSource>) -> Self {
        Self {
            source,
            current: ArcSwapOption::empty(),
            refresh_gate: Mutex::new(RefreshState::default()),
            attempts: AtomicU64::new(0),
            ttl: None,
            min_refresh_interval: Duration::ZERO,
        }
    }

    pub fn from_settings(settings: &KeySetCacheSettings) -> Result<Self, reqwest::Error> {
        let source = HttpKeySetSource::new(settings.jwks_url.clone(), settings.fetch_timeout)?;
        Ok(Self::new(Arc::new(source))
            .with_ttl(settings.ttl)
            .with_min_refresh_interval(settings.min_refresh_interval))
    }

    /// Cache seeded with `jwks`; misses are answered from the same fixed set.
    pub fn preloaded(jwks: Jwks) -> Self {
        let cached = CachedKeySet {
            keys: KeySet::from_jwks(&jwks),
            fetched_at: Instant::now(),
            generation: 1,
        };
        Self {
            current: ArcSwapOption::from_pointee(cached),
            ..Self::new(Arc::new(StaticKeySetSource::new(jwks)))
        }
    }

    pub fn with_ttl(mut self, ttl: Option<Duration>) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn with_min_refresh_interval(mut self, interval: Duration) -> Self {
        self.min_refresh_interval = interval;
        self
    }

    /// Resolve `kid` to a signing key, fetching the key set if needed.
    ///
    /// # Errors
    /// - `KeyNotFound` when `kid` is absent from a freshly fetched set.
    /// - `KeySetUnavailable` when the fetch itself fails.
    pub async fn get_key(&self, kid: &str) -> AuthResult<Arc<SigningKey>> {
        let seen_attempts = self.attempts.load(Ordering::Acquire);
        let seen = self.snapshot();
        if let Some(cached) = &seen
            && self.is_fresh(cached)
        {
            if let Some(key) = cached.keys.get(kid) {
                return Ok(key);
            }
            if cached.fetched_at.elapsed() < self.min_refresh_interval {
                tracing::debug!(%kid, "kid miss inside refresh interval, not refetching");
                return Err(key_not_found(kid));
            }
        }
        let seen_generation = seen.as_ref().map(|cached| cached.generation);

        let mut state = self.refresh_gate.lock().await;
        if let Some(cached) = self.snapshot()
            && Some(cached.generation) != seen_generation
            && self.is_fresh(&cached)
        {
            return cached.keys.get(kid).ok_or_else(|| key_not_found(kid));
        }

        let queued_failure = state
            .last_failure
            .clone()
            .filter(|_| self.attempts.load(Ordering::Acquire) != seen_attempts);
        let outcome = match queued_failure {
            Some(err) => {
                tracing::debug!(%kid, "key set fetch failed while queued, not refetching");
                Err(err)
            }
            None => self.refresh_locked(&mut state).await,
        };
        drop(state);

        match outcome {
            Ok(cached) => cached.keys.get(kid).ok_or_else(|| key_not_found(kid)),
            Err(err) => {
                // Fall back to a TTL-expired key while the provider is unreachable.
                if let Some(stale) = seen
                    && let Some(key) = stale.keys.get(kid)
                {
                    tracing::warn!(
                        %kid,
                        age_secs = stale.fetched_at.elapsed().as_secs(),
                        "key set refresh failed, serving stale key"
                    );
                    return Ok(key);
                }
                Err(err)
            }
        }
    }

    /// Force a fetch, replacing the cached set. Returns the number of usable keys.
    pub async fn refresh(&self) -> AuthResult<usize> {
        let mut state = self.refresh_gate.lock().await;
        let cached = self.refresh_locked(&mut state).await?;
        Ok(cached.keys.len())
    }

    /// Number of usable keys in the current snapshot, if one has been fetched.
    pub fn cached_key_count(&self) -> Option<usize> {
        self.snapshot().map(|cached| cached.keys.len())
    }

    fn snapshot(&self) -> Option<Arc<CachedKeySet>> {
        self.current.load_full()
    }

    fn is_fresh(&self, cached: &CachedKeySet) -> bool {
        match self.ttl {
            Some(ttl) => cached.fetched_at.elapsed() < ttl,
            None => true,
        }
    }

    // `state` is the guarded contents of `refresh_gate`.
    async fn refresh_locked(&self, state: &mut RefreshState) -> AuthResult<Arc<CachedKeySet>> {
        let outcome = self.fetch_and_swap().await;
        state.last_failure = outcome.as_ref().err().cloned();
        self.attempts.fetch_add(1, Ordering::Release);
        outcome
    }

    async fn fetch_and_swap(&self) -> AuthResult<Arc<CachedKeySet>> {
        let started = Instant::now();
        let jwks = match self.source.fetch().await {
            Ok(jwks) => jwks,
            Err(err) => {
                metrics::counter!("coffee_jwks_fetch_total", "outcome" => "error").increment(1);
                if let AuthError::KeySetUnavailable { detail } = &err {
                    tracing::warn!(error = %detail, "key set fetch failed");
                }
                return Err(err);
            }
        };
        let keys = KeySet::from_jwks(&jwks);
        let generation = self
            .snapshot()
            .map_or(1, |cached| cached.generation + 1);
        let cached = Arc::new(CachedKeySet {
            keys,
            fetched_at: Instant::now(),
            generation,
        });
        self.current.store(Some(cached.clone()));
        metrics::counter!("coffee_jwks_fetch_total", "outcome" => "ok").increment(1);
        tracing::info!(
            keys = cached.keys.len(),
            published = jwks.keys.len(),
            generation,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "key set refreshed"
        );
        Ok(cached)
    }
}

fn key_not_found(kid: &str) -> AuthError {
    AuthError::KeyNotFound {
        kid: kid.to_string(),
    }
}
