#![allow(dead_code)]

use coffee_authz::testutil::{TEST_AUDIENCE, TEST_ISSUER, test_jwks};
use coffee_authz::{
    AuthGate, AuthSettings, HttpKeySetSource, Jwks, KeySetCache, TokenVerifier,
};
use coffeeshop::app::{AppState, build_router};
use coffeeshop::store::memory::InMemoryStore;
use jsonwebtoken::Algorithm;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

pub type TestApp = axum::routing::RouterIntoService<axum::body::Body, ()>;

pub async fn read_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    serde_json::from_slice(&bytes).expect("json")
}

pub fn test_auth_settings() -> AuthSettings {
    AuthSettings {
        issuer: TEST_ISSUER.to_string(),
        audience: TEST_AUDIENCE.to_string(),
        algorithms: vec![Algorithm::RS256],
        leeway_seconds: 0,
    }
}

fn gate_over(keys: KeySetCache) -> AuthGate {
    AuthGate::new(Arc::new(TokenVerifier::new(
        Arc::new(keys),
        test_auth_settings(),
    )))
}

/// Gate whose key set is fixed in memory.
pub fn preloaded_gate(kids: &[&str]) -> AuthGate {
    gate_over(KeySetCache::preloaded(test_jwks(kids)))
}

/// Gate that fetches its key set over HTTP from `jwks_url`.
pub fn http_gate(jwks_url: &str) -> AuthGate {
    let source = HttpKeySetSource::new(jwks_url, Duration::from_secs(2)).expect("client");
    gate_over(KeySetCache::new(Arc::new(source)))
}

pub async fn app_with(gate: AuthGate, seed_sample_drink: bool) -> TestApp {
    let store = if seed_sample_drink {
        InMemoryStore::with_sample_drink().await.expect("seed")
    } else {
        InMemoryStore::new()
    };
    build_router(AppState {
        store: Arc::new(store),
        auth: gate,
    })
    .into_service()
}

/// Local stand-in for the provider's JWKS endpoint.
pub struct JwksServer {
    pub addr: SocketAddr,
    hits: Arc<AtomicUsize>,
}

impl JwksServer {
    pub async fn spawn(jwks: Jwks) -> Self {
        use axum::{Json, Router, routing::get};
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        let app = Router::new().route(
            "/.well-known/jwks.json",
            get(move || {
                let jwks = jwks.clone();
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Json(jwks)
                }
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind");
        let addr = listener.local_addr().expect("addr");
        tokio::spawn(async move {
            let _ = axum::serve(listener, app.into_make_service()).await;
        });
        Self { addr, hits }
    }

    pub fn url(&self) -> String {
        format!("http://{}/.well-known/jwks.json", self.addr)
    }

    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }
}
