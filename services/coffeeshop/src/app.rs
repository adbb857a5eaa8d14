//! HTTP application wiring.
//!
//! # Purpose
//! Builds the Axum router, configures middleware, and defines the shared
//! application state injected into handlers.
//!
//! # Notes
//! `AppState` is the composition root: the store and the auth gate are built
//! once in `main` and shared by every request.
use crate::api;
use crate::api::openapi::ApiDoc;
use crate::observability;
use crate::store::DrinkStore;
use axum::Json;
use axum::Router;
use axum::http::{HeaderName, Method, header};
use coffee_authz::AuthGate;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_opentelemetry::OpenTelemetrySpanExt;
use utoipa::OpenApi;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn DrinkStore>,
    pub auth: AuthGate,
}

pub fn build_router(state: AppState) -> Router {
    let trace_layer =
        TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
            let parent = observability::trace_context_from_headers(request.headers());
            let span = tracing::info_span!(
                "http.request",
                method = %request.method(),
                uri = %request.uri(),
                version = ?request.version()
            );
            span.set_parent(parent);
            span
        });

    Router::new()
        .route("/health", axum::routing::get(api::system::health))
        .route(
            "/drinks",
            axum::routing::get(api::drinks::list_drinks).post(api::drinks::create_drink),
        )
        .route(
            "/drinks-detail",
            axum::routing::get(api::drinks::list_drink_details),
        )
        .route(
            "/drinks/:id",
            axum::routing::patch(api::drinks::update_drink).delete(api::drinks::delete_drink),
        )
        .route(
            "/openapi.json",
            axum::routing::get(|| async { Json(ApiDoc::openapi()) }),
        )
        .layer(cors_layer())
        .layer(trace_layer)
        .with_state(state)
}

fn cors_layer() -> CorsLayer {
    let allowed_headers: [HeaderName; 2] = [header::AUTHORIZATION, header::CONTENT_TYPE];
    CorsLayer::new()
        .allow_origin(Any)
        .allow_headers(allowed_headers)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
}
