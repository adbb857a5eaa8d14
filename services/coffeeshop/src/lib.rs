//! Coffee shop service library crate.
//!
//! # Purpose
//! Exposes the drinks API, configuration, observability wiring, and storage
//! backends for use by the binary and integration tests.
//!
//! # Notes
//! Authorization lives in `coffee_authz`; handlers call the shared
//! [`coffee_authz::AuthGate`] held in [`app::AppState`].
pub mod api;
pub mod app;
pub mod config;
pub mod model;
pub mod observability;
pub mod store;
