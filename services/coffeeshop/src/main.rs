//! Coffee shop HTTP service entry point.
//!
//! # Purpose
//! Wires configuration, storage, and the auth gate into the router, then serves
//! the API and the metrics endpoint until Ctrl-C.
//!
//! # Notes
//! The `build_state` helper keeps wiring testable and minimizes main setup logic.
use anyhow::Context;
use coffee_authz::AuthGate;
use coffeeshop::app::{AppState, build_router};
use coffeeshop::config::CoffeeShopConfig;
use coffeeshop::observability;
use coffeeshop::store::DrinkStore;
use coffeeshop::store::memory::InMemoryStore;
use std::future::Future;
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = CoffeeShopConfig::from_env_or_yaml().context("load coffeeshop config")?;
    run_with_shutdown(config, async {
        let _ = tokio::signal::ctrl_c().await;
    })
    .await
}

async fn run_with_shutdown<F>(config: CoffeeShopConfig, shutdown: F) -> anyhow::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let metrics_handle = observability::init_observability("coffeeshop");
    let state = build_state(&config).await?;
    let metrics_task = tokio::spawn(observability::serve_metrics(
        metrics_handle,
        config.metrics_bind,
    ));

    let app = build_router(state.clone());

    let addr = config.bind_addr;
    tracing::info!(
        %addr,
        backend = state.store.backend_name(),
        issuer = %config.auth.issuer,
        audience = %config.auth.audience,
        jwks_url = %config.key_cache.jwks_url,
        "coffeeshop listening"
    );
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("bind {addr}"))?;
    tokio::pin!(shutdown);
    tokio::select! {
        result = axum::serve(listener, app.into_make_service()) => {
            result?;
        }
        _ = &mut shutdown => {
            tracing::info!("shutdown requested");
        }
    }

    metrics_task.abort();
    let _ = metrics_task.await;
    Ok(())
}

async fn build_state(config: &CoffeeShopConfig) -> anyhow::Result<AppState> {
    let store: Arc<dyn DrinkStore> = if config.seed_sample_drink {
        Arc::new(
            InMemoryStore::with_sample_drink()
                .await
                .context("seed sample drink")?,
        )
    } else {
        Arc::new(InMemoryStore::new())
    };
    let auth = AuthGate::from_settings(config.auth.clone(), &config.key_cache)
        .context("build key set http client")?;
    Ok(AppState { store, auth })
}
