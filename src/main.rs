//! Two Truths Back binary entrypoint wiring REST, SSE, the deadline tick and storage.

use std::{env, net::SocketAddr, sync::Arc};

use anyhow::Context;
use axum::Router;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use two_truths_back::{
    config::{AppConfig, StorageMode},
    dao::party_store::{PartyStore, memory::MemoryPartyStore},
    routes,
    services::deadline_supervisor,
    state::{AppState, SharedState},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = AppConfig::load();
    let tick_interval = config.tick_interval();
    let store = build_store(StorageMode::from_env()).await;
    let app_state = AppState::new(store, config);

    tokio::spawn(deadline_supervisor::run(app_state.clone(), tick_interval));
    let app = build_router(app_state);

    let port = env::var("PORT")
        .or_else(|_| env::var("SERVER_PORT"))
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(3000);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!(%addr, "starting server");

    let listener = TcpListener::bind(addr).await.context("binding server")?;
    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving axum")?;

    Ok(())
}

/// Pick the storage backend, falling back to memory when Upstash is unreachable.
async fn build_store(mode: StorageMode) -> Arc<dyn PartyStore> {
    match mode {
        StorageMode::Memory => {
            info!("using in-memory storage");
            Arc::new(MemoryPartyStore::new())
        }
        StorageMode::Redis => connect_upstash().await,
    }
}

#[cfg(feature = "upstash-store")]
async fn connect_upstash() -> Arc<dyn PartyStore> {
    use two_truths_back::dao::party_store::upstash::{UpstashConfig, UpstashPartyStore};

    let connected = match UpstashConfig::from_env() {
        Ok(config) => UpstashPartyStore::connect(config).await,
        Err(err) => Err(err),
    };
    match connected {
        Ok(store) => {
            info!("connected to Upstash Redis");
            Arc::new(store)
        }
        Err(err) => {
            warn!(error = %err, "Upstash storage unavailable; falling back to in-memory storage");
            Arc::new(MemoryPartyStore::new())
        }
    }
}

#[cfg(not(feature = "upstash-store"))]
async fn connect_upstash() -> Arc<dyn PartyStore> {
    warn!("built without the `upstash-store` feature; falling back to in-memory storage");
    Arc::new(MemoryPartyStore::new())
}

/// Build the top-level router and attach cross-cutting middleware layers.
fn build_router(state: SharedState) -> Router<()> {
    routes::router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Configure tracing subscribers so logs include spans by default.
fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,tower_http=debug".into());
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Wait for Ctrl+C or SIGTERM and shut the server down gracefully.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {},
                    _ = term.recv() => {},
                }
            }
            Err(err) => {
                warn!(error = %err, "failed to install SIGTERM handler");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
