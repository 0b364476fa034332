//! Gateway server setup
//!
//! Wires the store into the shared state, mounts the HTTP routes and runs
//! the server alongside the session janitor.

mod handler;
mod janitor;
mod routes;
mod state;

pub use handler::{gateway_handler, GatewayQuery};
pub use janitor::{spawn_janitor, sweep_expired};
pub use routes::{get_gateway, get_gateway_bot, health_check, BotGateway, GatewayUrl, RouteError};
pub use state::GatewayState;

use std::sync::Arc;

use axum::{routing::get, Router};
use concord_common::{AppConfig, AppError};
use concord_store::MemoryStore;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;

/// Create the gateway router
pub fn create_router() -> Router<GatewayState> {
    Router::new()
        .route("/gateway", get(gateway_handler))
        .route("/health", get(health_check))
        .route("/api/gateway", get(get_gateway))
        .route("/api/gateway/bot", get(get_gateway_bot))
}

/// Build the complete application
pub fn create_app(state: GatewayState) -> Router {
    create_router()
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Load the collaborator store and create `GatewayState`
pub async fn create_gateway_state(config: AppConfig) -> Result<GatewayState, AppError> {
    let store = match &config.store.fixture_path {
        Some(path) => {
            tracing::info!(path = %path, "Loading store fixture...");
            let store = MemoryStore::from_fixture_file(path)
                .await
                .map_err(|e| AppError::Store(e.to_string()))?;
            tracing::info!("Store fixture loaded");
            store
        }
        None => {
            tracing::warn!("No STORE_FIXTURE configured, starting with an empty store");
            MemoryStore::new()
        }
    };

    Ok(GatewayState::new(config, Arc::new(store)))
}

/// Bind the listening socket
pub async fn bind(addr: &str) -> Result<TcpListener, AppError> {
    TcpListener::bind(addr).await.map_err(|source| AppError::Bind {
        addr: addr.to_string(),
        source,
    })
}

/// Serve the gateway until `shutdown` fires
pub async fn serve(
    listener: TcpListener,
    state: GatewayState,
    shutdown: CancellationToken,
) -> Result<(), AppError> {
    if let Ok(addr) = listener.local_addr() {
        tracing::info!("Gateway listening on ws://{}/gateway", addr);
    }

    let janitor = spawn_janitor(state.clone(), shutdown.clone());

    let signal = shutdown.clone();
    let result = axum::serve(listener, create_app(state))
        .with_graceful_shutdown(async move { signal.cancelled().await })
        .await
        .map_err(AppError::Server);

    shutdown.cancel();
    if let Err(e) = janitor.await {
        tracing::warn!(error = %e, "Session janitor failed");
    }
    result
}

/// Run the complete gateway server with configuration
pub async fn run(config: AppConfig) -> Result<(), AppError> {
    let addr = config.gateway.address();
    tracing::info!("Starting Gateway server on {}", addr);

    let listener = bind(&addr).await?;
    let state = create_gateway_state(config).await?;

    let shutdown = CancellationToken::new();
    let signal = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Shutdown requested");
            signal.cancel();
        }
    });

    serve(listener, state, shutdown).await
}
