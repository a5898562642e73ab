//! HTTP API server

use std::sync::Arc;
use std::time::Duration;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::auth::JwtVerifier;
use crate::channel::ChannelName;
use crate::config::Config;
use crate::error::Result;
use crate::heartbeat;
use crate::registry::{ConnectionRegistry, SharedRegistry};
use crate::shutdown::ShutdownManager;
use crate::stats::Stats;

use super::routes;

/// Application state shared across handlers.
pub struct AppState {
    pub config: Config,
    pub registry: SharedRegistry,
    pub stats: Stats,
    pub jwt: JwtVerifier,
    pub shutdown: Arc<ShutdownManager>,
}

pub type SharedState = Arc<AppState>;

/// Run the HTTP/WS server: builds shared state, spawns the heartbeat
/// task, binds the listener, and serves until shutdown is signaled.
pub async fn run_server(config: Config, host: &str, port: u16) -> Result<()> {
    let pre_declared: Vec<String> = config
        .channels
        .iter()
        .filter_map(|name| ChannelName::parse(name).ok().map(|c| c.as_str().to_string()))
        .collect();

    let registry = Arc::new(ConnectionRegistry::new(pre_declared));
    let jwt = JwtVerifier::with_algorithm(config.jwt_secret.clone(), config.jwt_algorithm());
    let shutdown = Arc::new(ShutdownManager::new(
        Duration::from_secs(config.shutdown_timeout),
        Duration::from_secs(config.grace_period),
    ));

    let state = Arc::new(AppState {
        config: config.clone(),
        registry: registry.clone(),
        stats: Stats::new(),
        jwt,
        shutdown: shutdown.clone(),
    });

    let heartbeat_shutdown = shutdown.subscribe();
    let heartbeat_registry = registry.clone();
    let heartbeat_interval = Duration::from_secs(config.heartbeat_interval);
    tokio::spawn(async move {
        heartbeat::run(heartbeat_registry, heartbeat_interval, heartbeat_shutdown).await;
    });

    let signal_shutdown = shutdown.clone();
    tokio::spawn(async move {
        wait_for_termination().await;
        signal_shutdown.initiate_shutdown("signal").await;
    });

    let cleanup_registry = registry.clone();
    shutdown.register_shutdown_callback(move || {
        let registry = cleanup_registry.clone();
        async move { registry.clear().await }
    });

    let app = create_router(state);

    let addr = format!("{host}:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(addr, "broker listening");

    let mut shutdown_rx = shutdown.subscribe();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown_rx.changed().await;
        })
        .await?;

    shutdown.mark_shutdown_complete();
    Ok(())
}

/// Waits for Ctrl+C (SIGINT) or, on Unix, SIGTERM.
async fn wait_for_termination() {
    use tokio::signal;

    let ctrl_c = async {
        signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("received Ctrl+C"),
        _ = terminate => tracing::info!("received SIGTERM"),
    }
}

/// Create the router with all routes.
pub fn create_router(state: SharedState) -> Router {
    Router::new()
        .route("/publish/:channel", post(routes::publish_legacy))
        .route("/publish", post(routes::publish))
        .route("/ws/:channel", get(super::websocket::ws_handler))
        .route("/health", get(routes::health))
        .route("/stats", get(routes::stats))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
