//! Web server — axum REST API and WebSocket feed for the live fleet.
//!
//! Shared state is the reconciler (which owns the fleet store handle) and the
//! broadcast gateway. The staleness sweeper runs alongside the listener.

use std::sync::Arc;

use axum::routing::get;
use axum::Router;
use tower_http::cors::{Any, CorsLayer};

use fleet_core::config::Config;
use fleet_core::{FleetStore, Reconciler};

use crate::broadcast::Gateway;
use crate::sweeper::{Sweeper, SweeperConfig};

pub mod ingest;
pub mod routes;
pub mod ws;

// ---------------------------------------------------------------------------
// Shared state
// ---------------------------------------------------------------------------

pub struct AppState {
    pub reconciler: Reconciler,
    pub gateway: Gateway,
}

impl AppState {
    pub fn new(reconciler: Reconciler, gateway: Gateway) -> Self {
        AppState {
            reconciler,
            gateway,
        }
    }

    pub fn store(&self) -> &Arc<FleetStore> {
        self.reconciler.store()
    }
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(routes::index))
        .route("/api/health", get(routes::api_health))
        .route(
            "/api/aircraft",
            get(routes::api_aircraft).post(ingest::api_ingest_aircraft),
        )
        .route("/ws", get(ws::ws_handler))
        .with_state(state)
        .layer(cors)
}

/// Start the web server and the sweeper; runs until Ctrl-C.
pub async fn serve(config: Config) -> std::io::Result<()> {
    let store = Arc::new(FleetStore::new());
    let reconciler = Reconciler::with_policy(store.clone(), config.fleet.heading_policy);
    let gateway = Gateway::new();

    let sweeper = Sweeper::new(
        store,
        gateway.clone(),
        SweeperConfig::from(&config.fleet),
    )
    .start();

    let state = Arc::new(AppState::new(reconciler, gateway));
    let heading_policy = state.reconciler.policy();
    let app = build_router(state);
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!(
        %addr,
        sweep_interval_ms = config.fleet.sweep_interval_ms,
        idle_threshold_ms = config.fleet.idle_threshold_ms,
        %heading_policy,
        "fleet server listening"
    );

    let result = axum::serve(listener, app)
        .with_graceful_shutdown(fleet_core::runtime::shutdown_signal())
        .await;

    sweeper.abort();
    tracing::info!("fleet server stopped");
    result
}

#[cfg(test)]
pub(crate) fn test_state() -> Arc<AppState> {
    let store = Arc::new(FleetStore::new());
    Arc::new(AppState::new(Reconciler::new(store), Gateway::new()))
}
