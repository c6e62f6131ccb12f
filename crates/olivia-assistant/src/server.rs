//! HTTP server startup and routing.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    http::Method,
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::{info, warn};

use crate::{config::Config, memory_db::MemoryDatabase, shared_state::AppState};

/// Run the API server until Ctrl-C.
pub async fn run_server(cfg: Config) -> anyhow::Result<()> {
    crate::telemetry::init_tracing();
    crate::metrics::init_metrics()?;
    cfg.print_config();

    let database = open_database(&cfg.database_path)?;
    let addr = cfg.api_addr()?;
    let request_timeout = Duration::from_secs(cfg.request_timeout_seconds);
    let state = AppState::new(cfg, database)?;

    info!("Starting HTTP server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, build_router(state, request_timeout))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

fn open_database(path: &Path) -> anyhow::Result<Arc<MemoryDatabase>> {
    match MemoryDatabase::new(path) {
        Ok(db) => {
            info!("Memory database initialized at: {}", path.display());
            Ok(Arc::new(db))
        }
        Err(e) => {
            warn!("Failed to initialize memory database: {}. Falling back to in-memory.", e);
            Ok(Arc::new(MemoryDatabase::new_in_memory()?))
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

pub fn build_router(state: AppState, request_timeout: Duration) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_headers(Any);

    Router::new()
        .route("/chat", post(crate::api::chat))
        .route("/rank", post(crate::api::rank))
        .route("/rank/similar", post(crate::api::rank_similar))
        .route(
            "/checklists/:user_id",
            get(crate::api::get_checklist).delete(crate::api::delete_checklist),
        )
        .route("/healthz", get(crate::api::healthz))
        .route("/metrics", get(crate::api::metrics))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(request_timeout))
        .with_state(state)
}
