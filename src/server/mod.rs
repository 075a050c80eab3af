//! HTTP surface.
//!
//! | Route | Auth |
//! |---|---|
//! | `GET /`, `GET /healthcheck` | no |
//! | `GET /full_healthcheck`, `GET /healthcheck/db` | yes |
//! | `POST /process_patterns` | yes |
//! | `POST /pattern_queue`, `GET /pattern_queue`, `GET /pattern_queue/count` | yes |

pub mod auth;
pub mod health;
mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};

pub use auth::{AuthError, Authorized};
pub use health::{HealthProbes, HealthReport};

use crate::pipeline::PipelineOrchestrator;

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<PipelineOrchestrator>,
    pub health: Arc<HealthProbes>,
    /// Bearer token every protected route requires.
    pub api_key: Arc<str>,
}

impl AppState {
    pub fn new(
        orchestrator: Arc<PipelineOrchestrator>,
        health: Arc<HealthProbes>,
        api_key: impl Into<Arc<str>>,
    ) -> Self {
        Self {
            orchestrator,
            health,
            api_key: api_key.into(),
        }
    }
}

/// Build the application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(routes::healthcheck))
        .route("/healthcheck", get(routes::healthcheck))
        .route("/full_healthcheck", get(routes::full_healthcheck))
        .route("/healthcheck/db", get(routes::db_healthcheck))
        .route("/process_patterns", post(routes::process_patterns))
        .route(
            "/pattern_queue",
            post(routes::add_to_queue).get(routes::process_queue),
        )
        .route("/pattern_queue/count", get(routes::queue_count))
        .with_state(state)
}

/// Serve on an already-bound listener until Ctrl-C.
pub async fn serve(listener: tokio::net::TcpListener, state: AppState) -> anyhow::Result<()> {
    let local_addr = listener.local_addr()?;
    tracing::info!("patternpress listening on http://{local_addr}");
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    tracing::info!("server stopped");
    Ok(())
}

/// Bind `host:port` and serve.
pub async fn run_server(host: &str, port: u16, state: AppState) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind((host, port)).await?;
    serve(listener, state).await
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("failed to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
}
