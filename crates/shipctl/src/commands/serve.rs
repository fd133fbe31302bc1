//! Serve command - runs the workflow orchestrator behind an HTTP API
//!
//! Routes:
//!   GET  /health
//!   POST /api/workflows              start a workflow, 201 + {"id"}
//!   GET  /api/workflows              list (status, environment, tenantId, limit)
//!   GET  /api/workflows/:id          status snapshot
//!   POST /api/workflows/:id/cancel   {"cancelled": bool}

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use ship_core::{ShipConfig, ShipError, WorkflowFilter, WorkflowParams, WorkflowStore};
use ship_runtime::WorkflowOrchestrator;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

#[derive(Clone)]
pub struct AppState {
    orchestrator: WorkflowOrchestrator,
}

pub async fn execute(config: ShipConfig, host: Option<&str>, port: Option<u16>) -> anyhow::Result<()> {
    let host = host.unwrap_or(&config.spec.server.host);
    let port = port.unwrap_or(config.spec.server.port);
    let bind_addr: SocketAddr = format!("{}:{}", host, port)
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid bind address: {}", e))?;

    let orchestrator = build_orchestrator(&config).await?;
    let app = router(orchestrator.clone());

    let listener = tokio::net::TcpListener::bind(bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", bind_addr))?;
    info!(address = %bind_addr, store = ?config.spec.runtime.store, "Orchestrator listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;

    let grace = Duration::from_secs(config.spec.runtime.shutdown_timeout_secs);
    info!(active = orchestrator.active_count(), "Draining in-flight workflows");
    if !orchestrator.shutdown(grace).await {
        warn!(
            active = orchestrator.active_count(),
            "Shutdown timeout elapsed with workflows still running"
        );
    }
    Ok(())
}

/// Store, collaborators, thresholds and concurrency cap from config
pub async fn build_orchestrator(config: &ShipConfig) -> anyhow::Result<WorkflowOrchestrator> {
    let store: Arc<dyn WorkflowStore> = ship_store::open_store(&config.spec.runtime.store)
        .await
        .context("failed to open workflow store")?;
    let collaborators = ship_clients::from_config(&config.spec.services)?;

    let mut orchestrator = WorkflowOrchestrator::new(store, collaborators)
        .with_thresholds(config.spec.thresholds.clone());
    if let Some(max) = config.spec.runtime.max_concurrent_workflows {
        orchestrator = orchestrator.with_max_concurrent(max);
    }
    Ok(orchestrator)
}

pub fn router(orchestrator: WorkflowOrchestrator) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/api/workflows", post(start_workflow).get(list_workflows))
        .route("/api/workflows/:id", get(workflow_status))
        .route("/api/workflows/:id/cancel", post(cancel_workflow))
        .layer(TraceLayer::new_for_http())
        .with_state(AppState { orchestrator })
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        return;
    }
    info!("Shutdown signal received");
}

// ============================================================================
// HTTP Handlers
// ============================================================================

async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
        "activeWorkflows": state.orchestrator.active_count(),
    }))
}

async fn start_workflow(
    State(state): State<AppState>,
    Json(params): Json<WorkflowParams>,
) -> Result<impl IntoResponse, ApiError> {
    let id = state.orchestrator.start(params).await?;
    Ok((StatusCode::CREATED, Json(json!({ "id": id }))))
}

async fn list_workflows(
    State(state): State<AppState>,
    Query(filter): Query<WorkflowFilter>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.orchestrator.list(&filter).await?))
}

async fn workflow_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.orchestrator.status(&id).await?))
}

async fn cancel_workflow(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let cancelled = state.orchestrator.cancel(&id).await?;
    Ok(Json(json!({ "cancelled": cancelled })))
}

/// Maps orchestrator errors onto HTTP statuses
pub struct ApiError(ShipError);

impl From<ShipError> for ApiError {
    fn from(err: ShipError) -> Self {
        Self(err)
    }
}

pub fn status_for(err: &ShipError) -> StatusCode {
    match err {
        ShipError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
        ShipError::NotFound(_) => StatusCode::NOT_FOUND,
        ShipError::Collaborator { .. } => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = status_for(&self.0);
        if status.is_server_error() {
            error!(error = %self.0, "Request failed");
        }
        (status, Json(json!({ "error": self.0.to_string() }))).into_response()
    }
}
