//! HTTP transport.
//!
//! A thin layer over the registry: resolve the workflow, build a fresh
//! orchestrator for the request, and stream its records back as NDJSON.

use std::convert::Infallible;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    body::Body,
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use futures::StreamExt;
use serde_json::json;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::core::{RegistryError, WorkflowMetadata, WorkflowRegistry};
use crate::domain::WorkflowRunRequest;

pub const NDJSON: &str = "application/x-ndjson";

/// Shared state of the HTTP handlers
#[derive(Clone)]
pub struct AppState {
    registry: Arc<WorkflowRegistry>,
}

impl AppState {
    pub fn new(registry: WorkflowRegistry) -> Self {
        Self {
            registry: Arc::new(registry),
        }
    }
}

/// Create the router
pub fn create_router(registry: WorkflowRegistry) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/workflows", get(list_workflows))
        .route("/workflows/{workflow_id}/run", post(run_workflow))
        .with_state(AppState::new(registry))
        .layer(TraceLayer::new_for_http())
}

/// Bind `address` and serve until the process is stopped
pub async fn serve(registry: WorkflowRegistry, address: &str) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(address)
        .await
        .with_context(|| format!("Failed to bind {}", address))?;

    info!(address = %address, workflows = registry.len(), "Serving workflows");

    axum::serve(listener, create_router(registry))
        .await
        .context("HTTP server failed")
}

async fn root() -> impl IntoResponse {
    Json(json!({"status": "ok"}))
}

async fn health() -> impl IntoResponse {
    Json(json!({"status": "healthy"}))
}

async fn list_workflows(State(state): State<AppState>) -> Json<Vec<WorkflowMetadata>> {
    Json(state.registry.metadata().into_iter().cloned().collect())
}

async fn run_workflow(
    State(state): State<AppState>,
    Path(workflow_id): Path<String>,
    Json(request): Json<WorkflowRunRequest>,
) -> Response {
    let orchestrator = match state.registry.orchestrator(&workflow_id, request) {
        Ok(orchestrator) => orchestrator,
        Err(e) => return registry_error(e),
    };

    info!(
        workflow_id = %workflow_id,
        run_id = %orchestrator.run_id(),
        "Starting workflow run"
    );

    let records = orchestrator.into_stream().map(Ok::<_, Infallible>);

    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, NDJSON),
            (header::CACHE_CONTROL, "no-cache"),
        ],
        Body::from_stream(records),
    )
        .into_response()
}

fn registry_error(err: RegistryError) -> Response {
    warn!(error = %err, "Rejected workflow run");

    match err {
        RegistryError::NotFound { ref available, .. } => (
            StatusCode::NOT_FOUND,
            Json(json!({"error": err.to_string(), "available_workflows": available})),
        )
            .into_response(),
        other => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"error": other.to_string()})),
        )
            .into_response(),
    }
}
