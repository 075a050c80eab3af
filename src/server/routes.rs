//! Route handlers.

use axum::Json;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Deserialize;

use super::AppState;
use super::auth::Authorized;
use super::health::STATUS_OK;
use crate::error::PipelineError;
use crate::pipeline::{QueueRequest, QueueRun, RunReport, RunRequest};

#[derive(Debug, Deserialize)]
pub(super) struct PatternBody {
    idea: String,
    #[serde(default)]
    patterns: Option<u32>,
    #[serde(default)]
    publish: bool,
}

#[derive(Debug, Deserialize)]
pub(super) struct QueueBody {
    queue: Vec<QueueRequest>,
}

#[derive(Debug, Default, Deserialize)]
pub(super) struct PublishQuery {
    #[serde(default)]
    publish: bool,
}

fn message(status: StatusCode, text: impl Into<String>) -> Response {
    (status, Json(serde_json::json!({ "message": text.into() }))).into_response()
}

fn error_response(err: &PipelineError) -> Response {
    let status = match err {
        PipelineError::Generation(_) | PipelineError::Collaborator(_) => StatusCode::BAD_GATEWAY,
        PipelineError::Config(_) => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status.is_server_error() {
        tracing::error!(error = %err, "request failed");
    }
    message(status, err.to_string())
}

fn report_response(report: RunReport) -> Response {
    let text = if report.is_complete() {
        "Generated Patterns Successfully".to_owned()
    } else {
        format!(
            "Generated {} patterns, {} failed",
            report.products.len(),
            report.failures.len()
        )
    };
    (
        StatusCode::OK,
        Json(serde_json::json!({
            "message": text,
            "run_folder": report.run_folder,
            "patterns": report.products,
            "failures": report.failures,
        })),
    )
        .into_response()
}

pub(super) async fn healthcheck() -> impl IntoResponse {
    Json(serde_json::json!({ "status": STATUS_OK }))
}

pub(super) async fn full_healthcheck(_: Authorized, State(state): State<AppState>) -> Response {
    let report = state.health.full_report().await;
    let status = if report.is_ok() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(report)).into_response()
}

pub(super) async fn db_healthcheck(_: Authorized, State(state): State<AppState>) -> Response {
    match state.health.database().await {
        Ok(()) => Json(serde_json::json!({ "status": STATUS_OK })).into_response(),
        Err(e) => {
            tracing::error!(error = %e, "database health check failed");
            Json(serde_json::json!({
                "status": "error",
                "details": "An error has occurred, check the logs"
            }))
            .into_response()
        }
    }
}

pub(super) async fn process_patterns(
    _: Authorized,
    State(state): State<AppState>,
    Json(body): Json<PatternBody>,
) -> Response {
    if body.idea.trim().is_empty() {
        return message(StatusCode::BAD_REQUEST, "idea must not be empty");
    }
    let orchestrator = &state.orchestrator;
    let patterns = body
        .patterns
        .unwrap_or(orchestrator.settings().default_patterns);
    let patterns = match orchestrator.check_pattern_count(patterns) {
        Ok(p) => p,
        Err(e) => return error_response(&e),
    };

    let request = RunRequest {
        idea: body.idea.trim().to_owned(),
        patterns,
        publish: body.publish,
    };
    match orchestrator.run(request).await {
        Ok(report) => report_response(report),
        Err(e) => error_response(&e),
    }
}

pub(super) async fn add_to_queue(
    _: Authorized,
    State(state): State<AppState>,
    Json(body): Json<QueueBody>,
) -> Response {
    if body.queue.iter().any(|r| r.idea.trim().is_empty()) {
        return message(StatusCode::BAD_REQUEST, "idea must not be empty");
    }
    let count = body.queue.len();
    match state.orchestrator.enqueue(body.queue).await {
        Ok(_) => message(StatusCode::OK, format!("Added {count} items to queue")),
        Err(e @ PipelineError::Config(_)) => error_response(&e),
        Err(e) => {
            tracing::error!(error = %e, "enqueue failed");
            message(StatusCode::INTERNAL_SERVER_ERROR, "Error adding to queue")
        }
    }
}

pub(super) async fn process_queue(
    _: Authorized,
    State(state): State<AppState>,
    Query(query): Query<PublishQuery>,
) -> Response {
    match state.orchestrator.run_next_queued(query.publish).await {
        Ok(QueueRun::Empty) => message(StatusCode::NOT_FOUND, "No items in queue"),
        Ok(QueueRun::Processed { item, report }) => {
            tracing::info!(queue_id = item.id, idea = %item.idea, "queued idea processed");
            report_response(report)
        }
        Err(e) => error_response(&e),
    }
}

pub(super) async fn queue_count(_: Authorized, State(state): State<AppState>) -> Response {
    match state.orchestrator.queue_count().await {
        Ok(count) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "message": format!("{count} items in queue"),
                "count": count,
            })),
        )
            .into_response(),
        Err(e) => error_response(&e),
    }
}
