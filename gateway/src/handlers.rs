use std::io::ErrorKind;

use axum::extract::{Query, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::Json;
use tracing::{error, info};

use crate::api::{ReadParams, RunParams, RunResponse};
use crate::error::ApiError;
use crate::sandbox;
use crate::server::AppState;

// --- HANDLERS ---

pub async fn health() -> &'static str {
    "opsgate: operational"
}

// POST /run?task=...
pub async fn run_task(
    State(state): State<AppState>,
    Query(params): Query<RunParams>,
) -> Result<Json<RunResponse>, ApiError> {
    info!("Task received: {}", params.task);
    let report = state.runner.run(&params.task).await?;
    Ok(Json(RunResponse::completed(report.calls)))
}

// GET /read?path=...
pub async fn read_file(
    State(state): State<AppState>,
    Query(params): Query<ReadParams>,
) -> Result<Response, ApiError> {
    // 1. Confine: anything outside the data dir looks like a missing file
    let path = sandbox::resolve(&state.config.data_dir, &params.path).ok_or_else(|| {
        info!("Refusing read outside {}: {}", state.config.data_dir.display(), params.path);
        ApiError::NotFound
    })?;

    // 2. Read: the body is the file's exact text
    match tokio::fs::read_to_string(&path).await {
        Ok(text) => Ok(([(header::CONTENT_TYPE, "text/plain; charset=utf-8")], text).into_response()),
        Err(e) if e.kind() == ErrorKind::NotFound => Err(ApiError::NotFound),
        Err(e) => {
            error!("Failed to read {}: {}", path.display(), e);
            Err(ApiError::Internal(format!("could not read {}: {e}", path.display())))
        }
    }
}
