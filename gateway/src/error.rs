use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use opsgate_core::TaskError;
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    /// Denylisted task. Deliberately carries no body.
    #[error("task rejected")]
    Rejected,

    #[error("not found")]
    NotFound,

    #[error("upstream model failure: {0}")]
    BadGateway(String),

    #[error("{0}")]
    Internal(String),
}

impl From<TaskError> for ApiError {
    fn from(err: TaskError) -> Self {
        match err {
            TaskError::Rejected => ApiError::Rejected,
            TaskError::Planning(e) => ApiError::BadGateway(e.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Rejected => StatusCode::BAD_REQUEST.into_response(),
            ApiError::NotFound => StatusCode::NOT_FOUND.into_response(),
            ApiError::BadGateway(detail) => problem(StatusCode::BAD_GATEWAY, detail),
            ApiError::Internal(detail) => problem(StatusCode::INTERNAL_SERVER_ERROR, detail),
        }
    }
}

fn problem(status: StatusCode, detail: String) -> Response {
    let body = json!({
        "status": status.as_u16(),
        "title": status.canonical_reason().unwrap_or("Error"),
        "detail": detail,
    });
    (status, Json(body)).into_response()
}
