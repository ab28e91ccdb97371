//! Common test utilities.

use std::path::Path;
use std::sync::Arc;

use axum::body::Body;
use axum::http::Request;
use axum::Router;
use http_body_util::BodyExt;
use opsgate_core::testing::ScriptedModel;
use opsgate_core::Config;
use opsgate_gateway::{build_router, AppState};
use tower::ServiceExt;

/// Router over the built-in tools, `data_dir` as sandbox prefix and `model` as the LLM.
pub fn test_app(data_dir: &Path, model: Arc<ScriptedModel>) -> Router {
    let config = Arc::new(Config {
        data_dir: data_dir.to_path_buf(),
        ..Config::default()
    });
    let registry = Arc::new(opsgate_tools::builtin_registry().unwrap());
    let state = AppState::new(config, model, registry, reqwest::Client::new());
    build_router(state)
}

/// Send a request and return the status and body text.
pub async fn send(app: Router, request: Request<Body>) -> (u16, String) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status().as_u16();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    (status, String::from_utf8(body.to_vec()).unwrap())
}

pub fn post(uri: &str) -> Request<Body> {
    Request::post(uri).body(Body::empty()).unwrap()
}

pub fn get(uri: &str) -> Request<Body> {
    Request::get(uri).body(Body::empty()).unwrap()
}

/// Percent-encode a query value.
pub fn encode(value: &str) -> String {
    value
        .bytes()
        .map(|b| match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' | b'/' => {
                (b as char).to_string()
            }
            _ => format!("%{b:02X}"),
        })
        .collect()
}
