use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use opsgate_core::{Config, Dispatcher, LanguageModel, Registry, TaskRunner, ToolContext};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::handlers;

/// Shared state: configuration and the task runner (model + dispatcher).
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub runner: Arc<TaskRunner>,
}

impl AppState {
    pub fn new(
        config: Arc<Config>,
        llm: Arc<dyn LanguageModel>,
        registry: Arc<Registry>,
        http: reqwest::Client,
    ) -> Self {
        let context = ToolContext::new(config.clone(), llm.clone(), http);
        let dispatcher = Dispatcher::new(registry, context);
        let runner = Arc::new(TaskRunner::new(config.clone(), llm, dispatcher));
        Self { config, runner }
    }
}

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handlers::health))
        .route("/run", post(handlers::run_task))
        .route("/read", get(handlers::read_file))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
