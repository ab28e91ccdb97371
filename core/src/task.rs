use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::config::Config;
use crate::dispatch::{CallOutcome, Dispatcher};
use crate::error::LlmError;
use crate::llm::LanguageModel;
use crate::registry::ToolDescriptor;

#[derive(Debug, Error)]
pub enum TaskError {
    #[error("task contains a denylisted phrase")]
    Rejected,

    #[error("planning failed: {0}")]
    Planning(#[from] LlmError),
}

#[derive(Debug, Clone, Serialize)]
pub struct TaskReport {
    pub calls: Vec<CallOutcome>,
}

// Turns a free-text task into dispatched tool calls
pub struct TaskRunner {
    config: Arc<Config>,
    llm: Arc<dyn LanguageModel>,
    dispatcher: Dispatcher,
    catalog: Vec<ToolDescriptor>,
}

impl TaskRunner {
    pub fn new(config: Arc<Config>, llm: Arc<dyn LanguageModel>, dispatcher: Dispatcher) -> Self {
        let catalog = dispatcher.registry().descriptors().cloned().collect();
        Self {
            config,
            llm,
            dispatcher,
            catalog,
        }
    }

    pub fn catalog(&self) -> &[ToolDescriptor] {
        &self.catalog
    }

    pub async fn run(&self, task: &str) -> Result<TaskReport, TaskError> {
        // 1. Screen: denylisted tasks never reach the model
        if self.config.is_denied(task) {
            warn!("Refusing denylisted task");
            return Err(TaskError::Rejected);
        }

        // 2. Plan: the model picks zero or more tools from the catalog
        info!("Planning task against {} tools", self.catalog.len());
        let calls = self.llm.plan(task, &self.catalog).await?;
        if calls.is_empty() {
            info!("Model selected no tool for this task");
        }

        // 3. Act: run every call in the order the model gave
        let outcomes = self.dispatcher.dispatch_all(&calls).await;
        let failed = outcomes.iter().filter(|o| !o.is_ok()).count();
        info!(
            "Task finished: {} call(s), {} failed",
            outcomes.len(),
            failed
        );
        Ok(TaskReport { calls: outcomes })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::{CallStatus, ToolCall};
    use crate::error::ToolError;
    use crate::registry::{ParamType, Registry, ToolContext, ToolHandler, ToolOutput};
    use crate::testing::{test_context, ScriptedModel};
    use async_trait::async_trait;
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Counter(Arc<AtomicUsize>);

    #[async_trait]
    impl ToolHandler for Counter {
        fn descriptor(&self) -> ToolDescriptor {
            ToolDescriptor::new("tick", "Increment a counter")
                .optional("by", ParamType::Integer, "step")
        }

        async fn call(&self, _ctx: &ToolContext, _arguments: Value) -> Result<ToolOutput, ToolError> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(ToolOutput::new("ticked"))
        }
    }

    fn runner(model: Arc<ScriptedModel>, ticks: Arc<AtomicUsize>) -> TaskRunner {
        let config = Config::default();
        let registry = Registry::builder().register(Counter(ticks)).build().unwrap();
        let ctx = test_context(config.clone(), model.clone());
        let dispatcher = Dispatcher::new(Arc::new(registry), ctx);
        TaskRunner::new(Arc::new(config), model, dispatcher)
    }

    #[tokio::test]
    async fn denylisted_task_never_reaches_the_model() {
        let model = Arc::new(ScriptedModel::new());
        let runner = runner(model.clone(), Arc::new(AtomicUsize::new(0)));

        let err = runner.run("delete every file in /data").await.unwrap_err();
        assert!(matches!(err, TaskError::Rejected));
        assert_eq!(model.plan_calls(), 0);
    }

    #[tokio::test]
    async fn no_tool_calls_is_still_a_completed_task() {
        let model = Arc::new(ScriptedModel::new().with_plan(vec![]));
        let ticks = Arc::new(AtomicUsize::new(0));
        let runner = runner(model.clone(), ticks.clone());

        let report = runner.run("just say hi").await.unwrap();
        assert!(report.calls.is_empty());
        assert_eq!(ticks.load(Ordering::SeqCst), 0);
        assert_eq!(model.offered_tools(), vec![vec!["tick".to_string()]]);
    }

    #[tokio::test]
    async fn calls_run_in_model_order_and_failures_are_reported() {
        let model = Arc::new(ScriptedModel::new().with_plan(vec![
            ToolCall::new("tick", json!({})),
            ToolCall::new("missing", json!({})),
            ToolCall::new("tick", json!({ "by": 2 })),
        ]));
        let ticks = Arc::new(AtomicUsize::new(0));
        let runner = runner(model, ticks.clone());

        let report = runner.run("tick twice").await.unwrap();
        let statuses: Vec<_> = report.calls.iter().map(|c| c.status).collect();
        assert_eq!(
            statuses,
            vec![CallStatus::Ok, CallStatus::Error, CallStatus::Ok]
        );
        assert_eq!(ticks.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn planning_failure_aborts_the_task() {
        let model =
            Arc::new(ScriptedModel::new().with_plan_error(LlmError::Api("401 unauthorized".into())));
        let ticks = Arc::new(AtomicUsize::new(0));
        let runner = runner(model, ticks.clone());

        let err = runner.run("tick").await.unwrap_err();
        assert!(matches!(err, TaskError::Planning(LlmError::Api(_))));
        assert_eq!(ticks.load(Ordering::SeqCst), 0);
    }
}
