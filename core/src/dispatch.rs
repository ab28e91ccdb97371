use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use serde_json::Value;
use tracing::{error, info};

use crate::error::ToolError;
use crate::registry::{Registry, ToolContext, ToolDescriptor, ToolOutput};

/// One tool invocation requested by the model.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    /// JSON-encoded argument object, exactly as the model produced it.
    pub arguments: String,
}

impl ToolCall {
    pub fn new(name: impl Into<String>, arguments: Value) -> Self {
        Self {
            id: String::new(),
            name: name.into(),
            arguments: arguments.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CallStatus {
    Ok,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CallOutcome {
    pub tool: String,
    pub status: CallStatus,
    pub detail: String,
}

impl CallOutcome {
    pub fn is_ok(&self) -> bool {
        self.status == CallStatus::Ok
    }
}

pub struct Dispatcher {
    registry: Arc<Registry>,
    context: ToolContext,
}

impl Dispatcher {
    pub fn new(registry: Arc<Registry>, context: ToolContext) -> Self {
        Self { registry, context }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Run one call. Every failure, including an unknown tool name, becomes an error outcome.
    pub async fn dispatch(&self, call: &ToolCall) -> CallOutcome {
        let started = Instant::now();
        match self.try_dispatch(call).await {
            Ok(output) => {
                info!(
                    "Tool '{}' succeeded in {:.0}ms: {}",
                    call.name,
                    started.elapsed().as_secs_f64() * 1000.0,
                    output.summary
                );
                CallOutcome {
                    tool: call.name.clone(),
                    status: CallStatus::Ok,
                    detail: output.summary,
                }
            }
            Err(err) => {
                error!("Tool '{}' failed: {}", call.name, err);
                CallOutcome {
                    tool: call.name.clone(),
                    status: CallStatus::Error,
                    detail: err.to_string(),
                }
            }
        }
    }

    // A failed call does not stop the ones after it
    pub async fn dispatch_all(&self, calls: &[ToolCall]) -> Vec<CallOutcome> {
        let mut outcomes = Vec::with_capacity(calls.len());
        for call in calls {
            outcomes.push(self.dispatch(call).await);
        }
        outcomes
    }

    async fn try_dispatch(&self, call: &ToolCall) -> Result<ToolOutput, ToolError> {
        let entry = self
            .registry
            .get(&call.name)
            .ok_or_else(|| ToolError::UnknownTool(call.name.clone()))?;

        let arguments = parse_arguments(&call.arguments)?;
        check_required(&entry.descriptor, &arguments)?;

        info!("Dispatching '{}' with {}", call.name, arguments);
        entry.handler.call(&self.context, arguments).await
    }
}

fn parse_arguments(raw: &str) -> Result<Value, ToolError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(Value::Object(Default::default()));
    }
    let value: Value = serde_json::from_str(raw)
        .map_err(|e| ToolError::InvalidArguments(format!("arguments are not valid JSON: {e}")))?;
    if !value.is_object() {
        return Err(ToolError::InvalidArguments(
            "arguments must be a JSON object".into(),
        ));
    }
    Ok(value)
}

fn check_required(descriptor: &ToolDescriptor, arguments: &Value) -> Result<(), ToolError> {
    let missing: Vec<&str> = descriptor
        .required_names()
        .filter(|name| arguments.get(name).map_or(true, Value::is_null))
        .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(ToolError::InvalidArguments(format!(
            "missing required argument(s): {}",
            missing.join(", ")
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::registry::{ParamType, ToolHandler};
    use crate::testing::{test_context, ScriptedModel};
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        seen: Mutex<Vec<Value>>,
    }

    struct Echo(Arc<Recorder>);

    #[async_trait]
    impl ToolHandler for Echo {
        fn descriptor(&self) -> ToolDescriptor {
            ToolDescriptor::new("echo", "Echo input")
                .required("input", ParamType::String, "text")
        }

        async fn call(&self, _ctx: &ToolContext, arguments: Value) -> Result<ToolOutput, ToolError> {
            self.0.seen.lock().unwrap().push(arguments.clone());
            Ok(ToolOutput::new(format!("echoed {}", arguments["input"])))
        }
    }

    struct Broken;

    #[async_trait]
    impl ToolHandler for Broken {
        fn descriptor(&self) -> ToolDescriptor {
            ToolDescriptor::new("broken", "Always fails")
        }

        async fn call(&self, _ctx: &ToolContext, _arguments: Value) -> Result<ToolOutput, ToolError> {
            Err(ToolError::InvalidInput("nothing to do".into()))
        }
    }

    fn dispatcher(recorder: Arc<Recorder>) -> Dispatcher {
        let registry = Registry::builder()
            .register(Echo(recorder))
            .register(Broken)
            .build()
            .unwrap();
        let ctx = test_context(Config::default(), Arc::new(ScriptedModel::default()));
        Dispatcher::new(Arc::new(registry), ctx)
    }

    #[tokio::test]
    async fn handler_receives_exact_arguments_once() {
        let recorder = Arc::new(Recorder::default());
        let dispatcher = dispatcher(recorder.clone());

        let outcome = dispatcher
            .dispatch(&ToolCall::new("echo", json!({ "input": "hi" })))
            .await;

        assert!(outcome.is_ok(), "{outcome:?}");
        assert_eq!(*recorder.seen.lock().unwrap(), vec![json!({ "input": "hi" })]);
    }

    #[tokio::test]
    async fn unknown_tool_is_reported() {
        let dispatcher = dispatcher(Arc::new(Recorder::default()));
        let outcome = dispatcher
            .dispatch(&ToolCall::new("launch_rockets", json!({})))
            .await;

        assert_eq!(outcome.status, CallStatus::Error);
        assert!(outcome.detail.contains("unknown tool 'launch_rockets'"));
    }

    #[tokio::test]
    async fn missing_required_argument_skips_handler() {
        let recorder = Arc::new(Recorder::default());
        let dispatcher = dispatcher(recorder.clone());

        let outcome = dispatcher
            .dispatch(&ToolCall::new("echo", json!({ "other": 1 })))
            .await;

        assert_eq!(outcome.status, CallStatus::Error);
        assert!(outcome.detail.contains("input"));
        assert!(recorder.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn malformed_argument_text_is_reported() {
        let dispatcher = dispatcher(Arc::new(Recorder::default()));
        let call = ToolCall {
            id: "call_1".into(),
            name: "echo".into(),
            arguments: "{not json".into(),
        };
        let outcome = dispatcher.dispatch(&call).await;
        assert!(outcome.detail.contains("not valid JSON"));

        let call = ToolCall {
            arguments: "[1, 2]".into(),
            ..call
        };
        let outcome = dispatcher.dispatch(&call).await;
        assert!(outcome.detail.contains("JSON object"));
    }

    #[tokio::test]
    async fn failure_does_not_stop_later_calls() {
        let recorder = Arc::new(Recorder::default());
        let dispatcher = dispatcher(recorder.clone());

        let outcomes = dispatcher
            .dispatch_all(&[
                ToolCall::new("broken", json!({})),
                ToolCall::new("echo", json!({ "input": "after" })),
            ])
            .await;

        assert_eq!(outcomes.len(), 2);
        assert_eq!(outcomes[0].status, CallStatus::Error);
        assert_eq!(outcomes[1].status, CallStatus::Ok);
        assert_eq!(recorder.seen.lock().unwrap().len(), 1);
    }
}
