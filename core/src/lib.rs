//! Task-to-tool dispatch: configuration, the tool registry, the dispatcher,
//! the language-model client and the task orchestration that ties them together.

pub mod config;
pub mod dispatch;
pub mod error;
pub mod llm;
pub mod registry;
pub mod retry;
pub mod task;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use config::Config;
pub use dispatch::{CallOutcome, CallStatus, Dispatcher, ToolCall};
pub use error::{LlmError, ToolError};
pub use llm::{http_client, Brain, LanguageModel};
pub use registry::{
    ParamType, Parameter, Registry, RegistryError, ToolContext, ToolDescriptor, ToolHandler,
    ToolOutput,
};
pub use retry::{RetryPolicy, Retryable};
pub use task::{TaskError, TaskReport, TaskRunner};
