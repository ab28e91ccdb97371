use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::retry::Retryable;

/// Failures talking to the language-model service.
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// The service reported a fault on its side (`server_error`).
    #[error("service unavailable: {0}")]
    Unavailable(String),

    #[error("API error: {0}")]
    Api(String),

    /// The service answered but the payload was not what we asked for.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    // Request could not be built from our inputs
    #[error("invalid request: {0}")]
    Request(String),
}

impl Retryable for LlmError {
    fn is_retryable(&self) -> bool {
        matches!(
            self,
            LlmError::Transport(_) | LlmError::Timeout(_) | LlmError::Unavailable(_)
        )
    }

    fn timed_out(after: Duration) -> Self {
        LlmError::Timeout(after)
    }
}

/// Failures raised while dispatching or running a tool.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("unknown tool '{0}'")]
    UnknownTool(String),

    #[error("invalid arguments: {0}")]
    InvalidArguments(String),

    /// The arguments were well-formed but the input data was not usable.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} failed: {message}")]
    Process { program: String, message: String },

    #[error("{program} did not finish within {after:?}")]
    ProcessTimeout { program: String, after: Duration },

    #[error("HTTP request failed: {message}")]
    Http { message: String, retryable: bool },

    #[error(transparent)]
    Llm(#[from] LlmError),

    #[error("database error: {0}")]
    Database(String),
}

impl ToolError {
    /// Create an I/O error with path context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn process(program: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Process {
            program: program.into(),
            message: message.into(),
        }
    }

    /// Put `operation` in place of the generic name carried by a retry timeout.
    pub fn for_operation(self, operation: &str) -> Self {
        match self {
            ToolError::ProcessTimeout { after, .. } => ToolError::ProcessTimeout {
                program: operation.to_string(),
                after,
            },
            other => other,
        }
    }
}

impl Retryable for ToolError {
    fn is_retryable(&self) -> bool {
        match self {
            ToolError::ProcessTimeout { .. } => true,
            ToolError::Http { retryable, .. } => *retryable,
            ToolError::Llm(err) => err.is_retryable(),
            _ => false,
        }
    }

    fn timed_out(after: Duration) -> Self {
        ToolError::ProcessTimeout {
            program: "operation".to_string(),
            after,
        }
    }
}
