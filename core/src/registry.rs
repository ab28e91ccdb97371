use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Map, Value};
use thiserror::Error;

use crate::config::Config;
use crate::error::ToolError;
use crate::llm::LanguageModel;
use crate::retry::RetryPolicy;

/// JSON type of a tool parameter, as advertised to the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamType {
    String,
    Integer,
    StringArray,
}

impl ParamType {
    fn schema(self, description: &str) -> Value {
        match self {
            ParamType::String => json!({ "type": "string", "description": description }),
            ParamType::Integer => json!({ "type": "integer", "description": description }),
            ParamType::StringArray => json!({
                "type": "array",
                "items": { "type": "string" },
                "description": description,
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Parameter {
    pub name: String,
    pub kind: ParamType,
    pub description: String,
    pub required: bool,
}

/// Name, description and parameter list of one tool.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    pub parameters: Vec<Parameter>,
}

impl ToolDescriptor {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters: Vec::new(),
        }
    }

    pub fn required(self, name: &str, kind: ParamType, description: &str) -> Self {
        self.param(name, kind, description, true)
    }

    pub fn optional(self, name: &str, kind: ParamType, description: &str) -> Self {
        self.param(name, kind, description, false)
    }

    fn param(mut self, name: &str, kind: ParamType, description: &str, required: bool) -> Self {
        self.parameters.push(Parameter {
            name: name.to_string(),
            kind,
            description: description.to_string(),
            required,
        });
        self
    }

    pub fn required_names(&self) -> impl Iterator<Item = &str> {
        self.parameters
            .iter()
            .filter(|p| p.required)
            .map(|p| p.name.as_str())
    }

    /// JSON Schema object for the function-calling API.
    pub fn parameters_schema(&self) -> Value {
        let properties: Map<String, Value> = self
            .parameters
            .iter()
            .map(|p| (p.name.clone(), p.kind.schema(&p.description)))
            .collect();
        let required: Vec<&str> = self.required_names().collect();

        json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }
}

/// Everything a handler may reach for while running.
#[derive(Clone)]
pub struct ToolContext {
    pub config: Arc<Config>,
    pub llm: Arc<dyn LanguageModel>,
    pub http: reqwest::Client,
}

impl ToolContext {
    pub fn new(config: Arc<Config>, llm: Arc<dyn LanguageModel>, http: reqwest::Client) -> Self {
        Self { config, llm, http }
    }

    pub fn retry(&self) -> &RetryPolicy {
        &self.config.retry
    }
}

impl fmt::Debug for ToolContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolContext")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// What a handler reports back; the real result lives in its destination file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolOutput {
    pub summary: String,
}

impl ToolOutput {
    pub fn new(summary: impl Into<String>) -> Self {
        Self {
            summary: summary.into(),
        }
    }
}

/// A tool the model can select. Each handler owns its descriptor, so the
/// catalog and the dispatch table cannot drift apart.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    fn descriptor(&self) -> ToolDescriptor;

    /// Run the tool. `arguments` is the JSON object produced by the model.
    async fn call(&self, ctx: &ToolContext, arguments: Value) -> Result<ToolOutput, ToolError>;
}

/// Deserialize tool arguments into the handler's typed argument struct.
pub fn parse_args<T: DeserializeOwned>(arguments: Value) -> Result<T, ToolError> {
    serde_json::from_value(arguments).map_err(|e| ToolError::InvalidArguments(e.to_string()))
}

#[derive(Debug, Error, PartialEq)]
pub enum RegistryError {
    #[error("tool '{0}' is registered more than once")]
    DuplicateTool(String),

    #[error("tool '{tool}' declares parameter '{parameter}' more than once")]
    DuplicateParameter { tool: String, parameter: String },
}

pub struct RegistryEntry {
    pub descriptor: ToolDescriptor,
    pub handler: Arc<dyn ToolHandler>,
}

/// Ordered tool catalog plus the name-to-handler table.
pub struct Registry {
    entries: Vec<RegistryEntry>,
    index: HashMap<String, usize>,
}

impl Registry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::default()
    }

    /// Descriptors in registration order, as sent to the model.
    pub fn descriptors(&self) -> impl Iterator<Item = &ToolDescriptor> {
        self.entries.iter().map(|e| &e.descriptor)
    }

    pub fn get(&self, name: &str) -> Option<&RegistryEntry> {
        self.index.get(name).map(|&i| &self.entries[i])
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field(
                "tools",
                &self.descriptors().map(|d| d.name.as_str()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

#[derive(Default)]
pub struct RegistryBuilder {
    handlers: Vec<Arc<dyn ToolHandler>>,
}

impl RegistryBuilder {
    pub fn register(mut self, handler: impl ToolHandler + 'static) -> Self {
        self.handlers.push(Arc::new(handler));
        self
    }

    pub fn register_shared(mut self, handler: Arc<dyn ToolHandler>) -> Self {
        self.handlers.push(handler);
        self
    }

    pub fn build(self) -> Result<Registry, RegistryError> {
        let mut entries = Vec::with_capacity(self.handlers.len());
        let mut index = HashMap::with_capacity(self.handlers.len());

        for handler in self.handlers {
            let descriptor = handler.descriptor();

            let mut seen = HashSet::new();
            for param in &descriptor.parameters {
                if !seen.insert(param.name.as_str()) {
                    return Err(RegistryError::DuplicateParameter {
                        tool: descriptor.name.clone(),
                        parameter: param.name.clone(),
                    });
                }
            }

            if index.insert(descriptor.name.clone(), entries.len()).is_some() {
                return Err(RegistryError::DuplicateTool(descriptor.name));
            }
            entries.push(RegistryEntry { descriptor, handler });
        }

        Ok(Registry { entries, index })
    }
}
