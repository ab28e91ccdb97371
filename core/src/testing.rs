//! Scripted language model for tests.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::config::Config;
use crate::dispatch::ToolCall;
use crate::error::LlmError;
use crate::llm::LanguageModel;
use crate::registry::{ToolContext, ToolDescriptor};

/// Returns queued answers in order and records every prompt it sees.
#[derive(Default)]
pub struct ScriptedModel {
    plans: Mutex<VecDeque<Result<Vec<ToolCall>, LlmError>>>,
    completions: Mutex<VecDeque<Result<String, LlmError>>>,
    embeddings: Mutex<HashMap<String, Vec<f32>>>,
    prompts: Mutex<Vec<String>>,
    offered_tools: Mutex<Vec<Vec<String>>>,
}

impl ScriptedModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_plan(self, calls: Vec<ToolCall>) -> Self {
        self.plans.lock().unwrap().push_back(Ok(calls));
        self
    }

    pub fn with_plan_error(self, err: LlmError) -> Self {
        self.plans.lock().unwrap().push_back(Err(err));
        self
    }

    pub fn with_completion(self, text: impl Into<String>) -> Self {
        self.completions.lock().unwrap().push_back(Ok(text.into()));
        self
    }

    pub fn with_completion_error(self, err: LlmError) -> Self {
        self.completions.lock().unwrap().push_back(Err(err));
        self
    }

    pub fn with_embedding(self, text: impl Into<String>, vector: Vec<f32>) -> Self {
        self.embeddings.lock().unwrap().insert(text.into(), vector);
        self
    }

    /// Number of planning requests received so far.
    pub fn plan_calls(&self) -> usize {
        self.offered_tools.lock().unwrap().len()
    }

    /// Tool names offered on each planning request.
    pub fn offered_tools(&self) -> Vec<Vec<String>> {
        self.offered_tools.lock().unwrap().clone()
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }

    fn next_completion(&self, prompt: &str) -> Result<String, LlmError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        self.completions
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(LlmError::InvalidResponse("no scripted completion".into())))
    }
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    async fn plan(&self, task: &str, tools: &[ToolDescriptor]) -> Result<Vec<ToolCall>, LlmError> {
        self.prompts.lock().unwrap().push(task.to_string());
        self.offered_tools
            .lock()
            .unwrap()
            .push(tools.iter().map(|t| t.name.clone()).collect());
        self.plans
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(Vec::new()))
    }

    async fn complete(&self, prompt: &str) -> Result<String, LlmError> {
        self.next_completion(prompt)
    }

    async fn describe_image(&self, prompt: &str, image_url: &str) -> Result<String, LlmError> {
        self.next_completion(&format!("{prompt}\n{image_url}"))
    }

    async fn embed(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, LlmError> {
        let table = self.embeddings.lock().unwrap();
        inputs
            .iter()
            .map(|text| {
                table
                    .get(text)
                    .cloned()
                    .ok_or_else(|| LlmError::InvalidResponse(format!("no embedding for '{text}'")))
            })
            .collect()
    }
}

/// Tool context around `model` with a plain HTTP client that ignores proxy settings.
pub fn test_context(config: Config, model: Arc<dyn LanguageModel>) -> ToolContext {
    let http = reqwest::Client::builder()
        .no_proxy()
        .build()
        .unwrap_or_default();
    ToolContext::new(Arc::new(config), model, http)
}
