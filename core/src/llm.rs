use async_openai::{
    config::OpenAIConfig,
    error::OpenAIError,
    types::{
        ChatCompletionRequestMessage, ChatCompletionRequestMessageContentPartImageArgs,
        ChatCompletionRequestMessageContentPartTextArgs, ChatCompletionRequestUserMessageArgs,
        ChatCompletionRequestUserMessageContentPart, ChatCompletionTool, ChatCompletionToolArgs,
        ChatCompletionToolType, CreateChatCompletionRequest, CreateChatCompletionRequestArgs,
        CreateChatCompletionResponse, CreateEmbeddingRequestArgs, FunctionObjectArgs, ImageUrlArgs,
    },
    Client,
};
use async_trait::async_trait;
use tracing::{debug, info};

use crate::config::Config;
use crate::dispatch::ToolCall;
use crate::error::LlmError;
use crate::registry::ToolDescriptor;
use crate::retry::{self, RetryPolicy};

// Most inputs the embeddings endpoint accepts in one request
const EMBEDDING_BATCH_LIMIT: usize = 2048;

/// The operations the service needs from a language model.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Offer `tools` for `task` and return the calls the model chose, in order.
    async fn plan(&self, task: &str, tools: &[ToolDescriptor]) -> Result<Vec<ToolCall>, LlmError>;

    async fn complete(&self, prompt: &str) -> Result<String, LlmError>;

    /// Single-turn completion over text plus one image given as a data URL.
    async fn describe_image(&self, prompt: &str, image_url: &str) -> Result<String, LlmError>;

    /// One embedding per input, in input order.
    async fn embed(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, LlmError>;
}

/// Shared HTTP client for outbound calls. Every request is bounded by the attempt timeout.
pub fn http_client(config: &Config) -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(concat!("opsgate/", env!("CARGO_PKG_VERSION")))
        .timeout(config.retry.attempt_timeout)
        .build()
}

/// OpenAI-compatible chat and embedding client.
pub struct Brain {
    client: Client<OpenAIConfig>,
    chat_model: String,
    embedding_model: String,
    retry: RetryPolicy,
}

impl Brain {
    pub fn new(config: &Config, http: reqwest::Client) -> Self {
        let openai = OpenAIConfig::new()
            .with_api_base(&config.api_base)
            .with_api_key(config.api_token.clone().unwrap_or_default());
        let client = Client::with_config(openai).with_http_client(http);

        info!(
            "Brain configured. Base: {}, model: {}",
            config.api_base, config.chat_model
        );
        Self {
            client,
            chat_model: config.chat_model.clone(),
            embedding_model: config.embedding_model.clone(),
            retry: config.retry.clone(),
        }
    }

    // Quick connectivity check used at startup
    pub async fn ping(&self) -> Result<String, LlmError> {
        self.complete("Hello! Reply with 'System Online'.").await
    }

    async fn chat(
        &self,
        label: &str,
        request: CreateChatCompletionRequest,
    ) -> Result<CreateChatCompletionResponse, LlmError> {
        let client = &self.client;
        let request = &request;
        retry::run(&self.retry, label, || async move {
            client
                .chat()
                .create(request.clone())
                .await
                .map_err(LlmError::from)
        })
        .await
    }

    async fn single_message(
        &self,
        label: &str,
        message: ChatCompletionRequestMessage,
    ) -> Result<String, LlmError> {
        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.chat_model)
            .messages([message])
            .build()?;
        let response = self.chat(label, request).await?;

        response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .map(|content| content.trim().to_string())
            .ok_or_else(|| LlmError::InvalidResponse("completion has no text content".into()))
    }

    async fn embed_batch(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, LlmError> {
        let request = CreateEmbeddingRequestArgs::default()
            .model(&self.embedding_model)
            .input(inputs.to_vec())
            .build()?;

        let client = &self.client;
        let request = &request;
        let response = retry::run(&self.retry, "embedding", || async move {
            client
                .embeddings()
                .create(request.clone())
                .await
                .map_err(LlmError::from)
        })
        .await?;

        if response.data.len() != inputs.len() {
            return Err(LlmError::InvalidResponse(format!(
                "expected {} embeddings, got {}",
                inputs.len(),
                response.data.len()
            )));
        }
        let mut data = response.data;
        data.sort_by_key(|e| e.index);
        Ok(data.into_iter().map(|e| e.embedding).collect())
    }
}

#[async_trait]
impl LanguageModel for Brain {
    async fn plan(&self, task: &str, tools: &[ToolDescriptor]) -> Result<Vec<ToolCall>, LlmError> {
        let mut args = CreateChatCompletionRequestArgs::default();
        args.model(&self.chat_model).messages([user_text(task)?]);
        if !tools.is_empty() {
            args.tools(to_openai_tools(tools)?);
        }
        let request = args.build()?;

        let response = self.chat("tool planning", request).await?;
        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| LlmError::InvalidResponse("response has no choices".into()))?;

        let calls: Vec<ToolCall> = choice
            .message
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .map(|call| ToolCall {
                id: call.id,
                name: call.function.name,
                arguments: call.function.arguments,
            })
            .collect();

        debug!("Model selected {} tool call(s)", calls.len());
        Ok(calls)
    }

    async fn complete(&self, prompt: &str) -> Result<String, LlmError> {
        self.single_message("completion", user_text(prompt)?).await
    }

    async fn describe_image(&self, prompt: &str, image_url: &str) -> Result<String, LlmError> {
        let text = ChatCompletionRequestMessageContentPartTextArgs::default()
            .text(prompt)
            .build()?;
        let image = ChatCompletionRequestMessageContentPartImageArgs::default()
            .image_url(ImageUrlArgs::default().url(image_url).build()?)
            .build()?;
        let message = ChatCompletionRequestUserMessageArgs::default()
            .content(vec![
                ChatCompletionRequestUserMessageContentPart::Text(text),
                ChatCompletionRequestUserMessageContentPart::ImageUrl(image),
            ])
            .build()?;

        self.single_message("image completion", ChatCompletionRequestMessage::User(message))
            .await
    }

    async fn embed(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, LlmError> {
        let mut vectors = Vec::with_capacity(inputs.len());
        for batch in inputs.chunks(EMBEDDING_BATCH_LIMIT) {
            vectors.extend(self.embed_batch(batch).await?);
        }
        Ok(vectors)
    }
}

fn user_text(text: &str) -> Result<ChatCompletionRequestMessage, LlmError> {
    Ok(ChatCompletionRequestMessage::User(
        ChatCompletionRequestUserMessageArgs::default()
            .content(text)
            .build()?,
    ))
}

/// Convert registry descriptors into function-calling tool definitions.
pub fn to_openai_tools(tools: &[ToolDescriptor]) -> Result<Vec<ChatCompletionTool>, LlmError> {
    tools
        .iter()
        .map(|t| {
            let function = FunctionObjectArgs::default()
                .name(&t.name)
                .description(&t.description)
                .parameters(t.parameters_schema())
                .build()?;
            Ok(ChatCompletionToolArgs::default()
                .r#type(ChatCompletionToolType::Function)
                .function(function)
                .build()?)
        })
        .collect()
}

impl From<OpenAIError> for LlmError {
    fn from(err: OpenAIError) -> Self {
        match err {
            OpenAIError::Reqwest(e) => LlmError::Transport(e.to_string()),
            // async-openai only retries 429 itself; server faults come back as permanent
            OpenAIError::ApiError(e) if e.r#type.as_deref() == Some("server_error") => {
                LlmError::Unavailable(e.to_string())
            }
            OpenAIError::ApiError(e) => LlmError::Api(e.to_string()),
            OpenAIError::JSONDeserialize(e) => LlmError::InvalidResponse(e.to_string()),
            OpenAIError::InvalidArgument(message) => LlmError::Request(message),
            other => LlmError::Api(other.to_string()),
        }
    }
}
