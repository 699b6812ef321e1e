//! Chat transport — the narrow capability the agent needs from a chat backend.
//!
//! `AzureTransport` delegates to the `async_openai` client configured for
//! Azure OpenAI. Tests substitute a stub implementing [`ChatTransport`].

use std::time::Duration;

use async_openai::{
    config::AzureConfig,
    error::OpenAIError,
    types::{
        ChatCompletionRequestMessage, CreateChatCompletionRequest, CreateChatCompletionResponse,
        CreateChatCompletionStreamResponse, FinishReason,
    },
    Client,
};
use async_trait::async_trait;
use backoff::ExponentialBackoffBuilder;
use futures_util::stream::{BoxStream, StreamExt};
use serde_json::Value;
use tracing::debug;

use super::{AgentConfig, LlmError};

const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

/// Stream of completion chunks, each carrying a text delta.
pub type ChunkStream = BoxStream<'static, Result<CompletionChunk, LlmError>>;

/// Single-shot and streaming chat completion.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    async fn complete(&self, request: &ChatRequest) -> Result<Completion, LlmError>;

    /// Opens a streaming completion. Dropping the returned stream closes the
    /// underlying connection.
    async fn stream(&self, request: &ChatRequest) -> Result<ChunkStream, LlmError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    System,
    User,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub temperature: f32,
    pub max_tokens: Option<u32>,
}

/// One choice of a completion, or of a streamed chunk (where `content` is
/// the delta).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Choice {
    /// `None` when the content filter suppresses the reply.
    pub content: Option<String>,
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Completion {
    pub model: String,
    pub choices: Vec<Choice>,
    pub total_tokens: u32,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompletionChunk {
    pub choices: Vec<Choice>,
}

// ────────────────────────────────────────────────────────────────────────────
// Azure OpenAI
// ────────────────────────────────────────────────────────────────────────────

/// Azure OpenAI chat completions through `async_openai`.
///
/// Every request goes to the configured deployment. The client's own retry
/// on rate limits is switched off; failures reach the caller unchanged.
#[derive(Clone)]
pub struct AzureTransport {
    client: Client<AzureConfig>,
}

impl AzureTransport {
    pub fn new(config: &AgentConfig) -> Result<Self, LlmError> {
        let azure = AzureConfig::new()
            .with_api_base(config.endpoint.trim_end_matches('/'))
            .with_api_key(config.key.as_str())
            .with_deployment_id(config.deployment())
            .with_api_version(config.api_version.as_str());
        let http_client = reqwest::ClientBuilder::new().user_agent(USER_AGENT).build()?;
        let no_retry = ExponentialBackoffBuilder::new()
            .with_max_elapsed_time(Some(Duration::ZERO))
            .build();

        let client = Client::with_config(azure)
            .with_http_client(http_client)
            .with_backoff(no_retry);
        Ok(Self { client })
    }
}

#[async_trait]
impl ChatTransport for AzureTransport {
    async fn complete(&self, request: &ChatRequest) -> Result<Completion, LlmError> {
        debug!(model = %request.model, "sending chat completion");
        let response = self.client.chat().create(to_openai_request(request)).await?;
        Ok(completion_from_response(response))
    }

    async fn stream(&self, request: &ChatRequest) -> Result<ChunkStream, LlmError> {
        debug!(model = %request.model, "opening chat completion stream");
        let stream = self
            .client
            .chat()
            .create_stream(to_openai_request(request))
            .await?;
        Ok(stream
            .map(|item| item.map(chunk_from_response).map_err(LlmError::from))
            .boxed())
    }
}

fn to_openai_request(request: &ChatRequest) -> CreateChatCompletionRequest {
    CreateChatCompletionRequest {
        model: request.model.clone(),
        messages: request.messages.iter().map(to_openai_message).collect(),
        temperature: Some(request.temperature),
        max_tokens: request.max_tokens,
        ..Default::default()
    }
}

fn to_openai_message(message: &ChatMessage) -> ChatCompletionRequestMessage {
    match message.role {
        Role::System => ChatCompletionRequestMessage::System(message.content.clone().into()),
        Role::User => ChatCompletionRequestMessage::User(message.content.clone().into()),
    }
}

fn completion_from_response(response: CreateChatCompletionResponse) -> Completion {
    Completion {
        model: response.model,
        total_tokens: response.usage.map(|u| u.total_tokens).unwrap_or_default(),
        choices: response
            .choices
            .into_iter()
            .map(|choice| Choice {
                content: choice.message.content,
                finish_reason: choice.finish_reason.and_then(finish_reason_name),
            })
            .collect(),
    }
}

fn chunk_from_response(response: CreateChatCompletionStreamResponse) -> CompletionChunk {
    CompletionChunk {
        choices: response
            .choices
            .into_iter()
            .map(|choice| Choice {
                content: choice.delta.content,
                finish_reason: choice.finish_reason.and_then(finish_reason_name),
            })
            .collect(),
    }
}

/// The wire name, e.g. `stop` or `content_filter`.
fn finish_reason_name(reason: FinishReason) -> Option<String> {
    match serde_json::to_value(reason).ok()? {
        Value::String(name) => Some(name),
        _ => None,
    }
}

impl From<OpenAIError> for LlmError {
    fn from(err: OpenAIError) -> Self {
        match err {
            OpenAIError::Reqwest(e) => LlmError::Http(e),
            OpenAIError::ApiError(e) => LlmError::Api(e.message),
            OpenAIError::JSONDeserialize(e) => LlmError::Decode(e),
            other => LlmError::Transport(other.to_string()),
        }
    }
}
