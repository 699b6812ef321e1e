//! LLM Client — the single point of entry for chat-completion calls.
//!
//! All handlers go through [`Agent`]; the backend itself sits behind the
//! [`ChatTransport`] trait so tests can run without a network.
//!
//! There is no retry or backoff: transport failures are returned to the
//! caller as-is.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tokio::time::{timeout, timeout_at, Instant};
use tracing::{debug, info, warn};

pub mod prompts;
pub mod schema;
#[cfg(test)]
pub mod testing;
pub mod transport;

use crate::llm_client::prompts::system_prompt_for_schema;
use crate::llm_client::transport::{
    AzureTransport, ChatMessage, ChatRequest, ChatTransport, Role,
};

pub const DEFAULT_API_VERSION: &str = "2023-05-15";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);
const DEFAULT_TEMPERATURE: f32 = 0.7;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("missing required azure openai configuration: {0}")]
    Config(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error: {0}")]
    Api(String),

    /// Timeouts and broken streams.
    #[error("transport error: {0}")]
    Transport(String),

    #[error("failed to decode completion: {0}")]
    Decode(serde_json::Error),

    #[error("empty response choices")]
    EmptyChoices,

    #[error("invalid output_schema JSON: {0}")]
    InvalidSchema(serde_json::Error),

    /// The call succeeded but the reply is not JSON. Carries the result so
    /// callers can still show what the model said.
    #[error("JSON parse error: {source}")]
    OutputParse {
        result: Box<ChatResult>,
        source: serde_json::Error,
    },
}

impl LlmError {
    fn timed_out(after: Duration) -> Self {
        LlmError::Transport(format!("request timed out after {after:?}"))
    }

    /// Network, remote and timeout failures, as opposed to configuration,
    /// empty-result or parse problems.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            LlmError::Http(_) | LlmError::Api(_) | LlmError::Transport(_) | LlmError::Decode(_)
        )
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Configuration
// ────────────────────────────────────────────────────────────────────────────

/// Connection settings for the chat backend. The library never reads the
/// environment; see `config::Config::from_env` for that.
#[derive(Clone)]
pub struct AgentConfig {
    pub key: String,
    pub endpoint: String,
    /// Logical model name sent in requests.
    pub model: String,
    /// Azure deployment serving `model`. Falls back to `model` when unset.
    pub deployment: Option<String>,
    pub api_version: String,
    pub timeout: Duration,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            key: String::new(),
            endpoint: String::new(),
            model: String::new(),
            deployment: None,
            api_version: DEFAULT_API_VERSION.to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl fmt::Debug for AgentConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AgentConfig")
            .field("key", &"<redacted>")
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .field("deployment", &self.deployment)
            .field("api_version", &self.api_version)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl AgentConfig {
    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = key.into();
        self
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_deployment(mut self, deployment: impl Into<String>) -> Self {
        self.deployment = Some(deployment.into());
        self
    }

    pub fn with_api_version(mut self, api_version: impl Into<String>) -> Self {
        self.api_version = api_version.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn deployment(&self) -> &str {
        match self.deployment.as_deref() {
            Some(d) if !d.is_empty() => d,
            _ => &self.model,
        }
    }

    pub fn validate(&self) -> Result<(), LlmError> {
        let missing: Vec<&str> = [
            ("key", &self.key),
            ("endpoint", &self.endpoint),
            ("model", &self.model),
        ]
        .into_iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(name, _)| name)
        .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(LlmError::Config(missing.join(", ")))
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Per-call options and results
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct ChatOptions {
    pub system: Option<String>,
    pub temperature: f32,
    /// `None` lets the backend decide.
    pub max_tokens: Option<u32>,
    /// JSON Schema the reply should follow. Injected as a system instruction.
    pub output_schema: Option<String>,
}

impl Default for ChatOptions {
    fn default() -> Self {
        Self {
            system: None,
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: None,
            output_schema: None,
        }
    }
}

impl ChatOptions {
    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_output_schema(mut self, schema: impl Into<String>) -> Self {
        self.output_schema = Some(schema.into());
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ChatResult {
    pub text: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub model: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub finish_reason: String,
    #[serde(skip_serializing_if = "is_zero")]
    pub tokens: u32,
}

fn is_zero(n: &u32) -> bool {
    *n == 0
}

/// A chat result together with its reply parsed as JSON.
#[derive(Debug, Clone, PartialEq)]
pub struct StructuredChat {
    pub result: ChatResult,
    pub parsed: Value,
}

// ────────────────────────────────────────────────────────────────────────────
// Agent
// ────────────────────────────────────────────────────────────────────────────

/// Thin wrapper over a [`ChatTransport`] for single-turn chats.
#[derive(Clone)]
pub struct Agent {
    config: AgentConfig,
    transport: Arc<dyn ChatTransport>,
}

impl Agent {
    pub fn new(config: AgentConfig, transport: Arc<dyn ChatTransport>) -> Result<Self, LlmError> {
        config.validate()?;
        Ok(Self { config, transport })
    }

    /// Builds an agent backed by Azure OpenAI.
    pub fn azure(config: AgentConfig) -> Result<Self, LlmError> {
        config.validate()?;
        let transport = AzureTransport::new(&config)?;
        info!(
            model = %config.model,
            deployment = %config.deployment(),
            "Azure OpenAI transport initialized"
        );
        Self::new(config, Arc::new(transport))
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    fn build_request(&self, prompt: &str, options: &ChatOptions) -> Result<ChatRequest, LlmError> {
        let mut messages = Vec::with_capacity(3);

        if let Some(schema) = options.output_schema.as_deref().filter(|s| !s.trim().is_empty()) {
            serde_json::from_str::<Value>(schema).map_err(LlmError::InvalidSchema)?;
            messages.push(ChatMessage {
                role: Role::System,
                content: system_prompt_for_schema(schema),
            });
        }
        if let Some(system) = options.system.as_deref().filter(|s| !s.is_empty()) {
            messages.push(ChatMessage {
                role: Role::System,
                content: system.to_string(),
            });
        }
        messages.push(ChatMessage {
            role: Role::User,
            content: prompt.to_string(),
        });

        Ok(ChatRequest {
            model: self.config.model.clone(),
            messages,
            temperature: options.temperature,
            max_tokens: options.max_tokens.filter(|n| *n > 0),
        })
    }

    /// Sends a single-turn prompt and returns the first choice.
    pub async fn chat(&self, prompt: &str, options: &ChatOptions) -> Result<ChatResult, LlmError> {
        let request = self.build_request(prompt, options)?;
        let limit = self.config.timeout;

        let completion = timeout(limit, self.transport.complete(&request))
            .await
            .map_err(|_| LlmError::timed_out(limit))??;

        let tokens = completion.total_tokens;
        let model = completion.model;
        let choice = completion
            .choices
            .into_iter()
            .next()
            .ok_or(LlmError::EmptyChoices)?;

        debug!(%model, tokens, "chat completion succeeded");

        Ok(ChatResult {
            text: choice.content.unwrap_or_default(),
            model,
            finish_reason: choice.finish_reason.unwrap_or_default(),
            tokens,
        })
    }

    /// Chats, then parses the reply as JSON.
    ///
    /// A reply that is not JSON yields [`LlmError::OutputParse`], which still
    /// carries the successful result.
    pub async fn chat_json(
        &self,
        prompt: &str,
        options: &ChatOptions,
    ) -> Result<StructuredChat, LlmError> {
        let result = self.chat(prompt, options).await?;

        match serde_json::from_str::<Value>(strip_json_fences(&result.text)) {
            Ok(parsed) => Ok(StructuredChat { result, parsed }),
            Err(source) => {
                warn!("model reply is not valid JSON: {source}");
                debug!(raw = %result.text, "unparseable model reply");
                Err(LlmError::OutputParse {
                    result: Box::new(result),
                    source,
                })
            }
        }
    }

    /// Streams the reply, handing each non-empty text delta to `on_delta`.
    ///
    /// Returning `false` from `on_delta` stops early; the stream is dropped,
    /// which cancels the request. The timeout covers the whole call.
    pub async fn chat_stream<F>(
        &self,
        prompt: &str,
        options: &ChatOptions,
        mut on_delta: F,
    ) -> Result<ChatResult, LlmError>
    where
        F: FnMut(&str) -> bool,
    {
        let request = self.build_request(prompt, options)?;
        let limit = self.config.timeout;
        let deadline = Instant::now() + limit;

        let mut stream = timeout_at(deadline, self.transport.stream(&request))
            .await
            .map_err(|_| LlmError::timed_out(limit))??;

        let mut text = String::new();
        let mut finish_reason = String::new();

        loop {
            let next = timeout_at(deadline, stream.next())
                .await
                .map_err(|_| LlmError::timed_out(limit))?;
            let Some(chunk) = next else { break };
            let Some(choice) = chunk?.choices.into_iter().next() else {
                continue;
            };
            if let Some(reason) = choice.finish_reason {
                finish_reason = reason;
            }
            let Some(delta) = choice.content.filter(|d| !d.is_empty()) else {
                continue;
            };
            text.push_str(&delta);
            if !on_delta(&delta) {
                debug!("stream handler requested stop");
                break;
            }
        }

        Ok(ChatResult {
            text,
            model: self.config.model.clone(),
            finish_reason,
            tokens: 0,
        })
    }
}

/// Strips ```json ... ``` or ``` ... ``` code fences from LLM output.
fn strip_json_fences(text: &str) -> &str {
    let text = text.trim();
    let inner = text
        .strip_prefix("```json")
        .or_else(|| text.strip_prefix("```"));
    match inner {
        Some(stripped) => {
            let stripped = stripped.trim_start();
            stripped
                .strip_suffix("```")
                .map(str::trim)
                .unwrap_or(stripped)
        }
        None => text,
    }
}
