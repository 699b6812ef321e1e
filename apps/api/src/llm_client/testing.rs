//! Stub transport for tests; no network involved.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::stream::{self, StreamExt};

use super::transport::{
    ChatRequest, ChatTransport, Choice, ChunkStream, Completion, CompletionChunk,
};
use super::{AgentConfig, LlmError};

pub const TEST_MODEL: &str = "gpt-test";

pub fn test_config() -> AgentConfig {
    AgentConfig::default()
        .with_key("test-key")
        .with_endpoint("https://unit-test.openai.azure.com")
        .with_model(TEST_MODEL)
}

#[derive(Default)]
pub struct StubTransport {
    completion: Completion,
    failure: Option<String>,
    chunks: Vec<String>,
    delay: Option<Duration>,
    requests: Mutex<Vec<ChatRequest>>,
    pulled: Arc<AtomicUsize>,
}

impl StubTransport {
    /// Replies with `text`, model `gpt-test`, finish reason `stop`, 5 tokens.
    pub fn replying(text: &str) -> Self {
        Self {
            completion: Completion {
                model: TEST_MODEL.to_string(),
                choices: vec![Choice {
                    content: Some(text.to_string()),
                    finish_reason: Some("stop".to_string()),
                }],
                total_tokens: 5,
            },
            ..Self::default()
        }
    }

    pub fn without_choices() -> Self {
        Self {
            completion: Completion {
                model: TEST_MODEL.to_string(),
                ..Completion::default()
            },
            ..Self::default()
        }
    }

    /// Fails every call with an API error carrying `message`.
    pub fn failing(message: &str) -> Self {
        Self {
            failure: Some(message.to_string()),
            ..Self::default()
        }
    }

    /// Streams one chunk per entry; the last carries finish reason `stop`.
    pub fn streaming(chunks: &[&str]) -> Self {
        Self {
            chunks: chunks.iter().map(|c| c.to_string()).collect(),
            ..Self::default()
        }
    }

    /// Delays the completion, or each streamed chunk.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn chunks_pulled(&self) -> usize {
        self.pulled.load(Ordering::SeqCst)
    }

    fn record(&self, request: &ChatRequest) -> Result<(), LlmError> {
        self.requests.lock().unwrap().push(request.clone());
        match &self.failure {
            Some(message) => Err(LlmError::Api(message.clone())),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl ChatTransport for StubTransport {
    async fn complete(&self, request: &ChatRequest) -> Result<Completion, LlmError> {
        self.record(request)?;
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        Ok(self.completion.clone())
    }

    async fn stream(&self, request: &ChatRequest) -> Result<ChunkStream, LlmError> {
        self.record(request)?;
        let last = self.chunks.len().saturating_sub(1);
        let delay = self.delay;
        let pulled = self.pulled.clone();
        let chunks = self.chunks.clone().into_iter().enumerate();

        Ok(stream::iter(chunks)
            .then(move |(i, text)| {
                let pulled = pulled.clone();
                async move {
                    if let Some(delay) = delay {
                        tokio::time::sleep(delay).await;
                    }
                    pulled.fetch_add(1, Ordering::SeqCst);
                    Ok(CompletionChunk {
                        choices: vec![Choice {
                            content: Some(text),
                            finish_reason: (i == last).then(|| "stop".to_string()),
                        }],
                    })
                }
            })
            .boxed())
    }
}
