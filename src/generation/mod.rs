//! Chat-completion delegate used for answers, summaries, and tag extraction.
//!
//! The orchestrator treats generation as a black box behind [`ChatClient`]. The bundled
//! adapter targets OpenAI-compatible `/v1/chat/completions` endpoints; request latency
//! and token usage are captured for the response envelope.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Instant;
use thiserror::Error;

use crate::config::get_config;

const DEFAULT_OPENAI_URL: &str = "https://api.openai.com";

/// Errors surfaced while attempting chat completion.
#[derive(Debug, Error)]
pub enum GenerationError {
    /// Provider was unreachable.
    #[error("Chat provider unavailable: {0}")]
    ProviderUnavailable(String),
    /// Provider returned an error response.
    #[error("Failed to generate completion: {0}")]
    GenerationFailed(String),
    /// Provider response could not be parsed.
    #[error("Malformed provider response: {0}")]
    InvalidResponse(String),
}

/// Single message in a chat exchange.
#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage {
    /// Message role (`system` | `user` | `assistant`).
    pub role: String,
    /// Message text.
    pub content: String,
}

impl ChatMessage {
    /// Build a system-role message.
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".into(),
            content: content.into(),
        }
    }

    /// Build a user-role message.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".into(),
            content: content.into(),
        }
    }
}

/// Request payload passed to the chat provider.
#[derive(Debug, Clone)]
pub struct ChatRequest {
    /// Fully qualified model identifier understood by the provider.
    pub model: String,
    /// Conversation history, system prompt first.
    pub messages: Vec<ChatMessage>,
    /// Sampling temperature.
    pub temperature: f32,
    /// Maximum completion tokens.
    pub max_tokens: u32,
}

/// Completion returned by the chat provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatCompletion {
    /// Generated text.
    pub text: String,
    /// Prompt tokens consumed, when reported.
    pub prompt_tokens: Option<u64>,
    /// Completion tokens produced, when reported.
    pub completion_tokens: Option<u64>,
    /// Wall-clock latency of the provider call in milliseconds.
    pub latency_ms: u64,
}

/// Interface implemented by chat-completion providers.
#[async_trait]
pub trait ChatClient: Send + Sync {
    /// Generate a completion for the supplied conversation.
    async fn complete(&self, request: ChatRequest) -> Result<ChatCompletion, GenerationError>;
}

/// Build a chat client from configuration.
pub fn get_chat_client() -> Box<dyn ChatClient + Send + Sync> {
    let config = get_config();
    let base_url = config
        .openai_base_url
        .clone()
        .unwrap_or_else(|| DEFAULT_OPENAI_URL.to_string());
    Box::new(OpenAiChatClient::new(
        base_url,
        config.openai_api_key.clone(),
    ))
}

/// HTTP adapter for OpenAI-compatible chat completions.
pub struct OpenAiChatClient {
    http: Client,
    base_url: String,
    api_key: Option<String>,
}

impl OpenAiChatClient {
    /// Construct a client targeting the given base URL.
    pub fn new(base_url: String, api_key: Option<String>) -> Self {
        let http = Client::builder()
            .user_agent("ragmill/chat")
            .build()
            .expect("Failed to construct reqwest::Client for chat");
        Self {
            http,
            base_url,
            api_key,
        }
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1/chat/completions",
            self.base_url.trim_end_matches('/')
        )
    }
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    choices: Vec<CompletionChoice>,
    #[serde(default)]
    usage: Option<CompletionUsage>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    message: CompletionMessage,
}

#[derive(Debug, Deserialize)]
struct CompletionMessage {
    content: String,
}

#[derive(Debug, Deserialize)]
struct CompletionUsage {
    #[serde(default)]
    prompt_tokens: Option<u64>,
    #[serde(default)]
    completion_tokens: Option<u64>,
}

#[async_trait]
impl ChatClient for OpenAiChatClient {
    async fn complete(&self, request: ChatRequest) -> Result<ChatCompletion, GenerationError> {
        let payload = json!({
            "model": request.model,
            "messages": request.messages,
            "temperature": request.temperature,
            "max_tokens": request.max_tokens,
        });

        let started = Instant::now();
        let mut builder = self.http.post(self.endpoint()).json(&payload);
        if let Some(api_key) = &self.api_key
            && !api_key.is_empty()
        {
            builder = builder.bearer_auth(api_key);
        }

        let response = builder.send().await.map_err(|error| {
            GenerationError::ProviderUnavailable(format!(
                "failed to reach chat endpoint at {}: {error}",
                self.base_url
            ))
        })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(GenerationError::GenerationFailed(format!(
                "chat endpoint returned {status}: {body}"
            )));
        }

        let body: CompletionResponse = response.json().await.map_err(|error| {
            GenerationError::InvalidResponse(format!("failed to decode chat response: {error}"))
        })?;
        let latency_ms = started.elapsed().as_millis() as u64;

        let choice = body
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| GenerationError::InvalidResponse("no choices returned".into()))?;

        let (prompt_tokens, completion_tokens) = body
            .usage
            .map(|usage| (usage.prompt_tokens, usage.completion_tokens))
            .unwrap_or((None, None));

        Ok(ChatCompletion {
            text: choice.message.content.trim().to_string(),
            prompt_tokens,
            completion_tokens,
            latency_ms,
        })
    }
}
