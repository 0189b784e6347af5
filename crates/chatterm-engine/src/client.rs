//! Remote completion service.
//!
//! [`CompletionService`] is the seam between the conversation controller and
//! whatever produces replies. [`OpenAiClient`] implements it against an
//! OpenAI-compatible `chat/completions` endpoint.

use crate::config::Settings;
use crate::message::ChatMessage;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// One message as sent over the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireMessage {
    pub role: String,
    pub content: String,
}

impl WireMessage {
    fn new(role: &str, content: impl Into<String>) -> Self {
        Self {
            role: role.to_string(),
            content: content.into(),
        }
    }
}

/// Everything needed for a single completion call.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    /// Full chat-completions URL.
    pub endpoint: String,
    /// Bearer token.
    pub api_key: String,
    /// Model identifier.
    pub model: String,
    /// Sampling temperature.
    pub temperature: f32,
    /// System prompt followed by the conversation history.
    pub messages: Vec<WireMessage>,
}

impl CompletionRequest {
    /// Build a request from settings and the history to send.
    ///
    /// The system prompt always comes first, even when it is empty.
    pub fn new(settings: &Settings, history: &[ChatMessage]) -> Self {
        let mut messages = Vec::with_capacity(history.len() + 1);
        messages.push(WireMessage::new("system", settings.system_prompt.clone()));
        messages.extend(
            history
                .iter()
                .map(|m| WireMessage::new(m.role.as_str(), m.content.clone())),
        );

        Self {
            endpoint: settings.endpoint.clone(),
            api_key: settings.api_key.clone(),
            model: settings.model.clone(),
            temperature: settings.temperature,
            messages,
        }
    }
}

/// Errors from a completion call. `Display` is the text shown to the user.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CompletionError {
    /// No API key configured.
    #[error("Please configure an API key first.")]
    MissingApiKey,

    /// The request timed out.
    #[error("The request timed out. Please try again later.")]
    Timeout,

    /// Connection or transport failure.
    #[error("Network error: {0}")]
    Transport(String),

    /// Non-success HTTP status. `message` is the API-supplied text when present.
    #[error("{message}")]
    Status { status: u16, message: String },

    /// Response body could not be parsed.
    #[error("Malformed response: {0}")]
    Malformed(String),

    /// Response parsed but carried no reply text.
    #[error("The model returned no content. Please try again later.")]
    EmptyReply,
}

impl From<reqwest::Error> for CompletionError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            CompletionError::Timeout
        } else {
            CompletionError::Transport(err.to_string())
        }
    }
}

/// Produces an assistant reply for a request.
#[async_trait::async_trait]
pub trait CompletionService: Send + Sync {
    /// Run one completion and return the reply text.
    async fn complete(&self, request: &CompletionRequest) -> Result<String, CompletionError>;
}

#[derive(Debug, Serialize)]
struct ChatCompletionBody<'a> {
    model: &'a str,
    temperature: f32,
    messages: &'a [WireMessage],
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Option<ChoiceMessage>,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

/// Error payloads: OpenAI style `{"error": {"message": ..}}` or
/// FastAPI style `{"detail": ..}`.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: Option<ApiError>,
    detail: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    message: Option<String>,
}

impl ErrorBody {
    fn message(self) -> Option<String> {
        if let Some(message) = self.error.and_then(|e| e.message) {
            return Some(message);
        }
        let detail = match self.detail? {
            serde_json::Value::String(s) => s,
            other => other.to_string(),
        };
        Some(detail).filter(|m| !m.trim().is_empty())
    }
}

/// Client for OpenAI-compatible chat-completions endpoints.
#[derive(Debug, Clone, Default)]
pub struct OpenAiClient {
    client: Client,
}

impl OpenAiClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a preconfigured reqwest client (proxies, timeouts, ...).
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait::async_trait]
impl CompletionService for OpenAiClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, CompletionError> {
        if request.api_key.trim().is_empty() {
            return Err(CompletionError::MissingApiKey);
        }

        let body = ChatCompletionBody {
            model: &request.model,
            temperature: request.temperature,
            messages: &request.messages,
        };

        debug!(
            endpoint = %request.endpoint,
            model = %request.model,
            messages = request.messages.len(),
            "sending chat completion request"
        );

        let response = self
            .client
            .post(&request.endpoint)
            .bearer_auth(&request.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            warn!(status = status.as_u16(), "chat completion request failed");
            return Err(status_error(status, &text));
        }

        parse_reply(&text)
    }
}

fn status_error(status: StatusCode, body: &str) -> CompletionError {
    let message = serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(ErrorBody::message)
        .unwrap_or_else(|| {
            let reason = status.canonical_reason().unwrap_or_default();
            format!("Request failed: {} {reason}", status.as_u16())
                .trim_end()
                .to_string()
        });

    CompletionError::Status {
        status: status.as_u16(),
        message,
    }
}

fn parse_reply(body: &str) -> Result<String, CompletionError> {
    let parsed: ChatCompletionResponse =
        serde_json::from_str(body).map_err(|e| CompletionError::Malformed(e.to_string()))?;

    let reply = parsed
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message)
        .and_then(|m| m.content)
        .map(|c| c.trim().to_string())
        .unwrap_or_default();

    if reply.is_empty() {
        return Err(CompletionError::EmptyReply);
    }
    Ok(reply)
}
