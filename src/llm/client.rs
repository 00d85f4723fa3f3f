use std::fmt;
use std::time::Duration;

use futures::stream::BoxStream;
use reqwest::Client;
use tracing::{debug, warn};

use super::sse;
use super::types::{ChatMessage, ChatRequest, ChatResponse, ReasoningEffort};

pub const DEFAULT_BASE_URL: &str = "https://api.groq.com/openai/v1";
pub const DEFAULT_MODEL: &str = "openai/gpt-oss-120b";
const TEMPERATURE: f32 = 0.0;
const COMPLETION_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("GROQ_API_KEY not set. Get one at https://console.groq.com/keys")]
    ApiKeyNotSet,

    #[error("Model API rate limit exceeded. Please retry later.")]
    RateLimited,

    #[error("Model API rejected credentials: {0}")]
    Unauthorized(String),

    #[error("Model API error ({code}): {message}")]
    Api { code: u16, message: String },

    #[error("Model response contained no choices")]
    EmptyCompletion,

    #[error("Answer stream failed: {0}")]
    Stream(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
}

/// Incremental answer text, in generation order.
pub type FragmentStream = BoxStream<'static, Result<String, LlmError>>;

/// Text completion over a chat transcript.
/// Implemented by `ChatClient` for production; mock implementations used in tests.
pub trait ChatModel {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, LlmError>;

    /// Starts a streamed completion. The returned stream reads the response
    /// body only as it is polled.
    async fn complete_stream(&self, messages: &[ChatMessage]) -> Result<FragmentStream, LlmError>;
}

#[derive(Debug, Clone)]
pub struct LlmSettings {
    pub base_url: String,
    pub api_key: Option<String>,
    pub model: String,
    pub reasoning_effort: ReasoningEffort,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: None,
            model: DEFAULT_MODEL.to_string(),
            reasoning_effort: ReasoningEffort::default(),
        }
    }
}

#[derive(Clone)]
struct ApiKey(String);

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

/// Client for an OpenAI-compatible `/chat/completions` endpoint.
///
/// The hosted default requires a key; a self-hosted `base_url` may run
/// without one.
#[derive(Debug, Clone)]
pub struct ChatClient {
    http: Client,
    api_key: Option<ApiKey>,
    model: String,
    base_url: String,
    reasoning_effort: ReasoningEffort,
}

impl ChatClient {
    pub fn new(http: Client, settings: LlmSettings) -> Result<Self, LlmError> {
        let base_url = settings.base_url.trim_end_matches('/').to_string();
        let api_key = settings
            .api_key
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty());
        if api_key.is_none() && base_url == DEFAULT_BASE_URL {
            return Err(LlmError::ApiKeyNotSet);
        }
        Ok(Self {
            http,
            api_key: api_key.map(ApiKey),
            model: settings.model,
            base_url,
            reasoning_effort: settings.reasoning_effort,
        })
    }

    #[cfg(test)]
    pub(crate) fn with_base_url(http: Client, base_url: &str) -> Self {
        Self {
            http,
            api_key: Some(ApiKey("test-key".to_string())),
            model: DEFAULT_MODEL.to_string(),
            base_url: base_url.to_string(),
            reasoning_effort: ReasoningEffort::Medium,
        }
    }

    async fn post(
        &self,
        messages: &[ChatMessage],
        stream: bool,
    ) -> Result<reqwest::Response, LlmError> {
        let url = format!("{}/chat/completions", self.base_url);

        let request = ChatRequest {
            model: &self.model,
            messages,
            temperature: TEMPERATURE,
            reasoning_effort: self.reasoning_effort,
            stream,
        };

        let mut builder = self
            .http
            .post(&url)
            .header("User-Agent", crate::USER_AGENT)
            .json(&request);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(&key.0);
        }
        if !stream {
            builder = builder.timeout(COMPLETION_TIMEOUT);
        }

        let response = builder.send().await?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let classified = classify_error(status.as_u16(), &text);
            warn!(error = %classified, "model API error");
            return Err(classified);
        }
        Ok(response)
    }
}

impl ChatModel for ChatClient {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, LlmError> {
        let body: ChatResponse = self.post(messages, false).await?.json().await?;

        if let Some(err) = &body.error {
            let message = err.message.clone().unwrap_or_else(|| "Unknown error".to_string());
            warn!(%message, "model API error in 200 response");
            return Err(LlmError::Api { code: 200, message });
        }

        let text = body.text().ok_or(LlmError::EmptyCompletion)?;
        debug!(model = %self.model, chars = text.len(), "completion received");
        Ok(text)
    }

    async fn complete_stream(&self, messages: &[ChatMessage]) -> Result<FragmentStream, LlmError> {
        let response = self.post(messages, true).await?;
        debug!(model = %self.model, "answer stream opened");
        Ok(sse::fragments(response.bytes_stream()))
    }
}

fn classify_error(status: u16, text: &str) -> LlmError {
    let message = serde_json::from_str::<ChatResponse>(text)
        .ok()
        .and_then(|body| body.error)
        .and_then(|err| err.message)
        .unwrap_or_else(|| {
            let end = text.floor_char_boundary(200);
            format!("HTTP {status}: {}", &text[..end])
        });

    match status {
        429 => LlmError::RateLimited,
        401 => LlmError::Unauthorized(message),
        code => LlmError::Api { code, message },
    }
}
