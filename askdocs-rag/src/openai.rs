//! OpenAI-compatible embedder and generator over HTTP.
//!
//! This module is only available when the `openai` feature is enabled.
//! Both adapters talk to any server implementing the OpenAI `/v1/embeddings`
//! and `/v1/chat/completions` endpoints; point them elsewhere with
//! `with_base_url`.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::embedding::Embedder;
use crate::error::{RagError, Result};
use crate::generator::Generator;

/// The default OpenAI API base URL.
const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

/// The default model for OpenAI embeddings.
const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-small";

/// The default dimensionality for `text-embedding-3-small`.
const DEFAULT_DIMENSIONS: usize = 1536;

/// The default chat model.
const DEFAULT_CHAT_MODEL: &str = "gpt-4o-mini";

/// System message sent ahead of every prompt.
const SYSTEM_MESSAGE: &str = "You are a helpful assistant.";

const PROVIDER: &str = "OpenAI";

fn api_key_from_env() -> Result<String> {
    std::env::var("OPENAI_API_KEY").map_err(|_| {
        RagError::ConfigError("OPENAI_API_KEY environment variable not set".to_string())
    })
}

fn check_api_key(api_key: &str) -> Result<()> {
    if api_key.trim().is_empty() {
        return Err(RagError::ConfigError("OpenAI API key must not be empty".to_string()));
    }
    Ok(())
}

/// Map a transport error: connection problems and timeouts are transient.
fn transport_error(e: reqwest::Error) -> RagError {
    error!(provider = PROVIDER, error = %e, "request failed");
    RagError::ProviderUnavailable {
        provider: PROVIDER.into(),
        message: format!("request failed: {e}"),
    }
}

async fn status_error(response: reqwest::Response) -> RagError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    error!(provider = PROVIDER, %status, "API error");
    classify(status, &body)
}

/// Classify a non-success response.
///
/// 429 and 5xx are transient. 401 and 403 mean the credentials are wrong.
/// Anything else is a rejection of the request itself.
fn classify(status: StatusCode, body: &str) -> RagError {
    let detail = serde_json::from_str::<ErrorResponse>(body)
        .map(|e| e.error.message)
        .unwrap_or_else(|_| body.to_string());
    let message = format!("API returned {status}: {detail}");

    if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
        RagError::ProviderUnavailable { provider: PROVIDER.into(), message }
    } else if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        RagError::ConfigError(format!("{PROVIDER} rejected the API key: {message}"))
    } else {
        RagError::InvalidInput { provider: PROVIDER.into(), message }
    }
}

fn parse_error(e: reqwest::Error) -> RagError {
    error!(provider = PROVIDER, error = %e, "failed to parse response");
    RagError::ProviderUnavailable {
        provider: PROVIDER.into(),
        message: format!("failed to parse response: {e}"),
    }
}

/// An [`Embedder`] backed by the OpenAI embeddings API.
///
/// # Configuration
///
/// - `model` – defaults to `text-embedding-3-small`.
/// - `dimensions` – optional Matryoshka dimension override.
/// - `api_key` – from the constructor or the `OPENAI_API_KEY` environment variable.
///
/// # Example
///
/// ```rust,ignore
/// use askdocs_rag::openai::OpenAIEmbedder;
///
/// let embedder = OpenAIEmbedder::new("sk-...")?;
/// let vector = embedder.embed("hello world").await?;
/// ```
pub struct OpenAIEmbedder {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    dimensions: usize,
    /// If set, passed to the API for Matryoshka dimension truncation.
    request_dimensions: Option<usize>,
}

impl OpenAIEmbedder {
    /// Create a new embedder with the given API key.
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        let api_key = api_key.into();
        check_api_key(&api_key)?;
        Ok(Self {
            client: reqwest::Client::new(),
            api_key,
            base_url: OPENAI_BASE_URL.into(),
            model: DEFAULT_EMBEDDING_MODEL.into(),
            dimensions: DEFAULT_DIMENSIONS,
            request_dimensions: None,
        })
    }

    /// Create a new embedder using the `OPENAI_API_KEY` environment variable.
    pub fn from_env() -> Result<Self> {
        Self::new(api_key_from_env()?)
    }

    /// Set the API base URL (e.g. a local OpenAI-compatible server).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Set the model name (e.g. `text-embedding-3-large`).
    ///
    /// Call [`with_dimensions`](Self::with_dimensions) as well when the
    /// model's native size differs from 1536.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Set the output dimensions (Matryoshka support).
    pub fn with_dimensions(mut self, dims: usize) -> Self {
        self.dimensions = dims;
        self.request_dimensions = Some(dims);
        self
    }
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    dimensions: Option<usize>,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

impl EmbeddingResponse {
    fn into_embedding(self) -> Result<Vec<f32>> {
        self.data.into_iter().next().map(|d| d.embedding).ok_or_else(|| {
            RagError::ProviderUnavailable {
                provider: PROVIDER.into(),
                message: "API returned empty response".into(),
            }
        })
    }
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    message: String,
}

#[async_trait]
impl Embedder for OpenAIEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        if text.is_empty() {
            return Err(RagError::InvalidInput {
                provider: PROVIDER.into(),
                message: "cannot embed empty text".into(),
            });
        }

        debug!(provider = PROVIDER, model = %self.model, text_len = text.len(), "embedding text");

        let request_body = EmbeddingRequest {
            model: &self.model,
            input: text,
            dimensions: self.request_dimensions,
        };

        let response = self
            .client
            .post(format!("{}/embeddings", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request_body)
            .send()
            .await
            .map_err(transport_error)?;

        if !response.status().is_success() {
            return Err(status_error(response).await);
        }

        let parsed: EmbeddingResponse = response.json().await.map_err(parse_error)?;
        parsed.into_embedding()
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

/// A [`Generator`] backed by the OpenAI chat completions API.
///
/// Each prompt is sent as a single user message after a fixed system
/// message. Defaults: `temperature` 0.7, `max_tokens` 4096.
///
/// # Example
///
/// ```rust,ignore
/// use askdocs_rag::openai::OpenAIGenerator;
///
/// let generator = OpenAIGenerator::from_env()?.with_model("gpt-4o");
/// let text = generator.complete("Say hello").await?;
/// ```
pub struct OpenAIGenerator {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
}

impl OpenAIGenerator {
    /// Create a new generator with the given API key.
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        let api_key = api_key.into();
        check_api_key(&api_key)?;
        Ok(Self {
            client: reqwest::Client::new(),
            api_key,
            base_url: OPENAI_BASE_URL.into(),
            model: DEFAULT_CHAT_MODEL.into(),
            temperature: 0.7,
            max_tokens: 4096,
        })
    }

    /// Create a new generator using the `OPENAI_API_KEY` environment variable.
    pub fn from_env() -> Result<Self> {
        Self::new(api_key_from_env()?)
    }

    /// Set the API base URL.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Set the chat model name.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Set the sampling temperature.
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Set the completion token limit.
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f32,
    max_tokens: u32,
    messages: [ChatMessage<'a>; 2],
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

impl ChatResponse {
    fn into_content(self) -> Result<String> {
        self.choices.into_iter().find_map(|choice| choice.message.content).ok_or_else(|| {
            RagError::Internal("chat completion returned no message content".into())
        })
    }
}

#[derive(Deserialize)]
struct ChatChoice {
    message: AssistantMessage,
}

#[derive(Deserialize)]
struct AssistantMessage {
    #[serde(default)]
    content: Option<String>,
}

#[async_trait]
impl Generator for OpenAIGenerator {
    async fn complete(&self, prompt: &str) -> Result<String> {
        debug!(provider = PROVIDER, model = %self.model, prompt_len = prompt.len(), "completing");

        let request_body = ChatRequest {
            model: &self.model,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            messages: [
                ChatMessage { role: "system", content: SYSTEM_MESSAGE },
                ChatMessage { role: "user", content: prompt },
            ],
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request_body)
            .send()
            .await
            .map_err(transport_error)?;

        if !response.status().is_success() {
            return Err(status_error(response).await);
        }

        let parsed: ChatResponse = response.json().await.map_err(parse_error)?;
        parsed.into_content()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_are_classified() {
        let cases = [
            (StatusCode::BAD_REQUEST, "invalid_input"),
            (StatusCode::UNAUTHORIZED, "config"),
            (StatusCode::FORBIDDEN, "config"),
            (StatusCode::NOT_FOUND, "invalid_input"),
            (StatusCode::PAYLOAD_TOO_LARGE, "invalid_input"),
            (StatusCode::TOO_MANY_REQUESTS, "unavailable"),
            (StatusCode::INTERNAL_SERVER_ERROR, "unavailable"),
            (StatusCode::BAD_GATEWAY, "unavailable"),
            (StatusCode::SERVICE_UNAVAILABLE, "unavailable"),
        ];
        for (status, expected) in cases {
            let kind = match classify(status, "") {
                RagError::InvalidInput { .. } => "invalid_input",
                RagError::ConfigError(_) => "config",
                RagError::ProviderUnavailable { .. } => "unavailable",
                other => panic!("unexpected error for {status}: {other:?}"),
            };
            assert_eq!(kind, expected, "status {status}");
        }
    }

    #[test]
    fn only_transient_statuses_are_retryable() {
        assert!(classify(StatusCode::TOO_MANY_REQUESTS, "").is_retryable());
        assert!(classify(StatusCode::SERVICE_UNAVAILABLE, "").is_retryable());
        assert!(!classify(StatusCode::BAD_REQUEST, "").is_retryable());
        assert!(!classify(StatusCode::UNAUTHORIZED, "").is_retryable());
    }

    #[test]
    fn error_body_message_is_extracted() {
        let body = r#"{"error": {"message": "This model's maximum context length is 8192"}}"#;
        match classify(StatusCode::BAD_REQUEST, body) {
            RagError::InvalidInput { provider, message } => {
                assert_eq!(provider, PROVIDER);
                assert!(message.ends_with("This model's maximum context length is 8192"));
            }
            other => panic!("expected InvalidInput, got {other:?}"),
        }

        match classify(StatusCode::BAD_GATEWAY, "<html>upstream</html>") {
            RagError::ProviderUnavailable { message, .. } => {
                assert!(message.contains("<html>upstream</html>"));
            }
            other => panic!("expected ProviderUnavailable, got {other:?}"),
        }
    }

    #[test]
    fn empty_embedding_data_is_transient() {
        let parsed: EmbeddingResponse = serde_json::from_str(r#"{"data": []}"#).unwrap();
        let err = parsed.into_embedding().unwrap_err();
        assert!(matches!(err, RagError::ProviderUnavailable { .. }));

        let parsed: EmbeddingResponse =
            serde_json::from_str(r#"{"data": [{"embedding": [0.5, -0.25]}]}"#).unwrap();
        assert_eq!(parsed.into_embedding().unwrap(), vec![0.5, -0.25]);
    }

    #[test]
    fn missing_chat_content_is_internal() {
        let parsed: ChatResponse = serde_json::from_str(r#"{"choices": []}"#).unwrap();
        assert!(matches!(parsed.into_content(), Err(RagError::Internal(_))));

        let parsed: ChatResponse =
            serde_json::from_str(r#"{"choices": [{"message": {"content": null}}]}"#).unwrap();
        assert!(matches!(parsed.into_content(), Err(RagError::Internal(_))));

        let parsed: ChatResponse =
            serde_json::from_str(r#"{"choices": [{"message": {"content": "Hi."}}]}"#).unwrap();
        assert_eq!(parsed.into_content().unwrap(), "Hi.");
    }
}
