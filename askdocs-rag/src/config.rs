//! Configuration for the ingestion and retrieval pipelines.

use serde::{Deserialize, Serialize};

use crate::document::media_type_matches;
use crate::error::{RagError, Result};

/// Largest accepted `retry_backoff_ms`; later retries double it up to 32 times.
pub const MAX_RETRY_BACKOFF_MS: u64 = 60_000;

/// Configuration parameters for the RAG pipeline.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RagConfig {
    /// Maximum fragment size in characters.
    pub max_chunk_size: usize,
    /// Number of fragments retrieved per question.
    pub top_k: usize,
    /// Maximum number of fragment embeddings in flight at once.
    pub embed_concurrency: usize,
    /// Retries per fragment after a transient embedding failure.
    pub embed_max_retries: usize,
    /// Base delay before the first embedding retry; doubled on each attempt.
    pub retry_backoff_ms: u64,
    /// Number of characters of extracted text echoed in the ingestion summary.
    pub preview_chars: usize,
    /// Separator placed between fragments in the grounding context.
    pub context_separator: String,
    /// Media types accepted for ingestion.
    pub allowed_media_types: Vec<String>,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            max_chunk_size: 1000,
            top_k: 3,
            embed_concurrency: 4,
            embed_max_retries: 2,
            retry_backoff_ms: 200,
            preview_chars: 200,
            context_separator: "\n---\n".to_string(),
            allowed_media_types: vec![
                "application/pdf".to_string(),
                "image/png".to_string(),
                "text/plain".to_string(),
            ],
        }
    }
}

impl RagConfig {
    /// Create a new builder for constructing a [`RagConfig`].
    pub fn builder() -> RagConfigBuilder {
        RagConfigBuilder::default()
    }

    /// Whether `media_type` may be ingested. Parameters such as
    /// `; charset=utf-8` are ignored and the comparison is case-insensitive.
    pub fn accepts_media_type(&self, media_type: &str) -> bool {
        self.allowed_media_types.iter().any(|allowed| media_type_matches(media_type, allowed))
    }

    /// Check that the parameters are usable.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] describing the first invalid field.
    pub fn validate(&self) -> Result<()> {
        if self.max_chunk_size == 0 {
            return Err(RagError::ConfigError(
                "max_chunk_size must be greater than zero".to_string(),
            ));
        }
        if self.top_k == 0 {
            return Err(RagError::ConfigError("top_k must be greater than zero".to_string()));
        }
        if self.embed_concurrency == 0 {
            return Err(RagError::ConfigError(
                "embed_concurrency must be greater than zero".to_string(),
            ));
        }
        if self.retry_backoff_ms > MAX_RETRY_BACKOFF_MS {
            return Err(RagError::ConfigError(format!(
                "retry_backoff_ms must be at most {MAX_RETRY_BACKOFF_MS}"
            )));
        }
        if self.context_separator.is_empty() {
            return Err(RagError::ConfigError("context_separator must not be empty".to_string()));
        }
        if self.allowed_media_types.is_empty() {
            return Err(RagError::ConfigError(
                "allowed_media_types must list at least one media type".to_string(),
            ));
        }
        Ok(())
    }
}

/// Builder for constructing a validated [`RagConfig`].
#[derive(Debug, Clone, Default)]
pub struct RagConfigBuilder {
    config: RagConfig,
}

impl RagConfigBuilder {
    /// Set the maximum fragment size in characters.
    pub fn max_chunk_size(mut self, size: usize) -> Self {
        self.config.max_chunk_size = size;
        self
    }

    /// Set the number of fragments retrieved per question.
    pub fn top_k(mut self, k: usize) -> Self {
        self.config.top_k = k;
        self
    }

    /// Set the maximum number of concurrent embedding calls during ingestion.
    pub fn embed_concurrency(mut self, limit: usize) -> Self {
        self.config.embed_concurrency = limit;
        self
    }

    /// Set the per-fragment retry budget for transient embedding failures.
    pub fn embed_max_retries(mut self, retries: usize) -> Self {
        self.config.embed_max_retries = retries;
        self
    }

    /// Set the base retry delay in milliseconds.
    pub fn retry_backoff_ms(mut self, millis: u64) -> Self {
        self.config.retry_backoff_ms = millis;
        self
    }

    /// Set how many characters of extracted text the summary previews.
    pub fn preview_chars(mut self, chars: usize) -> Self {
        self.config.preview_chars = chars;
        self
    }

    /// Set the separator placed between fragments in the prompt context.
    pub fn context_separator(mut self, separator: impl Into<String>) -> Self {
        self.config.context_separator = separator.into();
        self
    }

    /// Replace the list of media types accepted for ingestion.
    pub fn allowed_media_types<I, S>(mut self, media_types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.allowed_media_types = media_types.into_iter().map(Into::into).collect();
        self
    }

    /// Build the [`RagConfig`], validating that parameters are consistent.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if:
    /// - `max_chunk_size == 0`
    /// - `top_k == 0`
    /// - `embed_concurrency == 0`
    /// - `context_separator` is empty
    /// - `allowed_media_types` is empty
    pub fn build(self) -> Result<RagConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
