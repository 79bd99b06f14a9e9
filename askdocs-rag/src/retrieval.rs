//! Question answering over indexed fragments.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::config::RagConfig;
use crate::document::{Answer, ScoredRecord};
use crate::embedding::Embedder;
use crate::error::{RagError, Result, RetrievalStep};
use crate::generator::Generator;
use crate::pipeline::{ensure_compatible, ensure_dimensions, until_cancelled};
use crate::prompt::{NO_MATCH_ANSWER, build_context, build_prompt};
use crate::vectorstore::VectorIndex;

/// Orchestrates [`Embedder`] → [`VectorIndex`] → prompt assembly →
/// [`Generator`] for one question at a time.
///
/// The generator is never invoked without grounding context: when nothing
/// matches, a canned answer is returned instead.
pub struct RetrievalPipeline {
    config: RagConfig,
    embedder: Arc<dyn Embedder>,
    index: Arc<dyn VectorIndex>,
    generator: Arc<dyn Generator>,
}

impl RetrievalPipeline {
    /// Create a retrieval pipeline.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if `config` is invalid or the
    /// embedder and index disagree on dimension or metric.
    pub fn new(
        config: RagConfig,
        embedder: Arc<dyn Embedder>,
        index: Arc<dyn VectorIndex>,
        generator: Arc<dyn Generator>,
    ) -> Result<Self> {
        config.validate()?;
        ensure_compatible(embedder.as_ref(), index.as_ref())?;
        Ok(Self { config, embedder, index, generator })
    }

    /// Embed `question` and return the `top_k` most similar fragments.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Retrieval`] at the `Validating`, `Embedding`, or
    /// `Searching` step.
    pub async fn retrieve(
        &self,
        question: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<ScoredRecord>> {
        if question.trim().is_empty() {
            let err = RagError::InvalidInput {
                provider: "Retrieval".into(),
                message: "question must not be empty".into(),
            };
            return Err(fail(RetrievalStep::Validating, err));
        }

        let vector = until_cancelled(cancel, self.embedder.embed(question))
            .await
            .and_then(|vector| ensure_dimensions(self.embedder.dimensions(), vector))
            .map_err(|e| fail(RetrievalStep::Embedding, e))?;

        let hits = until_cancelled(cancel, self.index.query(&vector, self.config.top_k))
            .await
            .map_err(|e| fail(RetrievalStep::Searching, e))?;

        debug!(hit_count = hits.len(), top_k = self.config.top_k, "retrieved fragments");
        Ok(hits)
    }

    /// Answer `question` using only retrieved fragments as context.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Retrieval`] naming the failed step. Generator
    /// failures are surfaced as-is and never retried.
    pub async fn ask(&self, question: &str, cancel: &CancellationToken) -> Result<Answer> {
        let hits = self.retrieve(question, cancel).await?;

        let context = build_context(&hits, &self.config.context_separator);
        if context.trim().is_empty() {
            info!(hit_count = hits.len(), "no matching documents, skipping generation");
            return Ok(Answer {
                question: question.to_string(),
                answer_text: NO_MATCH_ANSWER.to_string(),
            });
        }

        let prompt = build_prompt(question, &context);
        debug!(fragment_count = hits.len(), prompt_len = prompt.len(), "calling generator");

        let answer_text = until_cancelled(cancel, self.generator.complete(&prompt))
            .await
            .map_err(|e| fail(RetrievalStep::Generating, e))?;

        info!(fragment_count = hits.len(), answer_len = answer_text.len(), "question answered");

        Ok(Answer { question: question.to_string(), answer_text })
    }
}

fn fail(step: RetrievalStep, err: RagError) -> RagError {
    error!(%step, error = %err, "retrieval failed");
    err.at_step(step)
}
