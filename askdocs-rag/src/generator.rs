//! Generator capability for producing completions from a prompt.

use async_trait::async_trait;

use crate::error::Result;

/// A generative language model.
///
/// The retrieval pipeline calls [`complete`](Generator::complete) once per
/// question and never retries it; callers that want retries own that policy.
#[async_trait]
pub trait Generator: Send + Sync {
    /// Produce a natural-language completion for `prompt`.
    async fn complete(&self, prompt: &str) -> Result<String>;
}
