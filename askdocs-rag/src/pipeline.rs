//! RAG pipeline facade.
//!
//! The [`RagPipeline`] wires one set of collaborators (an [`Extractor`], an
//! [`Embedder`], a [`VectorIndex`], and a [`Generator`]) into an
//! [`IngestionPipeline`] and a [`RetrievalPipeline`] that share them, and
//! exposes the two public operations: [`ingest`](RagPipeline::ingest) and
//! [`ask`](RagPipeline::ask).
//!
//! # Example
//!
//! ```rust,ignore
//! use askdocs_rag::{RagPipeline, RagConfig, InMemoryVectorIndex, PlainTextExtractor};
//! use tokio_util::sync::CancellationToken;
//!
//! let pipeline = RagPipeline::builder()
//!     .config(RagConfig::default())
//!     .extractor(Arc::new(PlainTextExtractor))
//!     .embedder(Arc::new(my_embedder))
//!     .vector_index(Arc::new(InMemoryVectorIndex::new(1536)))
//!     .generator(Arc::new(my_generator))
//!     .build()?;
//!
//! let cancel = CancellationToken::new();
//! pipeline.ingest(document, &cancel).await?;
//! let answer = pipeline.ask("What is the refund policy?", &cancel).await?;
//! ```

use std::future::Future;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::chunking::{Chunker, FixedSizeChunker};
use crate::config::RagConfig;
use crate::document::{Answer, Document, IngestionSummary, ScoredRecord};
use crate::embedding::Embedder;
use crate::error::{RagError, Result};
use crate::extractor::Extractor;
use crate::generator::Generator;
use crate::ingest::IngestionPipeline;
use crate::retrieval::RetrievalPipeline;
use crate::vectorstore::VectorIndex;

/// Run `fut` unless `cancel` fires first, in which case the future is
/// dropped and [`RagError::Cancelled`] is returned.
pub(crate) async fn until_cancelled<T, F>(cancel: &CancellationToken, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(RagError::Cancelled),
        result = fut => result,
    }
}

/// Reject `vector` unless it has exactly `expected` elements.
pub(crate) fn ensure_dimensions(expected: usize, vector: Vec<f32>) -> Result<Vec<f32>> {
    if vector.len() != expected {
        return Err(RagError::DimensionMismatch { expected, actual: vector.len() });
    }
    Ok(vector)
}

/// Check that `embedder` and `index` agree on dimension and similarity metric.
///
/// # Errors
///
/// Returns [`RagError::ConfigError`] on any disagreement.
pub fn ensure_compatible(embedder: &dyn Embedder, index: &dyn VectorIndex) -> Result<()> {
    if embedder.dimensions() == 0 {
        return Err(RagError::ConfigError("embedder reports zero dimensions".to_string()));
    }
    if embedder.dimensions() != index.dimensions() {
        return Err(RagError::ConfigError(format!(
            "embedder produces {}-dimensional vectors but the index stores {}",
            embedder.dimensions(),
            index.dimensions()
        )));
    }
    if embedder.metric() != index.metric() {
        return Err(RagError::ConfigError(format!(
            "embedder expects {} similarity but the index ranks by {}",
            embedder.metric(),
            index.metric()
        )));
    }
    Ok(())
}

/// The ingestion-and-retrieval pipeline.
///
/// Construct one via [`RagPipeline::builder()`].
pub struct RagPipeline {
    config: RagConfig,
    ingestion: IngestionPipeline,
    retrieval: RetrievalPipeline,
}

impl RagPipeline {
    /// Create a new [`RagPipelineBuilder`].
    pub fn builder() -> RagPipelineBuilder {
        RagPipelineBuilder::default()
    }

    /// Return a reference to the pipeline configuration.
    pub fn config(&self) -> &RagConfig {
        &self.config
    }

    /// Return the ingestion half of the pipeline.
    pub fn ingestion(&self) -> &IngestionPipeline {
        &self.ingestion
    }

    /// Return the retrieval half of the pipeline.
    pub fn retrieval(&self) -> &RetrievalPipeline {
        &self.retrieval
    }

    /// Ingest one uploaded document: extract → chunk → embed → index.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Ingestion`] naming the failed stage.
    pub async fn ingest(
        &self,
        document: Document,
        cancel: &CancellationToken,
    ) -> Result<IngestionSummary> {
        self.ingestion.ingest(document, cancel).await
    }

    /// Answer `question` from the indexed documents.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Retrieval`] naming the failed step.
    pub async fn ask(&self, question: &str, cancel: &CancellationToken) -> Result<Answer> {
        self.retrieval.ask(question, cancel).await
    }

    /// Return the fragments most similar to `question` without generating an answer.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Retrieval`] naming the failed step.
    pub async fn retrieve(
        &self,
        question: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<ScoredRecord>> {
        self.retrieval.retrieve(question, cancel).await
    }
}

/// Builder for constructing a [`RagPipeline`].
///
/// All collaborators except the chunker are required; the chunker defaults
/// to a [`FixedSizeChunker`] sized by [`RagConfig::max_chunk_size`].
/// [`build()`](RagPipelineBuilder::build) validates the configuration and
/// checks eagerly that the embedder and index agree on dimension and metric.
#[derive(Default)]
pub struct RagPipelineBuilder {
    config: Option<RagConfig>,
    extractor: Option<Arc<dyn Extractor>>,
    chunker: Option<Arc<dyn Chunker>>,
    embedder: Option<Arc<dyn Embedder>>,
    vector_index: Option<Arc<dyn VectorIndex>>,
    generator: Option<Arc<dyn Generator>>,
}

impl RagPipelineBuilder {
    /// Set the pipeline configuration. Defaults to [`RagConfig::default()`].
    pub fn config(mut self, config: RagConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the text extractor.
    pub fn extractor(mut self, extractor: Arc<dyn Extractor>) -> Self {
        self.extractor = Some(extractor);
        self
    }

    /// Override the fragment chunker.
    pub fn chunker(mut self, chunker: Arc<dyn Chunker>) -> Self {
        self.chunker = Some(chunker);
        self
    }

    /// Set the embedder.
    pub fn embedder(mut self, embedder: Arc<dyn Embedder>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    /// Set the vector index backend.
    pub fn vector_index(mut self, index: Arc<dyn VectorIndex>) -> Self {
        self.vector_index = Some(index);
        self
    }

    /// Set the answer generator.
    pub fn generator(mut self, generator: Arc<dyn Generator>) -> Self {
        self.generator = Some(generator);
        self
    }

    /// Build the [`RagPipeline`].
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if a required collaborator is
    /// missing, the configuration is invalid, or the embedder and index
    /// disagree on dimension or metric.
    pub fn build(self) -> Result<RagPipeline> {
        let config = self.config.unwrap_or_default();
        config.validate()?;

        let extractor = self
            .extractor
            .ok_or_else(|| RagError::ConfigError("extractor is required".to_string()))?;
        let embedder =
            self.embedder.ok_or_else(|| RagError::ConfigError("embedder is required".to_string()))?;
        let vector_index = self
            .vector_index
            .ok_or_else(|| RagError::ConfigError("vector_index is required".to_string()))?;
        let generator = self
            .generator
            .ok_or_else(|| RagError::ConfigError("generator is required".to_string()))?;
        let chunker = match self.chunker {
            Some(chunker) => chunker,
            None => Arc::new(
                FixedSizeChunker::new(config.max_chunk_size)
                    .map_err(|e| RagError::ConfigError(e.to_string()))?,
            ),
        };

        let ingestion = IngestionPipeline::new(
            config.clone(),
            extractor,
            chunker,
            Arc::clone(&embedder),
            Arc::clone(&vector_index),
        )?;
        let retrieval = RetrievalPipeline::new(config.clone(), embedder, vector_index, generator)?;

        Ok(RagPipeline { config, ingestion, retrieval })
    }
}
