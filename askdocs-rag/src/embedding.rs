//! Embedder capability for generating vector embeddings from text.

use async_trait::async_trait;

use crate::error::Result;
use crate::vectorstore::Similarity;

/// A provider that maps text to a fixed-dimension embedding vector.
///
/// Every vector returned by one instance must have exactly
/// [`dimensions()`](Embedder::dimensions) elements; the pipelines reject
/// vectors of any other length with
/// [`RagError::DimensionMismatch`](crate::RagError::DimensionMismatch).
///
/// Implementations report transient upstream failures as
/// [`RagError::ProviderUnavailable`](crate::RagError::ProviderUnavailable)
/// and rejected text as [`RagError::InvalidInput`](crate::RagError::InvalidInput).
/// Only the former is retried by the ingestion pipeline.
///
/// # Example
///
/// ```rust,ignore
/// use askdocs_rag::Embedder;
///
/// let embedder = MyEmbedder::new();
/// let vector = embedder.embed("hello world").await?;
/// assert_eq!(vector.len(), embedder.dimensions());
/// ```
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Generate an embedding vector for a single text input.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Return the dimensionality of embeddings produced by this provider.
    fn dimensions(&self) -> usize;

    /// The similarity metric the embedding model is meant to be compared with.
    fn metric(&self) -> Similarity {
        Similarity::Cosine
    }
}
