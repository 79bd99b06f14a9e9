//! Vector index capability for storing and searching embeddings.

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::document::{IndexRecord, ScoredRecord};
use crate::error::Result;

/// The similarity function used to rank stored vectors against a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Similarity {
    /// Cosine of the angle between the two vectors.
    #[default]
    Cosine,
    /// Raw dot product; only meaningful for normalized embeddings.
    DotProduct,
}

impl Similarity {
    /// Score `a` against `b`. Both slices must have the same length.
    pub fn score(self, a: &[f32], b: &[f32]) -> f32 {
        match self {
            Similarity::Cosine => cosine_similarity(a, b),
            Similarity::DotProduct => dot(a, b),
        }
    }
}

impl fmt::Display for Similarity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Similarity::Cosine => f.write_str("cosine"),
            Similarity::DotProduct => f.write_str("dot_product"),
        }
    }
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

/// Compute cosine similarity between two vectors.
///
/// Returns 0.0 if either vector has zero magnitude.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot(a, b) / (norm_a * norm_b)
}

/// A storage backend for [`IndexRecord`]s with k-nearest-neighbour search.
///
/// Implementations must make [`upsert`](VectorIndex::upsert) an idempotent
/// overwrite by record id so that the pipeline can retry failed ids, and are
/// expected to be safe under concurrent writers. Concurrent writes to the
/// same id race last-write-wins.
///
/// # Example
///
/// ```rust,ignore
/// use askdocs_rag::{InMemoryVectorIndex, VectorIndex};
///
/// let index = InMemoryVectorIndex::new(384);
/// index.upsert(&records).await?;
/// let hits = index.query(&query_vector, 3).await?;
/// ```
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Insert or overwrite `records` by id.
    ///
    /// Returns [`RagError::PartialFailure`](crate::RagError::PartialFailure)
    /// listing the ids that were not written when only part of the batch
    /// succeeded.
    async fn upsert(&self, records: &[IndexRecord]) -> Result<()>;

    /// Return the `k` records most similar to `vector`.
    ///
    /// Results are ordered by descending score; ties keep insertion order.
    /// An empty index yields an empty `Vec`. `k == 0` is
    /// [`RagError::InvalidArgument`](crate::RagError::InvalidArgument).
    async fn query(&self, vector: &[f32], k: usize) -> Result<Vec<ScoredRecord>>;

    /// The vector dimension every stored and queried vector must have.
    fn dimensions(&self) -> usize;

    /// The similarity metric used to rank results.
    fn metric(&self) -> Similarity {
        Similarity::Cosine
    }
}
