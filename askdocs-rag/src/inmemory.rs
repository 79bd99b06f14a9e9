//! In-memory vector index.
//!
//! This module provides [`InMemoryVectorIndex`], a [`VectorIndex`] backed by
//! a `HashMap` protected by a `tokio::sync::RwLock`. It is suitable for
//! development, testing, and small-scale use cases.

use std::collections::{HashMap, hash_map};

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use crate::document::{IndexRecord, ScoredRecord};
use crate::error::{RagError, Result};
use crate::vectorstore::{Similarity, VectorIndex};

/// A stored record plus the position at which its id was first inserted.
#[derive(Debug)]
struct StoredRecord {
    inserted_at: u64,
    record: IndexRecord,
}

#[derive(Debug, Default)]
struct Inner {
    entries: HashMap<Uuid, StoredRecord>,
    next_position: u64,
}

/// An in-memory vector index using exhaustive similarity search.
///
/// Overwriting an existing id keeps its original insertion position, so
/// tie-breaking stays stable across idempotent re-upserts.
///
/// # Example
///
/// ```rust,ignore
/// use askdocs_rag::{InMemoryVectorIndex, VectorIndex};
///
/// let index = InMemoryVectorIndex::new(1536);
/// index.upsert(&records).await?;
/// ```
#[derive(Debug)]
pub struct InMemoryVectorIndex {
    dimensions: usize,
    metric: Similarity,
    inner: RwLock<Inner>,
}

impl InMemoryVectorIndex {
    /// Create an empty cosine-similarity index for vectors of `dimensions` elements.
    pub fn new(dimensions: usize) -> Self {
        Self { dimensions, metric: Similarity::Cosine, inner: RwLock::new(Inner::default()) }
    }

    /// Use `metric` instead of cosine similarity.
    pub fn with_metric(mut self, metric: Similarity) -> Self {
        self.metric = metric;
        self
    }

    /// Number of records currently stored.
    pub async fn len(&self) -> usize {
        self.inner.read().await.entries.len()
    }

    /// Whether the index holds no records.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Fetch a stored record by id.
    pub async fn get(&self, id: &Uuid) -> Option<IndexRecord> {
        self.inner.read().await.entries.get(id).map(|entry| entry.record.clone())
    }

    fn check_dimensions(&self, vector: &[f32]) -> Result<()> {
        if vector.len() != self.dimensions {
            return Err(RagError::DimensionMismatch {
                expected: self.dimensions,
                actual: vector.len(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl VectorIndex for InMemoryVectorIndex {
    async fn upsert(&self, records: &[IndexRecord]) -> Result<()> {
        // Validate the whole batch first so a bad vector never leaves it half-written.
        for record in records {
            self.check_dimensions(&record.vector)?;
        }

        let mut guard = self.inner.write().await;
        let inner = &mut *guard;
        for record in records {
            match inner.entries.entry(record.id) {
                hash_map::Entry::Occupied(mut slot) => slot.get_mut().record = record.clone(),
                hash_map::Entry::Vacant(slot) => {
                    slot.insert(StoredRecord {
                        inserted_at: inner.next_position,
                        record: record.clone(),
                    });
                    inner.next_position += 1;
                }
            }
        }
        debug!(backend = "InMemory", record_count = records.len(), "upserted records");
        Ok(())
    }

    async fn query(&self, vector: &[f32], k: usize) -> Result<Vec<ScoredRecord>> {
        if k == 0 {
            return Err(RagError::InvalidArgument("k must be greater than zero".to_string()));
        }
        self.check_dimensions(vector)?;

        let inner = self.inner.read().await;
        let mut scored: Vec<(u64, ScoredRecord)> = inner
            .entries
            .values()
            .map(|entry| {
                let score = self.metric.score(&entry.record.vector, vector);
                (entry.inserted_at, ScoredRecord { record: entry.record.clone(), score })
            })
            .collect();

        scored.sort_by(|(pos_a, a), (pos_b, b)| {
            b.score.total_cmp(&a.score).then_with(|| pos_a.cmp(pos_b))
        });
        scored.truncate(k);

        Ok(scored.into_iter().map(|(_, hit)| hit).collect())
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn metric(&self) -> Similarity {
        self.metric
    }
}
