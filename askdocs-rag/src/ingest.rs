//! Per-document ingestion: extract → chunk → embed → index.
//!
//! Each document moves through
//! `Received → Extracted → Chunked → Embedding → Indexed → Complete`, or ends
//! in `Failed(stage)`. Fragment embeddings fan out over a task set bounded by
//! a semaphore; a document is only indexed once every fragment has a vector,
//! so a completed ingestion is always fully searchable.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::chunking::Chunker;
use crate::config::RagConfig;
use crate::document::{
    Document, Fragment, IndexRecord, IngestionSummary, META_MEDIA_TYPE, META_SEQUENCE_INDEX,
    META_SOURCE_DOCUMENT,
};
use crate::embedding::Embedder;
use crate::error::{IngestStage, RagError, Result};
use crate::extractor::Extractor;
use crate::pipeline::{ensure_compatible, ensure_dimensions, until_cancelled};
use crate::vectorstore::VectorIndex;

/// Where a document is in its ingestion lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestState {
    /// The upload was accepted.
    Received,
    /// Text was extracted from the document.
    Extracted,
    /// The text was split into fragments.
    Chunked,
    /// Fragment embeddings are being computed.
    Embedding,
    /// All records were written to the index.
    Indexed,
    /// Ingestion finished successfully.
    Complete,
    /// Ingestion stopped at the given stage.
    Failed(IngestStage),
}

impl fmt::Display for IngestState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Received => f.write_str("Received"),
            Self::Extracted => f.write_str("Extracted"),
            Self::Chunked => f.write_str("Chunked"),
            Self::Embedding => f.write_str("Embedding"),
            Self::Indexed => f.write_str("Indexed"),
            Self::Complete => f.write_str("Complete"),
            Self::Failed(stage) => write!(f, "Failed({stage})"),
        }
    }
}

/// Logs state transitions for one document.
struct StateTracker<'a> {
    document: &'a str,
    state: IngestState,
}

impl<'a> StateTracker<'a> {
    fn new(document: &'a str) -> Self {
        debug!(document.name = document, state = %IngestState::Received, "ingestion started");
        Self { document, state: IngestState::Received }
    }

    fn advance(&mut self, next: IngestState) {
        debug!(document.name = self.document, from = %self.state, to = %next, "ingestion state");
        self.state = next;
    }

    fn fail(&mut self, stage: IngestStage, failure: impl Into<BatchFailure>) -> RagError {
        let BatchFailure { failed_ids, failed_fragments, error } = failure.into();
        error!(
            document.name = self.document,
            from = %self.state,
            %stage,
            failed_fragments = ?failed_fragments,
            error = %error,
            "ingestion failed"
        );
        self.state = IngestState::Failed(stage);
        error.at_stage(stage, failed_ids, failed_fragments)
    }
}

/// Exponential backoff for transient embedding failures.
#[derive(Debug, Clone, Copy)]
struct RetryPolicy {
    max_retries: usize,
    base_delay: Duration,
}

impl RetryPolicy {
    fn delay(&self, attempt: usize) -> Duration {
        let exponent = attempt.saturating_sub(1).min(5) as u32;
        self.base_delay.saturating_mul(1u32 << exponent)
    }
}

/// A failed step together with the records it failed for.
struct BatchFailure {
    failed_ids: Vec<Uuid>,
    failed_fragments: Vec<usize>,
    error: RagError,
}

impl BatchFailure {
    /// A failure of the fragments at `positions`, whose record ids are `ids[position]`.
    fn at(positions: Vec<usize>, ids: &[Uuid], error: RagError) -> Self {
        let failed_ids = positions.iter().map(|&position| ids[position]).collect();
        Self { failed_ids, failed_fragments: positions, error }
    }

    /// A failure of every record in `records` whose id is in `failed`.
    fn of_records(records: &[IndexRecord], failed: &HashSet<Uuid>, error: RagError) -> Self {
        let (failed_fragments, failed_ids) = records
            .iter()
            .enumerate()
            .filter(|(_, record)| failed.contains(&record.id))
            .map(|(position, record)| (position, record.id))
            .unzip();
        Self { failed_ids, failed_fragments, error }
    }
}

impl From<RagError> for BatchFailure {
    fn from(error: RagError) -> Self {
        Self { failed_ids: Vec::new(), failed_fragments: Vec::new(), error }
    }
}

/// Orchestrates [`Extractor`] → [`Chunker`] → [`Embedder`] → [`VectorIndex`]
/// for one document at a time.
pub struct IngestionPipeline {
    config: RagConfig,
    extractor: Arc<dyn Extractor>,
    chunker: Arc<dyn Chunker>,
    embedder: Arc<dyn Embedder>,
    index: Arc<dyn VectorIndex>,
}

impl IngestionPipeline {
    /// Create an ingestion pipeline.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if `config` is invalid or the
    /// embedder and index disagree on dimension or metric.
    pub fn new(
        config: RagConfig,
        extractor: Arc<dyn Extractor>,
        chunker: Arc<dyn Chunker>,
        embedder: Arc<dyn Embedder>,
        index: Arc<dyn VectorIndex>,
    ) -> Result<Self> {
        config.validate()?;
        ensure_compatible(embedder.as_ref(), index.as_ref())?;
        Ok(Self { config, extractor, chunker, embedder, index })
    }

    /// Ingest `document`, returning a summary once every fragment is indexed.
    ///
    /// Nothing is written to the index unless every fragment was embedded.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Ingestion`] with the failed stage; for the
    /// `Embedding` and `Indexing` stages `failed_fragments` holds the
    /// `sequence_index` of every fragment that could not be processed and
    /// `failed_ids` the matching record ids.
    pub async fn ingest(
        &self,
        document: Document,
        cancel: &CancellationToken,
    ) -> Result<IngestionSummary> {
        let mut tracker = StateTracker::new(&document.name);

        self.check_document(&document)
            .map_err(|e| tracker.fail(IngestStage::Receiving, e))?;

        let text = until_cancelled(cancel, self.extractor.extract_text(&document))
            .await
            .map_err(|e| tracker.fail(IngestStage::Extracting, e))?;
        tracker.advance(IngestState::Extracted);

        let fragments = self.chunker.chunk(&document.name, &text);
        let covered: usize = fragments.iter().map(|f| f.text.len()).sum();
        if covered != text.len() {
            let err = RagError::Internal(format!(
                "fragments cover {covered} of {} bytes of extracted text",
                text.len()
            ));
            return Err(tracker.fail(IngestStage::Chunking, err));
        }
        tracker.advance(IngestState::Chunked);

        let summary = self.summarize(&document.name, &text, fragments.len());
        if fragments.is_empty() {
            warn!(document.name = %document.name, "extracted text is empty, nothing to index");
            tracker.advance(IngestState::Complete);
            return Ok(summary);
        }

        let ids: Vec<Uuid> = fragments.iter().map(|_| Uuid::new_v4()).collect();

        tracker.advance(IngestState::Embedding);
        let vectors = self
            .embed_fragments(&fragments, &ids, cancel)
            .await
            .map_err(|f| tracker.fail(IngestStage::Embedding, f))?;

        let records: Vec<IndexRecord> = fragments
            .into_iter()
            .zip(ids)
            .zip(vectors)
            .map(|((fragment, id), vector)| build_record(id, fragment, vector, &document))
            .collect();

        self.index_records(&records, cancel)
            .await
            .map_err(|f| tracker.fail(IngestStage::Indexing, f))?;
        tracker.advance(IngestState::Indexed);

        tracker.advance(IngestState::Complete);
        info!(
            document.name = %document.name,
            fragment_count = summary.fragment_count,
            character_count = summary.character_count,
            "ingested document"
        );

        Ok(summary)
    }

    fn check_document(&self, document: &Document) -> Result<()> {
        if !self.config.accepts_media_type(&document.media_type) {
            return Err(RagError::InvalidArgument(format!(
                "unsupported media type '{}'",
                document.media_type
            )));
        }
        if document.bytes.is_empty() {
            return Err(RagError::InvalidArgument(format!(
                "document '{}' is empty",
                document.name
            )));
        }
        Ok(())
    }

    fn summarize(&self, name: &str, text: &str, fragment_count: usize) -> IngestionSummary {
        let character_count = text.chars().count();
        let mut preview_text: String = text.chars().take(self.config.preview_chars).collect();
        if character_count > self.config.preview_chars {
            preview_text.push_str("...");
        }
        IngestionSummary {
            document_name: name.to_string(),
            fragment_count,
            preview_text,
            character_count,
        }
    }

    fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.config.embed_max_retries,
            base_delay: Duration::from_millis(self.config.retry_backoff_ms),
        }
    }

    /// Embed every fragment, at most `embed_concurrency` at a time.
    ///
    /// Vectors are returned in fragment order regardless of completion order.
    /// The first fragment to exhaust its retry budget aborts the rest.
    async fn embed_fragments(
        &self,
        fragments: &[Fragment],
        ids: &[Uuid],
        cancel: &CancellationToken,
    ) -> std::result::Result<Vec<Vec<f32>>, BatchFailure> {
        let semaphore = Arc::new(Semaphore::new(self.config.embed_concurrency));
        let abort = cancel.child_token();
        let policy = self.retry_policy();
        let mut tasks = JoinSet::new();

        for (position, fragment) in fragments.iter().enumerate() {
            let semaphore = Arc::clone(&semaphore);
            let embedder = Arc::clone(&self.embedder);
            let abort = abort.clone();
            let text = fragment.text.clone();
            tasks.spawn(async move {
                let result = match semaphore.acquire_owned().await {
                    Ok(_permit) => embed_with_retry(embedder.as_ref(), &text, policy, &abort).await,
                    Err(e) => Err(RagError::Internal(format!("embedding semaphore closed: {e}"))),
                };
                (position, result)
            });
        }

        let mut vectors: HashMap<usize, Vec<f32>> = HashMap::with_capacity(fragments.len());
        while let Some(joined) = tasks.join_next().await {
            let (position, result) = match joined {
                Ok(done) => done,
                Err(e) => {
                    abort.cancel();
                    let error = RagError::Internal(format!("embedding task failed: {e}"));
                    return Err(error.into());
                }
            };
            match result {
                Ok(vector) => {
                    vectors.insert(position, vector);
                }
                Err(error) => {
                    abort.cancel();
                    if matches!(error, RagError::Cancelled) {
                        return Err(error.into());
                    }
                    warn!(
                        sequence_index = position,
                        error = %error,
                        "fragment embedding failed, aborting document"
                    );
                    return Err(BatchFailure::at(vec![position], ids, error));
                }
            }
        }

        (0..fragments.len())
            .map(|position| {
                vectors.remove(&position).ok_or_else(|| {
                    let error = RagError::Internal(format!("no embedding for fragment {position}"));
                    BatchFailure::at(vec![position], ids, error)
                })
            })
            .collect()
    }

    /// Upsert `records`, retrying ids reported by a partial failure once.
    ///
    /// `records` must be in fragment order so that positions are sequence indexes.
    async fn index_records(
        &self,
        records: &[IndexRecord],
        cancel: &CancellationToken,
    ) -> std::result::Result<(), BatchFailure> {
        let failed_ids = match until_cancelled(cancel, self.index.upsert(records)).await {
            Ok(()) => return Ok(()),
            Err(RagError::PartialFailure { failed_ids }) => failed_ids,
            Err(error) => {
                let all: HashSet<Uuid> = records.iter().map(|r| r.id).collect();
                return Err(BatchFailure::of_records(records, &all, error));
            }
        };

        let pending: HashSet<Uuid> = failed_ids.iter().copied().collect();
        let retry: Vec<IndexRecord> =
            records.iter().filter(|r| pending.contains(&r.id)).cloned().collect();
        if retry.is_empty() {
            let error = RagError::Internal(format!(
                "index reported {} failed record(s), none of them in the batch",
                failed_ids.len()
            ));
            return Err(error.into());
        }

        warn!(
            failed_count = retry.len(),
            record_count = records.len(),
            "partial upsert failure, retrying failed records once"
        );
        match until_cancelled(cancel, self.index.upsert(&retry)).await {
            Ok(()) => Ok(()),
            Err(RagError::PartialFailure { failed_ids }) => {
                let still_failing: HashSet<Uuid> = failed_ids.iter().copied().collect();
                let error = RagError::PartialFailure { failed_ids };
                Err(BatchFailure::of_records(records, &still_failing, error))
            }
            Err(error) => Err(BatchFailure::of_records(records, &pending, error)),
        }
    }
}

/// Embed `text`, retrying transient failures with exponential backoff.
async fn embed_with_retry(
    embedder: &dyn Embedder,
    text: &str,
    policy: RetryPolicy,
    cancel: &CancellationToken,
) -> Result<Vec<f32>> {
    let mut attempt = 0;
    loop {
        match until_cancelled(cancel, embedder.embed(text)).await {
            Ok(vector) => return ensure_dimensions(embedder.dimensions(), vector),
            Err(e) if e.is_retryable() && attempt < policy.max_retries => {
                attempt += 1;
                let delay = policy.delay(attempt);
                warn!(
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "embedding failed, retrying"
                );
                until_cancelled(cancel, async {
                    tokio::time::sleep(delay).await;
                    Ok(())
                })
                .await?;
            }
            Err(e) => return Err(e),
        }
    }
}

fn build_record(
    id: Uuid,
    fragment: Fragment,
    vector: Vec<f32>,
    document: &Document,
) -> IndexRecord {
    let metadata = HashMap::from([
        (META_SOURCE_DOCUMENT.to_string(), fragment.source_document),
        (META_SEQUENCE_INDEX.to_string(), fragment.sequence_index.to_string()),
        (META_MEDIA_TYPE.to_string(), document.media_type.clone()),
    ]);
    IndexRecord { id, fragment_text: fragment.text, vector, metadata }
}
