//! Error types for the `askdocs-rag` crate.

use std::fmt;

use thiserror::Error;
use uuid::Uuid;

/// The ingestion stage an [`RagError::Ingestion`] failure occurred in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IngestStage {
    /// Validating the uploaded document before any external call.
    Receiving,
    /// Converting the document into plain text.
    Extracting,
    /// Splitting extracted text into fragments.
    Chunking,
    /// Computing fragment embeddings.
    Embedding,
    /// Writing records to the vector index.
    Indexing,
}

impl fmt::Display for IngestStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Receiving => "Receiving",
            Self::Extracting => "Extracting",
            Self::Chunking => "Chunking",
            Self::Embedding => "Embedding",
            Self::Indexing => "Indexing",
        };
        f.write_str(name)
    }
}

/// The retrieval step an [`RagError::Retrieval`] failure occurred in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RetrievalStep {
    /// Validating the question.
    Validating,
    /// Embedding the question.
    Embedding,
    /// Querying the vector index.
    Searching,
    /// Calling the generator.
    Generating,
}

impl fmt::Display for RetrievalStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Validating => "Validating",
            Self::Embedding => "Embedding",
            Self::Searching => "Searching",
            Self::Generating => "Generating",
        };
        f.write_str(name)
    }
}

/// Errors that can occur in ingestion and retrieval.
#[derive(Debug, Error)]
pub enum RagError {
    /// The caller passed an argument outside its valid range. Never retried.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// A collaborator rejected its input (empty, oversized, undecodable). Never retried.
    #[error("Invalid input ({provider}): {message}")]
    InvalidInput {
        /// The component that rejected the input.
        provider: String,
        /// A description of the failure.
        message: String,
    },

    /// A transient upstream failure; the caller may retry with backoff.
    #[error("Provider unavailable ({provider}): {message}")]
    ProviderUnavailable {
        /// The provider that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
    },

    /// Some records of a batch were written and some were not.
    #[error("Partial failure: {} record(s) failed", failed_ids.len())]
    PartialFailure {
        /// Ids of the records that were not written.
        failed_ids: Vec<Uuid>,
    },

    /// A vector did not have the dimension the index or embedder declares.
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// The declared dimension.
        expected: usize,
        /// The dimension that was observed.
        actual: usize,
    },

    /// A configuration validation error.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// The operation was cancelled by the caller.
    #[error("Operation cancelled")]
    Cancelled,

    /// An unexpected failure inside the pipeline.
    #[error("Internal error: {0}")]
    Internal(String),

    /// A document ingestion failed at `stage`.
    #[error("Ingestion failed at {stage} stage{}: {source}", fragment_note(.failed_fragments))]
    Ingestion {
        /// The stage that failed.
        stage: IngestStage,
        /// Record ids that failed, for Embedding and Indexing failures.
        failed_ids: Vec<Uuid>,
        /// `sequence_index` of each failed fragment, parallel to `failed_ids`.
        failed_fragments: Vec<usize>,
        /// The underlying error.
        #[source]
        source: Box<RagError>,
    },

    /// A question could not be answered because `step` failed.
    #[error("Retrieval failed at {step} step: {source}")]
    Retrieval {
        /// The step that failed.
        step: RetrievalStep,
        /// The underlying error.
        #[source]
        source: Box<RagError>,
    },
}

impl RagError {
    /// Wrap `self` as an ingestion failure at `stage`.
    pub fn at_stage(
        self,
        stage: IngestStage,
        failed_ids: Vec<Uuid>,
        failed_fragments: Vec<usize>,
    ) -> Self {
        RagError::Ingestion { stage, failed_ids, failed_fragments, source: Box::new(self) }
    }

    /// Wrap `self` as a retrieval failure at `step`.
    pub fn at_step(self, step: RetrievalStep) -> Self {
        RagError::Retrieval { step, source: Box::new(self) }
    }

    /// Return the innermost error, unwrapping stage context.
    pub fn root(&self) -> &RagError {
        match self {
            RagError::Ingestion { source, .. } | RagError::Retrieval { source, .. } => {
                source.root()
            }
            other => other,
        }
    }

    /// Whether the caller may reasonably retry the failed operation.
    pub fn is_retryable(&self) -> bool {
        matches!(self.root(), RagError::ProviderUnavailable { .. })
    }

    /// Whether the failure was caused by cancellation.
    pub fn is_cancelled(&self) -> bool {
        matches!(self.root(), RagError::Cancelled)
    }
}

fn fragment_note(failed_fragments: &[usize]) -> String {
    if failed_fragments.is_empty() {
        String::new()
    } else {
        format!(" (fragments {failed_fragments:?})")
    }
}

/// A convenience result type for RAG operations.
pub type Result<T> = std::result::Result<T, RagError>;
