//! Data types for documents, fragments, index records, and pipeline outputs.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Metadata key holding the logical name of the source document.
pub const META_SOURCE_DOCUMENT: &str = "source_document";
/// Metadata key holding the fragment's position within its document.
pub const META_SEQUENCE_INDEX: &str = "sequence_index";
/// Metadata key holding the media type the document was uploaded with.
pub const META_MEDIA_TYPE: &str = "media_type";

/// Whether the `declared` media type is `expected`.
///
/// Parameters such as `; charset=utf-8` are ignored and the comparison is
/// case-insensitive.
pub fn media_type_matches(declared: &str, expected: &str) -> bool {
    let essence = declared.split(';').next().unwrap_or_default().trim();
    essence.eq_ignore_ascii_case(expected.trim())
}

/// An uploaded document: raw bytes, declared media type, and a logical name.
///
/// Documents are transient and owned by the request that uploaded them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    /// Logical name of the document (typically the uploaded file name).
    pub name: String,
    /// Declared media type, e.g. `application/pdf`.
    pub media_type: String,
    /// The raw document content.
    pub bytes: Vec<u8>,
}

impl Document {
    /// Create a new document.
    pub fn new(name: impl Into<String>, media_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self { name: name.into(), media_type: media_type.into(), bytes }
    }
}

/// A bounded-size slice of a document's extracted text.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Fragment {
    /// Name of the document this fragment was cut from.
    pub source_document: String,
    /// Zero-based position of this fragment within the document.
    pub sequence_index: usize,
    /// The fragment text.
    pub text: String,
}

/// A stored fragment with its embedding, as held by a
/// [`VectorIndex`](crate::vectorstore::VectorIndex).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IndexRecord {
    /// Unique identifier of the record.
    pub id: Uuid,
    /// The fragment text.
    pub fragment_text: String,
    /// The embedding of `fragment_text`.
    pub vector: Vec<f32>,
    /// Key-value metadata; see the `META_*` constants.
    pub metadata: HashMap<String, String>,
}

/// An [`IndexRecord`] paired with its similarity to a query vector.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScoredRecord {
    /// The matched record.
    pub record: IndexRecord,
    /// Cosine similarity to the query (higher is more similar).
    pub score: f32,
}

/// The result of a successful ingestion.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IngestionSummary {
    /// Logical name of the ingested document.
    pub document_name: String,
    /// Number of fragments that were embedded and indexed.
    pub fragment_count: usize,
    /// The beginning of the extracted text.
    pub preview_text: String,
    /// Length of the extracted text in characters.
    pub character_count: usize,
}

/// A grounded answer to a user question.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Answer {
    /// The question as submitted.
    pub question: String,
    /// The generated (or canned) answer.
    pub answer_text: String,
}
