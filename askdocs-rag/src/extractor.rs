//! Extractor capability for turning uploaded documents into plain text.

use async_trait::async_trait;
use tracing::debug;

use crate::document::{Document, media_type_matches};
use crate::error::{RagError, Result};

/// Converts a raw [`Document`] (PDF, image, text) into plain text.
///
/// OCR-backed implementations live outside this crate; the pipeline calls
/// [`extract_text`](Extractor::extract_text) exactly once per document and
/// surfaces any failure without retrying.
#[async_trait]
pub trait Extractor: Send + Sync {
    /// Extract the full text content of `document`.
    async fn extract_text(&self, document: &Document) -> Result<String>;
}

/// An [`Extractor`] for documents that already are UTF-8 text.
///
/// Accepts `text/plain` and `text/markdown`, with any parameters and in any
/// letter case; any other media type is rejected with
/// [`RagError::InvalidInput`].
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainTextExtractor;

impl PlainTextExtractor {
    /// Media types this extractor understands.
    pub const MEDIA_TYPES: [&'static str; 2] = ["text/plain", "text/markdown"];
}

#[async_trait]
impl Extractor for PlainTextExtractor {
    async fn extract_text(&self, document: &Document) -> Result<String> {
        if !Self::MEDIA_TYPES.iter().any(|t| media_type_matches(&document.media_type, t)) {
            return Err(RagError::InvalidInput {
                provider: "PlainText".into(),
                message: format!("cannot extract text from '{}'", document.media_type),
            });
        }

        debug!(document.name = %document.name, byte_len = document.bytes.len(), "decoding text");
        String::from_utf8(document.bytes.clone()).map_err(|e| RagError::InvalidInput {
            provider: "PlainText".into(),
            message: format!("document '{}' is not valid UTF-8: {e}", document.name),
        })
    }
}
