//! Splitting extracted text into fragments.
//!
//! Only naive fixed-size splitting is provided: fragments are cut every
//! `max_chunk_size` characters with no regard for sentence or paragraph
//! boundaries and no overlap between neighbours. Sizes are counted in
//! Unicode scalar values, so multi-byte text is never cut inside a character.

use crate::document::Fragment;
use crate::error::{RagError, Result};

/// A strategy for splitting a document's text into [`Fragment`]s.
pub trait Chunker: Send + Sync {
    /// Split `text` extracted from `source_document` into ordered fragments.
    ///
    /// Returns an empty `Vec` if `text` is empty.
    fn chunk(&self, source_document: &str, text: &str) -> Vec<Fragment>;
}

/// Splits text into contiguous slices of at most `max_chunk_size` characters.
///
/// Concatenating the fragments in `sequence_index` order reproduces the
/// input exactly. Only the final fragment may be shorter than the limit.
///
/// # Example
///
/// ```rust
/// use askdocs_rag::{Chunker, FixedSizeChunker};
///
/// let chunker = FixedSizeChunker::new(4).unwrap();
/// let fragments = chunker.chunk("notes.txt", "abcdefghij");
/// let texts: Vec<_> = fragments.iter().map(|f| f.text.as_str()).collect();
/// assert_eq!(texts, ["abcd", "efgh", "ij"]);
/// ```
#[derive(Debug, Clone)]
pub struct FixedSizeChunker {
    max_chunk_size: usize,
}

impl FixedSizeChunker {
    /// Create a new `FixedSizeChunker`.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::InvalidArgument`] if `max_chunk_size` is zero.
    pub fn new(max_chunk_size: usize) -> Result<Self> {
        if max_chunk_size == 0 {
            return Err(RagError::InvalidArgument(
                "max_chunk_size must be greater than zero".to_string(),
            ));
        }
        Ok(Self { max_chunk_size })
    }

    /// The configured maximum fragment length in characters.
    pub fn max_chunk_size(&self) -> usize {
        self.max_chunk_size
    }
}

impl Chunker for FixedSizeChunker {
    fn chunk(&self, source_document: &str, text: &str) -> Vec<Fragment> {
        split_by_chars(text, self.max_chunk_size)
            .into_iter()
            .enumerate()
            .map(|(sequence_index, slice)| Fragment {
                source_document: source_document.to_string(),
                sequence_index,
                text: slice.to_string(),
            })
            .collect()
    }
}

/// Chunk `text` into fragments of at most `max_chunk_size` characters.
///
/// # Errors
///
/// Returns [`RagError::InvalidArgument`] if `max_chunk_size` is zero.
pub fn chunk(source_document: &str, text: &str, max_chunk_size: usize) -> Result<Vec<Fragment>> {
    Ok(FixedSizeChunker::new(max_chunk_size)?.chunk(source_document, text))
}

/// Cut `text` every `max_chars` characters. `max_chars` must be non-zero.
fn split_by_chars(text: &str, max_chars: usize) -> Vec<&str> {
    let mut slices = Vec::new();
    let mut start = 0;
    let mut count = 0;

    for (offset, _) in text.char_indices() {
        if count == max_chars {
            slices.push(&text[start..offset]);
            start = offset;
            count = 0;
        }
        count += 1;
    }

    if start < text.len() {
        slices.push(&text[start..]);
    }

    slices
}
