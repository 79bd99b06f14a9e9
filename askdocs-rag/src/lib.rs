//! # askdocs-rag
//!
//! Document ingestion and grounded question answering.
//!
//! Uploaded documents are turned into text by an [`Extractor`], cut into
//! fixed-size [`Fragment`]s, embedded by an [`Embedder`], and written to a
//! [`VectorIndex`]. Questions are embedded the same way, matched against the
//! index, and answered by a [`Generator`] that is only given the retrieved
//! fragments as context.
//!
//! The four collaborators are traits, so any embedding provider, vector
//! store, OCR service, or language model can be plugged in. The crate ships
//! [`InMemoryVectorIndex`], [`PlainTextExtractor`], and (behind the `openai`
//! feature) OpenAI-compatible embedder and generator adapters.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//!
//! use askdocs_rag::{Document, InMemoryVectorIndex, PlainTextExtractor, RagPipeline};
//! use askdocs_rag::openai::{OpenAIEmbedder, OpenAIGenerator};
//! use tokio_util::sync::CancellationToken;
//!
//! let pipeline = RagPipeline::builder()
//!     .extractor(Arc::new(PlainTextExtractor))
//!     .embedder(Arc::new(OpenAIEmbedder::from_env()?))
//!     .vector_index(Arc::new(InMemoryVectorIndex::new(1536)))
//!     .generator(Arc::new(OpenAIGenerator::from_env()?))
//!     .build()?;
//!
//! let cancel = CancellationToken::new();
//! let doc = Document::new("faq.txt", "text/plain", std::fs::read("faq.txt")?);
//! let summary = pipeline.ingest(doc, &cancel).await?;
//! let answer = pipeline.ask("How do refunds work?", &cancel).await?;
//! ```

pub mod chunking;
pub mod config;
pub mod document;
pub mod embedding;
pub mod error;
pub mod extractor;
pub mod generator;
pub mod ingest;
pub mod inmemory;
pub mod pipeline;
pub mod prompt;
pub mod retrieval;
pub mod vectorstore;

#[cfg(feature = "openai")]
pub mod openai;

pub use chunking::{Chunker, FixedSizeChunker, chunk};
pub use config::{RagConfig, RagConfigBuilder};
pub use document::{
    Answer, Document, Fragment, IndexRecord, IngestionSummary, ScoredRecord, media_type_matches,
};
pub use embedding::Embedder;
pub use error::{IngestStage, RagError, Result, RetrievalStep};
pub use extractor::{Extractor, PlainTextExtractor};
pub use generator::Generator;
pub use ingest::{IngestState, IngestionPipeline};
pub use inmemory::InMemoryVectorIndex;
pub use pipeline::{RagPipeline, RagPipelineBuilder, ensure_compatible};
pub use prompt::NO_MATCH_ANSWER;
pub use retrieval::RetrievalPipeline;
pub use vectorstore::{Similarity, VectorIndex, cosine_similarity};
