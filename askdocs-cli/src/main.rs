//! `askdocs`: ingest text documents and ask grounded questions about them.
//!
//! ```text
//! askdocs -f handbook.md -f faq.txt "How many vacation days do I get?"
//! ```
//!
//! Embeddings and answers come from an OpenAI-compatible API; the index
//! lives in memory for the duration of the run.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use askdocs_rag::openai::{OpenAIEmbedder, OpenAIGenerator};
use askdocs_rag::{
    Answer, Document, Embedder, InMemoryVectorIndex, IngestionSummary, PlainTextExtractor,
    RagConfig, RagPipeline,
};
use clap::Parser;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "askdocs", version, about = "Ask questions about your documents")]
struct Cli {
    /// Document to ingest (repeatable)
    #[arg(short = 'f', long = "file", required = true)]
    files: Vec<PathBuf>,

    /// Question to answer from the ingested documents
    question: Option<String>,

    /// Maximum fragment size in characters
    #[arg(long, default_value_t = 1000)]
    chunk_size: usize,

    /// Number of fragments used as context
    #[arg(long, default_value_t = 3)]
    top_k: usize,

    /// Maximum concurrent embedding requests
    #[arg(long, default_value_t = 4)]
    concurrency: usize,

    /// Abort the whole run after this many seconds
    #[arg(long)]
    timeout_secs: Option<u64>,

    /// API key for the embedding and chat endpoints
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    api_key: String,

    /// Base URL of an OpenAI-compatible API
    #[arg(long, env = "ASKDOCS_BASE_URL")]
    base_url: Option<String>,

    /// Embedding model
    #[arg(long, env = "ASKDOCS_EMBEDDING_MODEL")]
    embedding_model: Option<String>,

    /// Embedding dimensions (required for models that are not 1536-dimensional)
    #[arg(long)]
    dimensions: Option<usize>,

    /// Chat model used to generate the answer
    #[arg(long, env = "ASKDOCS_CHAT_MODEL")]
    chat_model: Option<String>,

    /// Print results as JSON
    #[arg(long, default_value_t = false)]
    json: bool,
}

#[derive(Serialize)]
struct Report {
    documents: Vec<IngestionSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    answer: Option<Answer>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let pipeline = build_pipeline(&cli)?;
    let cancel = cancellation(cli.timeout_secs);

    let mut documents = Vec::with_capacity(cli.files.len());
    for path in &cli.files {
        let document = read_document(path).await?;
        let summary = pipeline
            .ingest(document, &cancel)
            .await
            .with_context(|| format!("failed to ingest {}", path.display()))?;
        documents.push(summary);
    }

    let answer = match cli.question.as_deref() {
        Some(question) => {
            Some(pipeline.ask(question, &cancel).await.context("failed to answer question")?)
        }
        None => None,
    };

    let report = Report { documents, answer };
    if cli.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }
    Ok(())
}

fn build_pipeline(cli: &Cli) -> Result<RagPipeline> {
    let mut embedder = OpenAIEmbedder::new(cli.api_key.clone())?;
    let mut generator = OpenAIGenerator::new(cli.api_key.clone())?;
    if let Some(base_url) = &cli.base_url {
        embedder = embedder.with_base_url(base_url.as_str());
        generator = generator.with_base_url(base_url.as_str());
    }
    if let Some(model) = &cli.embedding_model {
        embedder = embedder.with_model(model.as_str());
    }
    if let Some(dimensions) = cli.dimensions {
        embedder = embedder.with_dimensions(dimensions);
    }
    if let Some(model) = &cli.chat_model {
        generator = generator.with_model(model.as_str());
    }

    let config = RagConfig::builder()
        .max_chunk_size(cli.chunk_size)
        .top_k(cli.top_k)
        .embed_concurrency(cli.concurrency)
        .allowed_media_types(PlainTextExtractor::MEDIA_TYPES)
        .build()?;

    let index = InMemoryVectorIndex::new(embedder.dimensions());
    let pipeline = RagPipeline::builder()
        .config(config)
        .extractor(Arc::new(PlainTextExtractor))
        .embedder(Arc::new(embedder))
        .vector_index(Arc::new(index))
        .generator(Arc::new(generator))
        .build()?;
    Ok(pipeline)
}

/// A token cancelled on Ctrl-C or when `timeout_secs` elapses.
fn cancellation(timeout_secs: Option<u64>) -> CancellationToken {
    let cancel = CancellationToken::new();

    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupted, cancelling");
            on_signal.cancel();
        }
    });

    if let Some(secs) = timeout_secs {
        let on_timeout = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(secs)).await;
            warn!(timeout_secs = secs, "timed out, cancelling");
            on_timeout.cancel();
        });
    }

    cancel
}

async fn read_document(path: &Path) -> Result<Document> {
    let Some(media_type) = media_type_for(path) else {
        bail!("{}: unsupported file type, expected .txt or .md", path.display());
    };
    let bytes =
        tokio::fs::read(path).await.with_context(|| format!("failed to read {}", path.display()))?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    info!(document.name = %name, media_type, bytes = bytes.len(), "read document");
    Ok(Document::new(name, media_type, bytes))
}

fn media_type_for(path: &Path) -> Option<&'static str> {
    let extension = path.extension()?.to_str()?.to_ascii_lowercase();
    match extension.as_str() {
        "txt" | "text" | "log" => Some("text/plain"),
        "md" | "markdown" => Some("text/markdown"),
        _ => None,
    }
}

fn print_report(report: &Report) {
    for summary in &report.documents {
        println!(
            "Ingested {} ({} characters, {} fragments)",
            summary.document_name, summary.character_count, summary.fragment_count
        );
        println!("  {}", summary.preview_text.replace('\n', " "));
    }
    if let Some(answer) = &report.answer {
        println!();
        println!("Q: {}", answer.question);
        println!("A: {}", answer.answer_text);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn media_type_follows_extension() {
        assert_eq!(media_type_for(Path::new("notes.TXT")), Some("text/plain"));
        assert_eq!(media_type_for(Path::new("docs/README.md")), Some("text/markdown"));
        assert_eq!(media_type_for(Path::new("scan.pdf")), None);
        assert_eq!(media_type_for(Path::new("Makefile")), None);
    }

    #[test]
    fn cli_parses_repeated_files_and_question() {
        let cli = Cli::try_parse_from([
            "askdocs",
            "-f",
            "a.txt",
            "--file",
            "b.md",
            "--top-k",
            "5",
            "--api-key",
            "sk-test",
            "What is covered?",
        ])
        .unwrap();

        assert_eq!(cli.files, [PathBuf::from("a.txt"), PathBuf::from("b.md")]);
        assert_eq!(cli.question.as_deref(), Some("What is covered?"));
        assert_eq!(cli.top_k, 5);
        assert_eq!(cli.chunk_size, 1000);
        assert!(!cli.json);
    }
}
