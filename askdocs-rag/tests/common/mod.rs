//! Mock collaborators shared by the integration tests.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use askdocs_rag::{
    Document, Embedder, Extractor, Generator, InMemoryVectorIndex, IndexRecord, RagError, Result,
    ScoredRecord, VectorIndex,
};
use async_trait::async_trait;
use uuid::Uuid;

/// Deterministic hash-based embedding, L2-normalised.
pub fn hash_embedding(text: &str, dimensions: usize) -> Vec<f32> {
    let hash = text.bytes().fold(0u64, |acc, b| acc.wrapping_mul(31).wrapping_add(b as u64));
    let mut emb = vec![0.0f32; dimensions];
    for (i, v) in emb.iter_mut().enumerate() {
        let mixed = (hash ^ (i as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15))
            .wrapping_mul(0xBF58_476D_1CE4_E5B9);
        *v = (mixed >> 40) as f32 / (1u64 << 24) as f32 - 0.5;
    }
    let norm: f32 = emb.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        emb.iter_mut().for_each(|x| *x /= norm);
    }
    emb
}

fn unavailable(message: &str) -> RagError {
    RagError::ProviderUnavailable { provider: "Mock".into(), message: message.into() }
}

/// An embedder with scripted vectors and scripted transient failures.
///
/// Texts without a scripted vector get [`hash_embedding`].
pub struct ScriptedEmbedder {
    dimensions: usize,
    vectors: HashMap<String, Vec<f32>>,
    failures: Mutex<HashMap<String, usize>>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedEmbedder {
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions,
            vectors: HashMap::new(),
            failures: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with_vector(mut self, text: &str, vector: Vec<f32>) -> Self {
        self.vectors.insert(text.to_string(), vector);
        self
    }

    /// Fail the next `times` calls for `text` with `ProviderUnavailable`.
    pub fn fail_transiently(self, text: &str, times: usize) -> Self {
        self.failures.lock().unwrap().insert(text.to_string(), times);
        self
    }

    /// Fail every call for `text`.
    pub fn fail_always(self, text: &str) -> Self {
        self.fail_transiently(text, usize::MAX)
    }

    pub fn calls_for(&self, text: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|t| t.as_str() == text).count()
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl Embedder for ScriptedEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.calls.lock().unwrap().push(text.to_string());
        {
            let mut failures = self.failures.lock().unwrap();
            if let Some(remaining) = failures.get_mut(text) {
                if *remaining > 0 {
                    *remaining = remaining.saturating_sub(1);
                    return Err(unavailable("scripted failure"));
                }
            }
        }
        let vector = self.vectors.get(text).cloned();
        Ok(vector.unwrap_or_else(|| hash_embedding(text, self.dimensions)))
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

/// An embedder that declares one dimension but returns another.
pub struct InconsistentEmbedder {
    pub declared: usize,
    pub actual: usize,
    pub calls: AtomicUsize,
}

impl InconsistentEmbedder {
    pub fn new(declared: usize, actual: usize) -> Self {
        Self { declared, actual, calls: AtomicUsize::new(0) }
    }
}

#[async_trait]
impl Embedder for InconsistentEmbedder {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(vec![0.5; self.actual])
    }

    fn dimensions(&self) -> usize {
        self.declared
    }
}

/// An extractor returning fixed text, or failing.
pub struct StaticExtractor {
    text: Option<String>,
    pub calls: AtomicUsize,
}

impl StaticExtractor {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: Some(text.into()), calls: AtomicUsize::new(0) }
    }

    pub fn failing() -> Self {
        Self { text: None, calls: AtomicUsize::new(0) }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Extractor for StaticExtractor {
    async fn extract_text(&self, _document: &Document) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.text.clone().ok_or_else(|| unavailable("OCR service down"))
    }
}

/// An extractor that never finishes.
pub struct StallingExtractor;

#[async_trait]
impl Extractor for StallingExtractor {
    async fn extract_text(&self, _document: &Document) -> Result<String> {
        std::future::pending().await
    }
}

/// A generator that records prompts and returns a fixed answer, or fails.
pub struct RecordingGenerator {
    answer: Option<String>,
    prompts: Mutex<Vec<String>>,
}

impl RecordingGenerator {
    pub fn new(answer: impl Into<String>) -> Self {
        Self { answer: Some(answer.into()), prompts: Mutex::new(Vec::new()) }
    }

    pub fn failing() -> Self {
        Self { answer: None, prompts: Mutex::new(Vec::new()) }
    }

    pub fn call_count(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }

    pub fn last_prompt(&self) -> Option<String> {
        self.prompts.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl Generator for RecordingGenerator {
    async fn complete(&self, prompt: &str) -> Result<String> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        self.answer.clone().ok_or_else(|| unavailable("model overloaded"))
    }
}

/// Wraps an [`InMemoryVectorIndex`], recording every upsert batch and
/// optionally rejecting records by batch position.
pub struct RecordingIndex {
    inner: InMemoryVectorIndex,
    batches: Mutex<Vec<Vec<Uuid>>>,
    reject_plan: Mutex<VecDeque<Vec<usize>>>,
}

impl RecordingIndex {
    pub fn new(dimensions: usize) -> Self {
        Self {
            inner: InMemoryVectorIndex::new(dimensions),
            batches: Mutex::new(Vec::new()),
            reject_plan: Mutex::new(VecDeque::new()),
        }
    }

    /// For the n-th upsert call, reject the records at the listed positions.
    pub fn with_reject_plan(self, plan: Vec<Vec<usize>>) -> Self {
        *self.reject_plan.lock().unwrap() = plan.into();
        self
    }

    pub fn batches(&self) -> Vec<Vec<Uuid>> {
        self.batches.lock().unwrap().clone()
    }

    pub async fn len(&self) -> usize {
        self.inner.len().await
    }

    pub async fn get(&self, id: &Uuid) -> Option<IndexRecord> {
        self.inner.get(id).await
    }
}

#[async_trait]
impl VectorIndex for RecordingIndex {
    async fn upsert(&self, records: &[IndexRecord]) -> Result<()> {
        self.batches.lock().unwrap().push(records.iter().map(|r| r.id).collect());
        let rejected = self.reject_plan.lock().unwrap().pop_front().unwrap_or_default();

        let (failed, accepted): (Vec<_>, Vec<_>) = records
            .iter()
            .enumerate()
            .partition(|(position, _)| rejected.contains(position));
        let accepted: Vec<IndexRecord> = accepted.into_iter().map(|(_, r)| r.clone()).collect();
        self.inner.upsert(&accepted).await?;

        if failed.is_empty() {
            Ok(())
        } else {
            let failed_ids = failed.into_iter().map(|(_, r)| r.id).collect();
            Err(RagError::PartialFailure { failed_ids })
        }
    }

    async fn query(&self, vector: &[f32], k: usize) -> Result<Vec<ScoredRecord>> {
        self.inner.query(vector, k).await
    }

    fn dimensions(&self) -> usize {
        self.inner.dimensions()
    }
}

/// Build an [`IndexRecord`] with empty metadata.
pub fn record(text: &str, vector: Vec<f32>) -> IndexRecord {
    IndexRecord {
        id: Uuid::new_v4(),
        fragment_text: text.to_string(),
        vector,
        metadata: HashMap::new(),
    }
}

/// `len` characters of repeating lowercase ASCII.
pub fn ascii_text(len: usize) -> String {
    (0..len).map(|i| (b'a' + (i % 26) as u8) as char).collect()
}
