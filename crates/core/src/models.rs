use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// A bounded span of normalized document text, the atomic unit of retrieval.
/// Immutable once created; owned by the index after a build.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Chunk {
    pub text: String,
    /// Source document identifier (the pdf file name).
    pub source: String,
    /// 0-based page index within the source document.
    pub page: u32,
    /// 0-based chunk index within that page.
    pub chunk_id: u32,
}

/// Sidecar metadata persisted next to each bundle file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BundleMeta {
    pub bundle_id: String,
    pub pdfs: Vec<String>,
    pub index_name: String,
    pub chunk_tokens: usize,
    pub overlap: usize,
    pub n_chunks: usize,
    pub dimensions: usize,
    pub created_at: DateTime<Utc>,
}

/// Tuning knobs for the whole pipeline. Chunking parameters participate in
/// the bundle identifier; the rest only shape query-time behavior.
#[derive(Debug, Clone)]
pub struct RagConfig {
    pub index_name: String,
    pub max_tokens_per_chunk: usize,
    pub overlap_tokens: usize,
    /// Cap on pages read per pdf, for pilot builds. `None` reads everything.
    pub limit_pages: Option<usize>,
    pub embed_batch_size: usize,
    pub top_k: usize,
    pub confidence_threshold: f32,
    pub max_context_tokens: usize,
    pub max_new_tokens: usize,
    pub temperature: f32,
    pub top_p: f32,
    pub repetition_penalty: f32,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            index_name: "index_trigram_v1".to_string(),
            max_tokens_per_chunk: 256,
            overlap_tokens: 32,
            limit_pages: None,
            embed_batch_size: 512,
            top_k: 3,
            confidence_threshold: 0.2,
            max_context_tokens: 512,
            max_new_tokens: 30,
            temperature: 0.1,
            top_p: 0.7,
            repetition_penalty: 1.0,
        }
    }
}

/// A pdf that was discovered but dropped from the build.
#[derive(Debug)]
pub struct SkippedPdf {
    pub path: PathBuf,
    pub reason: String,
}

/// Outcome of one index build pass.
#[derive(Debug)]
pub struct BuildReport {
    pub bundle_id: String,
    pub n_chunks: usize,
    /// True when a bundle with the same identifier already existed and the
    /// build was skipped.
    pub reused: bool,
    pub skipped_files: Vec<SkippedPdf>,
}
