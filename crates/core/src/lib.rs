pub mod chunking;
pub mod context;
pub mod embeddings;
pub mod error;
pub mod extractor;
pub mod generation;
pub mod index;
pub mod models;
pub mod normalize;
pub mod orchestrator;
pub mod policy;
pub mod retrieval;

pub use chunking::{approx_token_len, split, split_sentences, ChunkingConfig, TokenEstimator};
pub use context::{context_budget, pack};
pub use embeddings::{CharacterNgramEmbedder, Embedder, DEFAULT_EMBEDDING_DIMENSIONS};
pub use error::{AnswerError, FailedCandidate, IndexError, ModelLoadError};
pub use extractor::{LopdfBackend, PdfBackend, PdfExtractBackend, PdfExtractor};
pub use generation::{
    fallback_chain, GenParams, Generator, HttpGenerator, LazyGenerator, ModelCandidate,
    ModelHandle, DEFAULT_MODEL, FALLBACK_MODELS,
};
pub use index::{build, bundle_id, digest_file, discover_pdfs, load_latest, LoadedIndex};
pub use models::{BuildReport, BundleMeta, Chunk, RagConfig, SkippedPdf};
pub use orchestrator::QaEngine;
pub use policy::{
    build_prompt, fast_template, route, system_preamble, trim_generated, Topic,
    NO_INFORMATION_ANSWER, UNKNOWN_ANSWER,
};
pub use retrieval::{search, Hit};
