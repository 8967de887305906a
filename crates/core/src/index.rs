use crate::chunking::{self, ChunkingConfig};
use crate::embeddings::Embedder;
use crate::error::IndexError;
use crate::extractor::PdfExtractor;
use crate::models::{BuildReport, BundleMeta, Chunk, RagConfig, SkippedPdf};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::{info, warn};
use walkdir::WalkDir;

pub const BUNDLE_EXTENSION: &str = "bundle";

/// On-disk layout of a bundle: strictly parallel arrays, one entry per
/// chunk. Lengths must agree or the bundle is corrupt.
#[derive(Debug, Serialize, Deserialize)]
struct BundlePayload {
    vectors: Vec<Vec<f32>>,
    texts: Vec<String>,
    sources: Vec<String>,
    pages: Vec<u32>,
    cids: Vec<u32>,
}

/// A bundle deserialized into the in-memory chunk/vector sequences.
#[derive(Debug)]
pub struct LoadedIndex {
    pub chunks: Vec<Chunk>,
    pub vectors: Vec<Vec<f32>>,
    pub meta: Option<BundleMeta>,
}

/// Lists `*.pdf` files directly inside `corpus_dir`, sorted by path.
/// Subdirectories are not searched; sorted order is what makes chunk ids
/// and the bundle identifier reproducible.
pub fn discover_pdfs(corpus_dir: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();

    for entry in WalkDir::new(corpus_dir)
        .max_depth(1)
        .into_iter()
        .filter_map(|item| item.ok())
    {
        if !entry.file_type().is_file() {
            continue;
        }

        let is_pdf = entry
            .path()
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"));

        if is_pdf {
            files.push(entry.path().to_path_buf());
        }
    }

    files.sort_unstable();
    files
}

pub fn digest_file(path: &Path) -> Result<String, IndexError> {
    let bytes = fs::read(path)?;
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    Ok(format!("{:x}", hasher.finalize()))
}

/// Deterministic bundle identifier: sha256 over every file's content hash
/// in sorted-path order, joined with the chunking parameters and index
/// name, truncated to 16 hex chars. Byte-identical corpora plus identical
/// parameters always map to the same identifier.
pub fn bundle_id(pdf_paths: &[PathBuf], config: &RagConfig) -> Result<String, IndexError> {
    let mut parts = Vec::with_capacity(pdf_paths.len() + 3);
    for path in pdf_paths {
        parts.push(digest_file(path)?);
    }
    parts.push(config.max_tokens_per_chunk.to_string());
    parts.push(config.overlap_tokens.to_string());
    parts.push(config.index_name.clone());

    let mut hasher = Sha256::new();
    hasher.update(parts.join("|").as_bytes());
    let digest = format!("{:x}", hasher.finalize());
    Ok(digest[..16].to_string())
}

fn bundle_path(cache_dir: &Path, id: &str) -> PathBuf {
    cache_dir.join(format!("{id}.{BUNDLE_EXTENSION}"))
}

fn meta_path(cache_dir: &Path, id: &str) -> PathBuf {
    cache_dir.join(format!("{id}.meta.json"))
}

/// Builds an index bundle from every pdf in `corpus_dir` and persists it
/// under `cache_dir`. A file that cannot be read or extracted is skipped
/// with a warning and recorded in the report; the build fails only when no
/// pdf exists at all or none yields a single chunk.
///
/// When a bundle with the same identifier already exists on disk the build
/// is skipped and the existing bundle is reused.
pub fn build(
    corpus_dir: &Path,
    cache_dir: &Path,
    config: &RagConfig,
    embedder: &dyn Embedder,
    extractor: &PdfExtractor,
) -> Result<BuildReport, IndexError> {
    fs::create_dir_all(cache_dir)?;

    let mut skipped_files = Vec::new();
    let discovered = discover_pdfs(corpus_dir);
    if discovered.is_empty() {
        return Err(IndexError::NoCorpus(corpus_dir.to_path_buf()));
    }

    // Unreadable files cannot participate in the content hash, so they are
    // dropped before the identifier is computed.
    let mut pdf_paths = Vec::new();
    for path in discovered {
        match digest_file(&path) {
            Ok(_) => pdf_paths.push(path),
            Err(error) => {
                warn!(path = %path.display(), %error, "skipping unreadable pdf");
                skipped_files.push(SkippedPdf {
                    path,
                    reason: error.to_string(),
                });
            }
        }
    }
    if pdf_paths.is_empty() {
        return Err(IndexError::NoCorpus(corpus_dir.to_path_buf()));
    }

    let id = bundle_id(&pdf_paths, config)?;
    if bundle_path(cache_dir, &id).exists() {
        let n_chunks = read_meta(&meta_path(cache_dir, &id))
            .map(|meta| meta.n_chunks)
            .unwrap_or(0);
        info!(bundle_id = %id, "bundle already built, reusing");
        return Ok(BuildReport {
            bundle_id: id,
            n_chunks,
            reused: true,
            skipped_files,
        });
    }

    let chunking = ChunkingConfig {
        max_tokens: config.max_tokens_per_chunk,
        overlap_tokens: config.overlap_tokens,
    };

    let mut chunks: Vec<Chunk> = Vec::new();
    let mut indexed_pdfs = Vec::new();
    for path in &pdf_paths {
        let source = path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("unknown.pdf")
            .to_string();

        let pages = match extractor.extract_pages(path, config.limit_pages) {
            Ok(pages) => pages,
            Err(error) => {
                warn!(path = %path.display(), %error, "skipping pdf");
                skipped_files.push(SkippedPdf {
                    path: path.clone(),
                    reason: error.to_string(),
                });
                continue;
            }
        };

        for (page_idx, page_text) in pages.iter().enumerate() {
            let page_chunks = chunking::split(page_text, &chunking, chunking::approx_token_len);
            for (chunk_idx, text) in page_chunks.into_iter().enumerate() {
                chunks.push(Chunk {
                    text,
                    source: source.clone(),
                    page: page_idx as u32,
                    chunk_id: chunk_idx as u32,
                });
            }
        }
        indexed_pdfs.push(source);
    }

    if chunks.is_empty() {
        return Err(IndexError::EmptyBuild(corpus_dir.to_path_buf()));
    }

    info!(bundle_id = %id, n_chunks = chunks.len(), "embedding chunks");
    let texts: Vec<String> = chunks.iter().map(|chunk| chunk.text.clone()).collect();
    let mut vectors: Vec<Vec<f32>> = Vec::with_capacity(texts.len());
    for batch in texts.chunks(config.embed_batch_size.max(1)) {
        vectors.extend(embedder.embed_batch(batch));
    }
    if vectors.len() != chunks.len() {
        return Err(IndexError::Embedding(format!(
            "embedder returned {} vectors for {} chunks",
            vectors.len(),
            chunks.len()
        )));
    }

    let meta = BundleMeta {
        bundle_id: id.clone(),
        pdfs: indexed_pdfs,
        index_name: config.index_name.clone(),
        chunk_tokens: config.max_tokens_per_chunk,
        overlap: config.overlap_tokens,
        n_chunks: chunks.len(),
        dimensions: embedder.dimensions(),
        created_at: Utc::now(),
    };

    let n_chunks = chunks.len();
    persist_bundle(cache_dir, &id, &chunks, &vectors, &meta)?;
    info!(bundle_id = %id, n_chunks, "bundle written");

    Ok(BuildReport {
        bundle_id: id,
        n_chunks,
        reused: false,
        skipped_files,
    })
}

/// Writes the parallel-array bundle file plus its json sidecar. Bundles
/// are write-once: a changed corpus hashes to a different identifier and a
/// fresh pair of files.
pub fn persist_bundle(
    cache_dir: &Path,
    id: &str,
    chunks: &[Chunk],
    vectors: &[Vec<f32>],
    meta: &BundleMeta,
) -> Result<(), IndexError> {
    let payload = BundlePayload {
        vectors: vectors.to_vec(),
        texts: chunks.iter().map(|chunk| chunk.text.clone()).collect(),
        sources: chunks.iter().map(|chunk| chunk.source.clone()).collect(),
        pages: chunks.iter().map(|chunk| chunk.page).collect(),
        cids: chunks.iter().map(|chunk| chunk.chunk_id).collect(),
    };

    fs::write(bundle_path(cache_dir, id), bincode::serialize(&payload)?)?;
    fs::write(meta_path(cache_dir, id), serde_json::to_vec_pretty(meta)?)?;
    Ok(())
}

fn read_meta(path: &Path) -> Option<BundleMeta> {
    let bytes = fs::read(path).ok()?;
    serde_json::from_slice(&bytes).ok()
}

fn latest_bundle_path(cache_dir: &Path) -> Result<Option<PathBuf>, IndexError> {
    if !cache_dir.exists() {
        return Ok(None);
    }

    let mut newest: Option<(SystemTime, PathBuf)> = None;
    for entry in fs::read_dir(cache_dir)? {
        let entry = entry?;
        let path = entry.path();
        let is_bundle = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext == BUNDLE_EXTENSION);
        if !is_bundle {
            continue;
        }

        let modified = entry.metadata()?.modified()?;
        let newer = newest
            .as_ref()
            .map(|(time, _)| modified > *time)
            .unwrap_or(true);
        if newer {
            newest = Some((modified, path));
        }
    }

    Ok(newest.map(|(_, path)| path))
}

/// Loads the most recently modified bundle in `cache_dir` back into memory,
/// checking that every parallel array has the same length.
pub fn load_latest(cache_dir: &Path) -> Result<LoadedIndex, IndexError> {
    let path = latest_bundle_path(cache_dir)?
        .ok_or_else(|| IndexError::NoIndex(cache_dir.to_path_buf()))?;
    load_bundle(cache_dir, &path)
}

fn load_bundle(cache_dir: &Path, path: &Path) -> Result<LoadedIndex, IndexError> {
    let bytes = fs::read(path)?;
    let payload: BundlePayload = bincode::deserialize(&bytes)
        .map_err(|error| IndexError::CorruptBundle(format!("{}: {error}", path.display())))?;

    let n = payload.texts.len();
    let aligned = payload.vectors.len() == n
        && payload.sources.len() == n
        && payload.pages.len() == n
        && payload.cids.len() == n;
    if !aligned {
        return Err(IndexError::CorruptBundle(format!(
            "parallel arrays disagree in {}: vectors={} texts={} sources={} pages={} cids={}",
            path.display(),
            payload.vectors.len(),
            n,
            payload.sources.len(),
            payload.pages.len(),
            payload.cids.len(),
        )));
    }

    let meta = path
        .file_stem()
        .and_then(|stem| stem.to_str())
        .and_then(|id| read_meta(&meta_path(cache_dir, id)));

    let chunks = payload
        .texts
        .into_iter()
        .zip(payload.sources)
        .zip(payload.pages)
        .zip(payload.cids)
        .map(|(((text, source), page), chunk_id)| Chunk {
            text,
            source,
            page,
            chunk_id,
        })
        .collect();

    info!(path = %path.display(), "index bundle loaded");
    Ok(LoadedIndex {
        chunks,
        vectors: payload.vectors,
        meta,
    })
}
