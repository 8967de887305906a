use once_cell::sync::Lazy;
use regex::Regex;

/// Sentences shorter than this (after trimming) are treated as extraction
/// noise and dropped.
const MIN_SENTENCE_CHARS: usize = 20;

/// Characters assumed per token when converting an overlap budget into a
/// character slice of the previous chunk.
const OVERLAP_CHARS_PER_TOKEN: usize = 4;

static SENTENCE_BOUNDARY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[.!?]\s+").expect("static regex"));

#[derive(Debug, Clone, Copy)]
pub struct ChunkingConfig {
    pub max_tokens: usize,
    pub overlap_tokens: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_tokens: 256,
            overlap_tokens: 32,
        }
    }
}

/// Swappable token-length estimator. The default is a cheap word-count
/// heuristic; a real tokenizer can be substituted without touching the
/// chunking logic.
pub type TokenEstimator = fn(&str) -> usize;

/// Approximates token count as `words / 0.75`, rounded up, minimum 1.
pub fn approx_token_len(text: &str) -> usize {
    let words = text.split_whitespace().count();
    (((words as f64) / 0.75).ceil() as usize).max(1)
}

/// Splits text at terminal punctuation followed by whitespace, dropping
/// fragments too short to carry meaning.
pub fn split_sentences(text: &str) -> Vec<String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Vec::new();
    }

    let mut sentences = Vec::new();
    let mut start = 0;
    for boundary in SENTENCE_BOUNDARY.find_iter(trimmed) {
        // The terminal punctuation is a single ascii byte at the match start.
        let end = boundary.start() + 1;
        push_sentence(&mut sentences, &trimmed[start..end]);
        start = boundary.end();
    }
    push_sentence(&mut sentences, &trimmed[start..]);
    sentences
}

fn push_sentence(sentences: &mut Vec<String>, raw: &str) {
    let sentence = raw.trim();
    if sentence.len() > MIN_SENTENCE_CHARS {
        sentences.push(sentence.to_string());
    }
}

/// Greedily packs sentences into chunks of at most `max_tokens` estimated
/// tokens, seeding each new chunk with the character tail of the chunk it
/// follows so context carries across the boundary.
///
/// When no sentence survives the noise filter the whole page collapses into
/// one bounded-length prefix chunk rather than being lost.
pub fn split(text: &str, config: &ChunkingConfig, estimate: TokenEstimator) -> Vec<String> {
    let sentences = split_sentences(text);
    if sentences.is_empty() {
        let prefix: String = text.chars().take(config.max_tokens * 5).collect();
        if prefix.trim().is_empty() {
            return Vec::new();
        }
        return vec![prefix];
    }

    let mut chunks: Vec<String> = Vec::new();
    let mut current: Vec<String> = Vec::new();
    let mut current_tokens = 0usize;

    for sentence in sentences {
        let sentence_tokens = estimate(&sentence);
        if !current.is_empty() && current_tokens + sentence_tokens > config.max_tokens {
            let closed = current.join(" ").trim().to_string();
            if !closed.is_empty() {
                if config.overlap_tokens > 0 {
                    let tail = char_tail(&closed, config.overlap_tokens * OVERLAP_CHARS_PER_TOKEN);
                    current_tokens = estimate(&tail);
                    current = vec![tail];
                } else {
                    current.clear();
                    current_tokens = 0;
                }
                chunks.push(closed);
            } else {
                current.clear();
                current_tokens = 0;
            }
        }
        current_tokens += sentence_tokens;
        current.push(sentence);
    }

    let last = current.join(" ").trim().to_string();
    if !last.is_empty() {
        chunks.push(last);
    }

    chunks.retain(|chunk| !chunk.trim().is_empty());
    chunks
}

/// Last `n` characters of `text`, on char boundaries. Deliberately not
/// sentence-aligned; the overlap seed may start mid-word.
fn char_tail(text: &str, n: usize) -> String {
    let count = text.chars().count();
    text.chars().skip(count.saturating_sub(n)).collect()
}
