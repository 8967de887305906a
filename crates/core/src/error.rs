use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IndexError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to extract {}: {detail}", .path.display())]
    Extraction { path: PathBuf, detail: String },

    #[error("no pdf files found in {}", .0.display())]
    NoCorpus(PathBuf),

    #[error("no chunks could be extracted from any pdf in {}", .0.display())]
    EmptyBuild(PathBuf),

    #[error("no index bundle found in {}; build an index first", .0.display())]
    NoIndex(PathBuf),

    #[error("corrupt index bundle: {0}")]
    CorruptBundle(String),

    #[error("embedding failed: {0}")]
    Embedding(String),

    #[error("bundle encode/decode error: {0}")]
    Bundle(#[from] bincode::Error),

    #[error("metadata serialization error: {0}")]
    Metadata(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum AnswerError {
    #[error("model load failed: {0}")]
    ModelLoad(#[from] ModelLoadError),

    #[error("generation failed: {0}")]
    Generation(String),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("invalid endpoint url: {0}")]
    Url(#[from] url::ParseError),
}

/// One generation-model candidate that could not be brought up.
#[derive(Debug, Clone)]
pub struct FailedCandidate {
    pub name: String,
    pub reason: String,
}

/// Every candidate in the fallback chain failed to load.
#[derive(Debug)]
pub struct ModelLoadError {
    pub attempts: Vec<FailedCandidate>,
}

impl fmt::Display for ModelLoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "no generation model could be loaded after {} attempt(s)", self.attempts.len())?;
        for attempt in &self.attempts {
            write!(f, "; {}: {}", attempt.name, attempt.reason)?;
        }
        Ok(())
    }
}

impl std::error::Error for ModelLoadError {}

pub type Result<T, E = IndexError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::{FailedCandidate, ModelLoadError};

    #[test]
    fn model_load_error_lists_every_attempt() {
        let error = ModelLoadError {
            attempts: vec![
                FailedCandidate {
                    name: "primary".to_string(),
                    reason: "connection refused".to_string(),
                },
                FailedCandidate {
                    name: "fallback".to_string(),
                    reason: "404".to_string(),
                },
            ],
        };

        let message = error.to_string();
        assert!(message.contains("2 attempt(s)"));
        assert!(message.contains("primary: connection refused"));
        assert!(message.contains("fallback: 404"));
    }
}
