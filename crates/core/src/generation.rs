use crate::error::{AnswerError, FailedCandidate, ModelLoadError};
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::time::Duration;
use tracing::{info, warn};
use url::Url;

/// Decoding parameters forwarded to the generation service.
#[derive(Debug, Clone, Copy)]
pub struct GenParams {
    pub max_new_tokens: usize,
    pub temperature: f32,
    pub top_p: f32,
    pub repetition_penalty: f32,
}

/// Boundary to the generation model: an opaque prompt-to-text call.
pub trait Generator {
    fn generate(&self, prompt: &str, params: &GenParams) -> Result<String, AnswerError>;
}

/// One endpoint/model pair in the fallback chain.
#[derive(Debug, Clone)]
pub struct ModelCandidate {
    pub name: String,
    pub endpoint: String,
    pub api_key: Option<String>,
}

pub const DEFAULT_MODEL: &str = "qwen2.5-0.5b-instruct";

/// Alternates tried in order when the preferred model cannot be reached.
pub const FALLBACK_MODELS: [&str; 2] = ["tinyllama-1.1b-chat", "distilgpt2"];

/// The preferred candidate followed by the fixed fallback list, duplicates
/// removed, all against the same endpoint.
pub fn fallback_chain(
    preferred: &str,
    endpoint: &str,
    api_key: Option<&str>,
) -> Vec<ModelCandidate> {
    let mut names = vec![preferred.to_string()];
    for name in FALLBACK_MODELS {
        if name != preferred {
            names.push(name.to_string());
        }
    }

    names
        .into_iter()
        .map(|name| ModelCandidate {
            name,
            endpoint: endpoint.to_string(),
            api_key: api_key.map(str::to_string),
        })
        .collect()
}

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    max_tokens: usize,
    temperature: f32,
    top_p: f32,
    repetition_penalty: f32,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    choices: Vec<CompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    text: String,
}

/// Blocking client for an OpenAI-style completion endpoint.
#[derive(Debug)]
pub struct HttpGenerator {
    client: Client,
    candidate: ModelCandidate,
}

impl HttpGenerator {
    /// Validates the candidate's endpoint and checks the host is reachable.
    /// Any HTTP status counts as reachable; only transport failures reject
    /// the candidate.
    pub fn connect(candidate: ModelCandidate) -> Result<Self, AnswerError> {
        let endpoint = Url::parse(&candidate.endpoint)?;
        let client = Client::builder()
            .timeout(Duration::from_secs(120))
            .build()?;

        client.get(endpoint).send()?;
        Ok(Self { client, candidate })
    }

    pub fn model_name(&self) -> &str {
        &self.candidate.name
    }
}

impl Generator for HttpGenerator {
    fn generate(&self, prompt: &str, params: &GenParams) -> Result<String, AnswerError> {
        let payload = CompletionRequest {
            model: &self.candidate.name,
            prompt,
            max_tokens: params.max_new_tokens,
            temperature: params.temperature,
            top_p: params.top_p,
            repetition_penalty: params.repetition_penalty,
        };

        let mut request = self.client.post(&self.candidate.endpoint).json(&payload);
        if let Some(api_key) = &self.candidate.api_key {
            request = request.bearer_auth(api_key);
        }

        let response = request.send()?;
        if !response.status().is_success() {
            return Err(AnswerError::Generation(format!(
                "completion request to {} returned {}",
                self.candidate.endpoint,
                response.status()
            )));
        }

        let body: CompletionResponse = response.json()?;
        body.choices
            .into_iter()
            .next()
            .map(|choice| choice.text)
            .ok_or_else(|| AnswerError::Generation("completion response had no choices".into()))
    }
}

/// Owned handle on the loaded generation model. One live handle per
/// process by cooperative discipline; inject it into the answer pipeline
/// rather than reaching for global state.
#[derive(Debug)]
pub struct ModelHandle {
    generator: Option<HttpGenerator>,
}

impl ModelHandle {
    /// Tries each candidate in order; the first that connects wins. When
    /// every candidate fails the aggregate error carries each attempt's
    /// failure reason.
    pub fn acquire(candidates: &[ModelCandidate]) -> Result<Self, ModelLoadError> {
        let mut attempts = Vec::new();
        for candidate in candidates {
            match HttpGenerator::connect(candidate.clone()) {
                Ok(generator) => {
                    info!(model = %candidate.name, endpoint = %candidate.endpoint, "generation model ready");
                    return Ok(Self {
                        generator: Some(generator),
                    });
                }
                Err(error) => {
                    warn!(model = %candidate.name, %error, "model candidate failed");
                    attempts.push(FailedCandidate {
                        name: candidate.name.clone(),
                        reason: error.to_string(),
                    });
                }
            }
        }
        Err(ModelLoadError { attempts })
    }

    /// A handle that never loaded anything. `release` on it is a no-op,
    /// which is what makes cleanup safe even when acquisition failed.
    pub fn unloaded() -> Self {
        Self { generator: None }
    }

    pub fn is_loaded(&self) -> bool {
        self.generator.is_some()
    }

    /// Drops the underlying client. Safe to call repeatedly and safe to
    /// call when `acquire` never succeeded.
    pub fn release(&mut self) {
        self.generator = None;
    }
}

impl Generator for ModelHandle {
    fn generate(&self, prompt: &str, params: &GenParams) -> Result<String, AnswerError> {
        match &self.generator {
            Some(generator) => generator.generate(prompt, params),
            None => Err(AnswerError::Generation(
                "no generation model is loaded".into(),
            )),
        }
    }
}

/// Lazily acquires the model handle on first use and keeps it resident
/// afterwards. Single-threaded by design, hence the `RefCell`.
pub struct LazyGenerator {
    candidates: Vec<ModelCandidate>,
    handle: RefCell<Option<ModelHandle>>,
}

impl LazyGenerator {
    pub fn new(candidates: Vec<ModelCandidate>) -> Self {
        Self {
            candidates,
            handle: RefCell::new(None),
        }
    }

    /// Releases the model if one was ever acquired.
    pub fn release(&self) {
        if let Some(handle) = self.handle.borrow_mut().as_mut() {
            handle.release();
        }
        *self.handle.borrow_mut() = None;
    }
}

impl Generator for LazyGenerator {
    fn generate(&self, prompt: &str, params: &GenParams) -> Result<String, AnswerError> {
        let mut slot = self.handle.borrow_mut();
        if slot.is_none() {
            *slot = Some(ModelHandle::acquire(&self.candidates)?);
        }
        slot.as_ref()
            .map(|handle| handle.generate(prompt, params))
            .unwrap_or_else(|| {
                Err(AnswerError::Generation(
                    "no generation model is loaded".into(),
                ))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::{fallback_chain, GenParams, Generator, ModelHandle, DEFAULT_MODEL};

    #[test]
    fn fallback_chain_puts_preferred_first_and_deduplicates() {
        let chain = fallback_chain(DEFAULT_MODEL, "http://localhost:8080/v1/completions", None);
        assert_eq!(chain[0].name, DEFAULT_MODEL);
        assert_eq!(chain.len(), 3);

        let chain = fallback_chain("distilgpt2", "http://localhost:8080/v1/completions", None);
        let names: Vec<_> = chain.iter().map(|candidate| candidate.name.as_str()).collect();
        assert_eq!(names, vec!["distilgpt2", "tinyllama-1.1b-chat"]);
    }

    #[test]
    fn released_handle_refuses_to_generate() {
        let mut handle = ModelHandle::unloaded();
        assert!(!handle.is_loaded());

        // Releasing a handle that never loaded must be a no-op, not a panic.
        handle.release();
        handle.release();

        let params = GenParams {
            max_new_tokens: 10,
            temperature: 0.1,
            top_p: 0.7,
            repetition_penalty: 1.0,
        };
        assert!(handle.generate("prompt", &params).is_err());
    }

    #[test]
    fn acquire_with_unreachable_candidates_reports_every_attempt() {
        let candidates = fallback_chain("primary", "http://127.0.0.1:1/v1/completions", None);
        let error = ModelHandle::acquire(&candidates).expect_err("nothing listens on port 1");
        assert_eq!(error.attempts.len(), candidates.len());
        assert_eq!(error.attempts[0].name, "primary");
    }
}
