use crate::chunking::approx_token_len;
use crate::context::{context_budget, pack};
use crate::embeddings::Embedder;
use crate::generation::{GenParams, Generator};
use crate::index::LoadedIndex;
use crate::models::{Chunk, RagConfig};
use crate::policy::{
    build_prompt, fast_template, route, system_preamble, trim_generated, NO_INFORMATION_ANSWER,
    UNKNOWN_ANSWER,
};
use crate::retrieval;
use tracing::{debug, warn};

/// One query's worth of answering machinery over a loaded index. Stateless
/// across queries; the generator is the only lazily-loaded collaborator.
pub struct QaEngine<E, G>
where
    E: Embedder,
    G: Generator,
{
    index: LoadedIndex,
    embedder: E,
    generator: G,
    config: RagConfig,
}

impl<E, G> QaEngine<E, G>
where
    E: Embedder,
    G: Generator,
{
    pub fn new(index: LoadedIndex, embedder: E, generator: G, config: RagConfig) -> Self {
        Self {
            index,
            embedder,
            generator,
            config,
        }
    }

    pub fn n_chunks(&self) -> usize {
        self.index.chunks.len()
    }

    /// Top-k chunks for the question by cosine similarity.
    pub fn search(&self, question: &str) -> Vec<(&Chunk, f32)> {
        let query_vector = self.embedder.embed(question);
        retrieval::search(&query_vector, &self.index.vectors, self.config.top_k)
            .into_iter()
            .map(|hit| (&self.index.chunks[hit.index], hit.score))
            .collect()
    }

    /// Produces exactly one answer string per question and never fails for
    /// a well-formed question: low-confidence retrieval and generation
    /// failures both degrade to fixed responses.
    pub fn answer(&self, question: &str) -> String {
        let hits = self.search(question);

        let confident = hits
            .first()
            .map(|(_, score)| *score >= self.config.confidence_threshold)
            .unwrap_or(false);
        if !confident {
            debug!(question, "no hit above confidence threshold");
            return NO_INFORMATION_ANSWER.to_string();
        }

        if let Some(template) = fast_template(question) {
            debug!(question, "answered from fast template");
            return template.to_string();
        }

        let topic = route(question);
        let budget = context_budget(self.config.max_context_tokens);
        let context = pack(
            hits.iter().map(|(chunk, _)| chunk.text.as_str()),
            budget,
            approx_token_len,
        );
        let prompt = build_prompt(&system_preamble(topic), &context, question);

        match self.generator.generate(&prompt, &self.gen_params()) {
            Ok(raw) => {
                let answer = trim_generated(&raw);
                if answer.is_empty() {
                    UNKNOWN_ANSWER.to_string()
                } else {
                    answer
                }
            }
            Err(error) => {
                warn!(%error, "generation failed, degrading to fallback answer");
                UNKNOWN_ANSWER.to_string()
            }
        }
    }

    fn gen_params(&self) -> GenParams {
        GenParams {
            max_new_tokens: self.config.max_new_tokens,
            temperature: self.config.temperature,
            top_p: self.config.top_p,
            repetition_penalty: self.config.repetition_penalty,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::QaEngine;
    use crate::embeddings::{CharacterNgramEmbedder, Embedder};
    use crate::error::AnswerError;
    use crate::generation::{GenParams, Generator};
    use crate::index::LoadedIndex;
    use crate::models::{Chunk, RagConfig};
    use crate::policy::{NO_INFORMATION_ANSWER, UNKNOWN_ANSWER};
    use std::cell::RefCell;

    struct StubGenerator {
        calls: RefCell<usize>,
        reply: Result<String, ()>,
    }

    impl StubGenerator {
        fn replying(reply: &str) -> Self {
            Self {
                calls: RefCell::new(0),
                reply: Ok(reply.to_string()),
            }
        }

        fn failing() -> Self {
            Self {
                calls: RefCell::new(0),
                reply: Err(()),
            }
        }

        fn calls(&self) -> usize {
            *self.calls.borrow()
        }
    }

    impl Generator for StubGenerator {
        fn generate(&self, _prompt: &str, _params: &GenParams) -> Result<String, AnswerError> {
            *self.calls.borrow_mut() += 1;
            self.reply
                .clone()
                .map_err(|_| AnswerError::Generation("stub failure".into()))
        }
    }

    fn index_over(texts: &[&str]) -> LoadedIndex {
        let embedder = CharacterNgramEmbedder::default();
        let chunks: Vec<Chunk> = texts
            .iter()
            .enumerate()
            .map(|(page, text)| Chunk {
                text: (*text).to_string(),
                source: "corpus.pdf".to_string(),
                page: page as u32,
                chunk_id: 0,
            })
            .collect();
        let vectors = chunks.iter().map(|chunk| embedder.embed(&chunk.text)).collect();
        LoadedIndex {
            chunks,
            vectors,
            meta: None,
        }
    }

    fn engine_over(texts: &[&str], generator: StubGenerator) -> QaEngine<CharacterNgramEmbedder, StubGenerator> {
        QaEngine::new(
            index_over(texts),
            CharacterNgramEmbedder::default(),
            generator,
            RagConfig::default(),
        )
    }

    #[test]
    fn emergency_fund_question_hits_the_fast_template_without_generation() {
        let engine = engine_over(
            &[
                "Emergency funds should cover 3-6 months of expenses.",
                "Photosynthesis converts sunlight into chemical energy.",
            ],
            StubGenerator::replying("should not be used"),
        );

        let hits = engine.search("What is an emergency fund?");
        assert_eq!(hits[0].0.page, 0);
        assert!(hits[0].1 >= 0.2);

        let answer = engine.answer("What is an emergency fund?");
        assert!(answer.contains("3-6 months of essential expenses"));
        assert_eq!(engine.generator.calls(), 0);
    }

    #[test]
    fn off_topic_question_degrades_to_no_information() {
        let engine = engine_over(
            &["Emergency funds should cover 3-6 months of expenses."],
            StubGenerator::replying("should not be used"),
        );

        let answer = engine.answer("What is the capital of France?");
        assert_eq!(answer, NO_INFORMATION_ANSWER);
        assert_eq!(engine.generator.calls(), 0);
    }

    #[test]
    fn empty_index_always_answers_no_information() {
        let engine = engine_over(&[], StubGenerator::replying("should not be used"));
        let answer = engine.answer("anything at all?");
        assert_eq!(answer, NO_INFORMATION_ANSWER);
        assert_eq!(engine.generator.calls(), 0);
    }

    #[test]
    fn untemplated_question_goes_through_generation_and_is_trimmed() {
        let engine = engine_over(
            &["Dollar cost averaging spreads purchases across time to reduce risk."],
            StubGenerator::replying("Invest a fixed amount on a schedule. <|user|> echoed junk"),
        );

        let answer = engine.answer("What is dollar cost averaging?");
        assert_eq!(answer, "Invest a fixed amount on a schedule.");
        assert_eq!(engine.generator.calls(), 1);
    }

    #[test]
    fn empty_generation_falls_back_to_i_dont_know() {
        let engine = engine_over(
            &["Dollar cost averaging spreads purchases across time to reduce risk."],
            StubGenerator::replying("   "),
        );

        let answer = engine.answer("What is dollar cost averaging?");
        assert_eq!(answer, UNKNOWN_ANSWER);
    }

    #[test]
    fn generation_errors_degrade_instead_of_surfacing() {
        let engine = engine_over(
            &["Dollar cost averaging spreads purchases across time to reduce risk."],
            StubGenerator::failing(),
        );

        let answer = engine.answer("What is dollar cost averaging?");
        assert_eq!(answer, UNKNOWN_ANSWER);
        assert_eq!(engine.generator.calls(), 1);
    }
}
