use crate::chunking::TokenEstimator;

/// Tokens held back from the context window for the prompt scaffold
/// (system preamble, delimiters, question).
pub const PROMPT_RESERVE_TOKENS: usize = 400;

/// Floor for the packing budget so tiny context windows still carry at
/// least one useful snippet.
pub const MIN_CONTEXT_TOKENS: usize = 512;

/// Characters assumed per token when clipping the final snippet.
pub const CHARS_PER_TOKEN: usize = 4;

pub fn context_budget(max_context_tokens: usize) -> usize {
    max_context_tokens
        .saturating_sub(PROMPT_RESERVE_TOKENS)
        .max(MIN_CONTEXT_TOKENS)
}

/// Packs already-ranked snippets into one bounded context string. Snippets
/// are appended in order until the token budget runs out; the first snippet
/// that would overflow is clipped to the remaining budget and packing stops
/// there.
pub fn pack<'a>(
    snippets: impl IntoIterator<Item = &'a str>,
    budget_tokens: usize,
    estimate: TokenEstimator,
) -> String {
    let mut assembled: Vec<String> = Vec::new();
    let mut used = 0usize;

    for text in snippets {
        let snippet = format!("{text}\n");
        let tokens = estimate(&snippet);
        if used + tokens > budget_tokens {
            let remaining_chars = budget_tokens.saturating_sub(used) * CHARS_PER_TOKEN;
            let clipped: String = snippet.chars().take(remaining_chars).collect();
            if !clipped.is_empty() {
                assembled.push(clipped);
            }
            break;
        }
        assembled.push(snippet);
        used += tokens;
    }

    assembled.join("\n")
}

#[cfg(test)]
mod tests {
    use super::{context_budget, pack, CHARS_PER_TOKEN, MIN_CONTEXT_TOKENS};
    use crate::chunking::approx_token_len;

    #[test]
    fn budget_is_floored_at_the_minimum() {
        assert_eq!(context_budget(512), MIN_CONTEXT_TOKENS);
        assert_eq!(context_budget(0), MIN_CONTEXT_TOKENS);
        assert_eq!(context_budget(2048), 2048 - 400);
    }

    #[test]
    fn snippets_within_budget_are_all_included() {
        let packed = pack(
            ["first snippet here", "second snippet here"],
            1_000,
            approx_token_len,
        );
        assert!(packed.contains("first snippet here"));
        assert!(packed.contains("second snippet here"));
    }

    #[test]
    fn overflowing_snippet_is_clipped_and_packing_stops() {
        let long = "word ".repeat(200);
        let snippets = [long.as_str(), "never reached snippet"];
        let budget = 40;
        let packed = pack(snippets, budget, approx_token_len);

        assert!(!packed.contains("never reached"));
        assert!(packed.chars().count() <= budget * CHARS_PER_TOKEN + 1);
        assert!(packed.starts_with("word word"));
    }

    #[test]
    fn empty_input_packs_to_empty_string() {
        assert_eq!(pack(std::iter::empty::<&str>(), 100, approx_token_len), "");
    }
}
