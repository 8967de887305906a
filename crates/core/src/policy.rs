//! Answer-selection policy: topic routing, fixed-intent fast templates,
//! prompt assembly, and post-processing of generated text.

/// Returned whenever retrieval produces nothing above the confidence
/// threshold. The query path degrades to this text instead of erroring.
pub const NO_INFORMATION_ANSWER: &str = "[Thinking: No relevant information found in knowledge base.] I don't have specific information about that in my knowledge base.";

/// Returned when the model produced nothing usable.
pub const UNKNOWN_ANSWER: &str = "I don't know.";

/// Delimiters the model may echo back; generated text is truncated at the
/// first occurrence of any of them.
pub const PROMPT_DELIMITERS: [&str; 3] = ["<|user|>", "<|system|>", "<|context|>"];

/// Coarse topic routes used only to pick a system preamble.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Topic {
    Student,
    Debt,
    Investing,
    Budget,
    General,
}

/// Keyword routing over the lowercased query. First matching family wins.
pub fn route(query: &str) -> Topic {
    let q = query.to_lowercase();
    let any = |words: &[&str]| words.iter().any(|word| q.contains(word));

    if any(&["student", "college", "school", "campus"]) {
        Topic::Student
    } else if any(&["debt", "loan", "credit card", "collections", "score"]) {
        Topic::Debt
    } else if any(&["invest", "stocks", "bond", "roth", "401k", "ira"]) {
        Topic::Investing
    } else if any(&["budget", "spend", "expense", "save", "saving"]) {
        Topic::Budget
    } else {
        Topic::General
    }
}

pub fn system_preamble(topic: Topic) -> String {
    let base = "You are a helpful financial advisor. Answer based on the provided context. \
        Always start your response with a brief thinking process in brackets like [Thinking: analyzing the question and relevant information...]. \
        Then provide a clear, actionable answer. Do not mention sources, page numbers, or document names. \
        Be concise and practical. If the answer is not in the context, say \"I don't have specific information about that in my knowledge base.\" \
        Focus on actionable advice that users can implement immediately.";

    let suffix = match topic {
        Topic::Student => {
            " Tailor examples to students (irregular income, textbooks, tuition, part-time work)."
        }
        Topic::Debt => " Emphasize credit health, payment order, APRs, and minimizing interest.",
        Topic::Investing => {
            " Give general education only; do not give personalized financial advice."
        }
        Topic::Budget => " Offer step-by-step budgeting guidance and templates.",
        Topic::General => "",
    };

    format!("{base}{suffix}")
}

const CREDIT_SCORE_ANSWER: &str = "[Thinking: Analyzing credit score improvement strategies from financial documents...] To improve your credit score, focus on: 1) Pay every bill on time - set up automatic payments or reminders, 2) Reduce credit utilization to under 30%, 3) Check credit reports for errors and dispute them, 4) Build credit history with secured cards if needed, 5) Avoid new credit applications, 6) Use snowball or avalanche methods to pay off debts. Consistency and patience are key to credit improvement.";

const EMERGENCY_FUND_ANSWER: &str = "[Thinking: Analyzing emergency fund strategies from financial documents...] Emergency funds are essential for financial security. Save 3-6 months of essential expenses to handle unexpected situations like job loss, medical emergencies, or major home repairs. Keep this money in a high-yield savings account for easy access while earning interest. Start small and be consistent - even $25 per week can build a substantial emergency fund over time. Automate your savings to make it easier to stick to your goal.";

const BUDGET_ANSWER: &str = "[Thinking: Analyzing budgeting strategies from financial documents...] The 50/30/20 rule is an excellent budgeting framework: allocate 50% of after-tax income to needs (housing, utilities, groceries), 30% to wants (entertainment, dining out), and 20% to savings and debt repayment. If you're consistently over budget in certain categories, reassess by either increasing that budget category or finding ways to cut spending. A savings rate of 20% or higher indicates excellent financial health. Review your budget monthly and adjust as needed.";

const DEBT_ANSWER: &str = "[Thinking: Analyzing debt management strategies from financial documents...] Prioritize high-interest debt first - pay off credit cards and other high-interest loans before focusing on lower-interest debt like mortgages. Consider the debt avalanche method: pay minimums on all debts, then put extra money toward the debt with the highest interest rate. Debt consolidation can be helpful if you can get a lower interest rate, but avoid extending the repayment period too much. Don't take on new debt while paying off existing debt.";

/// Fixed high-frequency intents answered without touching the model.
/// Substring checks evaluated in a fixed priority order; a question
/// matching several intents resolves to the first branch.
pub fn fast_template(question: &str) -> Option<&'static str> {
    let q = question.to_lowercase();

    if q.contains("credit score") {
        return Some(CREDIT_SCORE_ANSWER);
    }
    if q.contains("emergency fund") || q.contains("emergency") {
        return Some(EMERGENCY_FUND_ANSWER);
    }
    if q.contains("budget") || q.contains("spending") {
        return Some(BUDGET_ANSWER);
    }
    if q.contains("debt") || q.contains("loan") {
        return Some(DEBT_ANSWER);
    }
    None
}

/// Structured prompt wrapping preamble, packed context, and question in
/// the delimiter scheme the post-processor knows how to strip.
pub fn build_prompt(preamble: &str, context: &str, question: &str) -> String {
    format!(
        "<|system|>\n{preamble}\n</|system|>\n<|context|>\n{context}\n</|context|>\n<|user|>\n{question}\n</|user|>\n<|assistant|>"
    )
}

/// Truncates generated text at the first echoed prompt delimiter and trims
/// the result.
pub fn trim_generated(raw: &str) -> String {
    let mut text = raw.trim();
    for delimiter in PROMPT_DELIMITERS {
        if let Some(position) = text.find(delimiter) {
            text = text[..position].trim();
        }
    }
    text.to_string()
}

#[cfg(test)]
mod tests {
    use super::{
        build_prompt, fast_template, route, system_preamble, trim_generated, Topic,
    };

    #[test]
    fn routing_picks_the_first_matching_family() {
        assert_eq!(route("How do college students budget?"), Topic::Student);
        assert_eq!(route("Should I pay my loan early?"), Topic::Debt);
        assert_eq!(route("Is a Roth IRA worth it?"), Topic::Investing);
        assert_eq!(route("Track my monthly expenses"), Topic::Budget);
        assert_eq!(route("What is compound interest?"), Topic::General);
    }

    #[test]
    fn preamble_varies_by_topic() {
        let general = system_preamble(Topic::General);
        let student = system_preamble(Topic::Student);
        assert!(student.starts_with(&general));
        assert!(student.contains("tuition"));
    }

    #[test]
    fn credit_score_outranks_other_intents() {
        let answer = fast_template("How does my credit score affect my debt and budget?")
            .expect("intent should match");
        assert!(answer.contains("credit score"));
        assert!(answer.contains("credit utilization"));
    }

    #[test]
    fn emergency_intent_matches_on_either_keyword() {
        let by_phrase = fast_template("what is an emergency fund?");
        let by_word = fast_template("how do I prepare for an emergency?");
        assert_eq!(by_phrase, by_word);
        assert!(by_phrase.expect("intent should match").contains("3-6 months"));
    }

    #[test]
    fn unmatched_questions_fall_through_to_generation() {
        assert!(fast_template("What is dollar cost averaging?").is_none());
    }

    #[test]
    fn prompt_carries_all_three_sections() {
        let prompt = build_prompt("be helpful", "the context", "the question?");
        assert!(prompt.contains("<|system|>\nbe helpful"));
        assert!(prompt.contains("<|context|>\nthe context"));
        assert!(prompt.contains("<|user|>\nthe question?"));
        assert!(prompt.ends_with("<|assistant|>"));
    }

    #[test]
    fn generated_text_is_cut_at_echoed_delimiters() {
        let raw = "  A useful answer. <|user|>\nplease ignore this";
        assert_eq!(trim_generated(raw), "A useful answer.");
        assert_eq!(trim_generated("   \n "), "");
        assert_eq!(trim_generated("plain answer"), "plain answer");
    }
}
