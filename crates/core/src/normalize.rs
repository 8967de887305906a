use once_cell::sync::Lazy;
use regex::Regex;

static HORIZONTAL_WS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[ \t]+").expect("static regex"));
static NEWLINE_RUNS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").expect("static regex"));
static PAGE_MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^[ \t]*(Page[ \t]*\d+|\d+)[ \t]*$").expect("static regex"));

/// Cleans raw page text extracted from a pdf. Pure and deterministic:
/// collapses non-breaking spaces, rejoins words hyphenated across line
/// breaks, collapses whitespace runs, and strips page-number-only lines.
pub fn clean(raw: &str) -> String {
    if raw.is_empty() {
        return String::new();
    }

    let text = raw.replace('\u{a0}', " ").replace("-\n", "");
    let text = HORIZONTAL_WS.replace_all(&text, " ");
    let text = NEWLINE_RUNS.replace_all(&text, "\n\n");
    let text = PAGE_MARKER.replace_all(&text, "");
    text.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::clean;

    #[test]
    fn empty_input_yields_empty_output() {
        assert_eq!(clean(""), "");
        assert_eq!(clean("   \n\n  "), "");
    }

    #[test]
    fn hyphenation_newlines_and_page_markers_are_removed() {
        let raw = "hyphen-\nated word\n\n\n\nPage 3";
        assert_eq!(clean(raw), "hyphenated word");
    }

    #[test]
    fn bare_page_numbers_are_stripped() {
        let raw = "Interest compounds daily.\n42\nPrincipal stays fixed.";
        let cleaned = clean(raw);
        assert!(cleaned.contains("Interest compounds daily."));
        assert!(cleaned.contains("Principal stays fixed."));
        assert!(!cleaned.contains("42"));
    }

    #[test]
    fn horizontal_whitespace_collapses_but_numbers_inline_survive() {
        let raw = "Save\u{a0}3-6   months\tof expenses";
        assert_eq!(clean(raw), "Save 3-6 months of expenses");
    }

    #[test]
    fn triple_newlines_collapse_to_two() {
        let raw = "first paragraph\n\n\n\n\nsecond paragraph";
        assert_eq!(clean(raw), "first paragraph\n\nsecond paragraph");
    }
}
