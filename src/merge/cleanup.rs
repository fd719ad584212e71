use regex::Regex;
use std::sync::LazyLock;

/// Compiled patterns for tidying up recovered highlight text.
///
/// Order matters: citation stripping runs first because it is what leaves
/// the doubled punctuation behind.
struct HighlightCleaner {
    citation_re: Regex,
    double_comma_re: Regex,
    double_semicolon_re: Regex,
    comma_before_and_re: Regex,
    sentence_join_re: Regex,
    comma_join_re: Regex,
    wrap_join_re: Regex,
    multi_space_re: Regex,
}

impl HighlightCleaner {
    fn new() -> Self {
        Self {
            citation_re: Regex::new(r"\(p?\d+\)").expect("Failed to compile citation regex"),
            double_comma_re: Regex::new(r",\s*,").expect("Failed to compile double comma regex"),
            double_semicolon_re: Regex::new(r";\s*;")
                .expect("Failed to compile double semicolon regex"),
            comma_before_and_re: Regex::new(r",(\s*and\b)")
                .expect("Failed to compile comma-and regex"),
            sentence_join_re: Regex::new(r"([.;!?])([A-Za-z])")
                .expect("Failed to compile sentence join regex"),
            comma_join_re: Regex::new(r",([A-Za-z])").expect("Failed to compile comma join regex"),
            wrap_join_re: Regex::new(r"([a-z]{2})([A-Z][a-z])")
                .expect("Failed to compile line wrap join regex"),
            multi_space_re: Regex::new(r" {2,}").expect("Failed to compile multi space regex"),
        }
    }

    fn clean(&self, text: &str) -> String {
        let text = self.citation_re.replace_all(text, "");
        let text = self.double_comma_re.replace_all(&text, ",");
        let text = self.double_semicolon_re.replace_all(&text, ";");
        // ", and" left dangling after a stripped citation list
        let text = self.comma_before_and_re.replace_all(&text, "$1");
        let text = self.sentence_join_re.replace_all(&text, "$1 $2");
        let text = self.comma_join_re.replace_all(&text, ", $1");
        // "operationsWe" but not "GenAI"
        let text = self.wrap_join_re.replace_all(&text, "$1 $2");
        let text = self.multi_space_re.replace_all(&text, " ");
        text.trim().to_string()
    }
}

static CLEANER: LazyLock<HighlightCleaner> = LazyLock::new(HighlightCleaner::new);

/// Strip citation markers and repair spacing artifacts in one passage.
pub fn clean_highlight_text(text: &str) -> String {
    CLEANER.clean(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_citation_markers_removed() {
        assert_eq!(clean_highlight_text("some text(p1) here"), "some text here");
        assert_eq!(clean_highlight_text("as shown (12) before"), "as shown before");
        assert_eq!(clean_highlight_text("keep (a1) this"), "keep (a1) this");
    }

    #[test]
    fn test_doubled_punctuation_collapsed() {
        assert_eq!(clean_highlight_text("a, , b"), "a, b");
        assert_eq!(clean_highlight_text("first(3); (4); second"), "first; second");
        assert_eq!(clean_highlight_text("cats (1), and dogs"), "cats and dogs");
    }

    #[test]
    fn test_missing_space_after_punctuation() {
        assert_eq!(clean_highlight_text("end.Start"), "end. Start");
        assert_eq!(clean_highlight_text("one,two"), "one, two");
        assert_eq!(clean_highlight_text("really?Yes"), "really? Yes");
    }

    #[test]
    fn test_numbers_after_punctuation_untouched() {
        assert_eq!(clean_highlight_text("version 1.5 and 2,000"), "version 1.5 and 2,000");
    }

    #[test]
    fn test_line_wrap_join_split_but_acronyms_kept() {
        assert_eq!(
            clean_highlight_text("scale operationsWe found"),
            "scale operations We found"
        );
        assert_eq!(clean_highlight_text("GenAI tools"), "GenAI tools");
        assert_eq!(clean_highlight_text("the iPhone era"), "the iPhone era");
    }

    #[test]
    fn test_whitespace_collapsed_and_trimmed() {
        assert_eq!(clean_highlight_text("  too   many  spaces "), "too many spaces");
        assert_eq!(clean_highlight_text("(7)"), "");
    }

    #[test]
    fn test_clean_text_is_stable() {
        let text = "Already clean text, with punctuation. And more.";
        assert_eq!(clean_highlight_text(text), text);
        assert_eq!(clean_highlight_text(&clean_highlight_text(text)), text);
    }
}
