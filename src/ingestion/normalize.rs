//! Text normalization and sentence segmentation
//!
//! Normalizers are a capability surface selected by source format: generic
//! prose, markup-aware (strips HTML before segmentation), and tabular-aware
//! (each row is one sentence). Regexes are compiled at construction; there
//! is no process-wide lazy state.

use regex::Regex;
use unicode_segmentation::UnicodeSegmentation;

use crate::types::DocFormat;

/// Cleaning and sentence segmentation for one source kind
pub trait TextNormalizer: Send + Sync {
    /// Strip unprintable/escape characters and collapse irregular
    /// whitespace, returning text safe for chunking and display
    fn clean_text(&self, text: &str) -> String;

    /// Segment text into an ordered list of sentences
    fn split_sentences(&self, text: &str) -> Vec<String>;
}

/// Select the normalizer for a document format
pub fn normalizer_for(format: DocFormat) -> Box<dyn TextNormalizer> {
    match format {
        DocFormat::Html => Box::new(MarkupNormalizer::new()),
        DocFormat::Csv => Box::new(TabularNormalizer::new()),
        _ => Box::new(ProseNormalizer::new()),
    }
}

/// Normalizer for generic prose
pub struct ProseNormalizer {
    spaces: Regex,
}

impl ProseNormalizer {
    pub fn new() -> Self {
        Self {
            spaces: Regex::new(r"[ \t]+").expect("valid whitespace pattern"),
        }
    }
}

impl Default for ProseNormalizer {
    fn default() -> Self {
        Self::new()
    }
}

impl TextNormalizer for ProseNormalizer {
    fn clean_text(&self, text: &str) -> String {
        // control and escape characters become spaces, newlines survive
        let stripped: String = text
            .chars()
            .map(|c| if c.is_control() && c != '\n' { ' ' } else { c })
            .collect();

        let collapsed = self.spaces.replace_all(&stripped, " ");

        collapsed
            .lines()
            .map(|l| l.trim())
            .filter(|l| !l.is_empty())
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn split_sentences(&self, text: &str) -> Vec<String> {
        text.split_sentence_bounds()
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .map(|s| s.to_string())
            .collect()
    }
}

/// Normalizer for HTML sources: strips markup, then applies prose rules
pub struct MarkupNormalizer {
    prose: ProseNormalizer,
}

impl MarkupNormalizer {
    pub fn new() -> Self {
        Self {
            prose: ProseNormalizer::new(),
        }
    }
}

impl Default for MarkupNormalizer {
    fn default() -> Self {
        Self::new()
    }
}

impl TextNormalizer for MarkupNormalizer {
    fn clean_text(&self, text: &str) -> String {
        let document = scraper::Html::parse_document(text);

        let mut extracted = String::new();
        for fragment in document.root_element().text() {
            let trimmed = fragment.trim();
            if trimmed.is_empty() {
                continue;
            }
            if !extracted.is_empty() {
                extracted.push(' ');
            }
            extracted.push_str(trimmed);
        }

        self.prose.clean_text(&extracted)
    }

    fn split_sentences(&self, text: &str) -> Vec<String> {
        self.prose.split_sentences(text)
    }
}

/// Normalizer for tabular sources: every row line is one sentence
pub struct TabularNormalizer {
    prose: ProseNormalizer,
}

impl TabularNormalizer {
    pub fn new() -> Self {
        Self {
            prose: ProseNormalizer::new(),
        }
    }
}

impl Default for TabularNormalizer {
    fn default() -> Self {
        Self::new()
    }
}

impl TextNormalizer for TabularNormalizer {
    fn clean_text(&self, text: &str) -> String {
        self.prose.clean_text(text)
    }

    fn split_sentences(&self, text: &str) -> Vec<String> {
        text.lines()
            .map(|l| l.trim())
            .filter(|l| !l.is_empty())
            .map(|l| l.to_string())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prose_clean_strips_control_chars_and_collapses_whitespace() {
        let normalizer = ProseNormalizer::new();
        let cleaned = normalizer.clean_text("Hello\u{0007}   world\t\tagain\n\n\n  next line  ");
        assert_eq!(cleaned, "Hello world again\nnext line");
    }

    #[test]
    fn prose_clean_is_idempotent() {
        let normalizer = ProseNormalizer::new();
        let once = normalizer.clean_text("A  sentence.\x1b[0m Another\tone.");
        let twice = normalizer.clean_text(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn prose_sentences_preserve_order() {
        let normalizer = ProseNormalizer::new();
        let sentences =
            normalizer.split_sentences("First sentence. Second sentence! Third sentence?");
        assert_eq!(sentences.len(), 3);
        assert!(sentences[0].starts_with("First"));
        assert!(sentences[2].starts_with("Third"));
    }

    #[test]
    fn markup_normalizer_strips_tags() {
        let normalizer = MarkupNormalizer::new();
        let cleaned = normalizer
            .clean_text("<html><body><h1>Title</h1><p>Body text here.</p></body></html>");
        assert_eq!(cleaned, "Title Body text here.");
    }

    #[test]
    fn tabular_sentences_are_rows() {
        let normalizer = TabularNormalizer::new();
        let sentences = normalizer.split_sentences("name: a | size: 1\nname: b | size: 2\n");
        assert_eq!(sentences.len(), 2);
        assert_eq!(sentences[1], "name: b | size: 2");
    }

    #[test]
    fn empty_input_yields_no_sentences() {
        let normalizer = ProseNormalizer::new();
        assert!(normalizer.split_sentences("").is_empty());
        assert!(normalizer.split_sentences("   \n  ").is_empty());
    }
}
