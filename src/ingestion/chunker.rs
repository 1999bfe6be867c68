//! Sentence-window chunking
//!
//! Each chunk is the window of sentences within a fixed padding distance
//! before and after a center sentence, so adjacent chunks overlap and
//! answers spanning a boundary stay retrievable.

use crate::ingestion::normalize::TextNormalizer;

/// One chunk candidate produced from a document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkText {
    /// Window text handed to the retrieval backend
    pub text: String,
    /// Cleaned window text for display
    pub clean_text: String,
    /// Sentences inside the window, in order
    pub sentences: Vec<String>,
}

/// Chunker producing overlapping sentence windows
pub struct SentenceWindowChunker {
    padding: usize,
}

impl SentenceWindowChunker {
    /// Create a chunker with the given sentence padding
    pub fn new(padding: usize) -> Self {
        Self { padding }
    }

    /// Sentences included before and after each center sentence
    pub fn padding(&self) -> usize {
        self.padding
    }

    /// Convert a document's raw text units into ordered, overlapping,
    /// non-empty chunks.
    ///
    /// Units are cleaned individually, then joined into one blob so short
    /// trailing units (a page holding only a heading, say) merge with
    /// neighboring content instead of becoming degenerate micro-chunks.
    /// The result is empty only when no sentences existed.
    pub fn chunk_units(&self, normalizer: &dyn TextNormalizer, units: &[String]) -> Vec<ChunkText> {
        let cleaned: Vec<String> = units.iter().map(|u| normalizer.clean_text(u)).collect();
        let blob = cleaned.join("\n");

        let sentences = normalizer.split_sentences(&blob);
        if sentences.is_empty() {
            return Vec::new();
        }

        let last = sentences.len() - 1;
        let mut chunks = Vec::with_capacity(sentences.len());

        for center in 0..sentences.len() {
            let lo = center.saturating_sub(self.padding);
            let hi = (center + self.padding).min(last);
            let window = &sentences[lo..=hi];

            let text = window.join(" ");
            if text.trim().is_empty() {
                continue;
            }

            chunks.push(ChunkText {
                clean_text: text.clone(),
                text,
                sentences: window.to_vec(),
            });
        }

        chunks
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingestion::normalize::ProseNormalizer;

    fn chunker(padding: usize) -> SentenceWindowChunker {
        SentenceWindowChunker::new(padding)
    }

    fn units(texts: &[&str]) -> Vec<String> {
        texts.iter().map(|t| t.to_string()).collect()
    }

    #[test]
    fn one_chunk_per_sentence_position() {
        let normalizer = ProseNormalizer::new();
        let chunks = chunker(1).chunk_units(
            &normalizer,
            &units(&["Alpha is first. Beta follows. Gamma closes."]),
        );

        assert_eq!(chunks.len(), 3);
        for chunk in &chunks {
            assert!(!chunk.text.trim().is_empty());
        }
    }

    #[test]
    fn adjacent_chunks_share_two_p_sentences() {
        let normalizer = ProseNormalizer::new();
        let padding = 1;
        let chunks = chunker(padding).chunk_units(
            &normalizer,
            &units(&["One ran. Two ran. Three ran. Four ran. Five ran."]),
        );

        for pair in chunks.windows(2) {
            let shared = pair[0]
                .sentences
                .iter()
                .filter(|s| pair[1].sentences.contains(s))
                .count();
            assert!(shared >= 2 * padding, "expected overlap, got {}", shared);
        }
    }

    #[test]
    fn windows_clip_at_document_bounds() {
        let normalizer = ProseNormalizer::new();
        let chunks = chunker(2).chunk_units(
            &normalizer,
            &units(&["First here. Second here. Third here."]),
        );

        // first window spans [0, 2], last window spans [0, 2] after clipping
        assert_eq!(chunks[0].sentences.len(), 3);
        assert_eq!(chunks.last().unwrap().sentences.len(), 3);
    }

    #[test]
    fn rechunking_is_deterministic() {
        let normalizer = ProseNormalizer::new();
        let text = units(&["Stable input. Same every time. No surprises here."]);

        let first = chunker(1).chunk_units(&normalizer, &text);
        let second = chunker(1).chunk_units(&normalizer, &text);
        assert_eq!(first, second);
    }

    #[test]
    fn short_units_merge_across_page_breaks() {
        let normalizer = ProseNormalizer::new();
        // a heading-only page merges with the next page's content
        let chunks = chunker(1).chunk_units(
            &normalizer,
            &units(&["Chapter Two", "The story continues. It ends well."]),
        );

        assert!(!chunks.is_empty());
        assert!(chunks[0].text.contains("Chapter Two"));
    }

    #[test]
    fn vacuous_content_yields_no_chunks() {
        let normalizer = ProseNormalizer::new();
        let chunks = chunker(1).chunk_units(&normalizer, &units(&["   ", "\t\n", ""]));
        assert!(chunks.is_empty());
    }

    #[test]
    fn zero_padding_yields_single_sentence_chunks() {
        let normalizer = ProseNormalizer::new();
        let chunks = chunker(0).chunk_units(&normalizer, &units(&["One here. Two here."]));

        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].sentences.len(), 1);
    }
}
