//! Paragraph-first, sentence-aware text chunker.
//!
//! Splits raw document text into bounded-size semantic units. The chunk
//! index produced here is the only external handle into a chunk's
//! AI-output slot, so the output must be fully deterministic.
//!
//! # Algorithm
//!
//! 1. Split text on `\n\n` paragraph boundaries, trim each paragraph, and
//!    drop whitespace-only ones.
//! 2. A paragraph of at most `max_chunk_size` characters becomes one chunk.
//! 3. A longer paragraph is segmented into sentences (Unicode UAX #29
//!    sentence boundaries). Sentences are accumulated greedily while
//!    `len(current) + len(next) + 1 <= max_chunk_size`, joined by a space.
//! 4. A single sentence longer than the limit becomes its own oversized
//!    chunk. Text is never truncated or dropped.
//!
//! Lengths are counted in Unicode scalar values, not bytes.
//!
//! # Example
//!
//! ```rust
//! use doc_digest_core::chunk::split;
//!
//! let chunks = split("Hello world.\n\nSecond paragraph.", 1500);
//! assert_eq!(chunks, vec!["Hello world.", "Second paragraph."]);
//! ```

use unicode_segmentation::UnicodeSegmentation;

/// Default chunk size in characters.
pub const DEFAULT_MAX_CHUNK_SIZE: usize = 1500;

/// Split `text` into ordered chunks of at most `max_chunk_size` characters.
///
/// Returns an empty vector only when `text` has no non-whitespace content.
/// `max_chunk_size` of zero is treated as one.
pub fn split(text: &str, max_chunk_size: usize) -> Vec<String> {
    let max = max_chunk_size.max(1);
    let mut chunks = Vec::new();

    for block in text.split("\n\n") {
        let block = block.trim();
        if block.is_empty() {
            continue;
        }

        if char_len(block) <= max {
            chunks.push(block.to_string());
            continue;
        }

        let mut current = String::new();
        let mut current_len = 0usize;
        for sentence in split_sentences(block) {
            let sentence_len = char_len(sentence);
            if current.is_empty() {
                current.push_str(sentence);
                current_len = sentence_len;
            } else if current_len + sentence_len + 1 <= max {
                current.push(' ');
                current.push_str(sentence);
                current_len += sentence_len + 1;
            } else {
                chunks.push(std::mem::take(&mut current));
                current.push_str(sentence);
                current_len = sentence_len;
            }
        }
        if !current.is_empty() {
            chunks.push(current);
        }
    }

    chunks
}

/// Segment text into trimmed, non-empty sentences, in order.
pub fn split_sentences(text: &str) -> Vec<&str> {
    text.split_sentence_bounds()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect()
}

/// Split text into trimmed, non-empty paragraphs.
pub fn split_paragraphs(text: &str) -> Vec<&str> {
    text.split("\n\n")
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect()
}

/// Build a short title from the beginning of `text`.
///
/// Whitespace runs collapse to single spaces. When the text is longer than
/// `max_chars`, it is cut on a character boundary and `…` is appended.
pub fn make_title(text: &str, max_chars: usize) -> String {
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if char_len(&collapsed) <= max_chars {
        return collapsed;
    }
    let mut title: String = collapsed.chars().take(max_chars).collect();
    title.truncate(title.trim_end().len());
    title.push('…');
    title
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sentences_of(chunks: &[String]) -> Vec<String> {
        chunks
            .iter()
            .flat_map(|c| split_sentences(c).into_iter().map(str::to_string))
            .collect()
    }

    #[test]
    fn test_small_paragraphs_are_kept_whole() {
        let chunks = split("First paragraph.\n\nSecond paragraph.", 1500);
        assert_eq!(chunks, vec!["First paragraph.", "Second paragraph."]);
    }

    #[test]
    fn test_empty_and_whitespace_input() {
        assert!(split("", 100).is_empty());
        assert!(split("   \n\n \t \n\n", 100).is_empty());
    }

    #[test]
    fn test_whitespace_paragraphs_discarded() {
        let chunks = split("Alpha.\n\n   \n\nBeta.", 100);
        assert_eq!(chunks, vec!["Alpha.", "Beta."]);
    }

    #[test]
    fn test_long_paragraph_is_sentence_split() {
        let text = "One two three. Four five six. Seven eight nine.";
        let chunks = split(text, 30);
        assert_eq!(chunks, vec!["One two three. Four five six.", "Seven eight nine."]);
        for c in &chunks {
            assert!(c.chars().count() <= 30);
        }
    }

    #[test]
    fn test_oversized_sentence_is_its_own_chunk() {
        let long = format!("X{}", "x".repeat(49));
        let text = format!("Short one. {}. Tail.", long);
        let chunks = split(&text, 20);
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0], "Short one.");
        assert_eq!(chunks[1], format!("{}.", long));
        assert_eq!(chunks[2], "Tail.");
    }

    #[test]
    fn test_reconstructs_sentences_in_order() {
        let text = (0..40)
            .map(|i| format!("Sentence number {} is here.", i))
            .collect::<Vec<_>>()
            .join(" ");
        let text = format!("{}\n\nA closing paragraph. With two sentences.", text);
        let chunks = split(&text, 80);

        let expected: Vec<String> = split_paragraphs(&text)
            .into_iter()
            .flat_map(|p| split_sentences(p).into_iter().map(str::to_string))
            .collect();
        assert_eq!(sentences_of(&chunks), expected);

        for c in &chunks {
            let single_sentence = split_sentences(c).len() == 1;
            assert!(c.chars().count() <= 80 || single_sentence, "oversized: {}", c);
        }
    }

    #[test]
    fn test_non_empty_for_any_content() {
        for limit in [1, 2, 5, 1500] {
            assert!(!split("a", limit).is_empty());
            assert!(!split("Hello there. General Kenobi.", limit).is_empty());
        }
    }

    #[test]
    fn test_counts_characters_not_bytes() {
        // 10 Cyrillic characters, 20 bytes
        let text = "Привет мир";
        assert_eq!(split(text, 10), vec![text]);
    }

    #[test]
    fn test_deterministic() {
        let text = "Alpha beta. Gamma delta.\n\nEpsilon zeta. Eta theta. Iota kappa.";
        assert_eq!(split(text, 15), split(text, 15));
    }

    #[test]
    fn test_make_title() {
        assert_eq!(make_title("Short  text\nhere", 64), "Short text here");
        assert_eq!(make_title("abcdefghij", 4), "abcd…");
        assert_eq!(make_title("ab cd ef", 3), "ab…");
        assert_eq!(make_title("Привет мир", 6), "Привет…");
    }
}
