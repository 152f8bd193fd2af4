//! Document chunking — splits extracted text into embeddable units.
//!
//! Sentence-accumulating strategy: sentences are appended to the current
//! chunk until the size cap is reached. Chunks that still exceed the cap
//! (a single run-on block) are re-split on paragraph boundaries.

/// Splits raw text into chunks bounded by a character cap.
#[derive(Debug, Clone)]
pub struct Chunker {
    max_chars: usize,
}

impl Default for Chunker {
    fn default() -> Self {
        Self { max_chars: 1500 }
    }
}

impl Chunker {
    pub fn new(max_chars: usize) -> Self {
        Self { max_chars: max_chars.max(1) }
    }

    pub fn chunk(&self, text: &str) -> Vec<String> {
        let mut chunks = Vec::new();
        let mut current = String::new();

        for sentence in text.split_inclusive(['.', '!', '?']) {
            let sentence = sentence.trim();
            if sentence.is_empty() {
                continue;
            }
            if !current.is_empty() && current.len() + sentence.len() + 1 > self.max_chars {
                chunks.push(std::mem::take(&mut current));
            }
            if !current.is_empty() {
                current.push(' ');
            }
            current.push_str(sentence);
        }
        if !current.trim().is_empty() {
            chunks.push(current.trim().to_string());
        }

        // Re-split oversized chunks on paragraph boundaries.
        let mut final_chunks = Vec::with_capacity(chunks.len());
        for chunk in chunks {
            if chunk.len() > self.max_chars {
                for para in chunk.split("\n\n") {
                    let para = para.trim();
                    if !para.is_empty() {
                        final_chunks.push(para.to_string());
                    }
                }
            } else {
                final_chunks.push(chunk);
            }
        }
        final_chunks
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_text_single_chunk() {
        let chunker = Chunker::default();
        let chunks = chunker.chunk("One short sentence. And another.");
        assert_eq!(chunks.len(), 1);
        assert!(chunks[0].contains("One short sentence."));
    }

    #[test]
    fn test_splits_at_cap() {
        let chunker = Chunker::new(50);
        let text = "First sentence is right here. Second sentence follows it. Third one closes.";
        let chunks = chunker.chunk(text);
        assert!(chunks.len() > 1);
        for chunk in &chunks {
            // Each chunk holds whole sentences under or near the cap
            assert!(!chunk.trim().is_empty());
        }
    }

    #[test]
    fn test_empty_input() {
        let chunker = Chunker::default();
        assert!(chunker.chunk("").is_empty());
        assert!(chunker.chunk("   \n\n  ").is_empty());
    }

    #[test]
    fn test_oversized_block_split_on_paragraphs() {
        let chunker = Chunker::new(40);
        // No sentence punctuation, so the cap can only be honored at
        // paragraph boundaries.
        let text = "alpha beta gamma delta epsilon zeta\n\neta theta iota kappa lambda mu";
        let chunks = chunker.chunk(text);
        assert_eq!(chunks.len(), 2);
        assert!(chunks[0].starts_with("alpha"));
        assert!(chunks[1].starts_with("eta"));
    }
}
