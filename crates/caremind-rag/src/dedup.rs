//! Lexical near-duplicate detection for ingested chunks.
//!
//! This is intentionally a cheap check, not a semantic one: missed paraphrase
//! duplicates are accepted, and short generic texts can false-positive via
//! the containment rule.

/// Decides whether a new text chunk is a near-duplicate of existing chunks.
#[derive(Debug, Clone)]
pub struct Deduplicator {
    threshold: f64,
}

impl Deduplicator {
    /// `threshold` is the Jaccard similarity at or above which two texts are
    /// duplicates. The containment rule applies regardless of threshold.
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }

    /// Case-fold and collapse all whitespace runs to single spaces.
    fn normalize(text: &str) -> String {
        text.to_lowercase()
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Jaccard similarity between the word sets of two normalized texts.
    fn jaccard(a: &str, b: &str) -> f64 {
        let words_a: std::collections::HashSet<&str> = a.split(' ').collect();
        let words_b: std::collections::HashSet<&str> = b.split(' ').collect();

        let intersection = words_a.intersection(&words_b).count();
        let union = words_a.union(&words_b).count();
        if union == 0 {
            return 0.0;
        }
        intersection as f64 / union as f64
    }

    /// Whether two texts are near-duplicates of each other.
    pub fn is_similar(&self, a: &str, b: &str) -> bool {
        let norm_a = Self::normalize(a);
        let norm_b = Self::normalize(b);
        if norm_a.is_empty() || norm_b.is_empty() {
            return false;
        }
        if norm_a == norm_b {
            return true;
        }
        // One text verbatim inside the other counts regardless of Jaccard.
        if norm_a.contains(&norm_b) || norm_b.contains(&norm_a) {
            return true;
        }
        Self::jaccard(&norm_a, &norm_b) >= self.threshold
    }

    /// Whether `new_text` duplicates any of the existing texts.
    pub fn is_duplicate<'a>(
        &self,
        new_text: &str,
        existing: impl IntoIterator<Item = &'a str>,
    ) -> bool {
        existing.into_iter().any(|e| self.is_similar(new_text, e))
    }
}
