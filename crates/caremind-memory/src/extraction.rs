//! Insight extraction — lexical summarization of conversation blocks.
//!
//! Scans the caregiver side of a transcript block and produces typed
//! records: concerns become insights, "what worked" statements become
//! strategies, stated preferences become preferences, and recurring topics
//! are rolled into a summary insight. Deterministic by design so the same
//! block always extracts the same records.

use caremind_core::types::MemoryKind;

/// One candidate record extracted from a transcript block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedInsight {
    pub kind: MemoryKind,
    pub text: String,
}

const TOPIC_KEYWORDS: &[&str] = &[
    "sleep",
    "school",
    "meltdown",
    "therapy",
    "diet",
    "communication",
    "sensory",
    "routine",
    "medication",
    "sibling",
    "screening",
    "diagnosis",
];

const CONCERN_MARKERS: &[&str] = &[
    "worried",
    "worries",
    "concerned",
    "struggling",
    "frustrated",
    "exhausted",
    "overwhelmed",
    "scared",
    "afraid",
];

const STRATEGY_MARKERS: &[&str] =
    &["worked for us", "worked well", "really helped", "helped a lot", "has improved", "improved since"];

const PREFERENCE_MARKERS: &[&str] = &[
    "i prefer",
    "we prefer",
    "i'd rather",
    "we'd rather",
    "please keep",
    "please always",
    "don't want",
    "do not want",
];

/// Lexical extractor over caregiver messages in a transcript block.
#[derive(Debug, Default, Clone)]
pub struct InsightExtractor;

impl InsightExtractor {
    pub fn new() -> Self {
        Self
    }

    /// Extract typed records from one transcript block.
    ///
    /// Only `Caregiver:` lines are scanned; assistant output never feeds
    /// back into derived memory.
    pub fn extract(&self, transcript: &str) -> Vec<ExtractedInsight> {
        let mut insights = Vec::new();
        let mut topics_seen: Vec<&str> = Vec::new();

        for line in transcript.lines() {
            let Some(content) = line.strip_prefix("Caregiver: ") else {
                continue;
            };

            for sentence in split_sentences(content) {
                let lower = sentence.to_lowercase();

                for topic in TOPIC_KEYWORDS {
                    if lower.contains(topic) && !topics_seen.contains(topic) {
                        topics_seen.push(topic);
                    }
                }

                if PREFERENCE_MARKERS.iter().any(|m| lower.contains(m)) {
                    insights.push(ExtractedInsight {
                        kind: MemoryKind::Preference,
                        text: format!("Caregiver preference: {sentence}"),
                    });
                } else if STRATEGY_MARKERS.iter().any(|m| lower.contains(m)) {
                    insights.push(ExtractedInsight {
                        kind: MemoryKind::Strategy,
                        text: format!("Strategy that helped: {sentence}"),
                    });
                } else if CONCERN_MARKERS.iter().any(|m| lower.contains(m)) {
                    insights.push(ExtractedInsight {
                        kind: MemoryKind::Insight,
                        text: format!("Caregiver expressed concern: {sentence}"),
                    });
                }
            }
        }

        if !topics_seen.is_empty() {
            insights.push(ExtractedInsight {
                kind: MemoryKind::Insight,
                text: format!("Topics discussed: {}", topics_seen.join(", ")),
            });
        }

        insights
    }
}

fn split_sentences(text: &str) -> impl Iterator<Item = &str> {
    text.split_inclusive(['.', '!', '?'])
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_concern_becomes_insight() {
        let extractor = InsightExtractor::new();
        let transcript = "Caregiver: I'm worried about his sleep lately.\n\
                          Assistant: Sleep disruption is common.";
        let insights = extractor.extract(transcript);

        assert!(insights.iter().any(|i| i.kind == MemoryKind::Insight
            && i.text.contains("expressed concern")));
        // "sleep" is also picked up as a topic
        assert!(insights.iter().any(|i| i.text.contains("Topics discussed: sleep")));
    }

    #[test]
    fn test_preference_and_strategy() {
        let extractor = InsightExtractor::new();
        let transcript = "Caregiver: We prefer visual schedules over verbal reminders.\n\
                          Assistant: Noted.\n\
                          Caregiver: The weighted blanket really helped at bedtime.";
        let insights = extractor.extract(transcript);

        assert!(insights.iter().any(|i| i.kind == MemoryKind::Preference));
        assert!(insights.iter().any(|i| i.kind == MemoryKind::Strategy));
    }

    #[test]
    fn test_assistant_lines_are_ignored() {
        let extractor = InsightExtractor::new();
        let transcript = "Assistant: Many caregivers are worried about school transitions.";
        assert!(extractor.extract(transcript).is_empty());
    }

    #[test]
    fn test_extraction_is_deterministic() {
        let extractor = InsightExtractor::new();
        let transcript = "Caregiver: I'm exhausted and worried about meltdowns at school.";
        let first = extractor.extract(transcript);
        let second = extractor.extract(transcript);
        assert_eq!(first, second);
        assert!(!first.is_empty());
    }
}
