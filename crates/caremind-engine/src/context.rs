//! Context assembly — temporal weighting and priority-ordered prompt blocks.

use caremind_core::types::{KnowledgeSource, RetrievalResult};
use chrono::{DateTime, Utc};

/// Exponentially decay a similarity score by record age.
///
/// `weight = score * exp(-age_days / decay_days)`. Records newer than the
/// retrieval instant count as age zero rather than gaining weight.
pub fn temporal_weight(
    score: f32,
    created_at: DateTime<Utc>,
    retrieved_at: DateTime<Utc>,
    decay_days: f64,
) -> f32 {
    let age_days = (retrieved_at - created_at).num_seconds().max(0) as f64 / 86_400.0;
    (score as f64 * (-age_days / decay_days).exp()) as f32
}

/// Re-score candidates by temporal weight and re-sort descending.
pub fn apply_temporal_decay(results: &mut [RetrievalResult], decay_days: f64) {
    for result in results.iter_mut() {
        result.score =
            temporal_weight(result.score, result.created_at, result.retrieved_at, decay_days);
    }
    results.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
}

fn block_title(kind: KnowledgeSource) -> &'static str {
    match kind {
        KnowledgeSource::UserDocs => "From the caregiver's own documents",
        KnowledgeSource::StructuredFlow => "Reviewed guidance",
        KnowledgeSource::SharedKb => "From the knowledge base",
        KnowledgeSource::Memory => "From past conversations",
        KnowledgeSource::Web => "From the web",
    }
}

/// Assemble the context prompt: a reviewed flow prompt first when present,
/// then one block per source kind in fixed priority order. Each entry keeps
/// its literal source label for attribution.
pub fn assemble_context(results: &[RetrievalResult], flow_prompt: Option<&str>) -> String {
    let mut sections: Vec<String> = Vec::new();

    if let Some(prompt) = flow_prompt {
        sections.push(format!("{}:\n{prompt}", block_title(KnowledgeSource::StructuredFlow)));
    }

    let mut kinds: Vec<KnowledgeSource> = results.iter().map(|r| r.kind).collect();
    kinds.sort_by_key(|k| k.priority());
    kinds.dedup();

    for kind in kinds {
        let lines: Vec<String> = results
            .iter()
            .filter(|r| r.kind == kind)
            .map(|r| format!("- [{}] {}", r.source_label, r.text))
            .collect();
        sections.push(format!("{}:\n{}", block_title(kind), lines.join("\n")));
    }

    sections.join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn result(score: f32, kind: KnowledgeSource, label: &str, age_days: i64) -> RetrievalResult {
        let now = Utc::now();
        RetrievalResult {
            id: label.into(),
            text: format!("text from {label}"),
            score,
            source_label: label.into(),
            kind,
            created_at: now - Duration::days(age_days),
            retrieved_at: now,
        }
    }

    #[test]
    fn test_temporal_weight_decays_with_age() {
        let now = Utc::now();
        let fresh = temporal_weight(0.8, now, now, 365.0);
        let old = temporal_weight(0.8, now - Duration::days(365), now, 365.0);
        assert!((fresh - 0.8).abs() < 1e-3);
        // One decay horizon reduces the weight by a factor of e
        assert!((old - 0.8 / std::f32::consts::E).abs() < 1e-3);
    }

    #[test]
    fn test_future_timestamps_do_not_gain_weight() {
        let now = Utc::now();
        let weight = temporal_weight(0.8, now + Duration::days(30), now, 365.0);
        assert!((weight - 0.8).abs() < 1e-3);
    }

    #[test]
    fn test_decay_reorders_equal_scores_by_recency() {
        let mut results = vec![
            result(0.8, KnowledgeSource::SharedKb, "old_doc", 700),
            result(0.8, KnowledgeSource::SharedKb, "new_doc", 1),
        ];
        apply_temporal_decay(&mut results, 365.0);
        assert_eq!(results[0].source_label, "new_doc");
        assert!(results[0].score > results[1].score);
    }

    #[test]
    fn test_context_orders_blocks_by_priority() {
        let results = vec![
            result(0.9, KnowledgeSource::Memory, "chat_history_alice", 0),
            result(0.8, KnowledgeSource::UserDocs, "iep.txt", 0),
            result(0.7, KnowledgeSource::SharedKb, "guide.pdf", 0),
        ];
        let context = assemble_context(&results, None);

        let docs_pos = context.find("caregiver's own documents").unwrap();
        let kb_pos = context.find("knowledge base").unwrap();
        let memory_pos = context.find("past conversations").unwrap();
        assert!(docs_pos < kb_pos);
        assert!(kb_pos < memory_pos);
        // Literal labels survive into the context
        assert!(context.contains("[iep.txt]"));
    }

    #[test]
    fn test_flow_prompt_leads_the_context() {
        let results = vec![result(0.9, KnowledgeSource::Memory, "insights_alice", 0)];
        let context = assemble_context(&results, Some("Validated screening tools help."));
        assert!(context.starts_with("Reviewed guidance:"));
        assert!(context.contains("Validated screening tools help."));
    }

    #[test]
    fn test_empty_results_give_empty_context() {
        assert!(assemble_context(&[], None).is_empty());
    }
}
