//! Query Router — decides which knowledge sources serve a query.
//!
//! The policy is ordered and short-circuiting:
//! 1. Safety screen: a query matching the safety lexicon, or one whose
//!    recent caregiver turns matched it, goes to the structured flow alone,
//!    never blended with retrieval.
//! 2. Guided mode: an active flow node routes mostly to the flow, with
//!    memory as supporting context. Malformed guided state (a missing or
//!    unknown node) fails closed to the safety path.
//! 3. Free-form: blended retrieval with fixed, normalized source weights.
//!
//! Decisions are computed fresh per query and never persisted.

use std::collections::BTreeMap;
use std::sync::Arc;

use caremind_core::config::CaremindConfig;
use caremind_core::types::{KnowledgeSource, Role, RouteReason, RoutingDecision};
use caremind_flows::FlowStore;
use caremind_memory::session::{ConversationSession, SessionMode};

/// Relative free-form weights before normalization.
const FREEFORM_WEIGHTS: &[(KnowledgeSource, f32)] = &[
    (KnowledgeSource::UserDocs, 0.4),
    (KnowledgeSource::SharedKb, 0.3),
    (KnowledgeSource::Memory, 0.2),
    (KnowledgeSource::Web, 0.1),
];

/// Stateless routing policy over the safety lexicon and flow store.
pub struct Router {
    flows: Arc<FlowStore>,
    enable_web: bool,
}

impl Router {
    pub fn new(flows: Arc<FlowStore>, config: &CaremindConfig) -> Self {
        Self { flows, enable_web: config.retrieval.enable_web }
    }

    /// Route one query given the current session state.
    pub fn route(&self, query: &str, session: &ConversationSession) -> RoutingDecision {
        if self.matches_safety_lexicon(query, session) {
            tracing::warn!("🛟 Safety-sensitive query routed to structured flow");
            return RoutingDecision::single(KnowledgeSource::StructuredFlow, RouteReason::Safety);
        }

        if session.mode == SessionMode::Guided {
            return self.route_guided(session);
        }

        self.route_free_form(session)
    }

    /// The screen covers the current query and every caregiver turn still in
    /// the session window; a follow-up to a safety-sensitive turn stays on
    /// the safety path. Assistant turns are never scanned, since the crisis
    /// prompt itself contains lexicon terms.
    fn matches_safety_lexicon(&self, query: &str, session: &ConversationSession) -> bool {
        if self.contains_safety_term(query) {
            return true;
        }
        session
            .messages()
            .filter(|m| m.role == Role::User)
            .any(|m| self.contains_safety_term(&m.content))
    }

    fn contains_safety_term(&self, text: &str) -> bool {
        let lower = text.to_lowercase();
        self.flows.safety_terms().iter().any(|term| lower.contains(term.as_str()))
    }

    fn route_guided(&self, session: &ConversationSession) -> RoutingDecision {
        let valid_node = session
            .active_node
            .as_deref()
            .is_some_and(|node| self.flows.get_node(node).is_some());

        if !valid_node {
            tracing::warn!(
                "⚠️ Malformed guided state for {} (node {:?}), failing closed",
                session.owner_id,
                session.active_node
            );
            return RoutingDecision::single(
                KnowledgeSource::StructuredFlow,
                RouteReason::FailClosed,
            );
        }

        let mut weights = BTreeMap::new();
        weights.insert(KnowledgeSource::StructuredFlow, 0.7);
        weights.insert(KnowledgeSource::Memory, 0.3);
        RoutingDecision { weights, reason: RouteReason::Guided }
    }

    /// Blended retrieval. The private document source only participates when
    /// the user actually has documents; the remaining weights renormalize.
    fn route_free_form(&self, session: &ConversationSession) -> RoutingDecision {
        let mut weights: BTreeMap<KnowledgeSource, f32> = FREEFORM_WEIGHTS
            .iter()
            .filter(|(source, _)| match source {
                KnowledgeSource::Web => self.enable_web,
                KnowledgeSource::UserDocs => session.has_documents,
                _ => true,
            })
            .copied()
            .collect();

        let total: f32 = weights.values().sum();
        for weight in weights.values_mut() {
            *weight /= total;
        }
        RoutingDecision { weights, reason: RouteReason::FreeForm }
    }
}
