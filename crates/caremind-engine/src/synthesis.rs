//! Synthesis Engine — the full query cycle.
//!
//! route → parallel retrieval → temporal weighting → cross-source dedup →
//! diversity-constrained top-k → priority-ordered context → model call →
//! attributed response. Source failures exclude that source and are
//! reported honestly; they never fabricate content or fail the query.

use std::sync::Arc;

use async_trait::async_trait;
use caremind_core::Result;
use caremind_core::config::CaremindConfig;
use caremind_core::error::CaremindError;
use caremind_core::traits::vector::OwnerFilter;
use caremind_core::traits::{EmbeddingProvider, Provider, VectorStore};
use caremind_core::types::{
    GenerateParams, KnowledgeSource, Message, RetrievalResult, RouteReason, RoutingDecision,
    SourceRef, SynthesizedResponse, collections,
};
use caremind_flows::{CRISIS_NODE, FlowNode, FlowStore};
use caremind_memory::ConversationMemoryManager;
use caremind_memory::session::ConversationSession;
use caremind_rag::{Deduplicator, select_diverse};
use chrono::Utc;

use crate::context::{apply_temporal_decay, assemble_context};
use crate::router::Router;

/// Optional live web retrieval seam. Absent by default; when the router
/// includes the web source without a searcher configured, the source is
/// reported unavailable.
#[async_trait]
pub trait WebSearch: Send + Sync {
    async fn search(&self, query: &str, k: usize) -> Result<Vec<RetrievalResult>>;
}

const SYSTEM_PROMPT: &str = "You are a supportive assistant for caregivers of autistic \
children. Answer using only the provided context blocks and cite nothing \
beyond them. If the context is empty, say you are answering from general \
knowledge and recommend consulting a professional. Be warm, concrete and \
non-judgmental. Never give medical diagnoses.";

/// Orchestrates one query end to end.
pub struct SynthesisEngine {
    provider: Arc<dyn Provider>,
    embedder: Arc<dyn EmbeddingProvider>,
    store: Arc<dyn VectorStore>,
    flows: Arc<FlowStore>,
    memory: Arc<ConversationMemoryManager>,
    web: Option<Arc<dyn WebSearch>>,
    router: Router,
    dedup: Deduplicator,
    params: GenerateParams,
    shared_kb: String,
    top_k: usize,
    min_distinct_sources: usize,
    decay_days: f64,
}

impl SynthesisEngine {
    pub fn new(
        provider: Arc<dyn Provider>,
        embedder: Arc<dyn EmbeddingProvider>,
        store: Arc<dyn VectorStore>,
        flows: Arc<FlowStore>,
        memory: Arc<ConversationMemoryManager>,
        config: &CaremindConfig,
    ) -> Self {
        Self {
            provider,
            embedder,
            store,
            router: Router::new(flows.clone(), config),
            flows,
            memory,
            web: None,
            dedup: Deduplicator::new(config.retrieval.dedup_threshold),
            params: GenerateParams {
                model: config.llm.model.clone(),
                temperature: config.llm.temperature,
                max_tokens: config.llm.max_tokens,
            },
            shared_kb: collections::shared_kb(&config.vector_store.shared_kb),
            top_k: config.retrieval.top_k,
            min_distinct_sources: config.retrieval.min_distinct_sources,
            decay_days: config.retrieval.decay_days,
        }
    }

    pub fn with_web_search(mut self, web: Arc<dyn WebSearch>) -> Self {
        self.web = Some(web);
        self
    }

    /// Run the full query cycle for one user turn.
    pub async fn synthesize(
        &self,
        session: &mut ConversationSession,
        query: &str,
    ) -> Result<SynthesizedResponse> {
        if !session.has_documents {
            session.has_documents = self.user_has_documents(&session.owner_id).await;
        }
        let decision = self.router.route(query, session);
        tracing::debug!("🧭 Routed as {:?}: {:?}", decision.reason, decision.weights);

        if matches!(decision.reason, RouteReason::Safety | RouteReason::FailClosed) {
            return self.respond_from_safety_flow(session, query).await;
        }

        let query_vector = self.embedder.embed(query).await?;

        let (kb, docs, mem, web) = tokio::join!(
            self.retrieve_shared_kb(&decision, &query_vector),
            self.retrieve_user_docs(&decision, &session.owner_id, &query_vector),
            self.retrieve_memory(&decision, &session.owner_id, &query_vector),
            self.retrieve_web(&decision, query),
        );

        let mut candidates: Vec<RetrievalResult> = Vec::new();
        let mut unavailable: Vec<String> = Vec::new();
        let outcomes = [
            (KnowledgeSource::SharedKb, kb),
            (KnowledgeSource::UserDocs, docs),
            (KnowledgeSource::Memory, mem),
            (KnowledgeSource::Web, web),
        ];
        for (source, outcome) in outcomes {
            match outcome {
                Ok(mut results) => {
                    let weight = decision.weight(source);
                    for result in &mut results {
                        result.score *= weight;
                    }
                    candidates.extend(results);
                }
                Err(e) => {
                    tracing::warn!("⚠️ Source {} excluded this query: {e}", source.label());
                    unavailable.push(source.label().to_string());
                }
            }
        }

        apply_temporal_decay(&mut candidates, self.decay_days);
        let candidates = self.drop_cross_source_duplicates(candidates);
        let selected = select_diverse(
            candidates,
            self.top_k,
            self.min_distinct_sources,
            |r: &RetrievalResult| &r.source_label,
        );

        let flow_node = self.active_flow_node(&decision, session);
        let flow_prompt = flow_node.as_ref().map(|(_, node)| node.prompt.clone());
        let context = assemble_context(&selected, flow_prompt.as_deref());

        let mut answer = self.call_model(&context, query).await?;
        if !unavailable.is_empty() {
            answer.push_str(&format!(
                "\n\nNote: some of my usual sources were unavailable just now ({}), \
                 so this answer may be incomplete.",
                unavailable.join(", ")
            ));
        }

        let mut sources: Vec<SourceRef> = Vec::new();
        if let Some((node_id, _)) = &flow_node {
            sources.push(SourceRef {
                label: node_id.clone(),
                kind: KnowledgeSource::StructuredFlow,
            });
        }
        for result in &selected {
            let source = SourceRef { label: result.source_label.clone(), kind: result.kind };
            if !sources.contains(&source) {
                sources.push(source);
            }
        }

        let next_steps = flow_node
            .as_ref()
            .map(|(_, node)| node.next_nodes.clone())
            .unwrap_or_default();
        let confidence = self.confidence(&selected, &unavailable, flow_node.is_some());

        let response =
            SynthesizedResponse { answer, sources, confidence, next_steps, unavailable_sources: unavailable };
        self.persist_turn(session, query, &response.answer).await;
        Ok(response)
    }

    /// Safety and fail-closed queries get the vetted flow content verbatim.
    /// The model is never called on this path.
    async fn respond_from_safety_flow(
        &self,
        session: &mut ConversationSession,
        query: &str,
    ) -> Result<SynthesizedResponse> {
        let node = self.flows.crisis_node();
        let response = SynthesizedResponse {
            answer: node.prompt.clone(),
            sources: vec![SourceRef {
                label: CRISIS_NODE.to_string(),
                kind: KnowledgeSource::StructuredFlow,
            }],
            confidence: 1.0,
            next_steps: node.next_nodes.clone(),
            unavailable_sources: Vec::new(),
        };
        self.persist_turn(session, query, &response.answer).await;
        Ok(response)
    }

    async fn retrieve_shared_kb(
        &self,
        decision: &RoutingDecision,
        vector: &[f32],
    ) -> Result<Vec<RetrievalResult>> {
        if !decision.includes(KnowledgeSource::SharedKb) {
            return Ok(Vec::new());
        }
        self.search_collection(&self.shared_kb, "shared", vector, KnowledgeSource::SharedKb)
            .await
    }

    async fn retrieve_user_docs(
        &self,
        decision: &RoutingDecision,
        owner_id: &str,
        vector: &[f32],
    ) -> Result<Vec<RetrievalResult>> {
        if !decision.includes(KnowledgeSource::UserDocs) {
            return Ok(Vec::new());
        }
        self.search_collection(
            &collections::user_docs(owner_id),
            owner_id,
            vector,
            KnowledgeSource::UserDocs,
        )
        .await
    }

    async fn retrieve_memory(
        &self,
        decision: &RoutingDecision,
        owner_id: &str,
        vector: &[f32],
    ) -> Result<Vec<RetrievalResult>> {
        if !decision.includes(KnowledgeSource::Memory) {
            return Ok(Vec::new());
        }
        self.memory.recall(owner_id, vector, self.top_k).await
    }

    /// Cheap presence probe for the private document collection. A store
    /// error here counts as "no documents" rather than failing the query.
    async fn user_has_documents(&self, owner_id: &str) -> bool {
        self.store
            .scroll_texts(&collections::user_docs(owner_id), 1)
            .await
            .map(|texts| !texts.is_empty())
            .unwrap_or(false)
    }

    async fn retrieve_web(
        &self,
        decision: &RoutingDecision,
        query: &str,
    ) -> Result<Vec<RetrievalResult>> {
        if !decision.includes(KnowledgeSource::Web) {
            return Ok(Vec::new());
        }
        match &self.web {
            Some(web) => web.search(query, self.top_k).await,
            None => Err(CaremindError::SourceUnavailable("web search not configured".into())),
        }
    }

    async fn search_collection(
        &self,
        collection: &str,
        owner: &str,
        vector: &[f32],
        kind: KnowledgeSource,
    ) -> Result<Vec<RetrievalResult>> {
        let hits = self
            .store
            .search(collection, vector, self.top_k, &OwnerFilter::new(owner))
            .await?;
        let retrieved_at = Utc::now();
        Ok(hits
            .into_iter()
            .map(|hit| RetrievalResult {
                id: hit.id,
                text: hit.text,
                score: hit.score,
                source_label: hit.payload.source,
                kind,
                created_at: hit.payload.created_at,
                retrieved_at,
            })
            .collect())
    }

    /// Keep the first (highest-weighted) of any near-duplicate pair across
    /// sources, so one fact does not crowd out the context.
    fn drop_cross_source_duplicates(
        &self,
        candidates: Vec<RetrievalResult>,
    ) -> Vec<RetrievalResult> {
        let mut kept: Vec<RetrievalResult> = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            if self
                .dedup
                .is_duplicate(&candidate.text, kept.iter().map(|k| k.text.as_str()))
            {
                tracing::debug!("🔄 Dropped duplicate candidate from {}", candidate.source_label);
                continue;
            }
            kept.push(candidate);
        }
        kept
    }

    /// One retry on transient synthesis failures, then give up.
    async fn call_model(&self, context: &str, query: &str) -> Result<String> {
        let user_content = if context.is_empty() {
            format!("Context: (no sources available)\n\nQuestion: {query}")
        } else {
            format!("Context:\n{context}\n\nQuestion: {query}")
        };
        let messages = [Message::system(SYSTEM_PROMPT), Message::user(user_content)];

        match self.provider.chat(&messages, &self.params).await {
            Ok(response) => Ok(response.content),
            Err(e) if e.is_retryable() => {
                tracing::warn!("🔄 Synthesis failed, retrying once: {e}");
                Ok(self.provider.chat(&messages, &self.params).await?.content)
            }
            Err(e) => Err(e),
        }
    }

    /// Documented heuristic, not a calibrated probability: 0.95 with a
    /// user-document contribution, 0.90 with web, 0.70 baseline, 0.30 when
    /// every source came back empty. The 0.90 for flow-backed answers with
    /// no retrieval hits extends that ladder: vetted flow content is treated
    /// like a trusted source. Any unavailable source costs 0.15 (floor 0.30).
    fn confidence(&self, selected: &[RetrievalResult], unavailable: &[String], has_flow: bool) -> f32 {
        let mut confidence: f32 = if selected.iter().any(|r| r.kind == KnowledgeSource::UserDocs) {
            0.95
        } else if selected.iter().any(|r| r.kind == KnowledgeSource::Web) {
            0.90
        } else if has_flow {
            // Vetted flow content backs the answer even without retrieval hits
            0.90
        } else if selected.is_empty() {
            0.30
        } else {
            0.70
        };
        if !unavailable.is_empty() {
            confidence = (confidence - 0.15).max(0.30);
        }
        confidence
    }

    fn active_flow_node<'a>(
        &'a self,
        decision: &RoutingDecision,
        session: &ConversationSession,
    ) -> Option<(String, &'a FlowNode)> {
        if !decision.includes(KnowledgeSource::StructuredFlow) {
            return None;
        }
        let node_id = session.active_node.clone()?;
        let node = self.flows.get_node(&node_id)?;
        Some((node_id, node))
    }

    /// Persist the completed exchange. Memory failures degrade to a warning;
    /// the answer has already been produced and is returned regardless.
    async fn persist_turn(&self, session: &mut ConversationSession, query: &str, answer: &str) {
        if let Err(e) = self.memory.record_turn(session, query, answer).await {
            tracing::warn!("⚠️ Failed to persist conversation turn: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use caremind_core::types::{ChatResponse, RecordPayload, VectorPoint};
    use caremind_core::types::OwnerScope;
    use caremind_memory::MemoryDb;
    use caremind_rag::InMemoryVectorStore;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct StubProvider {
        calls: AtomicUsize,
        fail_first: AtomicUsize,
        last_prompt: Mutex<String>,
    }

    impl StubProvider {
        fn new() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                fail_first: AtomicUsize::new(0),
                last_prompt: Mutex::new(String::new()),
            }
        }

        fn failing_first(n: usize) -> Self {
            let provider = Self::new();
            provider.fail_first.store(n, Ordering::SeqCst);
            provider
        }
    }

    #[async_trait]
    impl Provider for StubProvider {
        fn name(&self) -> &str {
            "stub"
        }

        async fn chat(&self, messages: &[Message], _params: &GenerateParams) -> Result<ChatResponse> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_first.load(Ordering::SeqCst) > 0 {
                self.fail_first.fetch_sub(1, Ordering::SeqCst);
                return Err(CaremindError::Synthesis("model overloaded".into()));
            }
            *self.last_prompt.lock().unwrap() = messages
                .iter()
                .map(|m| m.content.clone())
                .collect::<Vec<_>>()
                .join("\n");
            Ok(ChatResponse { content: "Here is what I found.".into(), finish_reason: None })
        }
    }

    struct HashEmbedder;

    #[async_trait]
    impl EmbeddingProvider for HashEmbedder {
        fn name(&self) -> &str {
            "hash"
        }

        fn dimension(&self) -> usize {
            8
        }

        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            let mut vector = vec![0.0f32; 8];
            for word in text.to_lowercase().split_whitespace() {
                let mut h = 0usize;
                for b in word.bytes() {
                    h = h.wrapping_mul(31).wrapping_add(b as usize);
                }
                vector[h % 8] += 1.0;
            }
            Ok(vector)
        }
    }

    /// Store wrapper whose shared-kb collections are down.
    struct KbDownStore {
        inner: InMemoryVectorStore,
    }

    #[async_trait]
    impl VectorStore for KbDownStore {
        fn name(&self) -> &str {
            "kb-down"
        }

        async fn ensure_collection(&self, collection: &str, dimension: usize) -> Result<()> {
            self.inner.ensure_collection(collection, dimension).await
        }

        async fn upsert(&self, collection: &str, point: VectorPoint) -> Result<()> {
            self.inner.upsert(collection, point).await
        }

        async fn search(
            &self,
            collection: &str,
            vector: &[f32],
            k: usize,
            filter: &OwnerFilter,
        ) -> Result<Vec<caremind_core::types::ScoredPoint>> {
            if collection.starts_with("kb_") {
                return Err(CaremindError::Store("connection refused".into()));
            }
            self.inner.search(collection, vector, k, filter).await
        }

        async fn scroll_texts(
            &self,
            collection: &str,
            limit: usize,
        ) -> Result<Vec<caremind_core::types::StoredText>> {
            self.inner.scroll_texts(collection, limit).await
        }

        async fn delete_by_source(&self, collection: &str, source: &str) -> Result<()> {
            self.inner.delete_by_source(collection, source).await
        }
    }

    async fn seed(store: &dyn VectorStore, collection: &str, owner: &OwnerScope, source: &str, text: &str) {
        store.ensure_collection(collection, 8).await.unwrap();
        let vector = HashEmbedder.embed(text).await.unwrap();
        store
            .upsert(
                collection,
                VectorPoint {
                    id: format!("{collection}:{source}"),
                    vector,
                    text: text.into(),
                    payload: RecordPayload::document(owner, source),
                },
            )
            .await
            .unwrap();
    }

    fn engine_with(
        provider: Arc<StubProvider>,
        store: Arc<dyn VectorStore>,
    ) -> SynthesisEngine {
        let config = CaremindConfig::default();
        let embedder = Arc::new(HashEmbedder);
        let memory = Arc::new(ConversationMemoryManager::new(
            store.clone(),
            embedder.clone(),
            Arc::new(MemoryDb::open_in_memory().unwrap()),
            &config,
        ));
        SynthesisEngine::new(
            provider,
            embedder,
            store,
            Arc::new(FlowStore::with_defaults()),
            memory,
            &config,
        )
    }

    #[tokio::test]
    async fn test_safety_query_returns_vetted_content_without_model() {
        let provider = Arc::new(StubProvider::new());
        let engine = engine_with(provider.clone(), Arc::new(InMemoryVectorStore::new()));
        let mut session = ConversationSession::new("alice", 10);

        let response = engine
            .synthesize(&mut session, "sometimes I want to hurt myself")
            .await
            .unwrap();

        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
        assert!(response.answer.contains("988"));
        assert_eq!(response.confidence, 1.0);
        assert_eq!(response.sources[0].kind, KnowledgeSource::StructuredFlow);
        assert!(!response.next_steps.is_empty());
    }

    #[tokio::test]
    async fn test_benign_follow_up_to_safety_turn_stays_on_vetted_path() {
        let provider = Arc::new(StubProvider::new());
        let engine = engine_with(provider.clone(), Arc::new(InMemoryVectorStore::new()));
        let mut session = ConversationSession::new("alice", 10);

        engine
            .synthesize(&mut session, "sometimes I want to hurt myself")
            .await
            .unwrap();
        let response = engine
            .synthesize(&mut session, "what should I do now?")
            .await
            .unwrap();

        // Both turns resolve from the vetted flow, never the model
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
        assert_eq!(response.sources[0].label, CRISIS_NODE);
        assert_eq!(response.confidence, 1.0);
    }

    #[tokio::test]
    async fn test_malformed_guided_state_fails_closed_to_safety() {
        let provider = Arc::new(StubProvider::new());
        let engine = engine_with(provider.clone(), Arc::new(InMemoryVectorStore::new()));
        let mut session = ConversationSession::new("alice", 10);
        session.enter_guided("guided.removed_node");

        let response = engine.synthesize(&mut session, "what next?").await.unwrap();
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
        assert_eq!(response.sources[0].label, CRISIS_NODE);
    }

    #[tokio::test]
    async fn test_user_doc_hit_raises_confidence_and_cites_literal_label() {
        let store = Arc::new(InMemoryVectorStore::new());
        seed(
            store.as_ref(),
            "user_docs_alice",
            &OwnerScope::user("alice"),
            "iep_2026.pdf",
            "The IEP review meeting is scheduled for March with the speech therapist.",
        )
        .await;

        let provider = Arc::new(StubProvider::new());
        let engine = engine_with(provider.clone(), store);
        let mut session = ConversationSession::new("alice", 10);

        let response = engine
            .synthesize(&mut session, "When is the IEP review meeting scheduled?")
            .await
            .unwrap();

        assert_eq!(response.confidence, 0.95);
        assert!(response.sources.iter().any(|s| s.label == "iep_2026.pdf"));
        assert!(provider.last_prompt.lock().unwrap().contains("[iep_2026.pdf]"));
    }

    #[tokio::test]
    async fn test_kb_only_answer_gets_baseline_confidence() {
        let store = Arc::new(InMemoryVectorStore::new());
        seed(
            store.as_ref(),
            "kb_care_support",
            &OwnerScope::Shared,
            "early_signs.md",
            "Early signs include limited eye contact and delayed speech.",
        )
        .await;

        let engine = engine_with(Arc::new(StubProvider::new()), store);
        let mut session = ConversationSession::new("alice", 10);
        let response = engine
            .synthesize(&mut session, "What are early signs of autism?")
            .await
            .unwrap();
        assert_eq!(response.confidence, 0.70);
    }

    #[tokio::test]
    async fn test_no_sources_at_all_is_honest_low_confidence() {
        let provider = Arc::new(StubProvider::new());
        let engine = engine_with(provider.clone(), Arc::new(InMemoryVectorStore::new()));
        let mut session = ConversationSession::new("alice", 10);

        let response = engine
            .synthesize(&mut session, "What about equine therapy?")
            .await
            .unwrap();
        assert_eq!(response.confidence, 0.30);
        // The model is still called, with an honest empty context
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
        assert!(provider.last_prompt.lock().unwrap().contains("no sources available"));
    }

    #[tokio::test]
    async fn test_unavailable_source_is_excluded_and_reported() {
        let inner = InMemoryVectorStore::new();
        seed(
            &inner,
            "user_docs_alice",
            &OwnerScope::user("alice"),
            "notes.txt",
            "Occupational therapy sessions happen on Tuesdays.",
        )
        .await;
        let store = Arc::new(KbDownStore { inner });

        let engine = engine_with(Arc::new(StubProvider::new()), store);
        let mut session = ConversationSession::new("alice", 10);
        let response = engine
            .synthesize(&mut session, "When are the occupational therapy sessions?")
            .await
            .unwrap();

        assert_eq!(response.unavailable_sources, vec!["shared_kb".to_string()]);
        assert!(response.answer.contains("unavailable"));
        // Degraded from 0.95 by the unavailable source
        assert!((response.confidence - 0.80).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_transient_model_failure_is_retried_once() {
        let store = Arc::new(InMemoryVectorStore::new());
        let provider = Arc::new(StubProvider::failing_first(1));
        let engine = engine_with(provider.clone(), store);
        let mut session = ConversationSession::new("alice", 10);

        let response = engine.synthesize(&mut session, "Any advice?").await.unwrap();
        assert_eq!(provider.calls.load(Ordering::SeqCst), 2);
        assert_eq!(response.answer, "Here is what I found.");
    }

    #[tokio::test]
    async fn test_persistent_model_failure_propagates() {
        let provider = Arc::new(StubProvider::failing_first(5));
        let engine = engine_with(provider.clone(), Arc::new(InMemoryVectorStore::new()));
        let mut session = ConversationSession::new("alice", 10);
        assert!(engine.synthesize(&mut session, "Any advice?").await.is_err());
    }

    #[tokio::test]
    async fn test_cross_source_duplicate_appears_once_in_context() {
        let store = Arc::new(InMemoryVectorStore::new());
        let text = "Autism affects social communication.";
        seed(store.as_ref(), "kb_care_support", &OwnerScope::Shared, "guide.md", text).await;
        seed(
            store.as_ref(),
            "user_docs_alice",
            &OwnerScope::user("alice"),
            "my_notes.txt",
            "Autism affects social communication",
        )
        .await;

        let provider = Arc::new(StubProvider::new());
        let engine = engine_with(provider.clone(), store);
        let mut session = ConversationSession::new("alice", 10);
        engine
            .synthesize(&mut session, "How does autism affect communication?")
            .await
            .unwrap();

        let prompt = provider.last_prompt.lock().unwrap().clone();
        assert_eq!(prompt.matches("Autism affects social communication").count(), 1);
    }

    #[tokio::test]
    async fn test_exchange_is_persisted_after_synthesis() {
        let store = Arc::new(InMemoryVectorStore::new());
        let engine = engine_with(Arc::new(StubProvider::new()), store.clone());
        let mut session = ConversationSession::new("alice", 10);

        engine.synthesize(&mut session, "How do I handle meltdowns?").await.unwrap();
        assert_eq!(session.turn_count(), 1);
        assert_eq!(store.collection_len("chat_history_alice").await, 1);
    }

    #[tokio::test]
    async fn test_guided_mode_uses_flow_prompt_and_next_steps() {
        let store = Arc::new(InMemoryVectorStore::new());
        let provider = Arc::new(StubProvider::new());
        let engine = engine_with(provider.clone(), store);
        let mut session = ConversationSession::new("alice", 10);
        session.enter_guided("guided.screening");

        let response = engine
            .synthesize(&mut session, "what do the results mean?")
            .await
            .unwrap();

        assert!(provider.last_prompt.lock().unwrap().contains("M-CHAT-R"));
        assert_eq!(response.sources[0].label, "guided.screening");
        assert_eq!(response.next_steps, vec!["guided.support_resources".to_string()]);
        assert_eq!(response.confidence, 0.90);
    }
}
