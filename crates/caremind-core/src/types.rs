//! Domain types shared across the Caremind crates.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Tenant partition a record belongs to. Cross-tenant isolation is absolute:
/// a user's records are never returned for a different owner.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum OwnerScope {
    Shared,
    User(String),
}

impl OwnerScope {
    pub fn user(id: impl Into<String>) -> Self {
        Self::User(id.into())
    }

    pub fn is_shared(&self) -> bool {
        matches!(self, Self::Shared)
    }

    /// The payload key stored alongside every vector record and matched
    /// exactly by owner filters.
    pub fn key(&self) -> &str {
        match self {
            Self::Shared => "shared",
            Self::User(id) => id,
        }
    }
}

impl fmt::Display for OwnerScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Shared => write!(f, "shared"),
            Self::User(id) => write!(f, "user:{id}"),
        }
    }
}

impl From<OwnerScope> for String {
    fn from(scope: OwnerScope) -> Self {
        scope.to_string()
    }
}

impl TryFrom<String> for OwnerScope {
    type Error = String;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        if value == "shared" {
            Ok(Self::Shared)
        } else if let Some(id) = value.strip_prefix("user:") {
            if id.is_empty() {
                Err("empty user id in owner scope".into())
            } else {
                Ok(Self::User(id.to_string()))
            }
        } else {
            Err(format!("invalid owner scope: {value}"))
        }
    }
}

/// Collection naming convention for the persisted state layout.
/// One private collection set per owner, never merged.
pub mod collections {
    pub fn shared_kb(name: &str) -> String {
        format!("kb_{name}")
    }

    pub fn user_docs(owner_id: &str) -> String {
        format!("user_docs_{owner_id}")
    }

    pub fn chat_history(owner_id: &str) -> String {
        format!("chat_history_{owner_id}")
    }

    pub fn insights(owner_id: &str) -> String {
        format!("insights_{owner_id}")
    }

    pub fn prefs(owner_id: &str) -> String {
        format!("prefs_{owner_id}")
    }

    pub fn learning(owner_id: &str) -> String {
        format!("learning_{owner_id}")
    }
}

/// A unit of ingested document text with its own embedding.
/// Immutable once stored; deleted only by explicit document removal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    pub id: String,
    pub text: String,
    /// Document the chunk came from (filename or collection label).
    pub source: String,
    pub owner: OwnerScope,
    pub created_at: DateTime<Utc>,
    pub embedding: Vec<f32>,
}

/// The closed set of knowledge sources a query can be routed to.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum KnowledgeSource {
    SharedKb,
    UserDocs,
    StructuredFlow,
    Memory,
    Web,
}

impl KnowledgeSource {
    pub fn label(&self) -> &'static str {
        match self {
            Self::SharedKb => "shared_kb",
            Self::UserDocs => "user_docs",
            Self::StructuredFlow => "structured_flow",
            Self::Memory => "memory",
            Self::Web => "web",
        }
    }

    /// Context assembly priority: lower sorts first in the prompt.
    pub fn priority(&self) -> u8 {
        match self {
            Self::UserDocs => 0,
            Self::StructuredFlow => 1,
            Self::SharedKb => 2,
            Self::Memory => 3,
            Self::Web => 4,
        }
    }
}

/// Why the router picked the sources it did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteReason {
    /// Safety-sensitive input: structured flow only, never blended.
    Safety,
    /// Guided mode with an active flow node.
    Guided,
    /// Free-form query over the blended sources.
    FreeForm,
    /// Conversation state was malformed; failed closed to the safety path.
    FailClosed,
}

/// Routing decision produced fresh for each query; not persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingDecision {
    /// Source → weight. Absent sources carry weight zero.
    pub weights: BTreeMap<KnowledgeSource, f32>,
    pub reason: RouteReason,
}

impl RoutingDecision {
    /// A decision that targets a single source with full weight.
    pub fn single(source: KnowledgeSource, reason: RouteReason) -> Self {
        let mut weights = BTreeMap::new();
        weights.insert(source, 1.0);
        Self { weights, reason }
    }

    pub fn weight(&self, source: KnowledgeSource) -> f32 {
        self.weights.get(&source).copied().unwrap_or(0.0)
    }

    pub fn includes(&self, source: KnowledgeSource) -> bool {
        self.weight(source) > 0.0
    }

    pub fn sources(&self) -> impl Iterator<Item = KnowledgeSource> + '_ {
        self.weights
            .iter()
            .filter(|(_, w)| **w > 0.0)
            .map(|(s, _)| *s)
    }
}

/// One retrieved candidate, consumed within a single query cycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalResult {
    pub id: String,
    pub text: String,
    /// Similarity score in [0, 1].
    pub score: f32,
    /// Literal document/collection label, used verbatim in attribution.
    pub source_label: String,
    pub kind: KnowledgeSource,
    pub created_at: DateTime<Utc>,
    pub retrieved_at: DateTime<Utc>,
}

/// Kind of a derived or raw conversation memory record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryKind {
    ChatTurn,
    Insight,
    Preference,
    Strategy,
}

impl MemoryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ChatTurn => "chat_turn",
            Self::Insight => "insight",
            Self::Preference => "preference",
            Self::Strategy => "strategy",
        }
    }

    /// Collection the record lives in, per the persisted state layout.
    pub fn collection(&self, owner_id: &str) -> String {
        match self {
            Self::ChatTurn => collections::chat_history(owner_id),
            Self::Insight => collections::insights(owner_id),
            Self::Preference => collections::prefs(owner_id),
            Self::Strategy => collections::learning(owner_id),
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        match value {
            "chat_turn" => Some(Self::ChatTurn),
            "insight" => Some(Self::Insight),
            "preference" => Some(Self::Preference),
            "strategy" => Some(Self::Strategy),
            _ => None,
        }
    }
}

/// Inclusive range of conversation turns a derived record summarizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnRange {
    pub start: u64,
    pub end: u64,
}

impl TurnRange {
    pub fn new(start: u64, end: u64) -> Self {
        Self { start, end }
    }
}

impl fmt::Display for TurnRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}

/// A persisted conversation memory record. ChatTurns are append-only;
/// derived records are never overwritten, new extractions append.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryRecord {
    pub id: String,
    pub owner_id: String,
    pub kind: MemoryKind,
    pub text: String,
    pub turn_range: TurnRange,
    pub created_at: DateTime<Utc>,
}

/// Chat message role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// A chat message exchanged with the language model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: Role::System, content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self { role: Role::User, content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: Role::Assistant, content: content.into() }
    }
}

/// Generation parameters for a provider call.
#[derive(Debug, Clone)]
pub struct GenerateParams {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

/// A completed provider response.
#[derive(Debug, Clone)]
pub struct ChatResponse {
    pub content: String,
    pub finish_reason: Option<String>,
}

/// One attributed source in a synthesized answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceRef {
    /// Literal document/collection label actually used, never a placeholder.
    pub label: String,
    pub kind: KnowledgeSource,
}

/// The final synthesized answer returned to the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SynthesizedResponse {
    pub answer: String,
    pub sources: Vec<SourceRef>,
    pub confidence: f32,
    pub next_steps: Vec<String>,
    /// Sources that were routed to but unavailable this query. Non-empty
    /// means the answer is degraded-but-honest, with confidence reduced.
    pub unavailable_sources: Vec<String>,
}

/// Payload stored alongside every vector record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordPayload {
    /// Owner key ("shared" or a user id); matched exactly by owner filters.
    pub owner: String,
    /// Document filename or collection label the record came from.
    pub source: String,
    pub created_at: DateTime<Utc>,
    /// Memory kind tag, present only on conversation memory records.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    /// Turn range tag, present only on derived memory records.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub turn_range: Option<TurnRange>,
}

impl RecordPayload {
    pub fn document(owner: &OwnerScope, source: impl Into<String>) -> Self {
        Self {
            owner: owner.key().to_string(),
            source: source.into(),
            created_at: Utc::now(),
            kind: None,
            turn_range: None,
        }
    }
}

/// A record to upsert into a vector collection.
#[derive(Debug, Clone)]
pub struct VectorPoint {
    pub id: String,
    pub vector: Vec<f32>,
    pub text: String,
    pub payload: RecordPayload,
}

/// A search hit from a vector collection.
#[derive(Debug, Clone)]
pub struct ScoredPoint {
    pub id: String,
    pub score: f32,
    pub text: String,
    pub payload: RecordPayload,
}

/// A stored chunk text with its source label, used for duplicate checks.
#[derive(Debug, Clone)]
pub struct StoredText {
    pub text: String,
    pub source: String,
}
