//! # Caremind Memory
//!
//! Conversation memory: a bounded in-session turn window, an append-only
//! durable log, and incremental insight extraction that summarizes blocks
//! of turns into typed records (insights, preferences, strategies).
//!
//! Extraction never runs per-turn; it fires at fixed turn-count boundaries
//! and failures are deferred to the next boundary instead of blocking the
//! conversation.

pub mod db;
pub mod extraction;
pub mod manager;
pub mod session;

pub use db::{ExtractionJob, MemoryDb};
pub use extraction::{ExtractedInsight, InsightExtractor};
pub use manager::ConversationMemoryManager;
pub use session::ConversationSession;
