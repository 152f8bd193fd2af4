//! Conversation Session — bounded per-session turn window.

use std::collections::VecDeque;

use caremind_core::types::Message;
use uuid::Uuid;

/// Interaction mode of a session. Guided mode walks reviewed flow nodes;
/// free-form blends retrieval sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionMode {
    FreeForm,
    Guided,
}

/// Live conversation state for one user session.
///
/// The message window is bounded; the turn counter is monotone for the
/// lifetime of the session and keeps advancing after old turns fall out
/// of the window.
#[derive(Debug, Clone)]
pub struct ConversationSession {
    pub id: String,
    pub owner_id: String,
    pub mode: SessionMode,
    /// Active flow node id, meaningful in guided mode.
    pub active_node: Option<String>,
    /// Whether this user has any uploaded documents. Routing only targets
    /// the private document collection when set.
    pub has_documents: bool,
    messages: VecDeque<Message>,
    turn_count: u64,
    window: usize,
}

impl ConversationSession {
    pub fn new(owner_id: impl Into<String>, window: usize) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            owner_id: owner_id.into(),
            mode: SessionMode::FreeForm,
            active_node: None,
            has_documents: false,
            messages: VecDeque::new(),
            turn_count: 0,
            window: window.max(1),
        }
    }

    /// Completed user/assistant turns so far. Never decreases.
    pub fn turn_count(&self) -> u64 {
        self.turn_count
    }

    /// Messages currently in the window, oldest first.
    pub fn messages(&self) -> impl Iterator<Item = &Message> {
        self.messages.iter()
    }

    /// Record one completed exchange, evicting the oldest turn when the
    /// window is full.
    pub fn push_turn(&mut self, user_text: &str, assistant_text: &str) -> u64 {
        self.turn_count += 1;
        self.messages.push_back(Message::user(user_text));
        self.messages.push_back(Message::assistant(assistant_text));
        // One turn is a user/assistant message pair
        while self.messages.len() > self.window * 2 {
            self.messages.pop_front();
        }
        self.turn_count
    }

    /// Transcript of the most recent `turns` turns, for extraction.
    pub fn recent_transcript(&self, turns: usize) -> String {
        let keep = turns * 2;
        let skip = self.messages.len().saturating_sub(keep);
        self.messages
            .iter()
            .skip(skip)
            .map(|m| match m.role {
                caremind_core::types::Role::User => format!("Caregiver: {}", m.content),
                caremind_core::types::Role::Assistant => format!("Assistant: {}", m.content),
                caremind_core::types::Role::System => format!("System: {}", m.content),
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn enter_guided(&mut self, node_id: impl Into<String>) {
        self.mode = SessionMode::Guided;
        self.active_node = Some(node_id.into());
    }

    pub fn exit_guided(&mut self) {
        self.mode = SessionMode::FreeForm;
        self.active_node = None;
    }
}
