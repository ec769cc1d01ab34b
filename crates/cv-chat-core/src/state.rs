//! UI-agnostic conversation state types
//!
//! This module contains the message and transcript types shared between the
//! terminal UI and the one-shot CLI. Nothing here depends on a UI framework.

use serde::{Deserialize, Serialize};

/// A chat message in the AI conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: ChatRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

/// The role of a chat message sender
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

/// Ordered, append-only conversation history sent to the completion endpoint.
///
/// The first entry is always the system prompt the transcript was seeded with.
/// Entries are never removed, edited or reordered.
#[derive(Debug, Clone)]
pub struct Transcript {
    messages: Vec<ChatMessage>,
}

impl Transcript {
    pub fn new(system_prompt: impl Into<String>) -> Self {
        Self {
            messages: vec![ChatMessage::new(ChatRole::System, system_prompt)],
        }
    }

    pub fn append(&mut self, role: ChatRole, content: impl Into<String>) {
        self.messages.push(ChatMessage::new(role, content));
    }

    /// The full history, exactly as accumulated.
    pub fn to_sendable(&self) -> Vec<ChatMessage> {
        self.messages.clone()
    }

    /// The system prompt followed by at most `limit` of the most recent
    /// non-system messages. `None` is the same as `to_sendable`. The newest
    /// message is always kept, so a limit of 0 behaves like 1.
    pub fn window(&self, limit: Option<usize>) -> Vec<ChatMessage> {
        let Some(limit) = limit else {
            return self.to_sendable();
        };
        let limit = limit.max(1);

        let (system, rest) = self.messages.split_at(1);
        let skip = rest.len().saturating_sub(limit);
        system.iter().chain(rest.iter().skip(skip)).cloned().collect()
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn last(&self) -> Option<&ChatMessage> {
        self.messages.last()
    }
}
