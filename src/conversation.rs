//! Conversation transcript types supplied by the chat collaborator.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::llm::Role;

/// One message of a running transcript.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationMessage {
    /// Stable message id assigned by the chat collaborator.
    pub id: String,
    pub role: Role,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

impl ConversationMessage {
    /// Create a user message.
    pub fn user(id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            role: Role::User,
            content: content.into(),
            timestamp: None,
        }
    }

    /// Create an assistant message.
    pub fn assistant(id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            role: Role::Assistant,
            content: content.into(),
            timestamp: None,
        }
    }

    /// Attach a timestamp.
    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    pub fn is_user(&self) -> bool {
        self.role == Role::User
    }
}

/// The last `window_size` messages of a transcript.
pub fn window(messages: &[ConversationMessage], window_size: usize) -> &[ConversationMessage] {
    let start = messages.len().saturating_sub(window_size.max(1));
    &messages[start..]
}

/// Build user messages with sequential ids (`m1`, `m2`, ...).
///
/// Convenience for hosts and tests that only hold raw strings.
pub fn from_user_texts<S: AsRef<str>>(texts: &[S]) -> Vec<ConversationMessage> {
    texts
        .iter()
        .enumerate()
        .map(|(i, text)| ConversationMessage::user(format!("m{}", i + 1), text.as_ref()))
        .collect()
}
