//! Snapshot store seam.
//!
//! The engine does not own a persistence format. Merged states are handed to
//! a [`SnapshotStore`], and research views read history back through it.

use std::collections::BTreeMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::StoreError;
use crate::state::ConversationState;

/// Durable home for conversation state snapshots.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Append a snapshot for its conversation.
    async fn save(&self, state: &ConversationState) -> Result<(), StoreError>;

    /// Latest snapshot, if any.
    async fn load(&self, conversation_id: &str) -> Result<Option<ConversationState>, StoreError>;

    /// All snapshots for a conversation, oldest first.
    async fn history(&self, conversation_id: &str) -> Result<Vec<ConversationState>, StoreError>;

    async fn conversation_ids(&self) -> Result<Vec<String>, StoreError>;
}

/// Process-local store for tests and embedding.
#[derive(Default)]
pub struct InMemorySnapshotStore {
    snapshots: RwLock<BTreeMap<String, Vec<ConversationState>>>,
}

impl InMemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SnapshotStore for InMemorySnapshotStore {
    async fn save(&self, state: &ConversationState) -> Result<(), StoreError> {
        if state.conversation_id.is_empty() {
            return Err(StoreError::Unavailable(
                "snapshot has no conversation id".to_string(),
            ));
        }
        self.snapshots
            .write()
            .await
            .entry(state.conversation_id.clone())
            .or_default()
            .push(state.clone());
        Ok(())
    }

    async fn load(&self, conversation_id: &str) -> Result<Option<ConversationState>, StoreError> {
        Ok(self
            .snapshots
            .read()
            .await
            .get(conversation_id)
            .and_then(|history| history.last().cloned()))
    }

    async fn history(&self, conversation_id: &str) -> Result<Vec<ConversationState>, StoreError> {
        Ok(self
            .snapshots
            .read()
            .await
            .get(conversation_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn conversation_ids(&self) -> Result<Vec<String>, StoreError> {
        Ok(self.snapshots.read().await.keys().cloned().collect())
    }
}
