//! Stateful owner of conversation states.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::analysis::MultiFrameworkAnalysis;
use crate::state::{ConversationState, SnapshotStore, merge};

/// Slot for one conversation.
///
/// Holds a state only while that state is not known to be persisted: after
/// a failed save, or when the caller abandoned the turn mid-save. Clean
/// slots are released and the store is read again on next use.
type Slot = Arc<Mutex<Option<ConversationState>>>;

/// Keys states by conversation id and serializes merges per conversation.
///
/// Different conversations never wait on each other. Persistence failures
/// are logged and the in-memory state stays authoritative until a later
/// save succeeds.
pub struct StateManager {
    store: Arc<dyn SnapshotStore>,
    slots: std::sync::Mutex<HashMap<String, Slot>>,
}

impl StateManager {
    pub fn new(store: Arc<dyn SnapshotStore>) -> Self {
        Self {
            store,
            slots: std::sync::Mutex::new(HashMap::new()),
        }
    }

    pub fn store(&self) -> &Arc<dyn SnapshotStore> {
        &self.store
    }

    fn slots(&self) -> std::sync::MutexGuard<'_, HashMap<String, Slot>> {
        match self.slots.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn slot(&self, conversation_id: &str) -> Slot {
        self.slots()
            .entry(conversation_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(None)))
            .clone()
    }

    /// Drop the map entry if it is `slot`, nobody else holds it and it
    /// carries no unsaved state.
    ///
    /// Clones are only handed out under the map lock, so a strong count of
    /// two (map plus caller) cannot race with a new waiter.
    fn release(&self, conversation_id: &str, slot: Slot) {
        let mut slots = self.slots();
        let Some(entry) = slots.get(conversation_id) else {
            return;
        };
        if !Arc::ptr_eq(entry, &slot) || Arc::strong_count(&slot) != 2 {
            return;
        }
        let clean = slot.try_lock().map(|guard| guard.is_none()).unwrap_or(false);
        if clean {
            slots.remove(conversation_id);
        }
    }

    async fn seed(&self, conversation_id: &str) -> ConversationState {
        match self.store.load(conversation_id).await {
            Ok(Some(state)) => state,
            Ok(None) => ConversationState::new(conversation_id),
            Err(e) => {
                tracing::warn!(
                    conversation_id,
                    error = %e,
                    "Failed to load conversation state, starting fresh"
                );
                ConversationState::new(conversation_id)
            }
        }
    }

    /// Current cumulative state: the unsaved in-memory copy if one exists,
    /// otherwise whatever the store holds.
    pub async fn current(&self, conversation_id: &str) -> ConversationState {
        let slot = self.slot(conversation_id);
        let guard = slot.lock().await;
        let state = match guard.as_ref() {
            Some(state) => state.clone(),
            None => self.seed(conversation_id).await,
        };
        drop(guard);
        self.release(conversation_id, slot);
        state
    }

    /// Merge a complete turn into its conversation and persist the result.
    ///
    /// The merged state is cached before the save is awaited, so dropping
    /// this future never loses a recorded element.
    pub async fn apply(&self, analysis: &MultiFrameworkAnalysis) -> ConversationState {
        let conversation_id = analysis.conversation_id.as_str();
        let slot = self.slot(conversation_id);
        let mut guard = slot.lock().await;

        let old = match guard.as_ref() {
            Some(state) => state.clone(),
            None => self.seed(conversation_id).await,
        };
        let merged = merge(old, analysis);
        *guard = Some(merged.clone());

        match self.store.save(&merged).await {
            Ok(()) => *guard = None,
            Err(e) => tracing::warn!(
                conversation_id,
                error = %e,
                "Failed to persist conversation state, keeping it in memory"
            ),
        }

        drop(guard);
        self.release(conversation_id, slot);
        merged
    }

    /// Forget the cached state of one conversation.
    ///
    /// Returns `true` if an unsaved state was discarded; the next turn then
    /// starts from whatever the store holds.
    pub fn evict(&self, conversation_id: &str) -> bool {
        let Some(slot) = self.slots().remove(conversation_id) else {
            return false;
        };
        let unsaved = slot
            .try_lock()
            .map(|guard| guard.is_some())
            .unwrap_or(true);
        if unsaved {
            tracing::warn!(conversation_id, "Evicted a conversation with unsaved state");
        }
        unsaved
    }

    /// Number of conversations currently held in memory.
    pub fn cached_conversations(&self) -> usize {
        self.slots().len()
    }
}
