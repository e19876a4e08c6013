//! Cumulative per-conversation state and the pure merge that updates it.

mod manager;
mod store;

pub use manager::StateManager;
pub use store::{InMemorySnapshotStore, SnapshotStore};

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::analysis::MultiFrameworkAnalysis;
use crate::frameworks::{FrameworkKind, TherapeuticElement};

/// A detected element as recorded across turns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordedElement {
    /// Latest observation, including the latest scores.
    pub element: TherapeuticElement,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    pub occurrences: u32,
}

/// Cumulative record for one framework.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FrameworkState {
    /// Message count at which this framework last produced a verdict.
    pub last_analyzed_count: Option<usize>,
    /// Keyed by [`element_key`].
    pub elements: BTreeMap<String, RecordedElement>,
}

/// Cumulative record for one conversation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConversationState {
    pub conversation_id: String,
    pub last_analyzed_message_id: Option<String>,
    /// Turns in which at least one framework produced a verdict.
    pub analysis_count: u64,
    pub frameworks: BTreeMap<FrameworkKind, FrameworkState>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl ConversationState {
    pub fn new(conversation_id: impl Into<String>) -> Self {
        Self {
            conversation_id: conversation_id.into(),
            ..Self::default()
        }
    }

    /// Known elements for a framework, oldest first.
    pub fn elements_for(&self, framework: FrameworkKind) -> Vec<TherapeuticElement> {
        let Some(state) = self.frameworks.get(&framework) else {
            return Vec::new();
        };
        let mut recorded: Vec<&RecordedElement> = state.elements.values().collect();
        recorded.sort_by_key(|r| r.first_seen);
        recorded.into_iter().map(|r| r.element.clone()).collect()
    }

    pub fn last_analyzed_count(&self, framework: FrameworkKind) -> Option<usize> {
        self.frameworks
            .get(&framework)
            .and_then(|s| s.last_analyzed_count)
    }

    pub fn element_count(&self) -> usize {
        self.frameworks.values().map(|s| s.elements.len()).sum()
    }
}

fn normalize_evidence(evidence: &str) -> String {
    evidence
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Identity of an element: framework, subtype and normalized evidence hash.
pub fn element_key(element: &TherapeuticElement) -> String {
    let digest = Sha256::digest(normalize_evidence(&element.evidence).as_bytes());
    format!(
        "{}:{}:{}",
        element.framework,
        element.kind,
        &hex::encode(digest)[..16]
    )
}

/// Fold one turn into the cumulative state.
///
/// Only frameworks that produced a verdict this turn touch the state.
/// Elements are added or refreshed by [`element_key`]; nothing is removed
/// unless the same verdict invalidated the subtype without re-detecting it.
pub fn merge(old: ConversationState, new: &MultiFrameworkAnalysis) -> ConversationState {
    let mut state = old;
    if state.conversation_id.is_empty() {
        state.conversation_id = new.conversation_id.clone();
    }
    let seen_at = new.analyzed_at;
    let mut any_analyzed = false;

    for (framework, result) in &new.frameworks {
        if !result.analyzed {
            continue;
        }
        any_analyzed = true;

        let framework_state = state.frameworks.entry(*framework).or_default();
        framework_state.last_analyzed_count = Some(new.message_count);

        for element in &result.elements {
            framework_state
                .elements
                .entry(element_key(element))
                .and_modify(|recorded| {
                    recorded.element = element.clone();
                    recorded.last_seen = seen_at;
                    recorded.occurrences = recorded.occurrences.saturating_add(1);
                })
                .or_insert_with(|| RecordedElement {
                    element: element.clone(),
                    first_seen: seen_at,
                    last_seen: seen_at,
                    occurrences: 1,
                });
        }

        let redetected: BTreeSet<&str> = result.elements.iter().map(|e| e.kind.as_str()).collect();
        for subtype in &result.invalidated {
            if redetected.contains(subtype.as_str()) {
                continue;
            }
            framework_state
                .elements
                .retain(|_, recorded| recorded.element.kind != *subtype);
        }
    }

    if any_analyzed {
        state.analysis_count += 1;
        state.last_analyzed_message_id = Some(new.message_id.clone());
    }
    state.updated_at = Some(seen_at);
    state
}
