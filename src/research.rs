//! Read-side aggregation and research export over stored snapshots.
//!
//! Everything here is a projection of state the engine already produced. The
//! latest snapshot of a conversation is cumulative, so element statistics are
//! taken from it; the history only contributes snapshot counts.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::frameworks::FrameworkKind;
use crate::state::{ConversationState, FrameworkState, SnapshotStore};

/// count / min / max / mean over a set of confidences.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceSummary {
    pub count: usize,
    pub min: f32,
    pub max: f32,
    pub mean: f32,
}

impl ConfidenceSummary {
    pub fn from_values(values: impl IntoIterator<Item = f32>) -> Self {
        let mut summary = Self::default();
        let mut total = 0.0f64;
        for value in values {
            if summary.count == 0 {
                summary.min = value;
                summary.max = value;
            } else {
                summary.min = summary.min.min(value);
                summary.max = summary.max.max(value);
            }
            summary.count += 1;
            total += f64::from(value);
        }
        if summary.count > 0 {
            summary.mean = (total / summary.count as f64) as f32;
        }
        summary
    }
}

/// One framework's view of a conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameworkAggregate {
    pub framework: FrameworkKind,
    pub element_count: usize,
    /// Subtype -> total occurrences.
    pub subtype_frequency: BTreeMap<String, u32>,
    pub confidence: ConfidenceSummary,
    pub first_seen: Option<DateTime<Utc>>,
    pub last_seen: Option<DateTime<Utc>>,
    pub last_analyzed_count: Option<usize>,
}

impl FrameworkAggregate {
    fn from_state(framework: FrameworkKind, state: &FrameworkState) -> Self {
        let mut subtype_frequency = BTreeMap::new();
        for recorded in state.elements.values() {
            *subtype_frequency
                .entry(recorded.element.kind.clone())
                .or_insert(0u32) += recorded.occurrences;
        }
        Self {
            framework,
            element_count: state.elements.len(),
            subtype_frequency,
            confidence: ConfidenceSummary::from_values(
                state.elements.values().map(|r| r.element.confidence),
            ),
            first_seen: state.elements.values().map(|r| r.first_seen).min(),
            last_seen: state.elements.values().map(|r| r.last_seen).max(),
            last_analyzed_count: state.last_analyzed_count,
        }
    }
}

/// Aggregate view of one conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationAggregate {
    pub conversation_id: String,
    pub snapshot_count: usize,
    pub analysis_count: u64,
    pub last_analyzed_message_id: Option<String>,
    pub frameworks: BTreeMap<FrameworkKind, FrameworkAggregate>,
}

/// Filters for [`DataCollector::export_research_data`]. Empty means "all".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResearchFilters {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conversation_ids: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub frameworks: Vec<FrameworkKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_confidence: Option<f32>,
    /// Inclusive lower bound on `last_seen`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub since: Option<DateTime<Utc>>,
    /// Inclusive upper bound on `last_seen`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub until: Option<DateTime<Utc>>,
}

impl ResearchFilters {
    fn wants_conversation(&self, conversation_id: &str) -> bool {
        self.conversation_ids.is_empty() || self.conversation_ids.iter().any(|c| c == conversation_id)
    }

    fn accepts(&self, record: &ResearchRecord) -> bool {
        (self.frameworks.is_empty() || self.frameworks.contains(&record.framework))
            && self.min_confidence.is_none_or(|min| record.confidence >= min)
            && self.since.is_none_or(|since| record.last_seen >= since)
            && self.until.is_none_or(|until| record.last_seen <= until)
    }
}

/// One flattened element for research use.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResearchRecord {
    pub conversation_id: String,
    pub framework: FrameworkKind,
    pub subtype: String,
    pub evidence: String,
    pub intensity: f32,
    pub confidence: f32,
    pub occurrences: u32,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
}

/// Per-framework totals over exported records.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct FrameworkTotals {
    pub records: usize,
    pub occurrences: u64,
    pub mean_confidence: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResearchExport {
    pub generated_at: DateTime<Utc>,
    pub filters: ResearchFilters,
    pub conversation_count: usize,
    pub records: Vec<ResearchRecord>,
    pub totals: BTreeMap<FrameworkKind, FrameworkTotals>,
}

impl ResearchExport {
    pub fn to_json(&self) -> Result<String, StoreError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

fn records_of(state: &ConversationState) -> impl Iterator<Item = ResearchRecord> + '_ {
    state.frameworks.iter().flat_map(move |(framework, framework_state)| {
        framework_state.elements.values().map(move |recorded| ResearchRecord {
            conversation_id: state.conversation_id.clone(),
            framework: *framework,
            subtype: recorded.element.kind.clone(),
            evidence: recorded.element.evidence.clone(),
            intensity: recorded.element.intensity,
            confidence: recorded.element.confidence,
            occurrences: recorded.occurrences,
            first_seen: recorded.first_seen,
            last_seen: recorded.last_seen,
        })
    })
}

/// Aggregation over a [`SnapshotStore`].
pub struct DataCollector {
    store: Arc<dyn SnapshotStore>,
}

impl DataCollector {
    pub fn new(store: Arc<dyn SnapshotStore>) -> Self {
        Self { store }
    }

    /// Per-framework statistics for one conversation.
    ///
    /// Returns `None` when the conversation has no snapshots.
    pub async fn aggregate_conversation_data(
        &self,
        conversation_id: &str,
    ) -> Result<Option<ConversationAggregate>, StoreError> {
        let history = self.store.history(conversation_id).await?;
        let Some(latest) = history.last() else {
            return Ok(None);
        };

        let frameworks = latest
            .frameworks
            .iter()
            .map(|(framework, state)| (*framework, FrameworkAggregate::from_state(*framework, state)))
            .collect();

        Ok(Some(ConversationAggregate {
            conversation_id: conversation_id.to_string(),
            snapshot_count: history.len(),
            analysis_count: latest.analysis_count,
            last_analyzed_message_id: latest.last_analyzed_message_id.clone(),
            frameworks,
        }))
    }

    /// Flattened, filtered records across conversations.
    pub async fn export_research_data(
        &self,
        filters: &ResearchFilters,
    ) -> Result<ResearchExport, StoreError> {
        let mut records = Vec::new();
        let mut conversation_count = 0;

        for conversation_id in self.store.conversation_ids().await? {
            if !filters.wants_conversation(&conversation_id) {
                continue;
            }
            let Some(latest) = self.store.load(&conversation_id).await? else {
                continue;
            };
            let before = records.len();
            records.extend(records_of(&latest).filter(|r| filters.accepts(r)));
            if records.len() > before {
                conversation_count += 1;
            }
        }

        let mut totals: BTreeMap<FrameworkKind, FrameworkTotals> = BTreeMap::new();
        for record in &records {
            let entry = totals.entry(record.framework).or_default();
            entry.records += 1;
            entry.occurrences += u64::from(record.occurrences);
            entry.mean_confidence += record.confidence;
        }
        for entry in totals.values_mut() {
            entry.mean_confidence /= entry.records as f32;
        }

        tracing::debug!(
            records = records.len(),
            conversations = conversation_count,
            "Research export assembled"
        );

        Ok(ResearchExport {
            generated_at: Utc::now(),
            filters: filters.clone(),
            conversation_count,
            records,
            totals,
        })
    }

    /// [`Self::export_research_data`] serialized as JSON.
    pub async fn export_research_json(&self, filters: &ResearchFilters) -> Result<String, StoreError> {
        self.export_research_data(filters).await?.to_json()
    }
}
