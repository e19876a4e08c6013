//! Per-framework and per-turn verdicts.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::frameworks::{FrameworkKind, TherapeuticElement};

/// One framework's verdict for one turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameworkAnalysisResult {
    pub framework: FrameworkKind,
    /// Whether the framework produced a verdict this turn.
    pub analyzed: bool,
    /// Whether the verdict came from the text-generation capability.
    pub llm_used: bool,
    pub confidence_score: f32,
    #[serde(default)]
    pub elements: Vec<TherapeuticElement>,
    #[serde(default)]
    pub evidence_summary: String,
    /// Failure category or reason when degraded or failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Subtypes explicitly withdrawn this turn.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub invalidated: Vec<String>,
}

impl FrameworkAnalysisResult {
    /// Analyzed, nothing found.
    pub fn clean(framework: FrameworkKind) -> Self {
        Self {
            framework,
            analyzed: true,
            llm_used: false,
            confidence_score: 0.0,
            elements: Vec::new(),
            evidence_summary: String::new(),
            error: None,
            invalidated: Vec::new(),
        }
    }

    /// Not analyzed this turn; carries the cumulative elements forward.
    pub fn pass_through(framework: FrameworkKind, carried: Vec<TherapeuticElement>) -> Self {
        Self {
            analyzed: false,
            elements: carried,
            ..Self::clean(framework)
        }
    }

    /// The framework's path failed outright.
    pub fn failed(framework: FrameworkKind, reason: impl Into<String>) -> Self {
        Self {
            analyzed: false,
            error: Some(reason.into()),
            ..Self::clean(framework)
        }
    }

    /// Whether this result counts toward totals and insights.
    ///
    /// Pass-throughs and zero scores never count, whatever the threshold.
    pub fn exceeds_threshold(&self, threshold: f32) -> bool {
        self.analyzed && self.confidence_score > 0.0 && self.confidence_score >= threshold
    }

    /// `subtype: "evidence"` lines joined with `; `.
    pub fn summarize(elements: &[TherapeuticElement]) -> String {
        elements
            .iter()
            .map(|e| format!("{}: \"{}\"", e.kind, e.evidence))
            .collect::<Vec<_>>()
            .join("; ")
    }
}

/// Observation derived from two frameworks exceeding threshold together.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrossFrameworkInsight {
    /// Stable rule key, e.g. `parts_work+cognitive_behavioral`.
    pub rule: String,
    pub frameworks: Vec<FrameworkKind>,
    pub description: String,
    pub confidence: f32,
}

/// Shape consumed by callers that predate multi-framework support.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PartsProjection {
    pub parts: Vec<TherapeuticElement>,
    pub confidence: f32,
    pub analyzed: bool,
}

impl PartsProjection {
    fn from_frameworks(frameworks: &BTreeMap<FrameworkKind, FrameworkAnalysisResult>) -> Self {
        frameworks
            .get(&FrameworkKind::PartsWork)
            .map(|result| Self {
                parts: result.elements.clone(),
                confidence: result.confidence_score,
                analyzed: result.analyzed,
            })
            .unwrap_or_default()
    }
}

/// Aggregate verdict for one conversation turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MultiFrameworkAnalysis {
    pub analysis_id: Uuid,
    pub conversation_id: String,
    pub message_id: String,
    pub message_count: usize,
    pub analyzed_at: DateTime<Utc>,
    /// Exactly one entry per framework enabled this turn.
    pub frameworks: BTreeMap<FrameworkKind, FrameworkAnalysisResult>,
    /// Frameworks that exceeded their threshold, in registration order.
    #[serde(default)]
    pub above_threshold: Vec<FrameworkKind>,
    #[serde(default)]
    pub cross_framework_insights: Vec<CrossFrameworkInsight>,
    pub total_confidence: f32,
    #[serde(flatten)]
    pub legacy: PartsProjection,
}

impl MultiFrameworkAnalysis {
    pub fn new(
        conversation_id: impl Into<String>,
        message_id: impl Into<String>,
        message_count: usize,
        frameworks: BTreeMap<FrameworkKind, FrameworkAnalysisResult>,
    ) -> Self {
        let legacy = PartsProjection::from_frameworks(&frameworks);
        Self {
            analysis_id: Uuid::new_v4(),
            conversation_id: conversation_id.into(),
            message_id: message_id.into(),
            message_count,
            analyzed_at: Utc::now(),
            frameworks,
            above_threshold: Vec::new(),
            cross_framework_insights: Vec::new(),
            total_confidence: 0.0,
            legacy,
        }
    }

    pub fn result(&self, framework: FrameworkKind) -> Option<&FrameworkAnalysisResult> {
        self.frameworks.get(&framework)
    }

    /// Frameworks that produced a verdict this turn.
    pub fn analyzed_frameworks(&self) -> impl Iterator<Item = FrameworkKind> + '_ {
        self.frameworks
            .values()
            .filter(|r| r.analyzed)
            .map(|r| r.framework)
    }

    /// Plain-text tone guidance for a response composer.
    ///
    /// Empty when no framework exceeded its threshold.
    pub fn guidance(&self) -> String {
        if self.above_threshold.is_empty() {
            return String::new();
        }

        let mut out =
            String::from("Conversation context (adjust tone only; never label the user):\n");
        for framework in &self.above_threshold {
            let Some(result) = self.frameworks.get(framework) else {
                continue;
            };
            let mut kinds: Vec<&str> = result.elements.iter().map(|e| e.kind.as_str()).collect();
            kinds.dedup();
            out.push_str(&format!(
                "- {} ({:.2}): {}. {}\n",
                framework.label(),
                result.confidence_score,
                if kinds.is_empty() {
                    "pattern cues only".to_string()
                } else {
                    kinds.join(", ")
                },
                tone_hint(*framework)
            ));
        }
        for insight in &self.cross_framework_insights {
            out.push_str(&format!("- Together: {}.\n", insight.description));
        }
        out
    }
}

fn tone_hint(framework: FrameworkKind) -> &'static str {
    match framework {
        FrameworkKind::PartsWork => {
            "Acknowledge each side with curiosity and avoid taking one part's side."
        }
        FrameworkKind::CognitiveBehavioral => {
            "Gently explore the evidence for absolute or worst-case thoughts."
        }
        FrameworkKind::Archetypal => "Reflect the larger theme without interpreting it for them.",
        FrameworkKind::Narrative => {
            "Keep the person separate from the problem and notice exceptions."
        }
        FrameworkKind::Attachment => "Stay steady and warm; do not withdraw or over-reassure.",
    }
}
