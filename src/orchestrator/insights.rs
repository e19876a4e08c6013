//! Cross-framework insight rules.
//!
//! Each rule is keyed on an unordered pair of frameworks and fires only when
//! both exceeded their own threshold in the same turn. A rule that fails is
//! logged and dropped; the remaining insights and every per-framework result
//! are unaffected.

use std::collections::BTreeMap;

use crate::analysis::{ConfidencePolicy, CrossFrameworkInsight, FrameworkAnalysisResult};
use crate::error::AggregationError;
use crate::frameworks::FrameworkKind;

use FrameworkKind::{Archetypal, Attachment, CognitiveBehavioral, Narrative, PartsWork};

/// One entry of the rule table.
pub struct InsightRule {
    pub key: &'static str,
    pub frameworks: [FrameworkKind; 2],
    pub description: &'static str,
}

pub static RULES: &[InsightRule] = &[
    InsightRule {
        key: "parts_work+cognitive_behavioral",
        frameworks: [PartsWork, CognitiveBehavioral],
        description: "complex internal/cognitive presentation",
    },
    InsightRule {
        key: "parts_work+archetypal",
        frameworks: [PartsWork, Archetypal],
        description: "inner parts echo a larger archetypal theme",
    },
    InsightRule {
        key: "parts_work+narrative",
        frameworks: [PartsWork, Narrative],
        description: "inner conflict is shaping the life story",
    },
    InsightRule {
        key: "parts_work+attachment",
        frameworks: [PartsWork, Attachment],
        description: "protective parts active around closeness",
    },
    InsightRule {
        key: "cognitive_behavioral+archetypal",
        frameworks: [CognitiveBehavioral, Archetypal],
        description: "distorted thinking tied to a recurring life theme",
    },
    InsightRule {
        key: "cognitive_behavioral+narrative",
        frameworks: [CognitiveBehavioral, Narrative],
        description: "thinking errors feeding a problem-saturated story",
    },
    InsightRule {
        key: "cognitive_behavioral+attachment",
        frameworks: [CognitiveBehavioral, Attachment],
        description: "relational fears amplified by distorted thinking",
    },
    InsightRule {
        key: "archetypal+narrative",
        frameworks: [Archetypal, Narrative],
        description: "mythic themes in how the story is told",
    },
    InsightRule {
        key: "archetypal+attachment",
        frameworks: [Archetypal, Attachment],
        description: "archetypal roles played out in relationships",
    },
    InsightRule {
        key: "narrative+attachment",
        frameworks: [Narrative, Attachment],
        description: "relationship history shaping the self-story",
    },
];

fn score(
    rule: &InsightRule,
    results: &BTreeMap<FrameworkKind, FrameworkAnalysisResult>,
    framework: FrameworkKind,
) -> Result<f32, AggregationError> {
    let result = results.get(&framework).ok_or_else(|| AggregationError {
        rule: rule.key,
        reason: format!("no result for {framework}"),
    })?;
    if !result.confidence_score.is_finite() {
        return Err(AggregationError {
            rule: rule.key,
            reason: format!("{framework} confidence is not finite"),
        });
    }
    Ok(result.confidence_score)
}

fn subtypes(result: Option<&FrameworkAnalysisResult>) -> String {
    let mut kinds: Vec<&str> = result
        .map(|r| r.elements.iter().map(|e| e.kind.as_str()).collect())
        .unwrap_or_default();
    kinds.sort_unstable();
    kinds.dedup();
    kinds.join(", ")
}

/// Apply one rule to this turn's results.
pub fn apply_rule(
    rule: &InsightRule,
    results: &BTreeMap<FrameworkKind, FrameworkAnalysisResult>,
    policy: &dyn ConfidencePolicy,
) -> Result<CrossFrameworkInsight, AggregationError> {
    let [a, b] = rule.frameworks;
    let confidence = policy.insight_confidence(score(rule, results, a)?, score(rule, results, b)?);

    let (left, right) = (subtypes(results.get(&a)), subtypes(results.get(&b)));
    let description = if left.is_empty() || right.is_empty() {
        rule.description.to_string()
    } else {
        format!("{} ({left} / {right})", rule.description)
    };

    Ok(CrossFrameworkInsight {
        rule: rule.key.to_string(),
        frameworks: vec![a, b],
        description,
        confidence,
    })
}

/// Insights for every rule whose two frameworks are both in `above`.
pub fn derive_insights(
    conversation_id: &str,
    results: &BTreeMap<FrameworkKind, FrameworkAnalysisResult>,
    above: &[FrameworkKind],
    policy: &dyn ConfidencePolicy,
) -> Vec<CrossFrameworkInsight> {
    if above.len() < 2 {
        return Vec::new();
    }
    RULES
        .iter()
        .filter(|rule| rule.frameworks.iter().all(|f| above.contains(f)))
        .filter_map(|rule| match apply_rule(rule, results, policy) {
            Ok(insight) => Some(insight),
            Err(e) => {
                tracing::warn!(
                    conversation_id,
                    rule = rule.key,
                    error = %e,
                    "Dropping cross-framework insight"
                );
                None
            }
        })
        .collect()
}
