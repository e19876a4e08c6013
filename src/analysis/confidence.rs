//! Confidence combination rules.
//!
//! How per-element confidences roll up into a framework score, and how
//! framework scores roll up into a turn total, is a policy decision. It lives
//! behind [`ConfidencePolicy`] so it can be swapped without touching the
//! orchestrator.

use crate::frameworks::{TherapeuticElement, clamp_unit};

/// Named, swappable confidence combination.
pub trait ConfidencePolicy: Send + Sync {
    fn name(&self) -> &'static str;

    /// Framework score from its elements. 0.0 for no elements.
    fn framework_confidence(&self, elements: &[TherapeuticElement]) -> f32;

    /// Turn total from the scores of frameworks above threshold.
    fn total_confidence(&self, scores: &[f32]) -> f32;

    /// Confidence of an insight derived from two frameworks.
    fn insight_confidence(&self, a: f32, b: f32) -> f32 {
        clamp_unit(a.min(b))
    }
}

/// Maximum everywhere.
#[derive(Debug, Clone, Copy, Default)]
pub struct MaxConfidencePolicy;

impl ConfidencePolicy for MaxConfidencePolicy {
    fn name(&self) -> &'static str {
        "max"
    }

    fn framework_confidence(&self, elements: &[TherapeuticElement]) -> f32 {
        clamp_unit(elements.iter().map(|e| e.confidence).fold(0.0, f32::max))
    }

    fn total_confidence(&self, scores: &[f32]) -> f32 {
        clamp_unit(scores.iter().copied().fold(0.0, f32::max))
    }
}

/// Pattern-only confidence: `min(hit_count * per_hit, ceiling)`.
pub fn degraded_confidence(hit_count: usize, per_hit: f32, ceiling: f32) -> f32 {
    clamp_unit((hit_count as f32 * per_hit).min(ceiling))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frameworks::FrameworkKind;

    fn element(confidence: f32) -> TherapeuticElement {
        TherapeuticElement::new(FrameworkKind::Attachment, "anxious", "x", 0.5, confidence)
    }

    #[test]
    fn framework_confidence_is_max_of_elements() {
        let policy = MaxConfidencePolicy;
        assert_eq!(policy.framework_confidence(&[]), 0.0);
        assert_eq!(
            policy.framework_confidence(&[element(0.2), element(0.7), element(0.4)]),
            0.7
        );
    }

    #[test]
    fn total_confidence_is_max_of_scores() {
        let policy = MaxConfidencePolicy;
        assert_eq!(policy.total_confidence(&[]), 0.0);
        assert_eq!(policy.total_confidence(&[0.4, 0.9]), 0.9);
    }

    #[test]
    fn insight_confidence_is_the_weaker_side() {
        assert_eq!(MaxConfidencePolicy.insight_confidence(0.8, 0.35), 0.35);
    }

    #[test]
    fn degraded_confidence_is_capped() {
        assert!((degraded_confidence(2, 0.1, 0.5) - 0.2).abs() < 1e-6);
        assert_eq!(degraded_confidence(9, 0.1, 0.5), 0.5);
        assert_eq!(degraded_confidence(0, 0.1, 0.5), 0.0);
    }
}
