//! The five therapeutic frameworks.
//!
//! Frameworks are a closed set ([`FrameworkKind`]). Each one implements
//! [`FrameworkDetector`]: a bilingual pattern table for the stage-1 scan, a
//! prompt builder and a strict parser for the stage-2 answer. The orchestrator
//! only ever talks to the trait and treats subtype tags as opaque strings.

pub mod archetypal;
pub mod attachment;
pub mod cognitive;
pub mod matcher;
pub mod narrative;
pub mod parts_work;
pub mod patterns;
pub mod response;

pub use matcher::{LanguageHint, PatternMatchResult, detect_languages, scan};
pub use patterns::{Language, PatternLibrary, PatternSpec};

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::conversation::ConversationMessage;
use crate::error::{ConfigError, FrameworkError, ParseError};

/// Supported therapeutic lenses.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum FrameworkKind {
    /// Family-systems "parts" work. The original single-framework output.
    PartsWork,
    CognitiveBehavioral,
    Archetypal,
    Narrative,
    Attachment,
}

impl FrameworkKind {
    pub const ALL: [FrameworkKind; 5] = [
        FrameworkKind::PartsWork,
        FrameworkKind::CognitiveBehavioral,
        FrameworkKind::Archetypal,
        FrameworkKind::Narrative,
        FrameworkKind::Attachment,
    ];

    /// Stable identifier used in configuration and serialized output.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PartsWork => "parts_work",
            Self::CognitiveBehavioral => "cognitive_behavioral",
            Self::Archetypal => "archetypal",
            Self::Narrative => "narrative",
            Self::Attachment => "attachment",
        }
    }

    /// Human-readable name used in prompts and guidance text.
    pub fn label(&self) -> &'static str {
        match self {
            Self::PartsWork => "internal family systems (parts work)",
            Self::CognitiveBehavioral => "cognitive-behavioral",
            Self::Archetypal => "archetypal (depth psychology)",
            Self::Narrative => "narrative therapy",
            Self::Attachment => "attachment theory",
        }
    }
}

impl std::fmt::Display for FrameworkKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for FrameworkKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "parts_work" | "ifs" => Ok(Self::PartsWork),
            "cognitive_behavioral" | "cbt" => Ok(Self::CognitiveBehavioral),
            "archetypal" | "jungian" => Ok(Self::Archetypal),
            "narrative" => Ok(Self::Narrative),
            "attachment" => Ok(Self::Attachment),
            _ => Err(ConfigError::UnknownFramework(s.to_string())),
        }
    }
}

/// One entry of a framework's subtype vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Subtype {
    pub name: &'static str,
    pub description: &'static str,
}

/// One detected concept instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TherapeuticElement {
    pub framework: FrameworkKind,
    /// Subtype tag, e.g. `catastrophizing` or `anxious`.
    pub kind: String,
    pub evidence: String,
    pub intensity: f32,
    pub confidence: f32,
}

impl TherapeuticElement {
    /// Create an element. Scores are clamped into [0, 1].
    pub fn new(
        framework: FrameworkKind,
        kind: impl Into<String>,
        evidence: impl Into<String>,
        intensity: f32,
        confidence: f32,
    ) -> Self {
        Self {
            framework,
            kind: kind.into(),
            evidence: evidence.into(),
            intensity: clamp_unit(intensity),
            confidence: clamp_unit(confidence),
        }
    }
}

/// Clamp into [0, 1], mapping NaN to 0.
pub fn clamp_unit(value: f32) -> f32 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

/// Typed output of [`FrameworkDetector::parse_result`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedAnalysis {
    pub elements: Vec<TherapeuticElement>,
    /// Subtypes the model explicitly withdrew.
    pub invalidated: Vec<String>,
}

/// Capability shared by the five framework variants.
pub trait FrameworkDetector: Send + Sync {
    fn kind(&self) -> FrameworkKind;

    /// Subtype vocabulary accepted by the parser.
    fn vocabulary(&self) -> &'static [Subtype];

    /// Bilingual pattern definitions consumed by the matcher.
    fn get_patterns(&self) -> &'static [PatternSpec];

    /// Build the stage-2 prompt from the window and stage-1 hits.
    fn build_prompt(&self, messages: &[ConversationMessage], hits: &PatternMatchResult) -> String;

    /// Strictly parse a stage-2 answer.
    fn parse_result(&self, raw: &str) -> Result<ParsedAnalysis, ParseError> {
        response::parse_directives(self.kind(), self.vocabulary(), raw)
    }
}

/// Static kind -> implementation map.
pub fn detector_for(kind: FrameworkKind) -> Arc<dyn FrameworkDetector> {
    match kind {
        FrameworkKind::PartsWork => Arc::new(parts_work::PartsWorkDetector),
        FrameworkKind::CognitiveBehavioral => Arc::new(cognitive::CognitiveDetector),
        FrameworkKind::Archetypal => Arc::new(archetypal::ArchetypalDetector),
        FrameworkKind::Narrative => Arc::new(narrative::NarrativeDetector),
        FrameworkKind::Attachment => Arc::new(attachment::AttachmentDetector),
    }
}

/// All built-in detectors in canonical order.
pub fn all_detectors() -> Vec<Arc<dyn FrameworkDetector>> {
    FrameworkKind::ALL.into_iter().map(detector_for).collect()
}

/// A registered framework: its detector plus the compiled pattern library.
#[derive(Clone)]
pub struct FrameworkDefinition {
    detector: Arc<dyn FrameworkDetector>,
    library: Arc<PatternLibrary>,
}

impl std::fmt::Debug for FrameworkDefinition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameworkDefinition")
            .field("kind", &self.detector.kind())
            .field("library", &self.library)
            .finish()
    }
}

impl FrameworkDefinition {
    /// Compile the detector's patterns.
    pub fn compile(detector: Arc<dyn FrameworkDetector>) -> Result<Self, FrameworkError> {
        let library = PatternLibrary::compile(detector.kind(), detector.get_patterns())?;
        Ok(Self {
            detector,
            library: Arc::new(library),
        })
    }

    pub fn kind(&self) -> FrameworkKind {
        self.detector.kind()
    }

    pub fn detector(&self) -> &Arc<dyn FrameworkDetector> {
        &self.detector
    }

    pub fn library(&self) -> &PatternLibrary {
        &self.library
    }
}

/// Fallback evidence text used when stage 2 is unavailable.
///
/// Deterministic and free of any model output, so degraded results stay
/// reproducible.
pub fn fallback_text(framework: FrameworkKind, element_kind: &str) -> &'static str {
    match (framework, element_kind) {
        (FrameworkKind::PartsWork, "manager") => {
            "Language suggests a protective, planning part trying to keep things under control."
        }
        (FrameworkKind::PartsWork, "firefighter") => {
            "Language suggests a reactive part that steps in to numb or distract from pain."
        }
        (FrameworkKind::PartsWork, "exile") => {
            "Language suggests a young, hurt part carrying old pain."
        }
        (FrameworkKind::PartsWork, "self_energy") => {
            "Language shows curiosity and calm toward inner experience."
        }
        (FrameworkKind::PartsWork, _) => "The user describes different inner parts reacting.",

        (FrameworkKind::CognitiveBehavioral, "catastrophizing") => {
            "Thinking jumps to the worst possible outcome."
        }
        (FrameworkKind::CognitiveBehavioral, "all_or_nothing") => {
            "Situations are framed in absolute, black-or-white terms."
        }
        (FrameworkKind::CognitiveBehavioral, "overgeneralization") => {
            "A single event is treated as a never-ending pattern."
        }
        (FrameworkKind::CognitiveBehavioral, "mind_reading") => {
            "Assumptions are made about what others are thinking."
        }
        (FrameworkKind::CognitiveBehavioral, "should_statements") => {
            "Rigid rules about how things should be drive the distress."
        }
        (FrameworkKind::CognitiveBehavioral, "labeling") => {
            "A global negative label is attached to the self or others."
        }
        (FrameworkKind::CognitiveBehavioral, _) => {
            "Wording matches a common cognitive distortion pattern."
        }

        (FrameworkKind::Archetypal, "shadow") => {
            "Disowned or hidden aspects of the self are coming up."
        }
        (FrameworkKind::Archetypal, "hero") => "The user frames life as a struggle to overcome.",
        (FrameworkKind::Archetypal, "caregiver") => {
            "The user identifies strongly with caring for others."
        }
        (FrameworkKind::Archetypal, _) => "Imagery echoes a recurring archetypal theme.",

        (FrameworkKind::Narrative, "problem_saturated") => {
            "The story is dominated by the problem."
        }
        (FrameworkKind::Narrative, "unique_outcome") => {
            "An exception to the problem story is mentioned."
        }
        (FrameworkKind::Narrative, "externalization") => {
            "The problem is being spoken of as separate from the person."
        }
        (FrameworkKind::Narrative, _) => "The user is describing the story they live by.",

        (FrameworkKind::Attachment, "anxious") => {
            "Worry about closeness and being left shows up."
        }
        (FrameworkKind::Attachment, "avoidant") => {
            "A pull toward distance and self-reliance shows up."
        }
        (FrameworkKind::Attachment, "disorganized") => {
            "Closeness feels both wanted and frightening."
        }
        (FrameworkKind::Attachment, "secure") => "Closeness and independence feel balanced.",
        (FrameworkKind::Attachment, _) => "Relationship language touches on attachment themes.",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_round_trip_through_strings() {
        for kind in FrameworkKind::ALL {
            assert_eq!(kind.as_str().parse::<FrameworkKind>().unwrap(), kind);
        }
        assert_eq!("CBT".parse::<FrameworkKind>().unwrap(), FrameworkKind::CognitiveBehavioral);
        assert!("gestalt".parse::<FrameworkKind>().is_err());
    }

    #[test]
    fn kind_serializes_as_snake_case() {
        let json = serde_json::to_string(&FrameworkKind::CognitiveBehavioral).unwrap();
        assert_eq!(json, "\"cognitive_behavioral\"");
    }

    #[test]
    fn every_builtin_detector_compiles() {
        for detector in all_detectors() {
            let kind = detector.kind();
            let definition = FrameworkDefinition::compile(detector).unwrap();
            assert_eq!(definition.kind(), kind);
            assert!(definition.library().pattern_count() > 0);
            let languages: Vec<_> = definition.library().languages().collect();
            assert_eq!(languages, Language::ALL.to_vec(), "{kind} lacks a language");
        }
    }

    #[test]
    fn detector_map_is_consistent() {
        for kind in FrameworkKind::ALL {
            assert_eq!(detector_for(kind).kind(), kind);
        }
    }

    #[test]
    fn pattern_categories_are_vocabulary_or_cues() {
        for detector in all_detectors() {
            for spec in detector.get_patterns() {
                let known = detector.vocabulary().iter().any(|s| s.name == spec.category);
                assert!(
                    known || spec.category.ends_with("_cue"),
                    "{}: category {} is neither a subtype nor a cue",
                    detector.kind(),
                    spec.category
                );
            }
        }
    }

    #[test]
    fn element_scores_are_clamped() {
        let element =
            TherapeuticElement::new(FrameworkKind::Narrative, "unique_outcome", "x", 1.7, f32::NAN);
        assert_eq!(element.intensity, 1.0);
        assert_eq!(element.confidence, 0.0);
    }

    #[test]
    fn fallback_text_is_deterministic_and_total() {
        for kind in FrameworkKind::ALL {
            assert!(!fallback_text(kind, "anything").is_empty());
            assert_eq!(fallback_text(kind, "x"), fallback_text(kind, "x"));
        }
        assert!(fallback_text(FrameworkKind::CognitiveBehavioral, "catastrophizing").contains("worst"));
    }
}
