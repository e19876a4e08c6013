//! Narrative therapy: problem stories and their re-authoring.

use crate::conversation::ConversationMessage;
use crate::frameworks::matcher::PatternMatchResult;
use crate::frameworks::patterns::{Language, PatternSpec};
use crate::frameworks::response::{PromptSpec, render_prompt};
use crate::frameworks::{FrameworkDetector, FrameworkKind, Subtype};

static VOCABULARY: &[Subtype] = &[
    Subtype {
        name: "problem_saturated",
        description: "the problem dominates the user's story and identity",
    },
    Subtype {
        name: "externalization",
        description: "the problem is named as something separate from the person",
    },
    Subtype {
        name: "unique_outcome",
        description: "an exception where the problem did not win",
    },
    Subtype {
        name: "re_authoring",
        description: "the user retells events in a new, preferred way",
    },
    Subtype {
        name: "preferred_identity",
        description: "values and hopes about who the user wants to be",
    },
];

static PATTERNS: &[PatternSpec] = &[
    PatternSpec {
        category: "problem_saturated",
        language: Language::English,
        keywords: &["that's just who i am", "my whole life", "i'm just a", "story of my life", "i'm broken"],
        regexes: &[],
    },
    PatternSpec {
        category: "externalization",
        language: Language::English,
        keywords: &["the anxiety tells me", "the depression", "it takes over", "when it shows up"],
        regexes: &[r"(?i)\bthe (?:anxiety|depression|anger|fear) (?:makes|tells|wants) me\b"],
    },
    PatternSpec {
        category: "unique_outcome",
        language: Language::English,
        keywords: &["for once", "this time i didn't", "surprisingly", "except when", "first time i"],
        regexes: &[],
    },
    PatternSpec {
        category: "re_authoring",
        language: Language::English,
        keywords: &["looking back now", "see it differently", "a different way to tell", "new chapter"],
        regexes: &[],
    },
    PatternSpec {
        category: "preferred_identity",
        language: Language::English,
        keywords: &["the person i want to be", "who i really am", "what matters to me", "i value"],
        regexes: &[],
    },
    PatternSpec {
        category: "narrative_cue",
        language: Language::English,
        keywords: &["my story", "chapter of my life"],
        regexes: &[],
    },
    PatternSpec {
        category: "problem_saturated",
        language: Language::Chinese,
        keywords: &["我就是这样的人", "我这辈子", "我就是个", "我已经坏掉了"],
        regexes: &[],
    },
    PatternSpec {
        category: "externalization",
        language: Language::Chinese,
        keywords: &["焦虑告诉我", "抑郁让我", "它又来了"],
        regexes: &[],
    },
    PatternSpec {
        category: "unique_outcome",
        language: Language::Chinese,
        keywords: &["这一次我没有", "难得一次", "例外的是"],
        regexes: &[],
    },
    PatternSpec {
        category: "re_authoring",
        language: Language::Chinese,
        keywords: &["现在回头看", "换个角度看", "新的篇章"],
        regexes: &[],
    },
    PatternSpec {
        category: "preferred_identity",
        language: Language::Chinese,
        keywords: &["我想成为", "真正的我", "对我重要的是"],
        regexes: &[],
    },
    PatternSpec {
        category: "narrative_cue",
        language: Language::Chinese,
        keywords: &["我的故事", "人生的一章"],
        regexes: &[],
    },
];

const LENS: &str = "You are a narrative therapist. Read the user's recent messages \
and notice how they story their life: where the problem has taken over, where it \
is named as separate from them, and where exceptions or preferred identities \
appear.";

const RULES: &[&str] = &[
    "Treat the person as separate from the problem.",
    "Unique outcomes may be small; report them when the user's words show one.",
];

/// Narrative-therapy detector.
#[derive(Debug, Clone, Copy, Default)]
pub struct NarrativeDetector;

impl FrameworkDetector for NarrativeDetector {
    fn kind(&self) -> FrameworkKind {
        FrameworkKind::Narrative
    }

    fn vocabulary(&self) -> &'static [Subtype] {
        VOCABULARY
    }

    fn get_patterns(&self) -> &'static [PatternSpec] {
        PATTERNS
    }

    fn build_prompt(&self, messages: &[ConversationMessage], hits: &PatternMatchResult) -> String {
        render_prompt(
            &PromptSpec {
                framework: self.kind(),
                lens: LENS,
                vocabulary: VOCABULARY,
                rules: RULES,
            },
            messages,
            hits,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversation::from_user_texts;
    use crate::frameworks::matcher::{LanguageHint, scan};
    use crate::frameworks::patterns::PatternLibrary;

    fn library() -> PatternLibrary {
        PatternLibrary::compile(FrameworkKind::Narrative, PATTERNS).unwrap()
    }

    #[test]
    fn externalized_problem_is_flagged() {
        let window = from_user_texts(&["The anxiety tells me I can't go out"]);
        let result = scan(&window, &library(), LanguageHint::Auto);
        assert!(result.hits.contains_key("externalization"));
    }

    #[test]
    fn unique_outcome_is_flagged() {
        let window = from_user_texts(&["For once I spoke up in the meeting"]);
        let result = scan(&window, &library(), LanguageHint::Auto);
        assert_eq!(result.hits["unique_outcome"], vec!["For once"]);
    }

    #[test]
    fn invalidation_of_known_subtype_parses() {
        let parsed = NarrativeDetector
            .parse_result("INVALIDATE|problem_saturated|user now tells a different story")
            .unwrap();
        assert_eq!(parsed.invalidated, vec!["problem_saturated".to_string()]);
        assert!(parsed.elements.is_empty());
    }
}
