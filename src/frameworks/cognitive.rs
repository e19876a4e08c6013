//! Cognitive-behavioral distortions.

use crate::conversation::ConversationMessage;
use crate::frameworks::matcher::PatternMatchResult;
use crate::frameworks::patterns::{Language, PatternSpec};
use crate::frameworks::response::{PromptSpec, render_prompt};
use crate::frameworks::{FrameworkDetector, FrameworkKind, Subtype};

static VOCABULARY: &[Subtype] = &[
    Subtype {
        name: "catastrophizing",
        description: "expecting the worst possible outcome",
    },
    Subtype {
        name: "all_or_nothing",
        description: "black-or-white thinking with no middle ground",
    },
    Subtype {
        name: "overgeneralization",
        description: "one event read as a never-ending pattern",
    },
    Subtype {
        name: "mind_reading",
        description: "assuming what others think without evidence",
    },
    Subtype {
        name: "fortune_telling",
        description: "predicting a negative future as fact",
    },
    Subtype {
        name: "should_statements",
        description: "rigid rules about how self or others must behave",
    },
    Subtype {
        name: "labeling",
        description: "global negative labels instead of describing behavior",
    },
    Subtype {
        name: "personalization",
        description: "taking responsibility for events outside one's control",
    },
    Subtype {
        name: "emotional_reasoning",
        description: "treating a feeling as proof of a fact",
    },
    Subtype {
        name: "mental_filter",
        description: "dwelling on a single negative detail",
    },
];

static PATTERNS: &[PatternSpec] = &[
    PatternSpec {
        category: "catastrophizing",
        language: Language::English,
        keywords: &[
            "disaster",
            "nightmare",
            "ruined",
            "end of the world",
            "can't survive",
            "terrible will happen",
        ],
        regexes: &[
            r"(?i)\bthe worst\b",
            r"(?i)\beverything (?:is|will be) (?:over|ruined)\b",
        ],
    },
    PatternSpec {
        category: "all_or_nothing",
        language: Language::English,
        keywords: &["complete failure", "totally useless", "perfect or nothing", "either perfect"],
        regexes: &[r"(?i)\b(?:completely|totally|100%) (?:failed|wrong|useless)\b"],
    },
    PatternSpec {
        category: "overgeneralization",
        language: Language::English,
        keywords: &["always", "never", "every time", "nobody ever", "everyone always"],
        regexes: &[],
    },
    PatternSpec {
        category: "mind_reading",
        language: Language::English,
        keywords: &["they think i", "everyone thinks", "must think i'm", "i know they hate"],
        regexes: &[r"(?i)\b(?:he|she|they) probably thinks?\b"],
    },
    PatternSpec {
        category: "fortune_telling",
        language: Language::English,
        keywords: &["it will never work", "going to fail", "won't ever get better", "what if"],
        regexes: &[r"(?i)\bi(?:'m| am) going to (?:fail|lose|mess up)\b"],
    },
    PatternSpec {
        category: "should_statements",
        language: Language::English,
        keywords: &["i should", "i must", "i ought to", "should have", "shouldn't have"],
        regexes: &[],
    },
    PatternSpec {
        category: "labeling",
        language: Language::English,
        keywords: &["i'm a loser", "i'm an idiot", "i'm stupid", "i'm a failure"],
        regexes: &[],
    },
    PatternSpec {
        category: "personalization",
        language: Language::English,
        keywords: &["my fault", "because of me", "i ruined it", "i'm to blame"],
        regexes: &[],
    },
    PatternSpec {
        category: "emotional_reasoning",
        language: Language::English,
        keywords: &["i feel like a failure", "i feel stupid so", "feels true"],
        regexes: &[r"(?i)\bi feel (?:it|that) (?:so )?it must be\b"],
    },
    PatternSpec {
        category: "mental_filter",
        language: Language::English,
        keywords: &["only thing i remember", "all i can think about", "nothing good"],
        regexes: &[],
    },
    PatternSpec {
        category: "catastrophizing",
        language: Language::Chinese,
        keywords: &["最坏", "完蛋了", "世界末日", "糟透了", "毁了"],
        regexes: &[],
    },
    PatternSpec {
        category: "all_or_nothing",
        language: Language::Chinese,
        keywords: &["彻底失败", "一无是处", "要么完美"],
        regexes: &[],
    },
    PatternSpec {
        category: "overgeneralization",
        language: Language::Chinese,
        keywords: &["总是", "从来不", "每次都", "永远"],
        regexes: &[],
    },
    PatternSpec {
        category: "mind_reading",
        language: Language::Chinese,
        keywords: &["他们肯定觉得", "别人一定认为", "大家都讨厌我"],
        regexes: &[],
    },
    PatternSpec {
        category: "fortune_telling",
        language: Language::Chinese,
        keywords: &["肯定会失败", "不会好起来", "注定"],
        regexes: &[],
    },
    PatternSpec {
        category: "should_statements",
        language: Language::Chinese,
        keywords: &["我应该", "我必须", "本来应该"],
        regexes: &[],
    },
    PatternSpec {
        category: "labeling",
        language: Language::Chinese,
        keywords: &["我是个失败者", "我真笨", "我是废物"],
        regexes: &[],
    },
    PatternSpec {
        category: "personalization",
        language: Language::Chinese,
        keywords: &["都是我的错", "因为我"],
        regexes: &[],
    },
    PatternSpec {
        category: "emotional_reasoning",
        language: Language::Chinese,
        keywords: &["我感觉自己很失败", "感觉就是事实"],
        regexes: &[],
    },
    PatternSpec {
        category: "mental_filter",
        language: Language::Chinese,
        keywords: &["只记得不好的", "没有一件好事"],
        regexes: &[],
    },
];

const LENS: &str = "You are a cognitive-behavioral analyst. Read the user's recent \
messages and identify cognitive distortions: habitual thinking errors that \
amplify distress.";

const RULES: &[&str] = &[
    "Quote the exact words that show the distortion.",
    "Words like 'always' or 'never' count only when they generalize from few events.",
    "Prefer the most specific distortion when several fit.",
];

/// Cognitive-behavioral detector.
#[derive(Debug, Clone, Copy, Default)]
pub struct CognitiveDetector;

impl FrameworkDetector for CognitiveDetector {
    fn kind(&self) -> FrameworkKind {
        FrameworkKind::CognitiveBehavioral
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
        PatternLibrary::compile(FrameworkKind::CognitiveBehavioral, PATTERNS).unwrap()
    }

    #[test]
    fn worst_case_thinking_is_flagged() {
        let window = from_user_texts(&["I always think the worst will happen"]);
        let result = scan(&window, &library(), LanguageHint::Auto);
        assert_eq!(result.hits["catastrophizing"], vec!["the worst"]);
        assert_eq!(result.hits["overgeneralization"], vec!["always"]);
    }

    #[test]
    fn small_talk_is_not_flagged() {
        let window = from_user_texts(&["what's the weather today"]);
        assert!(!scan(&window, &library(), LanguageHint::Auto).matched);
    }

    #[test]
    fn chinese_distortions_are_flagged() {
        let window = from_user_texts(&["我总是把事情想到最坏"]);
        let result = scan(&window, &library(), LanguageHint::Auto);
        assert!(result.hits.contains_key("catastrophizing"));
        assert!(result.hits.contains_key("overgeneralization"));
    }

    #[test]
    fn parses_catastrophizing_element() {
        let parsed = CognitiveDetector
            .parse_result("ELEMENT|catastrophizing|0.8|0.9|I always think the worst will happen")
            .unwrap();
        assert_eq!(parsed.elements.len(), 1);
        assert_eq!(parsed.elements[0].kind, "catastrophizing");
    }
}
