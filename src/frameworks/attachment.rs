//! Attachment styles.

use crate::conversation::ConversationMessage;
use crate::frameworks::matcher::PatternMatchResult;
use crate::frameworks::patterns::{Language, PatternSpec};
use crate::frameworks::response::{PromptSpec, render_prompt};
use crate::frameworks::{FrameworkDetector, FrameworkKind, Subtype};

static VOCABULARY: &[Subtype] = &[
    Subtype {
        name: "secure",
        description: "comfortable with both closeness and independence",
    },
    Subtype {
        name: "anxious",
        description: "preoccupied with closeness, fears abandonment, seeks reassurance",
    },
    Subtype {
        name: "avoidant",
        description: "values self-reliance, uneasy with dependence or intimacy",
    },
    Subtype {
        name: "disorganized",
        description: "wants closeness yet experiences it as frightening",
    },
];

static PATTERNS: &[PatternSpec] = &[
    PatternSpec {
        category: "secure",
        language: Language::English,
        keywords: &["we talked it through", "i trust them", "i can ask for help", "we worked it out"],
        regexes: &[],
    },
    PatternSpec {
        category: "anxious",
        language: Language::English,
        keywords: &[
            "leave me",
            "abandon me",
            "don't love me anymore",
            "need reassurance",
            "why haven't they texted",
            "clingy",
        ],
        regexes: &[r"(?i)\bwhat if (?:he|she|they) leaves?\b"],
    },
    PatternSpec {
        category: "avoidant",
        language: Language::English,
        keywords: &["need my space", "don't need anyone", "too close", "keep people at a distance", "rather be alone"],
        regexes: &[],
    },
    PatternSpec {
        category: "disorganized",
        language: Language::English,
        keywords: &["push them away", "want them close but", "scared of the people i love"],
        regexes: &[],
    },
    PatternSpec {
        category: "relationship_cue",
        language: Language::English,
        keywords: &["my partner", "my boyfriend", "my girlfriend", "my husband", "my wife", "my mother", "my father"],
        regexes: &[],
    },
    PatternSpec {
        category: "secure",
        language: Language::Chinese,
        keywords: &["我们好好谈了", "我信任他", "我信任她", "可以寻求帮助"],
        regexes: &[],
    },
    PatternSpec {
        category: "anxious",
        language: Language::Chinese,
        keywords: &["离开我", "抛下我", "不爱我了", "为什么不回消息", "需要安慰"],
        regexes: &[],
    },
    PatternSpec {
        category: "avoidant",
        language: Language::Chinese,
        keywords: &["需要空间", "不需要任何人", "太近了", "宁愿一个人"],
        regexes: &[],
    },
    PatternSpec {
        category: "disorganized",
        language: Language::Chinese,
        keywords: &["把他推开", "把她推开", "又想靠近又害怕"],
        regexes: &[],
    },
    PatternSpec {
        category: "relationship_cue",
        language: Language::Chinese,
        keywords: &["我的伴侣", "男朋友", "女朋友", "我老公", "我老婆", "我妈", "我爸"],
        regexes: &[],
    },
];

const LENS: &str = "You are an attachment-informed analyst. Read the user's recent \
messages and identify how they relate to closeness, dependence and separation \
in their important relationships.";

const RULES: &[&str] = &[
    "Describe the attachment strategy shown in these messages, not a fixed trait.",
    "Report secure only when the user shows both closeness and autonomy.",
];

/// Attachment-style detector.
#[derive(Debug, Clone, Copy, Default)]
pub struct AttachmentDetector;

impl FrameworkDetector for AttachmentDetector {
    fn kind(&self) -> FrameworkKind {
        FrameworkKind::Attachment
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
