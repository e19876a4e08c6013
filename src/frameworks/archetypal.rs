//! Depth-psychology archetypes.

use crate::conversation::ConversationMessage;
use crate::frameworks::matcher::PatternMatchResult;
use crate::frameworks::patterns::{Language, PatternSpec};
use crate::frameworks::response::{PromptSpec, render_prompt};
use crate::frameworks::{FrameworkDetector, FrameworkKind, Subtype};

static VOCABULARY: &[Subtype] = &[
    Subtype {
        name: "hero",
        description: "life framed as a struggle or quest to overcome",
    },
    Subtype {
        name: "shadow",
        description: "disowned, hidden or feared aspects of the self",
    },
    Subtype {
        name: "caregiver",
        description: "identity organized around caring for others",
    },
    Subtype {
        name: "orphan",
        description: "abandonment, betrayal or longing to belong",
    },
    Subtype {
        name: "sage",
        description: "search for truth and understanding",
    },
    Subtype {
        name: "rebel",
        description: "urge to break rules or overturn what is",
    },
    Subtype {
        name: "explorer",
        description: "restlessness and longing for freedom or the new",
    },
    Subtype {
        name: "creator",
        description: "drive to make something new and lasting",
    },
];

static PATTERNS: &[PatternSpec] = &[
    PatternSpec {
        category: "hero",
        language: Language::English,
        keywords: &["fight through", "overcome", "prove myself", "rise above", "battle"],
        regexes: &[],
    },
    PatternSpec {
        category: "shadow",
        language: Language::English,
        keywords: &["dark side", "hidden side", "ugly side", "don't recognize myself", "hate that about myself"],
        regexes: &[],
    },
    PatternSpec {
        category: "caregiver",
        language: Language::English,
        keywords: &["take care of everyone", "everyone needs me", "putting others first", "look after them"],
        regexes: &[],
    },
    PatternSpec {
        category: "orphan",
        language: Language::English,
        keywords: &["abandoned", "left behind", "never belonged", "on my own", "betrayed"],
        regexes: &[],
    },
    PatternSpec {
        category: "sage",
        language: Language::English,
        keywords: &["meaning of it all", "understand why", "search for truth", "want to know why"],
        regexes: &[],
    },
    PatternSpec {
        category: "rebel",
        language: Language::English,
        keywords: &["break the rules", "tear it down", "won't conform", "sick of the rules"],
        regexes: &[],
    },
    PatternSpec {
        category: "explorer",
        language: Language::English,
        keywords: &["break free", "feel trapped", "somewhere new", "wanderlust"],
        regexes: &[],
    },
    PatternSpec {
        category: "creator",
        language: Language::English,
        keywords: &["create something", "build something", "my art", "make something new"],
        regexes: &[],
    },
    PatternSpec {
        category: "archetype_cue",
        language: Language::English,
        keywords: &["recurring dream", "i dreamed", "symbol"],
        regexes: &[r"(?i)\bdreamt? (?:of|about|that)\b"],
    },
    PatternSpec {
        category: "hero",
        language: Language::Chinese,
        keywords: &["战胜", "证明自己", "克服", "拼到底"],
        regexes: &[],
    },
    PatternSpec {
        category: "shadow",
        language: Language::Chinese,
        keywords: &["阴暗面", "黑暗的一面", "不认识自己", "讨厌自己的这一面"],
        regexes: &[],
    },
    PatternSpec {
        category: "caregiver",
        language: Language::Chinese,
        keywords: &["照顾所有人", "大家都需要我", "总是先想着别人"],
        regexes: &[],
    },
    PatternSpec {
        category: "orphan",
        language: Language::Chinese,
        keywords: &["被抛弃", "被背叛", "没有归属", "孤身一人"],
        regexes: &[],
    },
    PatternSpec {
        category: "sage",
        language: Language::Chinese,
        keywords: &["人生的意义", "想弄明白", "追求真相"],
        regexes: &[],
    },
    PatternSpec {
        category: "rebel",
        language: Language::Chinese,
        keywords: &["打破规则", "不想随大流", "反抗"],
        regexes: &[],
    },
    PatternSpec {
        category: "explorer",
        language: Language::Chinese,
        keywords: &["想要自由", "被困住", "去远方"],
        regexes: &[],
    },
    PatternSpec {
        category: "creator",
        language: Language::Chinese,
        keywords: &["创造", "做点新东西", "我的作品"],
        regexes: &[],
    },
    PatternSpec {
        category: "archetype_cue",
        language: Language::Chinese,
        keywords: &["梦见", "反复做梦", "象征"],
        regexes: &[],
    },
];

const LENS: &str = "You are a Jungian analyst. Read the user's recent messages and \
identify archetypal patterns: recurring roles, images and energies that shape \
how the user sees their life.";

const RULES: &[&str] = &[
    "Archetypes describe themes, not personality types; stay tentative.",
    "Dream imagery counts as evidence only when the user relates it to themselves.",
];

/// Archetypal detector.
#[derive(Debug, Clone, Copy, Default)]
pub struct ArchetypalDetector;

impl FrameworkDetector for ArchetypalDetector {
    fn kind(&self) -> FrameworkKind {
        FrameworkKind::Archetypal
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
