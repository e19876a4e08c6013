//! Family-systems "parts" work.
//!
//! This is the lens the engine originally shipped with; its result shape is
//! also exposed as the flattened legacy projection on every turn.

use crate::conversation::ConversationMessage;
use crate::frameworks::matcher::PatternMatchResult;
use crate::frameworks::patterns::{Language, PatternSpec};
use crate::frameworks::response::{PromptSpec, render_prompt};
use crate::frameworks::{FrameworkDetector, FrameworkKind, Subtype};

static VOCABULARY: &[Subtype] = &[
    Subtype {
        name: "manager",
        description: "proactive protector that plans, controls, criticizes or people-pleases to prevent pain",
    },
    Subtype {
        name: "firefighter",
        description: "reactive protector that numbs, distracts or acts out once pain breaks through",
    },
    Subtype {
        name: "exile",
        description: "young, vulnerable part carrying shame, fear or loneliness",
    },
    Subtype {
        name: "self_energy",
        description: "calm, curious, compassionate stance toward one's own parts",
    },
];

static PATTERNS: &[PatternSpec] = &[
    PatternSpec {
        category: "parts_cue",
        language: Language::English,
        keywords: &[
            "part of me",
            "a side of me",
            "another part",
            "one part",
            "inner critic",
            "inner child",
            "torn between",
        ],
        regexes: &[r"(?i)\b(?:some|other) part of me\b"],
    },
    PatternSpec {
        category: "manager",
        language: Language::English,
        keywords: &[
            "have to be perfect",
            "keep everything under control",
            "need to be in control",
            "keep it together",
            "can't let anyone down",
            "overthink",
        ],
        regexes: &[r"(?i)\bi (?:always|constantly) (?:plan|prepare|check)\b"],
    },
    PatternSpec {
        category: "firefighter",
        language: Language::English,
        keywords: &[
            "binge",
            "numb out",
            "zone out",
            "blow up",
            "lash out",
            "just want to escape",
            "drink to forget",
        ],
        regexes: &[],
    },
    PatternSpec {
        category: "exile",
        language: Language::English,
        keywords: &[
            "like a little kid",
            "when i was a child",
            "so ashamed",
            "unlovable",
            "worthless",
            "all alone",
        ],
        regexes: &[],
    },
    PatternSpec {
        category: "self_energy",
        language: Language::English,
        keywords: &["curious about", "compassion for", "i can hold", "make space for"],
        regexes: &[],
    },
    PatternSpec {
        category: "parts_cue",
        language: Language::Chinese,
        keywords: &["一部分的我", "有一部分", "另一个我", "内心的批评者", "内在小孩", "心里有个声音"],
        regexes: &[r"一方面.{0,20}另一方面"],
    },
    PatternSpec {
        category: "manager",
        language: Language::Chinese,
        keywords: &["必须完美", "一切都要控制", "不能让别人失望", "想太多"],
        regexes: &[],
    },
    PatternSpec {
        category: "firefighter",
        language: Language::Chinese,
        keywords: &["暴饮暴食", "麻痹自己", "发脾气", "只想逃避", "借酒消愁"],
        regexes: &[],
    },
    PatternSpec {
        category: "exile",
        language: Language::Chinese,
        keywords: &["小时候", "好羞耻", "没人爱我", "一文不值", "孤零零"],
        regexes: &[],
    },
    PatternSpec {
        category: "self_energy",
        language: Language::Chinese,
        keywords: &["好奇地看", "对自己温柔", "接纳这部分"],
        regexes: &[],
    },
];

const LENS: &str = "You are an analyst trained in Internal Family Systems. Read the \
user's recent messages and identify which parts are active: protective managers, \
reactive firefighters, vulnerable exiles, or moments of Self energy.";

const RULES: &[&str] = &[
    "Report a part only when the user's own words show it.",
    "Language like 'part of me' signals multiplicity; classify what that part does.",
    "Do not diagnose or give advice.",
];

/// Parts-work detector.
#[derive(Debug, Clone, Copy, Default)]
pub struct PartsWorkDetector;

impl FrameworkDetector for PartsWorkDetector {
    fn kind(&self) -> FrameworkKind {
        FrameworkKind::PartsWork
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
