//! Stage-1 pattern matcher.
//!
//! Deterministic and side-effect free: the same window scanned against the
//! same compiled library always yields the same [`PatternMatchResult`]. Only
//! user-authored messages are scanned so the assistant's own phrasing never
//! counts as evidence.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::conversation::ConversationMessage;
use crate::frameworks::patterns::{Language, PatternLibrary};

/// Maximum snippets kept per category.
const MAX_SNIPPETS_PER_CATEGORY: usize = 5;

/// CJK share at or above which a window is treated as Chinese only.
const CHINESE_RATIO: f32 = 0.8;

/// CJK share at or below which a window is treated as English only.
const ENGLISH_RATIO: f32 = 0.2;

/// How the scan language is chosen.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LanguageHint {
    /// Detect from the window, trying both subsets when ambiguous.
    #[default]
    Auto,
    English,
    Chinese,
}

impl std::str::FromStr for LanguageHint {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "en" | "english" => Ok(Self::English),
            "zh" | "chinese" => Ok(Self::Chinese),
            other => Err(format!("expected 'auto', 'en' or 'zh', got '{other}'")),
        }
    }
}

/// Stage-1 scan output.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatternMatchResult {
    pub matched: bool,
    /// Category -> evidence snippets, in order of first appearance.
    pub hits: BTreeMap<String, Vec<String>>,
    /// Language subsets that were scanned.
    pub languages: Vec<Language>,
}

impl PatternMatchResult {
    /// Total number of evidence snippets across categories.
    pub fn hit_count(&self) -> usize {
        self.hits.values().map(Vec::len).sum()
    }

    pub fn categories(&self) -> impl Iterator<Item = &str> {
        self.hits.keys().map(String::as_str)
    }
}

/// Choose the language subsets for a window.
pub fn detect_languages(window: &[ConversationMessage], hint: LanguageHint) -> Vec<Language> {
    match hint {
        LanguageHint::English => return vec![Language::English],
        LanguageHint::Chinese => return vec![Language::Chinese],
        LanguageHint::Auto => {}
    }

    let mut cjk = 0usize;
    let mut latin = 0usize;
    for message in window.iter().filter(|m| m.is_user()) {
        for c in message.content.chars() {
            if is_cjk(c) {
                cjk += 1;
            } else if c.is_ascii_alphabetic() {
                latin += 1;
            }
        }
    }

    // One CJK character carries roughly a word; weight latin letters down so
    // a short Chinese phrase is not drowned out by English.
    let latin_weight = latin as f32 / 4.0;
    let total = cjk as f32 + latin_weight;
    if total == 0.0 {
        return Language::ALL.to_vec();
    }
    let ratio = cjk as f32 / total;
    if ratio >= CHINESE_RATIO {
        vec![Language::Chinese]
    } else if ratio <= ENGLISH_RATIO {
        vec![Language::English]
    } else {
        Language::ALL.to_vec()
    }
}

fn is_cjk(c: char) -> bool {
    matches!(c, '\u{4E00}'..='\u{9FFF}' | '\u{3400}'..='\u{4DBF}' | '\u{F900}'..='\u{FAFF}')
}

/// Keyword hits in English must sit on word boundaries ("never" must not
/// fire inside "nevertheless").
fn on_word_boundary(text: &str, start: usize, end: usize) -> bool {
    let before = text[..start].chars().next_back();
    let after = text[end..].chars().next();
    !before.is_some_and(char::is_alphanumeric) && !after.is_some_and(char::is_alphanumeric)
}

fn push_snippet(hits: &mut BTreeMap<String, Vec<String>>, category: &str, snippet: &str) {
    let snippet = snippet.trim();
    if snippet.is_empty() {
        return;
    }
    let entry = hits.entry(category.to_string()).or_default();
    if entry.len() < MAX_SNIPPETS_PER_CATEGORY && !entry.iter().any(|s| s == snippet) {
        entry.push(snippet.to_string());
    }
}

/// Scan a message window against a compiled library.
pub fn scan(
    window: &[ConversationMessage],
    library: &PatternLibrary,
    hint: LanguageHint,
) -> PatternMatchResult {
    let languages = detect_languages(window, hint);
    let mut hits = BTreeMap::new();

    for message in window.iter().filter(|m| m.is_user()) {
        let content = message.content.as_str();
        for language in &languages {
            let Some(set) = library.set(*language) else {
                continue;
            };

            if let Some(matcher) = &set.keyword_matcher {
                for mat in matcher.find_iter(content) {
                    if *language == Language::English
                        && !on_word_boundary(content, mat.start(), mat.end())
                    {
                        continue;
                    }
                    let category = set.keyword_categories[mat.pattern().as_usize()];
                    push_snippet(&mut hits, category, &content[mat.start()..mat.end()]);
                }
            }

            for (regex, category) in set.regexes() {
                for mat in regex.find_iter(content) {
                    push_snippet(&mut hits, category, mat.as_str());
                }
            }
        }
    }

    PatternMatchResult {
        matched: !hits.is_empty(),
        hits,
        languages,
    }
}
