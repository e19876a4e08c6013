//! Bilingual pattern libraries.
//!
//! Each framework declares its cues as static [`PatternSpec`] tables: plain
//! keywords (matched with Aho-Corasick, ASCII case-insensitive) and regexes.
//! A [`PatternLibrary`] is compiled once when a framework is registered; a bad
//! definition surfaces there as [`FrameworkError::PatternCompilation`] and
//! never during scanning.

use std::collections::BTreeMap;

use aho_corasick::{AhoCorasick, MatchKind};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::FrameworkError;
use crate::frameworks::FrameworkKind;

/// Languages with pattern coverage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Language {
    English,
    Chinese,
}

impl Language {
    pub const ALL: [Language; 2] = [Language::English, Language::Chinese];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::English => "en",
            Self::Chinese => "zh",
        }
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One category of cues in one language.
#[derive(Debug, Clone, Copy)]
pub struct PatternSpec {
    /// Category tag reported in hits. Usually a subtype of the framework.
    pub category: &'static str,
    pub language: Language,
    pub keywords: &'static [&'static str],
    pub regexes: &'static [&'static str],
}

struct RegexEntry {
    regex: Regex,
    category: &'static str,
}

/// Compiled matchers for a single language.
pub(crate) struct LanguageSet {
    pub(crate) keyword_matcher: Option<AhoCorasick>,
    /// Category per keyword, indexed by Aho-Corasick pattern id.
    pub(crate) keyword_categories: Vec<&'static str>,
    regexes: Vec<RegexEntry>,
}

impl LanguageSet {
    pub(crate) fn regexes(&self) -> impl Iterator<Item = (&Regex, &'static str)> {
        self.regexes.iter().map(|e| (&e.regex, e.category))
    }
}

/// A framework's compiled pattern library.
pub struct PatternLibrary {
    framework: FrameworkKind,
    sets: BTreeMap<Language, LanguageSet>,
    pattern_count: usize,
}

impl std::fmt::Debug for PatternLibrary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PatternLibrary")
            .field("framework", &self.framework)
            .field("languages", &self.sets.keys().collect::<Vec<_>>())
            .field("pattern_count", &self.pattern_count)
            .finish()
    }
}

impl PatternLibrary {
    /// Compile pattern specs for a framework.
    pub fn compile(framework: FrameworkKind, specs: &[PatternSpec]) -> Result<Self, FrameworkError> {
        let mut sets = BTreeMap::new();
        let mut pattern_count = 0;

        for language in Language::ALL {
            let mut keywords: Vec<&'static str> = Vec::new();
            let mut keyword_categories = Vec::new();
            let mut regexes = Vec::new();

            for spec in specs.iter().filter(|s| s.language == language) {
                if spec.category.trim().is_empty() {
                    return Err(FrameworkError::PatternCompilation {
                        framework,
                        pattern: format!("{:?}", spec.keywords),
                        reason: "empty category".to_string(),
                    });
                }
                for keyword in spec.keywords {
                    // An empty needle would match at every offset.
                    if keyword.trim().is_empty() {
                        return Err(FrameworkError::PatternCompilation {
                            framework,
                            pattern: (*keyword).to_string(),
                            reason: format!("empty keyword in category '{}'", spec.category),
                        });
                    }
                    keywords.push(*keyword);
                    keyword_categories.push(spec.category);
                }
                for pattern in spec.regexes {
                    let regex =
                        Regex::new(pattern).map_err(|e| FrameworkError::PatternCompilation {
                            framework,
                            pattern: (*pattern).to_string(),
                            reason: e.to_string(),
                        })?;
                    regexes.push(RegexEntry {
                        regex,
                        category: spec.category,
                    });
                }
            }

            if keywords.is_empty() && regexes.is_empty() {
                continue;
            }

            let keyword_matcher = if keywords.is_empty() {
                None
            } else {
                Some(
                    AhoCorasick::builder()
                        .ascii_case_insensitive(true)
                        .match_kind(MatchKind::LeftmostLongest)
                        .build(&keywords)
                        .map_err(|e| FrameworkError::PatternCompilation {
                            framework,
                            pattern: format!("{language} keyword set"),
                            reason: e.to_string(),
                        })?,
                )
            };

            pattern_count += keywords.len() + regexes.len();
            sets.insert(
                language,
                LanguageSet {
                    keyword_matcher,
                    keyword_categories,
                    regexes,
                },
            );
        }

        Ok(Self {
            framework,
            sets,
            pattern_count,
        })
    }

    pub fn framework(&self) -> FrameworkKind {
        self.framework
    }

    /// Total number of compiled keywords and regexes.
    pub fn pattern_count(&self) -> usize {
        self.pattern_count
    }

    /// Languages this library has patterns for.
    pub fn languages(&self) -> impl Iterator<Item = Language> + '_ {
        self.sets.keys().copied()
    }

    pub(crate) fn set(&self, language: Language) -> Option<&LanguageSet> {
        self.sets.get(&language)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const GOOD: &[PatternSpec] = &[
        PatternSpec {
            category: "catastrophizing",
            language: Language::English,
            keywords: &["worst case", "disaster"],
            regexes: &[r"(?i)\bthe worst\b"],
        },
        PatternSpec {
            category: "catastrophizing",
            language: Language::Chinese,
            keywords: &["完蛋了"],
            regexes: &[],
        },
    ];

    #[test]
    fn compiles_both_languages() {
        let library = PatternLibrary::compile(FrameworkKind::CognitiveBehavioral, GOOD).unwrap();
        assert_eq!(library.pattern_count(), 4);
        let languages: Vec<_> = library.languages().collect();
        assert_eq!(languages, vec![Language::English, Language::Chinese]);
    }

    #[test]
    fn invalid_regex_is_a_compilation_error() {
        const BAD: &[PatternSpec] = &[PatternSpec {
            category: "broken",
            language: Language::English,
            keywords: &[],
            regexes: &[r"(unclosed"],
        }];
        let err = PatternLibrary::compile(FrameworkKind::Narrative, BAD).unwrap_err();
        match err {
            FrameworkError::PatternCompilation {
                framework, pattern, ..
            } => {
                assert_eq!(framework, FrameworkKind::Narrative);
                assert_eq!(pattern, "(unclosed");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn empty_keyword_is_rejected() {
        const BAD: &[PatternSpec] = &[PatternSpec {
            category: "anxious",
            language: Language::English,
            keywords: &["  "],
            regexes: &[],
        }];
        assert!(matches!(
            PatternLibrary::compile(FrameworkKind::Attachment, BAD),
            Err(FrameworkError::PatternCompilation { .. })
        ));
    }
}
