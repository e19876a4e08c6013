//! Prompt rendering and strict result parsing shared by all detectors.
//!
//! The model is asked to answer with one directive per line:
//!
//! ```text
//! ELEMENT|<subtype>|<intensity 0..1>|<confidence 0..1>|<evidence>
//! INVALIDATE|<subtype>|<reason>
//! NONE
//! ```
//!
//! Lines without a directive prefix are ignored so a short preamble does not
//! sink an otherwise valid answer. Anything that *claims* to be a directive
//! must be well formed.

use crate::conversation::ConversationMessage;
use crate::error::ParseError;
use crate::frameworks::matcher::PatternMatchResult;
use crate::frameworks::{FrameworkKind, ParsedAnalysis, Subtype, TherapeuticElement};

/// Maximum characters of a single message quoted into a prompt.
const MAX_QUOTED_MESSAGE_CHARS: usize = 600;

/// Framework-specific parts of a prompt.
pub struct PromptSpec<'a> {
    pub framework: FrameworkKind,
    /// One-paragraph analyst persona and lens.
    pub lens: &'a str,
    pub vocabulary: &'a [Subtype],
    /// Extra framework-specific rules, one per line.
    pub rules: &'a [&'a str],
}

/// Render the stage-2 prompt for a framework.
pub fn render_prompt(
    spec: &PromptSpec<'_>,
    messages: &[ConversationMessage],
    hits: &PatternMatchResult,
) -> String {
    let mut prompt = String::new();
    prompt.push_str(spec.lens.trim());
    prompt.push_str("\n\nSubtypes you may report (use the exact tag):\n");
    for subtype in spec.vocabulary {
        prompt.push_str(&format!("- {}: {}\n", subtype.name, subtype.description));
    }

    if !spec.rules.is_empty() {
        prompt.push_str("\nRules:\n");
        for rule in spec.rules {
            prompt.push_str(&format!("- {rule}\n"));
        }
    }

    prompt.push_str("\nCues flagged by a keyword pre-scan (may be false positives):\n");
    for (category, snippets) in &hits.hits {
        let quoted: Vec<String> = snippets.iter().map(|s| format!("\"{s}\"")).collect();
        prompt.push_str(&format!("- {category}: {}\n", quoted.join(", ")));
    }

    prompt.push_str("\nRecent user messages:\n---\n");
    for message in messages.iter().filter(|m| m.is_user()) {
        prompt.push_str(&format!("[{}] {}\n", message.id, quote(&message.content)));
    }
    prompt.push_str("---\n");

    prompt.push_str(&format!(
        r#"
Answer with one line per finding for the {framework} lens, in this exact format:
ELEMENT|SUBTYPE|INTENSITY|CONFIDENCE|EVIDENCE

INTENSITY and CONFIDENCE are decimals between 0 and 1. EVIDENCE is a short quote
from the user's messages. If an earlier finding no longer holds, add:
INVALIDATE|SUBTYPE|REASON

If nothing applies, output exactly: NONE"#,
        framework = spec.framework.label()
    ));

    prompt
}

fn quote(content: &str) -> String {
    let flattened = content.replace(['\n', '\r'], " ");
    if flattened.chars().count() <= MAX_QUOTED_MESSAGE_CHARS {
        return flattened;
    }
    let truncated: String = flattened.chars().take(MAX_QUOTED_MESSAGE_CHARS).collect();
    format!("{truncated}...")
}

fn parse_score(line: usize, field: &'static str, raw: &str) -> Result<f32, ParseError> {
    let value = raw.trim();
    match value.parse::<f32>() {
        Ok(v) if v.is_finite() && (0.0..=1.0).contains(&v) => Ok(v),
        _ => Err(ParseError::InvalidScore {
            line,
            field,
            value: value.to_string(),
        }),
    }
}

fn resolve_subtype(
    line: usize,
    framework: FrameworkKind,
    vocabulary: &[Subtype],
    raw: &str,
) -> Result<&'static str, ParseError> {
    let wanted = raw.trim().to_lowercase().replace([' ', '-'], "_");
    vocabulary
        .iter()
        .find(|s| s.name == wanted)
        .map(|s| s.name)
        .ok_or_else(|| ParseError::UnknownSubtype {
            line,
            framework,
            subtype: raw.trim().to_string(),
        })
}

/// Parse a directive response against a framework vocabulary.
pub fn parse_directives(
    framework: FrameworkKind,
    vocabulary: &[Subtype],
    raw: &str,
) -> Result<ParsedAnalysis, ParseError> {
    let mut parsed = ParsedAnalysis::default();
    let mut saw_none = false;
    let mut saw_directive = false;

    for (index, line) in raw.lines().enumerate() {
        let line_no = index + 1;
        let line = line.trim().trim_start_matches(['-', '*']).trim();

        if line.eq_ignore_ascii_case("NONE") {
            saw_none = true;
            saw_directive = true;
            continue;
        }

        if let Some(rest) = strip_directive(line, "ELEMENT") {
            saw_directive = true;
            let fields: Vec<&str> = rest.splitn(4, '|').collect();
            if fields.len() != 4 {
                return Err(ParseError::FieldCount {
                    line: line_no,
                    expected: 5,
                    found: fields.len() + 1,
                });
            }
            let kind = resolve_subtype(line_no, framework, vocabulary, fields[0])?;
            let intensity = parse_score(line_no, "intensity", fields[1])?;
            let confidence = parse_score(line_no, "confidence", fields[2])?;
            let evidence = fields[3].trim().trim_matches('"').trim();
            if evidence.is_empty() {
                return Err(ParseError::EmptyEvidence { line: line_no });
            }
            parsed.elements.push(TherapeuticElement::new(
                framework, kind, evidence, intensity, confidence,
            ));
            continue;
        }

        if let Some(rest) = strip_directive(line, "INVALIDATE") {
            saw_directive = true;
            let fields: Vec<&str> = rest.splitn(2, '|').collect();
            // A blank reason counts as a missing field.
            if fields.get(1).is_none_or(|reason| reason.trim().is_empty()) {
                return Err(ParseError::FieldCount {
                    line: line_no,
                    expected: 3,
                    found: 2,
                });
            }
            let kind = resolve_subtype(line_no, framework, vocabulary, fields[0])?;
            if !parsed.invalidated.iter().any(|k| k == kind) {
                parsed.invalidated.push(kind.to_string());
            }
        }
    }

    if !saw_directive {
        return Err(ParseError::NoDirectives);
    }
    if saw_none && !parsed.elements.is_empty() {
        return Err(ParseError::ConflictingDirectives);
    }
    Ok(parsed)
}

/// `ELEMENT|rest` -> `rest`, case-insensitive on the directive name.
fn strip_directive<'a>(line: &'a str, directive: &str) -> Option<&'a str> {
    let (head, rest) = line.split_once('|')?;
    head.trim().eq_ignore_ascii_case(directive).then_some(rest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversation::from_user_texts;
    use std::collections::BTreeMap;

    const VOCAB: &[Subtype] = &[
        Subtype {
            name: "secure",
            description: "comfortable with closeness",
        },
        Subtype {
            name: "anxious",
            description: "fears abandonment",
        },
    ];

    fn parse(raw: &str) -> Result<ParsedAnalysis, ParseError> {
        parse_directives(FrameworkKind::Attachment, VOCAB, raw)
    }

    #[test]
    fn parses_elements_and_ignores_preamble() {
        let raw = "Here is my analysis:\nELEMENT|anxious|0.7|0.8|\"what if they leave me\"\n";
        let parsed = parse(raw).unwrap();
        assert_eq!(parsed.elements.len(), 1);
        let element = &parsed.elements[0];
        assert_eq!(element.kind, "anxious");
        assert_eq!(element.framework, FrameworkKind::Attachment);
        assert_eq!(element.evidence, "what if they leave me");
        assert!((element.intensity - 0.7).abs() < f32::EPSILON);
        assert!((element.confidence - 0.8).abs() < f32::EPSILON);
    }

    #[test]
    fn none_yields_empty_analysis() {
        let parsed = parse("NONE").unwrap();
        assert!(parsed.elements.is_empty());
        assert!(parsed.invalidated.is_empty());
    }

    #[test]
    fn subtype_tags_are_normalized() {
        let parsed = parse("ELEMENT| Anxious |0.5|0.5|clingy").unwrap();
        assert_eq!(parsed.elements[0].kind, "anxious");
    }

    #[test]
    fn invalidations_are_collected_once() {
        let raw = "INVALIDATE|secure|new evidence\nINVALIDATE|secure|again\nNONE";
        let parsed = parse(raw).unwrap();
        assert_eq!(parsed.invalidated, vec!["secure".to_string()]);
    }

    #[test]
    fn evidence_may_contain_pipes() {
        let parsed = parse("ELEMENT|secure|0.4|0.6|we talk | we repair").unwrap();
        assert_eq!(parsed.elements[0].evidence, "we talk | we repair");
    }

    #[test]
    fn prose_only_is_rejected() {
        assert_eq!(
            parse("The user seems fine.").unwrap_err(),
            ParseError::NoDirectives
        );
        assert_eq!(parse("").unwrap_err(), ParseError::NoDirectives);
    }

    #[test]
    fn unknown_subtype_is_rejected() {
        let err = parse("ELEMENT|fearful|0.5|0.5|x").unwrap_err();
        assert!(matches!(err, ParseError::UnknownSubtype { line: 1, .. }));
    }

    #[test]
    fn out_of_range_scores_are_rejected() {
        assert!(matches!(
            parse("ELEMENT|anxious|1.5|0.5|x").unwrap_err(),
            ParseError::InvalidScore {
                field: "intensity",
                ..
            }
        ));
        assert!(matches!(
            parse("ELEMENT|anxious|0.5|high|x").unwrap_err(),
            ParseError::InvalidScore {
                field: "confidence",
                ..
            }
        ));
    }

    #[test]
    fn truncated_element_is_rejected() {
        assert!(matches!(
            parse("ELEMENT|anxious|0.5").unwrap_err(),
            ParseError::FieldCount { found: 3, .. }
        ));
    }

    #[test]
    fn invalidation_without_reason_is_rejected() {
        assert_eq!(
            parse("NONE\nINVALIDATE|secure").unwrap_err(),
            ParseError::FieldCount {
                line: 2,
                expected: 3,
                found: 2,
            }
        );
        assert!(matches!(
            parse("INVALIDATE|secure|   ").unwrap_err(),
            ParseError::FieldCount { line: 1, .. }
        ));
    }

    #[test]
    fn none_with_elements_conflicts() {
        assert_eq!(
            parse("NONE\nELEMENT|anxious|0.5|0.5|x").unwrap_err(),
            ParseError::ConflictingDirectives
        );
    }

    #[test]
    fn prompt_carries_vocabulary_hits_and_messages() {
        let spec = PromptSpec {
            framework: FrameworkKind::Attachment,
            lens: "You are an attachment-informed analyst.",
            vocabulary: VOCAB,
            rules: &["Do not diagnose."],
        };
        let mut hits = BTreeMap::new();
        hits.insert("anxious".to_string(), vec!["leave me".to_string()]);
        let scan = PatternMatchResult {
            matched: true,
            hits,
            languages: vec![],
        };
        let messages = from_user_texts(&["I worry they will leave me"]);
        let prompt = render_prompt(&spec, &messages, &scan);

        assert!(prompt.starts_with("You are an attachment-informed analyst."));
        assert!(prompt.contains("- anxious: fears abandonment"));
        assert!(prompt.contains("- Do not diagnose."));
        assert!(prompt.contains("- anxious: \"leave me\""));
        assert!(prompt.contains("[m1] I worry they will leave me"));
        assert!(prompt.contains("ELEMENT|SUBTYPE|INTENSITY|CONFIDENCE|EVIDENCE"));
    }

    #[test]
    fn long_messages_are_truncated_in_prompts() {
        let long = "x".repeat(MAX_QUOTED_MESSAGE_CHARS + 50);
        let quoted = quote(&long);
        assert!(quoted.ends_with("..."));
        assert_eq!(quoted.chars().count(), MAX_QUOTED_MESSAGE_CHARS + 3);
    }
}
