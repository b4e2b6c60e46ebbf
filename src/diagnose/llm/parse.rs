//! Reply parsing
//!
//! Strict JSON first, then labeled-field extraction from free text. A reply
//! only counts as unusable when no root cause can be recovered at all.

use crate::diagnose::{Diagnosis, DiagnosisSource};
use crate::error::{DiagnoseError, Result};
use crate::util::truncate;
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;
use std::sync::OnceLock;

/// Confidence assumed when free text carries none (percent)
const DEFAULT_CONFIDENCE_PERCENT: f64 = 80.0;
pub const UNKNOWN_CODE_POSITION: &str = "unknown";
pub const SEE_DETAILED_ANALYSIS: &str = "see detailed analysis";

/// Strip markdown code fences from a response
fn strip_markdown_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let clean = if trimmed.starts_with("```json") {
        trimmed.strip_prefix("```json").unwrap_or(trimmed)
    } else if trimmed.starts_with("```") {
        trimmed.strip_prefix("```").unwrap_or(trimmed)
    } else {
        trimmed
    };
    let clean = if clean.ends_with("```") {
        clean.strip_suffix("```").unwrap_or(clean)
    } else {
        clean
    };
    clean.trim()
}

/// Extract a JSON fragment between matching delimiters
fn extract_json_fragment(text: &str, open: char, close: char) -> Option<&str> {
    let start = text.find(open)?;
    let end = text.rfind(close)?;
    if start <= end {
        Some(&text[start..=end])
    } else {
        None
    }
}

/// Try to fix common JSON issues from LLM responses
fn fix_json_issues(json: &str) -> String {
    let mut fixed = json.to_string();

    // Remove trailing commas before ] or }
    fixed = fixed.replace(",]", "]");
    fixed = fixed.replace(",}", "}");

    // Smart quotes to regular quotes
    fixed = fixed.replace(['\u{201C}', '\u{201D}'], "\"");
    fixed = fixed.replace(['\u{2018}', '\u{2019}'], "'");

    fixed
        .chars()
        .filter(|c| !c.is_control() || *c == '\n' || *c == '\t')
        .collect()
}

/// Scale a reported confidence into `[0, 1]`; anything above 1 is a percentage
pub fn normalize_confidence(value: f64, percent: bool) -> f64 {
    let scaled = if percent || value > 1.0 { value / 100.0 } else { value };
    if scaled.is_nan() {
        return DEFAULT_CONFIDENCE_PERCENT / 100.0;
    }
    scaled.clamp(0.0, 1.0)
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ConfidenceJson {
    Number(f64),
    Text(String),
}

impl ConfidenceJson {
    fn to_fraction(&self) -> Option<f64> {
        match self {
            ConfidenceJson::Number(n) => Some(normalize_confidence(*n, false)),
            ConfidenceJson::Text(s) => {
                let trimmed = s.trim();
                let percent = trimmed.ends_with('%');
                let value = trimmed.trim_end_matches('%').trim().parse::<f64>().ok()?;
                Some(normalize_confidence(value, percent))
            }
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum SuggestionJson {
    Text(String),
    Steps(Vec<String>),
}

impl SuggestionJson {
    fn into_text(self) -> String {
        match self {
            SuggestionJson::Text(s) => s,
            SuggestionJson::Steps(steps) => steps.join("; "),
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct DiagnosisJson {
    #[serde(alias = "root_cause")]
    root_cause: String,
    confidence: ConfidenceJson,
    #[serde(alias = "code_position")]
    code_position: String,
    #[serde(alias = "fix_suggestion")]
    fix_suggestion: SuggestionJson,
}

/// Parse a model reply into a diagnosis
pub fn parse_diagnosis(reply: &str) -> Result<Diagnosis> {
    if let Some(diagnosis) = parse_strict(reply) {
        return Ok(diagnosis);
    }
    if let Some(diagnosis) = parse_json_fields(reply) {
        return Ok(diagnosis);
    }
    extract_from_text(reply).ok_or_else(|| {
        DiagnoseError::AnalyzerUnavailable(format!(
            "reply has no recognizable root cause: {}",
            truncate(reply.trim(), 200)
        ))
    })
}

fn parse_strict(reply: &str) -> Option<Diagnosis> {
    let clean = strip_markdown_fences(reply);
    let json_str = extract_json_fragment(clean, '{', '}')?;
    let parsed = serde_json::from_str::<DiagnosisJson>(json_str)
        .or_else(|_| serde_json::from_str::<DiagnosisJson>(&fix_json_issues(json_str)))
        .ok()?;

    let root_cause = parsed.root_cause.trim().to_string();
    if root_cause.is_empty() {
        return None;
    }
    let confidence = parsed.confidence.to_fraction()?;
    Some(Diagnosis::new(
        DiagnosisSource::Llm,
        root_cause,
        confidence,
        parsed.code_position.trim(),
        parsed.fix_suggestion.into_text().trim(),
    ))
}

/// JSON object whose fields are individually missing or mistyped
fn parse_json_fields(reply: &str) -> Option<Diagnosis> {
    let clean = strip_markdown_fences(reply);
    let json_str = extract_json_fragment(clean, '{', '}')?;
    let value = serde_json::from_str::<Value>(json_str)
        .or_else(|_| serde_json::from_str::<Value>(&fix_json_issues(json_str)))
        .ok()?;
    let object = value.as_object()?;
    let field = |camel: &str, snake: &str| object.get(camel).or_else(|| object.get(snake));

    let root_cause = field("rootCause", "root_cause")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())?
        .to_string();

    let confidence = field("confidence", "confidence")
        .and_then(|v| serde_json::from_value::<ConfidenceJson>(v.clone()).ok())
        .and_then(|c| c.to_fraction())
        .unwrap_or(DEFAULT_CONFIDENCE_PERCENT / 100.0);

    let code_position = field("codePosition", "code_position")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(UNKNOWN_CODE_POSITION)
        .to_string();

    let fix_suggestion = field("fixSuggestion", "fix_suggestion")
        .and_then(|v| serde_json::from_value::<SuggestionJson>(v.clone()).ok())
        .map(|s| s.into_text().trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| SEE_DETAILED_ANALYSIS.to_string());

    Some(Diagnosis::new(
        DiagnosisSource::Llm,
        root_cause,
        confidence,
        code_position,
        fix_suggestion,
    ))
}

struct FieldPatterns {
    root_cause: Regex,
    confidence: Regex,
    code_position: Regex,
    fix_suggestion: Regex,
}

/// `label: value` on one line, tolerating bullets, markdown bold and JSON quoting
fn labeled_line(labels: &str) -> String {
    format!(
        r#"(?im)^[\s\-\*#>"]*(?:{})[\s\*"]*[:：][\s\*"]*(.+?)["\s]*,?\s*$"#,
        labels
    )
}

fn field_patterns() -> Option<&'static FieldPatterns> {
    static PATTERNS: OnceLock<Option<FieldPatterns>> = OnceLock::new();
    PATTERNS
        .get_or_init(|| {
            Some(FieldPatterns {
                root_cause: Regex::new(&labeled_line(r"root[\s_-]?cause|根因")).ok()?,
                confidence: Regex::new(
                    r#"(?i)(?:confidence|置信度)[\s\*"]*[:：][\s\*"]*(\d+(?:\.\d+)?)\s*(%)?"#,
                )
                .ok()?,
                code_position: Regex::new(&labeled_line(
                    r"code[\s_-]?position|code[\s_-]?location|location|代码位置",
                ))
                .ok()?,
                fix_suggestion: Regex::new(&labeled_line(
                    r"fix[\s_-]?suggestion|suggestion|fix|修复建议",
                ))
                .ok()?,
            })
        })
        .as_ref()
}

fn capture(pattern: &Regex, text: &str) -> Option<String> {
    pattern
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Best-effort extraction of labeled fields from free text
fn extract_from_text(reply: &str) -> Option<Diagnosis> {
    let patterns = field_patterns()?;
    let root_cause = capture(&patterns.root_cause, reply)?;

    let confidence = patterns
        .confidence
        .captures(reply)
        .and_then(|caps| {
            let value = caps.get(1)?.as_str().parse::<f64>().ok()?;
            Some(normalize_confidence(value, caps.get(2).is_some()))
        })
        .unwrap_or(DEFAULT_CONFIDENCE_PERCENT / 100.0);

    let code_position = capture(&patterns.code_position, reply)
        .unwrap_or_else(|| UNKNOWN_CODE_POSITION.to_string());
    let fix_suggestion = capture(&patterns.fix_suggestion, reply)
        .unwrap_or_else(|| SEE_DETAILED_ANALYSIS.to_string());

    Some(Diagnosis::new(
        DiagnosisSource::Llm,
        root_cause,
        confidence,
        code_position,
        fix_suggestion,
    ))
}
