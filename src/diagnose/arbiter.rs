//! Diagnosis arbitration
//!
//! Pure aggregation over already-computed candidates: picks the final
//! diagnosis, rates severity and writes the summary. No I/O.
//!
//! Thresholds are strict: a confidence of exactly `0.90` is *not* high.

use super::{Diagnosis, Severity};

/// Confidence strictly above this is "high"
pub const HIGH_CONFIDENCE: f64 = 0.9;
/// Confidence strictly above this (and not high) is "medium"
pub const MEDIUM_CONFIDENCE: f64 = 0.7;
/// More rule matches than this is high severity regardless of confidence
const MANY_ISSUES: usize = 2;

/// Arbiter output merged into the analysis result
#[derive(Debug, Clone, PartialEq)]
pub struct Verdict {
    pub severity: Severity,
    pub summary: String,
    pub final_diagnosis: Option<Diagnosis>,
}

pub fn reconcile(rule_diagnoses: &[Diagnosis], llm_diagnosis: Option<&Diagnosis>) -> Verdict {
    Verdict {
        severity: severity(rule_diagnoses),
        summary: summary(rule_diagnoses),
        final_diagnosis: select_final(rule_diagnoses, llm_diagnosis),
    }
}

/// Highest-confidence rule match; earlier catalog entries win ties
pub fn top_rule(rule_diagnoses: &[Diagnosis]) -> Option<&Diagnosis> {
    rule_diagnoses.iter().fold(None, |best: Option<&Diagnosis>, d| match best {
        Some(b) if b.confidence >= d.confidence => Some(b),
        _ => Some(d),
    })
}

/// The LLM replaces the rule result only with strictly higher confidence.
/// Equal confidence keeps the rule diagnosis.
pub fn select_final(
    rule_diagnoses: &[Diagnosis],
    llm_diagnosis: Option<&Diagnosis>,
) -> Option<Diagnosis> {
    match (top_rule(rule_diagnoses), llm_diagnosis) {
        (Some(rule), Some(llm)) if llm.confidence > rule.confidence => Some(llm.clone()),
        (Some(rule), _) => Some(rule.clone()),
        (None, Some(llm)) => Some(llm.clone()),
        (None, None) => None,
    }
}

pub fn severity(rule_diagnoses: &[Diagnosis]) -> Severity {
    let any_high = rule_diagnoses
        .iter()
        .any(|d| d.confidence > HIGH_CONFIDENCE);
    if any_high || rule_diagnoses.len() > MANY_ISSUES {
        Severity::High
    } else if !rule_diagnoses.is_empty() {
        Severity::Medium
    } else {
        Severity::Low
    }
}

/// Count of diagnoses per confidence bucket: (high, medium, low)
pub fn confidence_buckets(rule_diagnoses: &[Diagnosis]) -> (usize, usize, usize) {
    rule_diagnoses
        .iter()
        .fold((0, 0, 0), |(high, medium, low), d| {
            if d.confidence > HIGH_CONFIDENCE {
                (high + 1, medium, low)
            } else if d.confidence > MEDIUM_CONFIDENCE {
                (high, medium + 1, low)
            } else {
                (high, medium, low + 1)
            }
        })
}

pub fn summary(rule_diagnoses: &[Diagnosis]) -> String {
    if rule_diagnoses.is_empty() {
        return "No known rule matched this exception; a follow-up LLM analysis is recommended."
            .to_string();
    }

    let (high, medium, low) = confidence_buckets(rule_diagnoses);
    let buckets: Vec<String> = [(high, "high"), (medium, "medium"), (low, "low")]
        .into_iter()
        .filter(|(count, _)| *count > 0)
        .map(|(count, label)| format!("{} {}-confidence", count, label))
        .collect();

    let top: Vec<&str> = rule_diagnoses
        .iter()
        .take(2)
        .map(Diagnosis::display_name)
        .collect();

    format!(
        "Analysis found {} potential {}: {}. Check {} first, apply the suggested fixes, then verify the result.",
        rule_diagnoses.len(),
        if rule_diagnoses.len() == 1 { "issue" } else { "issues" },
        buckets.join(", "),
        top.join(" and "),
    )
}
