//! Diagnosis model
//!
//! Candidate diagnoses come from two sources: the static rule catalog and the
//! LLM analyzer. The arbiter folds them into one [`AnalysisResult`].

pub mod arbiter;
pub mod llm;
pub mod static_rules;

use crate::record::ExceptionRecord;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Where a diagnosis came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagnosisSource {
    /// Static rule catalog, no model cost
    Rule,
    /// Generative model (live or simulated)
    Llm,
}

/// One candidate explanation for an anomaly
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Diagnosis {
    pub root_cause: String,
    /// In `[0, 1]`
    pub confidence: f64,
    pub code_position: String,
    pub fix_suggestion: String,
    pub source: DiagnosisSource,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rule_id: Option<String>,
    /// Short issue name used in summaries
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Produced by the deterministic fallback instead of a live model call
    #[serde(default)]
    pub simulated: bool,
}

impl Diagnosis {
    pub fn new(
        source: DiagnosisSource,
        root_cause: impl Into<String>,
        confidence: f64,
        code_position: impl Into<String>,
        fix_suggestion: impl Into<String>,
    ) -> Self {
        Self {
            root_cause: root_cause.into(),
            confidence: confidence.clamp(0.0, 1.0),
            code_position: code_position.into(),
            fix_suggestion: fix_suggestion.into(),
            source,
            rule_id: None,
            title: None,
            simulated: false,
        }
    }

    pub fn with_rule(mut self, rule_id: impl Into<String>, title: impl Into<String>) -> Self {
        self.rule_id = Some(rule_id.into());
        self.title = Some(title.into());
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn simulated(mut self) -> Self {
        self.simulated = true;
        self
    }

    /// Name used when listing this issue
    pub fn display_name(&self) -> &str {
        self.title.as_deref().unwrap_or(&self.root_cause)
    }
}

/// Overall severity of an analysis
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A collaborator that was replaced by a safe default during the run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DegradedSource {
    /// Log store unreachable, empty log text used
    Log,
    /// Model unavailable, fallback diagnosis used
    Analyzer,
}

/// Top-level output of one analysis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub input_data: ExceptionRecord,
    /// Rule matches in catalog order
    pub potential_issues: Vec<Diagnosis>,
    pub severity: Severity,
    pub summary: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub final_diagnosis: Option<Diagnosis>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub keywords: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub code_snippets: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub degraded: Vec<DegradedSource>,
}

impl AnalysisResult {
    pub fn is_degraded(&self) -> bool {
        !self.degraded.is_empty()
    }
}
