//! Analysis pipeline
//!
//! normalize → fetch log → locate code → match rules → LLM second opinion →
//! arbitrate. Only input errors abort; an unreachable log store or model
//! degrades the run and is recorded on the result.

use crate::collab::locator::{extract_keywords, CodeLocator, NO_MATCH};
use crate::collab::logs::{log_source, LogSource, LogStoreConfig, NoLogStore};
use crate::diagnose::arbiter;
use crate::diagnose::llm::{AnalyzerConfig, LlmAnalyzer};
use crate::diagnose::static_rules::{match_rules, MatchContext};
use crate::diagnose::{AnalysisResult, DegradedSource};
use crate::error::Result;
use crate::record::{normalize, ExceptionRecord, RawReport};
use chrono::Utc;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

/// Per-run switches
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnalysisOptions {
    /// Ask the LLM analyzer for a second opinion
    pub use_llm: bool,
}

impl Default for AnalysisOptions {
    fn default() -> Self {
        Self { use_llm: true }
    }
}

/// Stateless between calls; every run builds its own record and result
pub struct DiagnosisEngine {
    logs: Arc<dyn LogSource>,
    locator: Arc<CodeLocator>,
    analyzer: Arc<LlmAnalyzer>,
}

impl DiagnosisEngine {
    pub fn new(logs: Arc<dyn LogSource>, locator: CodeLocator, analyzer: LlmAnalyzer) -> Self {
        Self {
            logs,
            locator: Arc::new(locator),
            analyzer: Arc::new(analyzer),
        }
    }

    /// Production wiring from explicit configuration values
    pub fn from_config(analyzer: AnalyzerConfig, logs: &LogStoreConfig, simulate_log: bool) -> Self {
        let logs = log_source(logs, simulate_log).unwrap_or_else(|err| {
            warn!(error = %err, "log store misconfigured, continuing without logs");
            Arc::new(NoLogStore) as Arc<dyn LogSource>
        });
        Self::new(logs, CodeLocator::default(), LlmAnalyzer::new(analyzer))
    }

    /// True when this run asks for an LLM opinion that can only be simulated
    fn simulates_llm(&self, options: AnalysisOptions) -> bool {
        options.use_llm && !self.analyzer.is_live()
    }

    /// Validate a raw report and analyze it
    pub async fn analyze(&self, raw: &RawReport, options: AnalysisOptions) -> Result<AnalysisResult> {
        let record = normalize(raw)?;
        let code_root = raw
            .local_code_path
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(PathBuf::from);
        Ok(self
            .analyze_record(record, code_root.as_deref(), options)
            .await)
    }

    /// Analyze an already-normalized record; never fails
    pub async fn analyze_record(
        &self,
        record: ExceptionRecord,
        code_root: Option<&Path>,
        options: AnalysisOptions,
    ) -> AnalysisResult {
        let mut degraded = Vec::new();
        if self.simulates_llm(options) {
            warn!("no usable LLM configuration; the LLM diagnosis will be simulated");
        }

        let log_text = match self.logs.fetch_log(&record.process_instance_id).await {
            Ok(text) => text,
            Err(err) => {
                warn!(
                    instance = %record.process_instance_id,
                    error = %err,
                    "log retrieval failed, continuing with empty log"
                );
                degraded.push(DegradedSource::Log);
                String::new()
            }
        };

        let keywords = extract_keywords(&log_text);
        let code_snippets = self.locate(&keywords, code_root).await;

        let ctx = MatchContext::new(&log_text, &keywords);
        let potential_issues = match_rules(&record, Some(&ctx));

        let llm_diagnosis = if options.use_llm {
            let diagnosis = self
                .analyzer
                .analyze(&record, &log_text, &code_snippets)
                .await;
            if diagnosis.simulated {
                degraded.push(DegradedSource::Analyzer);
            }
            Some(diagnosis)
        } else {
            None
        };

        let verdict = arbiter::reconcile(&potential_issues, llm_diagnosis.as_ref());
        info!(
            instance = %record.process_instance_id,
            scene = %record.exception_scene,
            issues = potential_issues.len(),
            severity = %verdict.severity,
            degraded = degraded.len(),
            "analysis complete"
        );

        AnalysisResult {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            input_data: record,
            potential_issues,
            severity: verdict.severity,
            summary: verdict.summary,
            final_diagnosis: verdict.final_diagnosis,
            keywords,
            code_snippets,
            degraded,
        }
    }

    /// Local checkouts are walked on the blocking pool
    async fn locate(&self, keywords: &[String], code_root: Option<&Path>) -> Vec<String> {
        let Some(root) = code_root else {
            return self.locator.locate(keywords, None);
        };
        if keywords.is_empty() {
            return Vec::new();
        }
        if !root.is_dir() {
            warn!(root = %root.display(), "local code path is not a directory");
        }

        let locator = Arc::clone(&self.locator);
        let owned_keywords = keywords.to_vec();
        let root = root.to_path_buf();
        match tokio::task::spawn_blocking(move || locator.locate(&owned_keywords, Some(&root))).await {
            Ok(found) => found,
            Err(err) => {
                warn!(error = %err, "code search task failed");
                vec![NO_MATCH.to_string(); keywords.len()]
            }
        }
    }
}
