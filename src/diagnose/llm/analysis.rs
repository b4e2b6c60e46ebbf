use super::client::{ChatBackend, HttpChatClient};
use super::models::{AnalyzerConfig, ChatRequest};
use super::parse::parse_diagnosis;
use super::prompts::{build_user_prompt, DIAGNOSIS_SYSTEM};
use crate::diagnose::{Diagnosis, DiagnosisSource};
use crate::error::{DiagnoseError, Result};
use crate::record::ExceptionRecord;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub const FALLBACK_ROOT_CAUSE: &str = "Simulated diagnosis: field mapping between process nodes is misconfigured, so the value is lost or reset during node transition";
pub const FALLBACK_CONFIDENCE: f64 = 0.60;
pub const FALLBACK_CODE_POSITION: &str = "src/flow/mapping.js:58 (mapNodeField)";
pub const FALLBACK_FIX_SUGGESTION: &str = "1. Check the field mapping of the exception node; 2. Confirm source and target field names match; 3. Re-run with a configured LLM key for a live analysis";

/// Fixed diagnosis used whenever the model cannot answer
pub fn fallback_diagnosis() -> Diagnosis {
    Diagnosis::new(
        DiagnosisSource::Llm,
        FALLBACK_ROOT_CAUSE,
        FALLBACK_CONFIDENCE,
        FALLBACK_CODE_POSITION,
        FALLBACK_FIX_SUGGESTION,
    )
    .with_title("LLM analysis (simulated)")
    .simulated()
}

/// Second-opinion analyzer backed by a generative model
pub struct LlmAnalyzer {
    config: AnalyzerConfig,
    backend: Option<Arc<dyn ChatBackend>>,
}

impl LlmAnalyzer {
    /// Analyzer talking to the configured HTTP endpoint
    pub fn new(config: AnalyzerConfig) -> Self {
        let backend = config.api_key().and_then(|key| {
            match HttpChatClient::new(&config.endpoint, key, config.timeout) {
                Ok(client) => Some(Arc::new(client) as Arc<dyn ChatBackend>),
                Err(err) => {
                    warn!(error = %err, "could not build model client");
                    None
                }
            }
        });
        Self { config, backend }
    }

    /// Analyzer with an injected backend (tests, alternative providers)
    pub fn with_backend(config: AnalyzerConfig, backend: Arc<dyn ChatBackend>) -> Self {
        Self {
            config,
            backend: Some(backend),
        }
    }

    /// Whether a live model call will be attempted
    pub fn is_live(&self) -> bool {
        self.config.is_configured() && self.backend.is_some()
    }

    /// Always returns a diagnosis; failures yield [`fallback_diagnosis`]
    pub async fn analyze(
        &self,
        record: &ExceptionRecord,
        log_text: &str,
        code_snippets: &[String],
    ) -> Diagnosis {
        match self.try_analyze(record, log_text, code_snippets).await {
            Ok(diagnosis) => diagnosis,
            Err(err) => {
                warn!(
                    instance = %record.process_instance_id,
                    error = %err,
                    "LLM analysis unavailable, returning simulated diagnosis"
                );
                fallback_diagnosis()
            }
        }
    }

    /// Live analysis; any failure is reported as `AnalyzerUnavailable`
    pub async fn try_analyze(
        &self,
        record: &ExceptionRecord,
        log_text: &str,
        code_snippets: &[String],
    ) -> Result<Diagnosis> {
        let backend = match (&self.backend, self.config.is_configured()) {
            (Some(backend), true) => backend,
            (None, true) => {
                return Err(DiagnoseError::AnalyzerUnavailable(format!(
                    "no usable model client for endpoint `{}`",
                    self.config.endpoint
                )))
            }
            (_, false) => {
                return Err(DiagnoseError::AnalyzerUnavailable(
                    "no API key configured".to_string(),
                ))
            }
        };

        let user = build_user_prompt(record, log_text, code_snippets);
        let request = ChatRequest::json(&self.config, DIAGNOSIS_SYSTEM, &user);
        debug!(
            model = %self.config.model,
            prompt_chars = user.len(),
            "requesting LLM diagnosis"
        );

        let reply = tokio::time::timeout(self.config.timeout, backend.complete(&request))
            .await
            .map_err(|_| {
                DiagnoseError::AnalyzerUnavailable(format!(
                    "model call timed out after {}s",
                    self.config.timeout.as_secs()
                ))
            })??;

        let diagnosis = parse_diagnosis(&reply.content)?.with_title("LLM analysis");
        info!(
            instance = %record.process_instance_id,
            model = %reply.model,
            confidence = diagnosis.confidence,
            "LLM diagnosis received"
        );
        Ok(diagnosis)
    }
}
