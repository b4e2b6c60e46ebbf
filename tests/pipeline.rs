//! End-to-end analysis runs with injected collaborators

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use flow_doctor::collab::{CodeLocator, LogSource, NoLogStore, SimulatedLogStore};
use flow_doctor::diagnose::llm::{AnalyzerConfig, ChatBackend, ChatReply, ChatRequest, LlmAnalyzer};
use flow_doctor::diagnose::{AnalysisResult, DegradedSource, DiagnosisSource, Severity};
use flow_doctor::error::Result;
use flow_doctor::{AnalysisOptions, DiagnoseError, DiagnosisEngine, RawReport};
use serde_json::json;

struct FixedLog(&'static str);

#[async_trait]
impl LogSource for FixedLog {
    async fn fetch_log(&self, _instance_id: &str) -> Result<String> {
        Ok(self.0.to_string())
    }
}

/// Replies with a canned body and counts calls
struct CannedModel {
    content: String,
    calls: AtomicUsize,
}

impl CannedModel {
    fn new(content: serde_json::Value) -> Arc<Self> {
        Arc::new(Self {
            content: content.to_string(),
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl ChatBackend for CannedModel {
    async fn complete(&self, request: &ChatRequest) -> Result<ChatReply> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(ChatReply {
            content: self.content.clone(),
            usage: None,
            model: request.model.clone(),
        })
    }
}

struct BrokenModel;

#[async_trait]
impl ChatBackend for BrokenModel {
    async fn complete(&self, _request: &ChatRequest) -> Result<ChatReply> {
        Err(DiagnoseError::AnalyzerUnavailable("connection reset".to_string()))
    }
}

fn live_config() -> AnalyzerConfig {
    AnalyzerConfig {
        api_key: Some("sk-test".to_string()),
        ..AnalyzerConfig::default()
    }
}

fn engine_with(logs: Arc<dyn LogSource>, backend: Arc<dyn ChatBackend>) -> DiagnosisEngine {
    DiagnosisEngine::new(
        logs,
        CodeLocator::default(),
        LlmAnalyzer::with_backend(live_config(), backend),
    )
}

fn report(scene: &str) -> RawReport {
    RawReport {
        process_instance_id: Some("PROC-100".into()),
        exception_scene: Some(scene.into()),
        exception_node: Some("finance_review".into()),
        exception_field: Some("travel_days".into()),
        exception_desc: Some("travel days changed after the node transition".into()),
        submit_data: Some(json!(r#"{"travel_days": 3}"#)),
        operator: Some("alice".into()),
        submit_form_data: Some(json!({"travel_days": 3})),
        echo_form_data: Some(json!({"travel_days": 1})),
        ..Default::default()
    }
}

#[tokio::test]
async fn test_rules_and_predicates_fire_together() {
    let engine = engine_with(Arc::new(SimulatedLogStore), Arc::new(BrokenModel));
    let result = engine
        .analyze(&report("field_value_error"), AnalysisOptions::default())
        .await
        .unwrap();

    let ids: Vec<_> = result
        .potential_issues
        .iter()
        .filter_map(|d| d.rule_id.as_deref())
        .collect();
    assert_eq!(ids, vec!["rule1", "R001"]);
    assert_eq!(result.severity, Severity::High);
    assert!(result.summary.starts_with("Analysis found 2 potential issues: 2 high-confidence."));

    // rule1 and R001 tie at 0.95; the earlier catalog entry wins
    let final_diagnosis = result.final_diagnosis.unwrap();
    assert_eq!(final_diagnosis.rule_id.as_deref(), Some("rule1"));
    assert_eq!(result.degraded, vec![DegradedSource::Analyzer]);
}

#[tokio::test]
async fn test_confident_llm_overrides_rules() {
    let model = CannedModel::new(json!({
        "rootCause": "mapping table points travel_days at the legacy days column",
        "confidence": 0.97,
        "codePosition": "src/flow/mapping.js:61",
        "fixSuggestion": "Point the mapping at travel_days"
    }));
    let engine = engine_with(Arc::new(NoLogStore), model.clone());
    let result = engine
        .analyze(&report("field_value_error"), AnalysisOptions::default())
        .await
        .unwrap();

    assert_eq!(model.calls.load(Ordering::SeqCst), 1);
    let final_diagnosis = result.final_diagnosis.unwrap();
    assert_eq!(final_diagnosis.source, DiagnosisSource::Llm);
    assert_eq!(final_diagnosis.code_position, "src/flow/mapping.js:61");
    assert!(!final_diagnosis.simulated);
    // Severity reflects rule matches only
    assert_eq!(result.severity, Severity::High);
    assert_eq!(result.degraded, vec![DegradedSource::Log]);
}

#[tokio::test]
async fn test_equal_confidence_keeps_rule() {
    let model = CannedModel::new(json!({
        "rootCause": "something else",
        "confidence": "90%",
        "codePosition": "unknown",
        "fixSuggestion": "n/a"
    }));
    let engine = engine_with(Arc::new(NoLogStore), model);
    let result = engine
        .analyze(&report("field_missing"), AnalysisOptions::default())
        .await
        .unwrap();

    let final_diagnosis = result.final_diagnosis.unwrap();
    assert_eq!(final_diagnosis.source, DiagnosisSource::Rule);
    assert_eq!(final_diagnosis.rule_id.as_deref(), Some("rule2"));
    assert_eq!(result.severity, Severity::Medium);
}

#[tokio::test]
async fn test_weaker_llm_keeps_rule() {
    let model = CannedModel::new(json!({
        "rootCause": "status flag never reset",
        "confidence": 0.5,
        "codePosition": "src/flow/status.js:12",
        "fixSuggestion": "reset the flag"
    }));
    let engine = engine_with(Arc::new(FixedLog("nothing interesting")), model);
    let result = engine
        .analyze(&report("process_status_error"), AnalysisOptions::default())
        .await
        .unwrap();

    // rule8 matches the scene; the LLM at 0.5 does not beat it
    assert_eq!(result.potential_issues.len(), 1);
    assert_eq!(result.severity, Severity::Medium);
    assert!(result.keywords.is_empty());
    assert!(result.code_snippets.is_empty());
    assert!(!result.is_degraded());
}

#[tokio::test]
async fn test_llm_disabled_skips_model() {
    let model = CannedModel::new(json!({}));
    let engine = engine_with(Arc::new(NoLogStore), model.clone());
    let result = engine
        .analyze(&report("field_type_error"), AnalysisOptions { use_llm: false })
        .await
        .unwrap();

    assert_eq!(model.calls.load(Ordering::SeqCst), 0);
    assert_eq!(
        result.final_diagnosis.unwrap().rule_id.as_deref(),
        Some("rule3")
    );
}

#[tokio::test]
async fn test_malformed_payload_aborts_with_field() {
    let engine = engine_with(Arc::new(NoLogStore), Arc::new(BrokenModel));
    let mut raw = report("field_missing");
    raw.node_config = Some(json!("{ not json"));
    let err = engine
        .analyze(&raw, AnalysisOptions::default())
        .await
        .unwrap_err();

    assert!(err.is_input_error());
    assert_eq!(err.field(), Some("nodeConfig"));
}

#[tokio::test]
async fn test_unknown_scene_is_rejected() {
    let engine = engine_with(Arc::new(NoLogStore), Arc::new(BrokenModel));
    let err = engine
        .analyze(&report("cosmic_rays"), AnalysisOptions::default())
        .await
        .unwrap_err();
    assert_eq!(err.field(), Some("exceptionScene"));
}

#[tokio::test]
async fn test_local_code_path_is_searched() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(dir.path().join("flow")).unwrap();
    std::fs::write(
        dir.path().join("flow/mapper.js"),
        "const a = 1;\n// mapping of node fields\nexport default a;\n",
    )
    .unwrap();

    let engine = engine_with(Arc::new(SimulatedLogStore), Arc::new(BrokenModel));
    let mut raw = report("field_value_error");
    raw.local_code_path = Some(dir.path().display().to_string());
    let result = engine
        .analyze(&raw, AnalysisOptions { use_llm: false })
        .await
        .unwrap();

    assert_eq!(result.keywords, vec!["mapping".to_string()]);
    assert_eq!(result.code_snippets.len(), 1);
    assert!(result.code_snippets[0].starts_with("flow/mapper.js:2"));
}

#[tokio::test]
async fn test_result_survives_json_round_trip() {
    let engine = engine_with(Arc::new(SimulatedLogStore), Arc::new(BrokenModel));
    let result = engine
        .analyze(&report("field_value_0"), AnalysisOptions::default())
        .await
        .unwrap();

    let text = serde_json::to_string(&result).unwrap();
    let value: serde_json::Value = serde_json::from_str(&text).unwrap();
    assert_eq!(value["inputData"]["exceptionScene"], "field_value_0");
    assert_eq!(value["severity"], result.severity.as_str());

    let back: AnalysisResult = serde_json::from_str(&text).unwrap();
    assert_eq!(back, result);
}

#[tokio::test]
async fn test_concurrent_runs_are_independent() {
    let engine = Arc::new(engine_with(Arc::new(NoLogStore), Arc::new(BrokenModel)));
    let scenes = ["field_value_error", "field_missing", "node_config_error", "flow_not_progress"];

    let runs = scenes.iter().map(|scene| {
        let engine = Arc::clone(&engine);
        let raw = report(scene);
        async move { engine.analyze(&raw, AnalysisOptions { use_llm: false }).await }
    });
    let results = futures::future::join_all(runs).await;

    for (scene, result) in scenes.iter().zip(results) {
        let result = result.unwrap();
        assert_eq!(result.input_data.exception_scene.as_str(), *scene);
        assert_eq!(result.potential_issues.len(), 1);
    }
}
