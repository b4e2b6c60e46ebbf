//! Model endpoint tests against a mock chat-completions server

use std::time::Duration;

use flow_doctor::diagnose::llm::{
    AnalyzerConfig, ChatBackend, ChatRequest, HttpChatClient, LlmAnalyzer,
};
use flow_doctor::diagnose::DiagnosisSource;
use flow_doctor::record::{normalize, ExceptionRecord, RawReport};
use flow_doctor::DiagnoseError;
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn config_for(server: &MockServer) -> AnalyzerConfig {
    AnalyzerConfig {
        endpoint: format!("{}/v1/chat/completions", server.uri()),
        api_key: Some("sk-test".to_string()),
        timeout: Duration::from_secs(5),
        ..AnalyzerConfig::default()
    }
}

fn completion(content: &str) -> serde_json::Value {
    json!({
        "id": "chatcmpl-mock",
        "object": "chat.completion",
        "model": "gpt-4o-mini",
        "usage": {"prompt_tokens": 120, "completion_tokens": 40, "total_tokens": 160},
        "choices": [{
            "index": 0,
            "message": {"role": "assistant", "content": content},
            "finish_reason": "stop"
        }]
    })
}

fn record() -> ExceptionRecord {
    let raw = RawReport {
        process_instance_id: Some("PROC-9".into()),
        exception_scene: Some("field_value_0".into()),
        exception_field: Some("amount".into()),
        exception_desc: Some("amount shows 0 after approval".into()),
        ..Default::default()
    };
    normalize(&raw).expect("valid report")
}

#[tokio::test]
async fn test_chat_completion_sends_key_and_model() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("authorization", "Bearer sk-test"))
        .and(body_partial_json(json!({
            "model": "gpt-4o-mini",
            "response_format": {"type": "json_object"}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion("{}")))
        .expect(1)
        .mount(&server)
        .await;

    let config = config_for(&server);
    let client = HttpChatClient::new(&config.endpoint, "sk-test", config.timeout).unwrap();
    let reply = client
        .complete(&ChatRequest::json(&config, "system", "user"))
        .await
        .unwrap();

    assert_eq!(reply.content, "{}");
    assert_eq!(reply.model, "gpt-4o-mini");
    assert_eq!(reply.usage.map(|u| u.total_tokens), Some(160));
}

#[tokio::test]
async fn test_server_error_is_analyzer_unavailable() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    let config = config_for(&server);
    let client = HttpChatClient::new(&config.endpoint, "sk-test", config.timeout).unwrap();
    let err = client
        .complete(&ChatRequest::json(&config, "system", "user"))
        .await
        .unwrap_err();

    match err {
        DiagnoseError::AnalyzerUnavailable(message) => assert!(message.contains("500")),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_live_analysis_parses_model_reply() {
    let server = MockServer::start().await;
    let reply = r#"```json
{"rootCause": "numeric field converted to text and reset", "confidence": 88,
 "codePosition": "src/flow/convert.js:41", "fixSuggestion": ["cast before save", "retest"]}
```"#;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion(reply)))
        .mount(&server)
        .await;

    let analyzer = LlmAnalyzer::new(config_for(&server));
    assert!(analyzer.is_live());
    let diagnosis = analyzer.analyze(&record(), "", &[]).await;

    assert_eq!(diagnosis.source, DiagnosisSource::Llm);
    assert!(!diagnosis.simulated);
    assert!((diagnosis.confidence - 0.88).abs() < 1e-9);
    assert_eq!(diagnosis.code_position, "src/flow/convert.js:41");
    assert!(diagnosis.fix_suggestion.contains("cast before save"));
}

#[tokio::test]
async fn test_rejected_key_falls_back_to_simulated() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(401).set_body_string("invalid api key"))
        .mount(&server)
        .await;

    let analyzer = LlmAnalyzer::new(config_for(&server));
    let err = analyzer.try_analyze(&record(), "", &[]).await.unwrap_err();
    assert!(matches!(err, DiagnoseError::AnalyzerUnavailable(_)));

    let diagnosis = analyzer.analyze(&record(), "", &[]).await;
    assert!(diagnosis.simulated);
    assert_eq!(diagnosis.source, DiagnosisSource::Llm);
    assert!((diagnosis.confidence - 0.60).abs() < 1e-9);
}

#[tokio::test]
async fn test_unparseable_reply_falls_back() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion("I cannot help with that.")))
        .mount(&server)
        .await;

    let diagnosis = LlmAnalyzer::new(config_for(&server))
        .analyze(&record(), "", &[])
        .await;
    assert!(diagnosis.simulated);
}

#[tokio::test]
async fn test_rate_limit_is_retried_then_succeeds() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(429).set_body_string("Rate limit reached, retry after 1 seconds"))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion("ok")))
        .expect(1)
        .mount(&server)
        .await;

    let config = config_for(&server);
    let client = HttpChatClient::new(&config.endpoint, "sk-test", config.timeout).unwrap();
    let reply = client
        .complete(&ChatRequest::json(&config, "system", "user"))
        .await
        .unwrap();
    assert_eq!(reply.content, "ok");
}

#[tokio::test]
async fn test_rate_limit_gives_up_after_two_retries() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(429).set_body_string("Rate limit reached, retry after 1 seconds"))
        .expect(3)
        .mount(&server)
        .await;

    let config = config_for(&server);
    let client = HttpChatClient::new(&config.endpoint, "sk-test", config.timeout).unwrap();
    let err = client
        .complete(&ChatRequest::json(&config, "system", "user"))
        .await
        .unwrap_err();
    assert_eq!(
        err,
        DiagnoseError::AnalyzerUnavailable("rate limited after 2 retries".to_string())
    );
}
