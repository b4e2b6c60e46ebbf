use criterion::{black_box, criterion_group, criterion_main, Criterion};
use flow_doctor::collab::{extract_keywords, CodeLocator};
use flow_doctor::diagnose::arbiter;
use flow_doctor::diagnose::llm::{fallback_diagnosis, parse_diagnosis};
use flow_doctor::diagnose::static_rules::{match_rules, MatchContext};
use flow_doctor::record::{normalize, ExceptionScene, RawReport};
use serde_json::json;

const TRACE: &str = "[2025-07-01 10:00:00] instanceId:PROC-42 - mapping field travel_days → days error;\n\
                     [2025-07-01 10:00:00] type convert failed for amount;\n\
                     [2025-07-01 10:00:01] permission filter applied to operator alice";

fn synthetic_report(scene: ExceptionScene) -> RawReport {
    RawReport {
        process_instance_id: Some("PROC-42".into()),
        exception_scene: Some(scene.as_str().into()),
        exception_node: Some("approve".into()),
        exception_field: Some("amount".into()),
        exception_desc: Some("amount was reset after approval".into()),
        submit_data: Some(json!(r#"{"amount": 1200, "travel_days": 3}"#)),
        node_config: Some(json!({"mapping": {"travel_days": "days"}})),
        operate_time: Some("2025-07-01 10:00:00".into()),
        operator: Some("alice".into()),
        submit_form_data: Some(json!({"amount": 1200})),
        echo_form_data: Some(json!({"amount": 0})),
        ..RawReport::default()
    }
}

fn bench_normalize(c: &mut Criterion) {
    let report = synthetic_report(ExceptionScene::FieldValueError);
    c.bench_function("normalize_report", |b| {
        b.iter(|| black_box(normalize(black_box(&report)).is_ok()));
    });
}

fn bench_rule_matching(c: &mut Criterion) {
    let records: Vec<_> = ExceptionScene::ALL
        .iter()
        .filter_map(|scene| normalize(&synthetic_report(*scene)).ok())
        .collect();
    let keywords = extract_keywords(TRACE);

    c.bench_function("match_rules_all_scenes", |b| {
        b.iter(|| {
            let ctx = MatchContext::new(TRACE, &keywords);
            for record in &records {
                black_box(match_rules(record, Some(&ctx)).len());
            }
        });
    });
}

fn bench_reconcile(c: &mut Criterion) {
    let record = match normalize(&synthetic_report(ExceptionScene::FieldValueError)) {
        Ok(record) => record,
        Err(err) => panic!("synthetic report should normalize: {err}"),
    };
    let keywords = extract_keywords(TRACE);
    let ctx = MatchContext::new(TRACE, &keywords);
    let issues = match_rules(&record, Some(&ctx));
    let llm = fallback_diagnosis();

    c.bench_function("reconcile_with_llm", |b| {
        b.iter(|| black_box(arbiter::reconcile(black_box(&issues), Some(&llm)).severity));
    });
}

fn bench_parse_and_locate(c: &mut Criterion) {
    let reply = "```json\n{\"rootCause\": \"mapping misconfigured\", \"confidence\": \"85%\", \
                 \"codePosition\": \"src/flow/mapping.js:97\", \"fixSuggestion\": [\"fix the map\"]}\n```";
    c.bench_function("parse_llm_reply", |b| {
        b.iter(|| black_box(parse_diagnosis(black_box(reply)).is_ok()));
    });

    let locator = CodeLocator::default();
    let keywords = extract_keywords(TRACE);
    c.bench_function("locate_static_map", |b| {
        b.iter(|| black_box(locator.locate(black_box(&keywords), None).len()));
    });
}

criterion_group!(
    perf_core,
    bench_normalize,
    bench_rule_matching,
    bench_reconcile,
    bench_parse_and_locate
);
criterion_main!(perf_core);
