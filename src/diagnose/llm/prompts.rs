use crate::record::{ExceptionRecord, Payload};
use crate::util::truncate_middle;

/// Log text beyond this is cut in the middle before prompting
const MAX_LOG_CHARS: usize = 6_000;

pub const DIAGNOSIS_SYSTEM: &str = r#"You are a senior engineer on a business-process engine team. You diagnose data anomalies reported against running process instances: values that change between nodes, fields that go missing, types that get converted, flows that stall.

You receive the exception report, the instance's trace log, and code locations matched from log keywords. Find the single most likely root cause.

OUTPUT FORMAT (JSON):
{
  "rootCause": "one or two sentences naming what went wrong and where",
  "confidence": 85,
  "codePosition": "path/to/file.js:LINE (functionName)",
  "fixSuggestion": "1. first step; 2. second step"
}

RULES:
- confidence is a percentage from 0 to 100
- Ground codePosition in the supplied code locations when one fits; otherwise give your best guess and say so
- Compare submitted and echoed data field by field; a mismatch on the exception field is strong evidence
- Output ONLY the JSON object, no markdown fences, no commentary"#;

fn render_payload(payload: &Payload) -> String {
    if payload.is_empty() {
        return "(none)".to_string();
    }
    serde_json::to_string_pretty(payload).unwrap_or_else(|_| "(unprintable)".to_string())
}

/// User prompt embedding the record, log and located code
pub fn build_user_prompt(record: &ExceptionRecord, log_text: &str, code_snippets: &[String]) -> String {
    let log_section = if log_text.trim().is_empty() {
        "(log unavailable)".to_string()
    } else {
        truncate_middle(log_text.trim(), MAX_LOG_CHARS)
    };

    let code_section = if code_snippets.is_empty() {
        "(no code locations matched)".to_string()
    } else {
        code_snippets
            .iter()
            .map(|s| format!("- {}", s))
            .collect::<Vec<_>>()
            .join("\n")
    };

    format!(
        "EXCEPTION REPORT\n\
         Instance ID: {instance}\n\
         Scene: {scene} ({scene_label})\n\
         Node: {node}\n\
         Exception field: {field}\n\
         Operator: {operator}\n\
         Repository: {repo}\n\
         Reported at: {time}\n\
         Description: {desc}\n\n\
         SUBMITTED FORM DATA:\n{submitted}\n\n\
         ECHOED FORM DATA:\n{echoed}\n\n\
         SUBMIT PAYLOAD:\n{submit_data}\n\n\
         NODE CONFIG:\n{node_config}\n\n\
         TRACE LOG:\n{log}\n\n\
         CODE LOCATIONS:\n{code}\n\n\
         Diagnose the root cause and reply with the JSON object only.",
        instance = record.process_instance_id,
        scene = record.exception_scene,
        scene_label = record.exception_scene.label(),
        node = record.exception_node.as_deref().unwrap_or("unknown"),
        field = record.exception_field.as_deref().unwrap_or("unknown"),
        operator = record.operator.as_deref().unwrap_or("unknown"),
        repo = if record.git_repo.is_empty() { "unknown" } else { record.git_repo.as_str() },
        time = record.operate_time,
        desc = record.exception_desc,
        submitted = render_payload(&record.submit_form_data),
        echoed = render_payload(&record.echo_form_data),
        submit_data = render_payload(&record.submit_data),
        node_config = render_payload(&record.node_config),
        log = log_section,
        code = code_section,
    )
}
