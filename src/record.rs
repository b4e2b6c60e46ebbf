//! Record normalization
//!
//! Turns a loosely-shaped report (as produced by a form, a clipboard paste,
//! or an uploaded JSON file) into a canonical [`ExceptionRecord`]. Embedded
//! payloads may arrive either as JSON text or as already-structured objects;
//! after normalization they are always parsed objects.

use crate::error::{DiagnoseError, Result};
use crate::util::truncate;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

/// A parsed structured payload (submitted data, node config, ...)
pub type Payload = Map<String, Value>;

const OPERATE_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Fixed catalog of anomaly categories
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExceptionScene {
    #[serde(rename = "field_value_error")]
    FieldValueError,
    #[serde(rename = "field_missing")]
    FieldMissing,
    #[serde(rename = "field_type_error")]
    FieldTypeError,
    #[serde(rename = "flow_not_progress")]
    FlowNotProgress,
    #[serde(rename = "node_config_error")]
    NodeConfigError,
    #[serde(rename = "field_value_0")]
    FieldValueZero,
    #[serde(rename = "field_mapping_missing")]
    FieldMappingMissing,
    #[serde(rename = "process_status_error")]
    ProcessStatusError,
}

impl ExceptionScene {
    pub const ALL: [ExceptionScene; 8] = [
        ExceptionScene::FieldValueError,
        ExceptionScene::FieldMissing,
        ExceptionScene::FieldTypeError,
        ExceptionScene::FlowNotProgress,
        ExceptionScene::NodeConfigError,
        ExceptionScene::FieldValueZero,
        ExceptionScene::FieldMappingMissing,
        ExceptionScene::ProcessStatusError,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ExceptionScene::FieldValueError => "field_value_error",
            ExceptionScene::FieldMissing => "field_missing",
            ExceptionScene::FieldTypeError => "field_type_error",
            ExceptionScene::FlowNotProgress => "flow_not_progress",
            ExceptionScene::NodeConfigError => "node_config_error",
            ExceptionScene::FieldValueZero => "field_value_0",
            ExceptionScene::FieldMappingMissing => "field_mapping_missing",
            ExceptionScene::ProcessStatusError => "process_status_error",
        }
    }

    /// Human-readable label
    pub fn label(&self) -> &'static str {
        match self {
            ExceptionScene::FieldValueError => "Field value wrong after node transition",
            ExceptionScene::FieldMissing => "Required field missing",
            ExceptionScene::FieldTypeError => "Field type mismatch",
            ExceptionScene::FlowNotProgress => "Flow did not advance",
            ExceptionScene::NodeConfigError => "Node configuration error",
            ExceptionScene::FieldValueZero => "Field shows 0 after submit",
            ExceptionScene::FieldMappingMissing => "Field mapping missing",
            ExceptionScene::ProcessStatusError => "Process status error",
        }
    }
}

impl fmt::Display for ExceptionScene {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ExceptionScene {
    type Err = DiagnoseError;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim();
        ExceptionScene::ALL
            .into_iter()
            .find(|scene| scene.as_str() == wanted)
            .ok_or_else(|| DiagnoseError::Validation {
                field: "exceptionScene",
                reason: format!("unknown exception scene `{}`", wanted),
            })
    }
}

/// Report as supplied by the caller, before validation
///
/// Scalar fields are kept as raw JSON so a wrongly-typed value is reported
/// against its own field during normalization, not as an unreadable report.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawReport {
    pub process_instance_id: Option<Value>,
    pub exception_scene: Option<Value>,
    pub exception_node: Option<Value>,
    pub exception_field: Option<Value>,
    pub exception_desc: Option<Value>,
    /// JSON text or object
    pub submit_data: Option<Value>,
    pub node_config: Option<Value>,
    pub operate_time: Option<Value>,
    pub git_repo: Option<Value>,
    pub operator: Option<Value>,
    pub submit_form_data: Option<Value>,
    pub echo_form_data: Option<Value>,
    /// Local checkout used by the code locator instead of the static table
    pub local_code_path: Option<String>,
}

impl RawReport {
    /// Parse a whole report from JSON text
    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| DiagnoseError::MalformedPayload {
            field: "report",
            raw_text: format!("{} ({})", truncate(text.trim(), 200), e),
        })
    }
}

/// Canonical exception record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExceptionRecord {
    pub process_instance_id: String,
    pub exception_scene: ExceptionScene,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exception_node: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exception_field: Option<String>,
    pub exception_desc: String,
    #[serde(default)]
    pub submit_data: Payload,
    #[serde(default)]
    pub node_config: Payload,
    pub operate_time: String,
    #[serde(default)]
    pub git_repo: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operator: Option<String>,
    #[serde(default)]
    pub submit_form_data: Payload,
    #[serde(default)]
    pub echo_form_data: Payload,
}

impl ExceptionRecord {
    /// Value the user submitted for the exception field, if any
    pub fn submitted_value(&self) -> Option<&Value> {
        let field = self.exception_field.as_deref()?;
        self.submit_form_data
            .get(field)
            .or_else(|| self.submit_data.get(field))
    }

    /// Value the engine echoed back for the exception field, if any
    pub fn echoed_value(&self) -> Option<&Value> {
        let field = self.exception_field.as_deref()?;
        self.echo_form_data.get(field)
    }
}

/// Build a canonical record from a raw report
pub fn normalize(raw: &RawReport) -> Result<ExceptionRecord> {
    normalize_at(raw, Utc::now())
}

/// Same as [`normalize`], with an explicit clock for `operateTime` defaults
pub fn normalize_at(raw: &RawReport, now: DateTime<Utc>) -> Result<ExceptionRecord> {
    let process_instance_id = required("processInstanceId", raw.process_instance_id.as_ref())?;
    let scene_text = required("exceptionScene", raw.exception_scene.as_ref())?;
    let exception_desc = required("exceptionDesc", raw.exception_desc.as_ref())?;
    let exception_scene = scene_text.parse::<ExceptionScene>()?;

    Ok(ExceptionRecord {
        process_instance_id,
        exception_scene,
        exception_node: optional("exceptionNode", raw.exception_node.as_ref())?,
        exception_field: optional("exceptionField", raw.exception_field.as_ref())?,
        exception_desc,
        submit_data: parse_payload("submitData", raw.submit_data.as_ref())?,
        node_config: parse_payload("nodeConfig", raw.node_config.as_ref())?,
        operate_time: optional("operateTime", raw.operate_time.as_ref())?
            .unwrap_or_else(|| now.format(OPERATE_TIME_FORMAT).to_string()),
        git_repo: optional("gitRepo", raw.git_repo.as_ref())?.unwrap_or_default(),
        operator: optional("operator", raw.operator.as_ref())?,
        submit_form_data: parse_payload("submitFormData", raw.submit_form_data.as_ref())?,
        echo_form_data: parse_payload("echoFormData", raw.echo_form_data.as_ref())?,
    })
}

fn required(field: &'static str, value: Option<&Value>) -> Result<String> {
    optional(field, value)?.ok_or_else(|| DiagnoseError::missing(field))
}

/// Text field; numbers and booleans are taken as their JSON text
fn optional(field: &'static str, value: Option<&Value>) -> Result<Option<String>> {
    let text = match value {
        None | Some(Value::Null) => return Ok(None),
        Some(Value::String(s)) => s.trim().to_string(),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        Some(other) => {
            return Err(DiagnoseError::Validation {
                field,
                reason: format!("expected text, found {}", truncate(&other.to_string(), 80)),
            })
        }
    };
    Ok(Some(text).filter(|t| !t.is_empty()))
}

/// Parse an embedded payload; absent or blank values become an empty object
fn parse_payload(field: &'static str, value: Option<&Value>) -> Result<Payload> {
    match value {
        None | Some(Value::Null) => Ok(Payload::new()),
        Some(Value::Object(map)) => Ok(map.clone()),
        Some(Value::String(text)) => {
            let trimmed = text.trim();
            if trimmed.is_empty() {
                return Ok(Payload::new());
            }
            match serde_json::from_str::<Value>(trimmed) {
                Ok(Value::Object(map)) => Ok(map),
                Ok(Value::Null) => Ok(Payload::new()),
                _ => Err(DiagnoseError::MalformedPayload {
                    field,
                    raw_text: text.clone(),
                }),
            }
        }
        Some(other) => Err(DiagnoseError::MalformedPayload {
            field,
            raw_text: other.to_string(),
        }),
    }
}
