//! Static rule catalog
//!
//! Author-curated diagnosis templates distilled from past production incidents.
//! Rules are data: adding one means adding an entry to [`RULES`], never
//! touching [`match_rules`]. Scene-keyed rules fire on the record's scene
//! alone; predicate rules need log context and fire only when it is supplied.

use super::{Diagnosis, DiagnosisSource};
use crate::record::{ExceptionRecord, ExceptionScene};
use serde::Serialize;
use serde_json::Value;

/// Evidence gathered outside the record (log text, extracted keywords)
#[derive(Debug, Clone, Copy, Default)]
pub struct MatchContext<'a> {
    pub log_text: &'a str,
    pub keywords: &'a [String],
}

impl<'a> MatchContext<'a> {
    pub fn new(log_text: &'a str, keywords: &'a [String]) -> Self {
        Self { log_text, keywords }
    }

    fn mentions(&self, needle: &str) -> bool {
        self.keywords.iter().any(|k| k == needle) || self.log_text.contains(needle)
    }
}

/// Log/data-driven checks for predicate rules
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Predicate {
    /// Submitted and echoed values differ and the trace mentions a mapping
    MappingMismatch,
    /// A number went in, `0` or `""` came back, and the trace mentions a conversion
    TypeConversion,
    /// The trace reports a permission filter applied to this operator
    PermissionFilter,
}

impl Predicate {
    pub fn evaluate(&self, record: &ExceptionRecord, ctx: &MatchContext<'_>) -> bool {
        match self {
            Predicate::MappingMismatch => {
                record.submitted_value() != record.echoed_value()
                    && (ctx.mentions("mapping") || ctx.log_text.contains("字段映射"))
            }
            Predicate::TypeConversion => {
                let submitted_number = matches!(record.submitted_value(), Some(Value::Number(_)));
                let echoed_blank = match record.echoed_value() {
                    Some(Value::Number(n)) => n.as_f64() == Some(0.0),
                    Some(Value::String(s)) => s.is_empty(),
                    _ => false,
                };
                submitted_number && echoed_blank && ctx.mentions("type convert")
            }
            Predicate::PermissionFilter => match record.operator.as_deref() {
                Some(operator) => ctx.mentions("permission") && ctx.log_text.contains(operator),
                None => false,
            },
        }
    }
}

/// What makes a rule fire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Trigger {
    Scene(ExceptionScene),
    Predicate(Predicate),
}

/// One catalog entry
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Rule {
    pub id: &'static str,
    pub name: &'static str,
    pub trigger: Trigger,
    /// When the rule applies, for humans reading the catalog
    pub conditions: &'static [&'static str],
    pub root_cause: &'static str,
    pub code_check_point: &'static str,
    pub suggestion: &'static str,
    pub confidence: f64,
}

impl Rule {
    pub fn matches(&self, record: &ExceptionRecord, ctx: Option<&MatchContext<'_>>) -> bool {
        match (&self.trigger, ctx) {
            (Trigger::Scene(scene), _) => *scene == record.exception_scene,
            (Trigger::Predicate(predicate), Some(ctx)) => predicate.evaluate(record, ctx),
            (Trigger::Predicate(_), None) => false,
        }
    }

    pub fn to_diagnosis(&self) -> Diagnosis {
        Diagnosis::new(
            DiagnosisSource::Rule,
            self.root_cause,
            self.confidence,
            self.code_check_point,
            self.suggestion,
        )
        .with_rule(self.id, self.name)
    }
}

/// The catalog, in evaluation order
pub static RULES: &[Rule] = &[
    Rule {
        id: "rule1",
        name: "Field value wrong after node transition",
        trigger: Trigger::Scene(ExceptionScene::FieldValueError),
        conditions: &[
            "Target field name differs from source field name in the mapping",
            "Source value is correct, target value is wrong",
        ],
        root_cause: "Field name misconfigured in the data mapping",
        code_check_point: "src/flow/mapping.js:58",
        suggestion: "Check the exception node's field mapping and make sure target and source field names match",
        confidence: 0.95,
    },
    Rule {
        id: "rule2",
        name: "Required field missing",
        trigger: Trigger::Scene(ExceptionScene::FieldMissing),
        conditions: &[
            "Form data lacks a field the process engine requires",
            "The field is marked required in code",
        ],
        root_cause: "Form data is missing a required field: processInstanceId",
        code_check_point: "src/flow/mapping.js:97",
        suggestion: "Check the form submit logic and make sure processInstanceId is passed through",
        confidence: 0.90,
    },
    Rule {
        id: "rule3",
        name: "Field type mismatch",
        trigger: Trigger::Scene(ExceptionScene::FieldTypeError),
        conditions: &[
            "Configured field type does not match the value type",
            "Source value is a number, target field type is text",
        ],
        root_cause: "Field type misconfigured; converting text to number defaults to 0",
        code_check_point: "src/form/validate.js:163",
        suggestion: "Change the exception field's type to number and resubmit",
        confidence: 0.85,
    },
    Rule {
        id: "rule4",
        name: "Flow did not advance",
        trigger: Trigger::Scene(ExceptionScene::FlowNotProgress),
        conditions: &[
            "Process instance status did not change",
            "Form data was submitted but the flow never reached the next node",
        ],
        root_cause: "Current process status disagrees with the status carried in the form data",
        code_check_point: "src/rule/RuleEngine.js:456",
        suggestion: "Check the status transition logic and make status updates atomic",
        confidence: 0.80,
    },
    Rule {
        id: "rule5",
        name: "Node configuration error",
        trigger: Trigger::Scene(ExceptionScene::NodeConfigError),
        conditions: &[
            "A mapping referenced by the node configuration does not exist",
            "Target field is declared in the configuration but missing in practice",
        ],
        root_cause: "Mapping in the node configuration is wrong",
        code_check_point: "src/flow/mapping.js:86",
        suggestion: "Check the mappings in the node configuration and make sure the target field exists",
        confidence: 0.85,
    },
    Rule {
        id: "rule6",
        name: "Field shows 0 after submit",
        trigger: Trigger::Scene(ExceptionScene::FieldValueZero),
        conditions: &[
            "Exception field is configured as text",
            "User entered a numeric value",
        ],
        root_cause: "Field type misconfigured; converting text to number defaults to 0",
        code_check_point: "src/form/validate.js:163",
        suggestion: "Change the exception field's type to number and resubmit",
        confidence: 0.90,
    },
    Rule {
        id: "rule7",
        name: "Field mapping missing",
        trigger: Trigger::Scene(ExceptionScene::FieldMappingMissing),
        conditions: &[
            "Exception field has no mapping in the node configuration",
            "Source field exists but is not mapped",
        ],
        root_cause: "Node configuration lacks a field mapping",
        code_check_point: "src/flow/mapping.js:86",
        suggestion: "Add the missing field mapping to the node configuration",
        confidence: 0.85,
    },
    Rule {
        id: "rule8",
        name: "Process status error",
        trigger: Trigger::Scene(ExceptionScene::ProcessStatusError),
        conditions: &[
            "Process instance status differs from the expected one",
            "Process already ended but is still handling requests",
        ],
        root_cause: "Process status management is wrong",
        code_check_point: "src/flow/flowService.js:128",
        suggestion: "Check the status management logic and make sure status updates are applied correctly",
        confidence: 0.80,
    },
    Rule {
        id: "R001",
        name: "Node field mapping mismatch",
        trigger: Trigger::Predicate(Predicate::MappingMismatch),
        conditions: &[
            "Submitted value differs from echoed value",
            "Trace mentions a field mapping",
        ],
        root_cause: "Field mapping between process nodes is misconfigured, so data is passed on incorrectly",
        code_check_point: "src/flow/mapping.js:58 (mapNodeField)",
        suggestion: "1. Check the exception node's field mapping; 2. Confirm source and target field names match",
        confidence: 0.95,
    },
    Rule {
        id: "R002",
        name: "Field type conversion",
        trigger: Trigger::Predicate(Predicate::TypeConversion),
        conditions: &[
            "A number was submitted but 0 or empty was echoed",
            "Trace mentions a type conversion",
        ],
        root_cause: "Form field type misconfigured (numeric value stored in a text field), so type conversion fails",
        code_check_point: "src/form/validate.js:32 (convertFieldType)",
        suggestion: "1. Check the exception field's type configuration; 2. Change the field type to Number",
        confidence: 0.90,
    },
    Rule {
        id: "R003",
        name: "Operator permission filter",
        trigger: Trigger::Predicate(Predicate::PermissionFilter),
        conditions: &[
            "Trace mentions a permission check",
            "Trace mentions the operator",
        ],
        root_cause: "Operator lacks data access on this process node, so the data was filtered out",
        code_check_point: "src/permission/filter.js:18 (checkDataPermission)",
        suggestion: "1. Check the operator's role permissions; 2. Adjust the node's data permission configuration",
        confidence: 0.85,
    },
];

/// Evaluate the whole catalog; every matching rule is returned, in catalog order
pub fn match_rules(record: &ExceptionRecord, ctx: Option<&MatchContext<'_>>) -> Vec<Diagnosis> {
    RULES
        .iter()
        .filter(|rule| rule.matches(record, ctx))
        .map(Rule::to_diagnosis)
        .collect()
}

pub fn rule_by_id(id: &str) -> Option<&'static Rule> {
    RULES.iter().find(|rule| rule.id == id)
}

pub fn all_rules() -> &'static [Rule] {
    RULES
}
