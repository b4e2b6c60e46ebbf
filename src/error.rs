//! Error taxonomy for the diagnosis pipeline
//!
//! Only input errors (`Validation`, `MalformedPayload`) abort an analysis.
//! The collaborator errors are recovered inside the engine and surface as
//! degraded-mode markers on the result instead.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, DiagnoseError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DiagnoseError {
    /// A required report field is missing, blank, or outside its catalog
    #[error("invalid field `{field}`: {reason}")]
    Validation { field: &'static str, reason: String },

    /// An embedded payload could not be parsed as a JSON object
    #[error("field `{field}` is not a valid JSON object: {raw_text}")]
    MalformedPayload { field: &'static str, raw_text: String },

    /// The log store could not be reached or refused the request
    #[error("log unavailable: {0}")]
    LogUnavailable(String),

    /// The generative-model analyzer could not produce a usable diagnosis
    #[error("analyzer unavailable: {0}")]
    AnalyzerUnavailable(String),
}

impl DiagnoseError {
    pub fn missing(field: &'static str) -> Self {
        DiagnoseError::Validation {
            field,
            reason: "required field is missing".to_string(),
        }
    }

    /// Name of the offending input field, for input errors
    pub fn field(&self) -> Option<&'static str> {
        match self {
            DiagnoseError::Validation { field, .. }
            | DiagnoseError::MalformedPayload { field, .. } => Some(*field),
            _ => None,
        }
    }

    /// Whether this error aborts the pipeline rather than degrading it
    pub fn is_input_error(&self) -> bool {
        self.field().is_some()
    }
}
