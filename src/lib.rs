//! Flow Doctor library crate
//!
//! Diagnoses anomalies reported against business-process instances: a
//! report is normalized, matched against the static rule catalog, enriched
//! with trace logs and code locations, optionally sent to an LLM for a second
//! opinion, and reconciled into one graded result.

pub mod collab;
pub mod config;
pub mod diagnose;
pub mod engine;
pub mod error;
pub mod keyring;
pub mod record;
pub mod util;

pub use diagnose::{AnalysisResult, Diagnosis, DiagnosisSource, Severity};
pub use engine::{AnalysisOptions, DiagnosisEngine};
pub use error::{DiagnoseError, Result};
pub use record::{normalize, ExceptionRecord, ExceptionScene, RawReport};
