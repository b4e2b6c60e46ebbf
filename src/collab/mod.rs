//! Adapters for external collaborators: log store and source repository

pub mod locator;
pub mod logs;

pub use locator::{extract_keywords, CodeLocator, CodeRepository, LocalCodeSearch, StaticCodeMap, NO_MATCH};
pub use logs::{log_source, HttpLogStore, LogSource, LogStoreConfig, NoLogStore, SimulatedLogStore};
