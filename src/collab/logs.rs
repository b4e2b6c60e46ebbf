//! Log retrieval
//!
//! Fetches the full trace of a process instance from a log store. Failures
//! are reported as `LogUnavailable`; the engine decides how to degrade.

use crate::error::{DiagnoseError, Result};
use crate::util::truncate;
use async_trait::async_trait;
use chrono::Local;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

pub const DEFAULT_LOG_TIMEOUT_SECS: u64 = 10;

/// Source of trace logs for process instances
#[async_trait]
pub trait LogSource: Send + Sync {
    async fn fetch_log(&self, instance_id: &str) -> Result<String>;
}

/// Log store connection settings
#[derive(Debug, Clone, PartialEq)]
pub struct LogStoreConfig {
    pub base_url: Option<String>,
    pub timeout: Duration,
}

impl Default for LogStoreConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            timeout: Duration::from_secs(DEFAULT_LOG_TIMEOUT_SECS),
        }
    }
}

/// `GET {base_url}/instances/{id}/log`, body is the plain log text
pub struct HttpLogStore {
    http: reqwest::Client,
    base_url: Url,
}

impl HttpLogStore {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let base_url = Url::parse(base_url).map_err(|e| {
            DiagnoseError::LogUnavailable(format!("invalid log store url `{}`: {}", base_url, e))
        })?;
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| DiagnoseError::LogUnavailable(e.to_string()))?;
        Ok(Self { http, base_url })
    }

    fn log_url(&self, instance_id: &str) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| {
                DiagnoseError::LogUnavailable(format!(
                    "log store url `{}` cannot take a path",
                    self.base_url
                ))
            })?
            .pop_if_empty()
            .extend(["instances", instance_id, "log"]);
        Ok(url)
    }
}

#[async_trait]
impl LogSource for HttpLogStore {
    async fn fetch_log(&self, instance_id: &str) -> Result<String> {
        let url = self.log_url(instance_id)?;
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| DiagnoseError::LogUnavailable(format!("transport error: {}", e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| DiagnoseError::LogUnavailable(format!("transport error: {}", e)))?;

        if !status.is_success() {
            return Err(DiagnoseError::LogUnavailable(format!(
                "log store returned {}: {}",
                status,
                truncate(&body, 200)
            )));
        }
        Ok(body)
    }
}

/// Canned trace for demos and offline runs
pub struct SimulatedLogStore;

#[async_trait]
impl LogSource for SimulatedLogStore {
    async fn fetch_log(&self, instance_id: &str) -> Result<String> {
        let now = Local::now().format("%Y-%m-%d %H:%M:%S");
        Ok(format!(
            "[{now}] instanceId:{instance_id} - mapping field travel_days → days error;\n\
             [{now}] submitData: {{travel_days:3}} → echoData: {{days:1}};\n\
             [{now}] mapNodeField failed: target field is undefined"
        ))
    }
}

/// No log store configured
pub struct NoLogStore;

#[async_trait]
impl LogSource for NoLogStore {
    async fn fetch_log(&self, _instance_id: &str) -> Result<String> {
        Err(DiagnoseError::LogUnavailable(
            "no log store configured".to_string(),
        ))
    }
}

/// Pick the log source for a run
pub fn log_source(config: &LogStoreConfig, simulate: bool) -> Result<Arc<dyn LogSource>> {
    if simulate {
        return Ok(Arc::new(SimulatedLogStore) as Arc<dyn LogSource>);
    }
    match config.base_url.as_deref().map(str::trim).filter(|u| !u.is_empty()) {
        Some(url) => Ok(Arc::new(HttpLogStore::new(url, config.timeout)?) as Arc<dyn LogSource>),
        None => Ok(Arc::new(NoLogStore) as Arc<dyn LogSource>),
    }
}
