//! Configuration management for flowdoctor
//!
//! Stores settings in ~/.config/flowdoctor/config.json. Environment variables
//! override the file; the API key is looked up env → keychain → file.
//! The engine never reads any of this directly: it receives the resolved
//! [`AnalyzerConfig`] and [`LogStoreConfig`] values.

use crate::collab::logs::{LogStoreConfig, DEFAULT_LOG_TIMEOUT_SECS};
use crate::diagnose::llm::models::{
    AnalyzerConfig, DEFAULT_ENDPOINT, DEFAULT_MODEL, DEFAULT_TEMPERATURE, DEFAULT_TIMEOUT_SECS,
};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::warn;

pub const ENV_API_KEY: &str = "FLOWDOCTOR_LLM_API_KEY";
pub const ENV_ENDPOINT: &str = "FLOWDOCTOR_LLM_ENDPOINT";
pub const ENV_MODEL: &str = "FLOWDOCTOR_LLM_MODEL";
pub const ENV_LOG_URL: &str = "FLOWDOCTOR_LOG_URL";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmSettings {
    pub endpoint: String,
    pub model: String,
    pub temperature: f32,
    pub timeout_secs: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            model: DEFAULT_MODEL.to_string(),
            temperature: DEFAULT_TEMPERATURE,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            api_key: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogStoreSettings {
    pub base_url: Option<String>,
    pub timeout_secs: u64,
}

impl Default for LogStoreSettings {
    fn default() -> Self {
        Self {
            base_url: None,
            timeout_secs: DEFAULT_LOG_TIMEOUT_SECS,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub llm: LlmSettings,
    pub log_store: LogStoreSettings,
}

impl Config {
    /// Get the config directory path
    fn config_dir() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("flowdoctor"))
    }

    /// Get the config file path
    pub fn config_path() -> Option<PathBuf> {
        Self::config_dir().map(|p| p.join("config.json"))
    }

    /// Get the config file location for display
    pub fn config_location() -> String {
        Self::config_path()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "~/.config/flowdoctor/config.json".to_string())
    }

    /// Load config from disk, or return default
    pub fn load() -> Self {
        match Self::config_path() {
            Some(path) => Self::load_from(&path),
            None => Self::default(),
        }
    }

    /// Load from a specific file; a corrupt file is backed up and defaults used
    pub fn load_from(path: &Path) -> Self {
        let Ok(content) = fs::read_to_string(path) else {
            return Self::default();
        };
        match serde_json::from_str(&content) {
            Ok(config) => config,
            Err(err) => {
                preserve_corrupt_config(path, &content);
                warn!(
                    path = %path.display(),
                    error = %err,
                    "config file was corrupted; a backup was saved and defaults were loaded"
                );
                Self::default()
            }
        }
    }

    /// Effective configuration: file, then environment and keychain overrides
    pub fn resolve() -> Self {
        let mut config = Self::load();
        config.apply_overrides(|name| std::env::var(name).ok());
        config
    }

    /// Apply overrides from an environment lookup, then the keychain for the key
    pub fn apply_overrides(&mut self, env: impl Fn(&str) -> Option<String>) {
        let env = |name: &str| env(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        if let Some(endpoint) = env(ENV_ENDPOINT) {
            self.llm.endpoint = endpoint;
        }
        if let Some(model) = env(ENV_MODEL) {
            self.llm.model = model;
        }
        if let Some(url) = env(ENV_LOG_URL) {
            self.log_store.base_url = Some(url);
        }

        if let Some(key) = env(ENV_API_KEY) {
            self.llm.api_key = Some(key);
            return;
        }
        match crate::keyring::get_api_key() {
            Ok(Some(key)) => self.llm.api_key = Some(key),
            Ok(None) => {}
            Err(err) => {
                warn!(error = %err, "couldn't read API key from system keychain");
                warn!("set {} to bypass the keychain", ENV_API_KEY);
            }
        }
    }

    /// Save config to disk
    pub fn save(&self) -> Result<PathBuf> {
        let dir = Self::config_dir().context("Could not determine config directory")?;
        self.save_to(&dir.join("config.json"))
    }

    pub fn save_to(&self, path: &Path) -> Result<PathBuf> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).context("Failed to create config directory")?;
        }
        let content = serde_json::to_string_pretty(self).context("Failed to serialize config")?;
        write_config_atomic(path, &content).context("Failed to write config")?;
        Ok(path.to_path_buf())
    }

    /// Store the API key, preferring the keychain over the config file
    pub fn set_api_key(&mut self, key: &str) -> Result<String> {
        match crate::keyring::set_api_key(key) {
            Ok(()) => {
                if self.llm.api_key.take().is_some() {
                    self.save()?;
                }
                Ok("system keychain".to_string())
            }
            Err(err) => {
                warn!(error = %err, "keychain unavailable, storing API key in config file");
                self.llm.api_key = Some(key.to_string());
                let path = self.save()?;
                Ok(path.display().to_string())
            }
        }
    }

    pub fn analyzer_config(&self) -> AnalyzerConfig {
        AnalyzerConfig {
            endpoint: self.llm.endpoint.clone(),
            model: self.llm.model.clone(),
            temperature: self.llm.temperature,
            timeout: Duration::from_secs(self.llm.timeout_secs.max(1)),
            api_key: self.llm.api_key.clone(),
        }
    }

    pub fn log_store_config(&self) -> LogStoreConfig {
        LogStoreConfig {
            base_url: self.log_store.base_url.clone(),
            timeout: Duration::from_secs(self.log_store.timeout_secs.max(1)),
        }
    }

    /// Copy safe to print: the API key is masked
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        copy.llm.api_key = copy.llm.api_key.as_deref().map(mask_key);
        copy
    }
}

fn mask_key(key: &str) -> String {
    let count = key.chars().count();
    if count <= 8 {
        return "****".to_string();
    }
    let tail: String = key.chars().skip(count - 4).collect();
    format!("****{}", tail)
}

fn preserve_corrupt_config(path: &Path, content: &str) {
    let corrupt_path = path.with_extension("json.corrupt");
    if fs::rename(path, &corrupt_path).is_err() {
        let _ = fs::write(&corrupt_path, content);
    }
}

#[cfg(unix)]
fn write_config_atomic(path: &Path, content: &str) -> std::io::Result<()> {
    use std::fs::OpenOptions;
    use std::io::Write;
    use std::os::unix::fs::PermissionsExt;

    let tmp_path = path.with_extension("tmp");
    let mut file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(&tmp_path)?;

    if let Err(e) = file.set_permissions(fs::Permissions::from_mode(0o600)) {
        warn!(error = %e, "failed to set config file permissions");
    }

    file.write_all(content.as_bytes())?;

    if let Err(err) = fs::rename(&tmp_path, path) {
        let _ = fs::remove_file(&tmp_path);
        return Err(err);
    }
    Ok(())
}

#[cfg(not(unix))]
fn write_config_atomic(path: &Path, content: &str) -> std::io::Result<()> {
    fs::write(path, content)
}
