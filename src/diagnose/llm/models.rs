use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default OpenAI-compatible chat completions endpoint
pub const DEFAULT_ENDPOINT: &str = "https://api.openai.com/v1/chat/completions";
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_TEMPERATURE: f32 = 0.2;
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
/// Literal shipped in sample configs; treated as "no key"
pub const PLACEHOLDER_API_KEY: &str = "sk-your-api-key-here";

/// Everything the analyzer needs to reach the model, passed in explicitly
#[derive(Debug, Clone, PartialEq)]
pub struct AnalyzerConfig {
    pub endpoint: String,
    pub model: String,
    pub temperature: f32,
    pub timeout: Duration,
    pub api_key: Option<String>,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            model: DEFAULT_MODEL.to_string(),
            temperature: DEFAULT_TEMPERATURE,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            api_key: None,
        }
    }
}

impl AnalyzerConfig {
    /// The usable API key, if one is configured
    pub fn api_key(&self) -> Option<&str> {
        self.api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty() && *key != PLACEHOLDER_API_KEY)
    }

    pub fn is_configured(&self) -> bool {
        self.api_key().is_some()
    }
}

/// Chat completion request body
#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<Message>,
    pub temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_format: Option<ResponseFormat>,
}

impl ChatRequest {
    /// System + user request asking for a JSON object reply
    pub fn json(config: &AnalyzerConfig, system: &str, user: &str) -> Self {
        Self {
            model: config.model.clone(),
            messages: vec![Message::new("system", system), Message::new("user", user)],
            temperature: config.temperature,
            response_format: Some(ResponseFormat {
                format_type: "json_object".to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ResponseFormat {
    #[serde(rename = "type")]
    pub format_type: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Message {
    pub role: String,
    pub content: String,
}

impl Message {
    pub fn new(role: &str, content: &str) -> Self {
        Self {
            role: role.to_string(),
            content: content.to_string(),
        }
    }
}

/// API usage information
#[derive(Deserialize, Clone, Debug, Default)]
pub struct Usage {
    #[serde(default)]
    pub prompt_tokens: u32,
    #[serde(default)]
    pub completion_tokens: u32,
    #[serde(default)]
    pub total_tokens: u32,
}
