use super::models::{ChatRequest, Usage};
use crate::error::{DiagnoseError, Result};
use crate::util::truncate;
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

/// Response from the model including content and usage stats
#[derive(Debug, Clone)]
pub struct ChatReply {
    pub content: String,
    pub usage: Option<Usage>,
    pub model: String,
}

/// Anything that can answer a chat completion request
#[async_trait]
pub trait ChatBackend: Send + Sync {
    async fn complete(&self, request: &ChatRequest) -> Result<ChatReply>;
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
    usage: Option<Usage>,
    model: Option<String>,
}

#[derive(Deserialize)]
struct Choice {
    message: MessageContent,
}

#[derive(Deserialize)]
struct MessageContent {
    #[serde(default)]
    content: Option<String>,
}

/// Rate limit retry configuration
const MAX_RETRIES: u32 = 2;
const INITIAL_BACKOFF_MS: u64 = 1000;
const BACKOFF_MULTIPLIER: u64 = 2;

/// Extract a retry-after hint from an error body ("retry after 3 seconds")
fn parse_retry_after(text: &str) -> Option<u64> {
    let text_lower = text.to_lowercase();
    let pos = text_lower.find("retry")?;
    let after_retry = &text_lower[pos..];
    for word in after_retry.split_whitespace().skip(1).take(5) {
        if let Ok(secs) = word
            .trim_matches(|c: char| !c.is_numeric())
            .parse::<u64>()
        {
            if secs > 0 && secs < 60 {
                return Some(secs);
            }
        }
    }
    None
}

/// OpenAI-compatible chat completions over HTTP
pub struct HttpChatClient {
    http: reqwest::Client,
    endpoint: Url,
    api_key: String,
}

impl HttpChatClient {
    pub fn new(endpoint: &str, api_key: impl Into<String>, timeout: Duration) -> Result<Self> {
        let endpoint = Url::parse(endpoint).map_err(|e| {
            DiagnoseError::AnalyzerUnavailable(format!("invalid endpoint `{}`: {}", endpoint, e))
        })?;
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| DiagnoseError::AnalyzerUnavailable(e.to_string()))?;
        Ok(Self {
            http,
            endpoint,
            api_key: api_key.into(),
        })
    }
}

#[async_trait]
impl ChatBackend for HttpChatClient {
    /// Includes automatic retry with exponential backoff for rate limits
    async fn complete(&self, request: &ChatRequest) -> Result<ChatReply> {
        let mut retry_count = 0;

        loop {
            let response = self
                .http
                .post(self.endpoint.clone())
                .header("Content-Type", "application/json")
                .bearer_auth(&self.api_key)
                .json(request)
                .send()
                .await
                .map_err(|e| DiagnoseError::AnalyzerUnavailable(format!("transport error: {}", e)))?;

            let status = response.status();
            let text = response
                .text()
                .await
                .map_err(|e| DiagnoseError::AnalyzerUnavailable(format!("transport error: {}", e)))?;

            if status.is_success() {
                let parsed: ChatResponse = serde_json::from_str(&text).map_err(|e| {
                    DiagnoseError::AnalyzerUnavailable(format!(
                        "unexpected completion body ({}): {}",
                        e,
                        truncate(&text, 200)
                    ))
                })?;

                let content = parsed
                    .choices
                    .into_iter()
                    .next()
                    .and_then(|c| c.message.content)
                    .unwrap_or_default();

                if let Some(usage) = &parsed.usage {
                    debug!(
                        prompt_tokens = usage.prompt_tokens,
                        completion_tokens = usage.completion_tokens,
                        "model call finished"
                    );
                }

                return Ok(ChatReply {
                    content,
                    usage: parsed.usage,
                    model: parsed.model.unwrap_or_else(|| request.model.clone()),
                });
            }

            if status.as_u16() == 429 && retry_count < MAX_RETRIES {
                retry_count += 1;
                let retry_after = parse_retry_after(&text).unwrap_or_else(|| {
                    (INITIAL_BACKOFF_MS * BACKOFF_MULTIPLIER.pow(retry_count - 1)) / 1000
                });
                warn!(
                    retry_after_secs = retry_after,
                    attempt = retry_count,
                    max = MAX_RETRIES,
                    "model endpoint rate limited, retrying"
                );
                tokio::time::sleep(Duration::from_secs(retry_after)).await;
                continue;
            }

            let message = match status.as_u16() {
                401 | 403 => "API key rejected by the model endpoint".to_string(),
                429 => format!("rate limited after {} retries", retry_count),
                500..=599 => format!("model endpoint server error ({})", status),
                _ => format!("API error {}: {}", status, truncate(&text, 200)),
            };
            return Err(DiagnoseError::AnalyzerUnavailable(message));
        }
    }
}
