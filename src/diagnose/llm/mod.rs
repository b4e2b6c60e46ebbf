pub mod analysis;
pub mod client;
pub mod models;
pub mod parse;
pub mod prompts;

pub use analysis::{fallback_diagnosis, LlmAnalyzer};
pub use client::{ChatBackend, ChatReply, HttpChatClient};
pub use models::{AnalyzerConfig, ChatRequest, Message, Usage};
pub use parse::parse_diagnosis;
