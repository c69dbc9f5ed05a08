mod openai;

pub use openai::OpenAiClient;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

const BRIEF_TEMPERATURE: f32 = 0.3;
const BRIEF_MAX_TOKENS: u32 = 180;

const PROBE_PROMPT: &str = "Responda apenas: ok";
const PROBE_TEMPERATURE: f32 = 0.1;
const PROBE_MAX_TOKENS: u32 = 10;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}
impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// A single chat completion call, minus the model which the client fills in.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub messages: Vec<ChatMessage>,
    pub temperature: f32,
    pub max_tokens: u32,
}
impl CompletionRequest {
    /// Short informative reply to an end-user message.
    pub fn brief(system_prompt: &str, prompt: impl Into<String>) -> Self {
        Self {
            messages: vec![ChatMessage::system(system_prompt), ChatMessage::user(prompt)],
            temperature: BRIEF_TEMPERATURE,
            max_tokens: BRIEF_MAX_TOKENS,
        }
    }

    /// Minimal round-trip used to check the API is reachable and the credential works.
    pub fn probe() -> Self {
        Self {
            messages: vec![ChatMessage::user(PROBE_PROMPT)],
            temperature: PROBE_TEMPERATURE,
            max_tokens: PROBE_MAX_TOKENS,
        }
    }

    /// Content of the last user turn.
    pub fn user_content(&self) -> Option<&str> {
        self.messages
            .iter()
            .rev()
            .find(|message| message.role == "user")
            .map(|message| message.content.as_str())
    }
}

/// Body of an unsuccessful API response.
#[derive(Debug, Clone, PartialEq)]
pub enum ErrorBody {
    Json(serde_json::Value),
    Text(String),
}

#[derive(thiserror::Error, Debug)]
pub enum CompletionError {
    #[error("completion API credential missing")]
    MissingCredential,
    #[error("completion API responded with status {status}")]
    Status { status: u16, body: ErrorBody },
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("malformed completion response: {0}")]
    MalformedResponse(String),
}
impl CompletionError {
    /// Short tag used when logging failures.
    pub fn reason(&self) -> &'static str {
        match self {
            CompletionError::MissingCredential => "missing-credential",
            CompletionError::Status { .. } => "status",
            CompletionError::Network(_) => "network",
            CompletionError::MalformedResponse(_) => "malformed-response",
        }
    }
}

pub type CompletionResult = Result<String, CompletionError>;

#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Performs exactly one completion call, returning the trimmed text of the first choice.
    async fn complete(&self, request: CompletionRequest) -> CompletionResult;
}
