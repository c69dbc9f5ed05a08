use crate::completion::{
    ChatMessage, CompletionClient, CompletionError, CompletionRequest, CompletionResult, ErrorBody,
};
use crate::config::CompletionConfig;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

#[derive(Serialize)]
struct ChatCompletionBody<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
    max_tokens: u32,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatCompletionChoice>,
}

#[derive(Deserialize)]
struct ChatCompletionChoice {
    message: ChatMessage,
}

/// Chat completion client for the OpenAI API (or anything speaking the same wire format).
#[derive(Clone)]
pub struct OpenAiClient {
    endpoint: String,
    model: String,
    api_key: Option<String>,
    timeout: Duration,
}
impl OpenAiClient {
    pub fn new(config: &CompletionConfig) -> Self {
        Self {
            endpoint: config.endpoint.clone(),
            model: config.model.clone(),
            api_key: config.api_key.clone(),
            timeout: config.timeout(),
        }
    }

    async fn send(&self, api_key: &str, request: &CompletionRequest) -> CompletionResult {
        let body = ChatCompletionBody {
            model: &self.model,
            messages: &request.messages,
            temperature: request.temperature,
            max_tokens: request.max_tokens,
        };

        // Each call gets its own client, nothing is pooled across requests.
        let http_client = Client::builder().timeout(self.timeout).build()?;

        debug!("Sending completion request to {}", self.endpoint);
        let response = http_client
            .post(&self.endpoint)
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await?;
            let body = match serde_json::from_str(&text) {
                Ok(json) => ErrorBody::Json(json),
                Err(_) => ErrorBody::Text(text),
            };
            return Err(CompletionError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let bytes = response.bytes().await?;
        let completion: ChatCompletionResponse = serde_json::from_slice(&bytes)
            .map_err(|e| CompletionError::MalformedResponse(e.to_string()))?;

        completion
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content.trim().to_string())
            .ok_or_else(|| CompletionError::MalformedResponse("no choices in response".to_string()))
    }
}

#[async_trait]
impl CompletionClient for OpenAiClient {
    async fn complete(&self, request: CompletionRequest) -> CompletionResult {
        // Fail before touching the network when no credential was configured.
        let api_key = self
            .api_key
            .as_deref()
            .ok_or(CompletionError::MissingCredential)?;

        self.send(api_key, &request).await
    }
}
