//! Chat-completion client for report generation. One request per report; no retries.

use log::warn;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::settings::LmSettings;

#[derive(Debug, Clone)]
pub struct LlmClient {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
    temperature: f64,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f64,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

impl LlmClient {
    pub fn new(lm: &LmSettings, api_key: &str, timeout: Duration) -> Result<Self, LlmError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: format!("{}/chat/completions", lm.base_url().trim_end_matches('/')),
            api_key: api_key.to_string(),
            model: lm.model_name().to_string(),
            temperature: lm.temperature,
            max_tokens: lm.max_tokens,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Send `prompt` as a single user message and return the reply text.
    pub async fn complete(&self, prompt: &str) -> Result<String, LlmError> {
        let body = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };

        let resp = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            warn!("chat completion http {}: {}", status, text.chars().take(300).collect::<String>());
            return Err(LlmError::Status(status));
        }

        let raw = resp.text().await?;
        extract_content(&raw)
    }
}

/// `choices[0].message.content` of a chat-completion response body.
pub fn extract_content(raw: &str) -> Result<String, LlmError> {
    let parsed: ChatResponse =
        serde_json::from_str(raw).map_err(|e| LlmError::MalformedResponse(e.to_string()))?;
    let content = parsed
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .ok_or_else(|| LlmError::MalformedResponse("no message content".to_string()))?;
    if content.trim().is_empty() {
        return Err(LlmError::MalformedResponse("empty message content".to_string()));
    }
    Ok(content)
}

#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("non-success status {0}")]
    Status(StatusCode),

    #[error("unexpected response: {0}")]
    MalformedResponse(String),

    #[error("could not serialize prompt payload: {0}")]
    Payload(#[from] serde_json::Error),
}
