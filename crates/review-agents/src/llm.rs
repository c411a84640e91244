//! LLM collaborator for reviewers.
//!
//! Reviewers talk to a model through [`ChatClient`], so tests can swap in a
//! mock and the orchestrator never sees network errors. The production
//! client speaks the OpenAI-compatible `/chat/completions` protocol.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::config::LlmEndpoint;

/// Errors from the chat collaborator.
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("API request failed: {0}")]
    RequestFailed(String),

    #[error("API key not configured for {0}")]
    MissingApiKey(String),

    #[error("Response parse error: {0}")]
    ParseError(String),

    #[error("Model returned an empty response")]
    EmptyResponse,
}

/// Speaker of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

/// One message of a chat completion request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }
}

/// A chat model a reviewer can consult.
#[async_trait]
pub trait ChatClient: Send + Sync {
    /// Send `messages` and return the reply text.
    async fn chat(&self, messages: &[ChatMessage]) -> Result<String, LlmError>;
}

/// Client for any OpenAI-compatible `/chat/completions` endpoint.
pub struct OpenAiChatClient {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
    temperature: f32,
    max_tokens: u32,
}

impl OpenAiChatClient {
    pub fn new(endpoint: &LlmEndpoint) -> Result<Self, LlmError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(endpoint.timeout_secs))
            .build()
            .map_err(|e| LlmError::RequestFailed(e.to_string()))?;

        Ok(Self {
            client,
            base_url: endpoint.url.trim_end_matches('/').to_string(),
            api_key: endpoint.api_key.clone(),
            model: endpoint.model.clone(),
            temperature: endpoint.temperature,
            max_tokens: endpoint.max_tokens,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl ChatClient for OpenAiChatClient {
    async fn chat(&self, messages: &[ChatMessage]) -> Result<String, LlmError> {
        let request_body = serde_json::json!({
            "model": self.model,
            "messages": messages,
            "max_tokens": self.max_tokens,
            "temperature": self.temperature,
        });

        let mut request = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Content-Type", "application/json")
            .json(&request_body);
        if let Some(key) = &self.api_key {
            request = request.header("Authorization", format!("Bearer {}", key));
        }

        let response = request
            .send()
            .await
            .map_err(|e| LlmError::RequestFailed(e.to_string()))?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED && self.api_key.is_none() {
            return Err(LlmError::MissingApiKey(self.model.clone()));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::RequestFailed(format!(
                "chat API error ({}): {}",
                status, body
            )));
        }

        let resp_json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| LlmError::ParseError(e.to_string()))?;

        let content = resp_json["choices"][0]["message"]["content"]
            .as_str()
            .unwrap_or("")
            .trim()
            .to_string();
        debug!(model = %self.model, chars = content.len(), "Chat completion received");

        if content.is_empty() {
            return Err(LlmError::EmptyResponse);
        }
        Ok(content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_wire_form() {
        let json = serde_json::to_value(ChatMessage::system("be strict")).unwrap();
        assert_eq!(json["role"], "system");
        assert_eq!(json["content"], "be strict");
        let json = serde_json::to_value(ChatMessage::user("review this")).unwrap();
        assert_eq!(json["role"], "user");
    }

    #[test]
    fn test_client_trims_base_url() {
        let endpoint = LlmEndpoint {
            url: "http://localhost:8080/v1/".to_string(),
            ..LlmEndpoint::default()
        };
        let client = OpenAiChatClient::new(&endpoint).unwrap();
        assert_eq!(client.base_url, "http://localhost:8080/v1");
        assert_eq!(client.model(), endpoint.model);
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_request_failure() {
        let endpoint = LlmEndpoint {
            url: "http://127.0.0.1:9".to_string(),
            timeout_secs: 2,
            ..LlmEndpoint::default()
        };
        let client = OpenAiChatClient::new(&endpoint).unwrap();
        let err = client
            .chat(&[ChatMessage::user("hello")])
            .await
            .unwrap_err();
        assert!(matches!(err, LlmError::RequestFailed(_)));
    }
}
