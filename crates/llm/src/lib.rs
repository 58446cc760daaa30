//! StepWorks chat-completion infrastructure adapter.
//!
//! Implements [`steps::ChatCompletion`] against an OpenAI-compatible
//! `/chat/completions` endpoint.
//!
//! ## Architectural Layer
//!
//! **Infrastructure.** All HTTP transport, request formatting, and response
//! parsing live here. The `steps` crate sees only the trait.

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use steps::{ChatCompletion, ChatHistory, ChatMessage, CompletionError};

/// Default API base; override with
/// [`with_base_url`](OpenAiChatCompletion::with_base_url) for compatible
/// gateways.
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Chat-completion client for OpenAI-compatible APIs.
pub struct OpenAiChatCompletion {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
}

impl OpenAiChatCompletion {
    /// Creates a client for the given key and model against the default API
    /// base.
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: api_key.into(),
            model: model.into(),
        }
    }

    /// Points the client at a different OpenAI-compatible base URL.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[async_trait]
impl ChatCompletion for OpenAiChatCompletion {
    async fn complete(&self, history: &ChatHistory) -> Result<String, CompletionError> {
        let request = CompletionRequest {
            model: &self.model,
            messages: history.messages(),
        };

        debug!(model = %self.model, messages = history.len(), "requesting completion");
        let response = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| CompletionError::Transport {
                message: e.to_string(),
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| CompletionError::Transport {
                message: e.to_string(),
            })?;

        if !status.is_success() {
            return Err(CompletionError::Api {
                status: status.as_u16(),
                body,
            });
        }

        extract_content(&body)
    }
}

/// Pulls `choices[0].message.content` out of a completion response body.
fn extract_content(body: &str) -> Result<String, CompletionError> {
    let value: Value =
        serde_json::from_str(body).map_err(|e| CompletionError::MalformedResponse {
            message: format!("response is not JSON: {e}"),
        })?;

    value
        .pointer("/choices/0/message/content")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| CompletionError::MalformedResponse {
            message: "response carries no choices[0].message.content".to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_the_first_choice() {
        let body = r#"{
            "choices": [
                {"message": {"role": "assistant", "content": "Hello there."}}
            ]
        }"#;
        assert_eq!(extract_content(body).unwrap(), "Hello there.");
    }

    #[test]
    fn rejects_a_choiceless_response() {
        let err = extract_content(r#"{"choices": []}"#).unwrap_err();
        assert!(matches!(err, CompletionError::MalformedResponse { .. }));
    }

    #[test]
    fn rejects_non_json() {
        let err = extract_content("upstream proxy error").unwrap_err();
        assert!(matches!(err, CompletionError::MalformedResponse { .. }));
    }
}
