use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::LlmConfig;
use crate::error::ChatError;

/// Client for the OpenAI-compatible `/v1/chat/completions` endpoint.
///
/// Every failure kind is returned as a [`ChatError`] value — never a panic,
/// and never a placeholder string masquerading as a model answer. Callers at
/// the pipeline/agent boundary decide how to render failures.
pub struct ChatClient {
    client: reqwest::Client,
    config: LlmConfig,
}

#[derive(Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<Message>,
}

#[derive(Serialize)]
struct Message {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

impl ChatClient {
    pub fn new(client: reqwest::Client, config: LlmConfig) -> Self {
        Self { client, config }
    }

    /// Single-shot chat completion bounded by the configured request
    /// timeout.
    pub async fn chat(&self, system_prompt: &str, user_message: &str) -> Result<String, ChatError> {
        let api_key = self
            .config
            .api_key
            .as_deref()
            .ok_or(ChatError::MissingApiKey)?;

        let url = format!("{}/v1/chat/completions", self.config.base_url);
        let req = ChatCompletionRequest {
            model: self.config.chat_model.clone(),
            messages: vec![
                Message {
                    role: "system".to_string(),
                    content: system_prompt.to_string(),
                },
                Message {
                    role: "user".to_string(),
                    content: user_message.to_string(),
                },
            ],
        };

        let resp = self
            .client
            .post(&url)
            .timeout(Duration::from_secs(self.config.request_timeout_secs))
            .header("Authorization", format!("Bearer {api_key}"))
            .json(&req)
            .send()
            .await
            .map_err(classify_request_error)?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(ChatError::Status { status, body });
        }

        let body = resp
            .text()
            .await
            .map_err(|e| ChatError::Network(e.to_string()))?;
        parse_chat_body(&body)
    }
}

fn classify_request_error(e: reqwest::Error) -> ChatError {
    if e.is_timeout() {
        ChatError::Timeout
    } else {
        ChatError::Network(e.to_string())
    }
}

/// Extract the assistant message from a chat-completions response body.
fn parse_chat_body(body: &str) -> Result<String, ChatError> {
    let parsed: ChatCompletionResponse = serde_json::from_str(body)
        .map_err(|e| ChatError::MalformedResponse(e.to_string()))?;

    parsed
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .ok_or_else(|| ChatError::MalformedResponse("no choices in response".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid_body() {
        let body = r#"{"choices":[{"message":{"role":"assistant","content":"hello there"}}]}"#;
        assert_eq!(parse_chat_body(body).unwrap(), "hello there");
    }

    #[test]
    fn test_parse_body_without_choices() {
        let body = r#"{"choices":[]}"#;
        assert!(matches!(
            parse_chat_body(body),
            Err(ChatError::MalformedResponse(_))
        ));
    }

    #[test]
    fn test_parse_body_with_null_content() {
        let body = r#"{"choices":[{"message":{"role":"assistant","content":null}}]}"#;
        assert!(matches!(
            parse_chat_body(body),
            Err(ChatError::MalformedResponse(_))
        ));
    }

    #[test]
    fn test_parse_invalid_json() {
        assert!(matches!(
            parse_chat_body("not json {{"),
            Err(ChatError::MalformedResponse(_))
        ));
    }

    #[tokio::test]
    async fn test_chat_without_api_key_fails_as_value() {
        let client = ChatClient::new(reqwest::Client::new(), LlmConfig::default());
        let err = client.chat("system", "hi").await.unwrap_err();
        assert!(matches!(err, ChatError::MissingApiKey));
        // The conversion to a placeholder happens at the caller, not here.
        assert!(err.user_message().contains("placeholder"));
    }
}
