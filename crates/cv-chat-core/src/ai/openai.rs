use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::DEFAULT_ENDPOINT;
use crate::state::ChatMessage;

/// Everything needed for one call to the chat completions endpoint
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub api_key: String,
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub max_tokens: u32,
    pub temperature: f32,
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum CompletionError {
    /// The endpoint answered with a non-success status
    #[error("{}", rejection_text(.status, .message))]
    Rejected { status: u16, message: Option<String> },
    /// The request never produced a response
    #[error("transport failure: {0}")]
    Transport(String),
    /// A success status with a body we could not read
    #[error("malformed response: {0}")]
    Malformed(String),
}

fn rejection_text(status: &u16, message: &Option<String>) -> String {
    match message {
        Some(message) => message.clone(),
        None => format!("Error {}", status),
    }
}

#[derive(Serialize)]
struct OpenAIRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    max_tokens: u32,
    temperature: f32,
}

#[derive(Deserialize)]
struct OpenAIChoice {
    message: Option<OpenAIResponseMessage>,
}

#[derive(Deserialize)]
struct OpenAIResponseMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct OpenAIResponse {
    #[serde(default)]
    choices: Vec<OpenAIChoice>,
}

#[derive(Deserialize)]
struct OpenAIErrorBody {
    error: Option<OpenAIErrorDetail>,
}

#[derive(Deserialize)]
struct OpenAIErrorDetail {
    message: Option<String>,
}

#[derive(Clone)]
pub struct OpenAIClient {
    client: Client,
    endpoint: String,
}

impl OpenAIClient {
    pub fn new() -> Self {
        Self::with_endpoint(DEFAULT_ENDPOINT)
    }

    pub fn with_endpoint(endpoint: &str) -> Self {
        Self {
            client: Client::new(),
            endpoint: endpoint.to_string(),
        }
    }

    /// Send the conversation and return the trimmed reply.
    /// `Ok(None)` means the endpoint succeeded but produced no text.
    pub async fn complete(&self, request: &CompletionRequest) -> Result<Option<String>, CompletionError> {
        let body = OpenAIRequest {
            model: &request.model,
            messages: &request.messages,
            max_tokens: request.max_tokens,
            temperature: request.temperature,
        };

        debug!(model = %request.model, messages = request.messages.len(), "sending completion request");

        let response = self.client
            .post(&self.endpoint)
            .header("Authorization", format!("Bearer {}", request.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| CompletionError::Transport(e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| CompletionError::Transport(e.to_string()))?;

        if !status.is_success() {
            warn!(status = status.as_u16(), "completion request rejected");
            return Err(rejection(status, &text));
        }

        parse_reply(&text)
    }
}

impl Default for OpenAIClient {
    fn default() -> Self {
        Self::new()
    }
}

/// Build the error for a non-success response, using `error.message` from
/// the body when it is there.
pub fn rejection(status: StatusCode, body: &str) -> CompletionError {
    let message = serde_json::from_str::<OpenAIErrorBody>(body)
        .ok()
        .and_then(|b| b.error)
        .and_then(|e| e.message)
        .filter(|m| !m.is_empty());

    CompletionError::Rejected {
        status: status.as_u16(),
        message,
    }
}

/// Pull `choices[0].message.content` out of a success body.
pub fn parse_reply(body: &str) -> Result<Option<String>, CompletionError> {
    let response: OpenAIResponse = serde_json::from_str(body)
        .map_err(|e| CompletionError::Malformed(e.to_string()))?;

    Ok(response.choices
        .into_iter()
        .next()
        .and_then(|c| c.message)
        .and_then(|m| m.content)
        .map(|content| content.trim().to_string())
        .filter(|content| !content.is_empty()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::ChatRole;

    #[test]
    fn test_parse_reply_reads_first_choice() {
        let body = r#"{
            "id": "chatcmpl-1",
            "choices": [
                {"index": 0, "message": {"role": "assistant", "content": "  TechCorp GmbH, StartupXYZ, WebAgency Berlin\n"}},
                {"index": 1, "message": {"role": "assistant", "content": "ignored"}}
            ]
        }"#;

        assert_eq!(
            parse_reply(body).unwrap().as_deref(),
            Some("TechCorp GmbH, StartupXYZ, WebAgency Berlin")
        );
    }

    #[test]
    fn test_parse_reply_empty_or_missing_content() {
        assert_eq!(parse_reply(r#"{"choices": []}"#).unwrap(), None);
        assert_eq!(parse_reply(r#"{}"#).unwrap(), None);
        assert_eq!(parse_reply(r#"{"choices": [{"message": {"content": null}}]}"#).unwrap(), None);
        assert_eq!(parse_reply(r#"{"choices": [{"message": {"content": "   "}}]}"#).unwrap(), None);
    }

    #[test]
    fn test_parse_reply_malformed_body() {
        assert!(matches!(parse_reply("<html>"), Err(CompletionError::Malformed(_))));
    }

    #[test]
    fn test_rejection_uses_remote_message() {
        let err = rejection(
            StatusCode::UNAUTHORIZED,
            r#"{"error": {"message": "Invalid API key", "type": "invalid_request_error"}}"#,
        );

        assert_eq!(
            err,
            CompletionError::Rejected { status: 401, message: Some("Invalid API key".to_string()) }
        );
        assert_eq!(err.to_string(), "Invalid API key");
    }

    #[test]
    fn test_rejection_falls_back_to_status() {
        let err = rejection(StatusCode::BAD_GATEWAY, "upstream exploded");
        assert_eq!(err, CompletionError::Rejected { status: 502, message: None });
        assert_eq!(err.to_string(), "Error 502");

        let err = rejection(StatusCode::TOO_MANY_REQUESTS, r#"{"error": {}}"#);
        assert_eq!(err.to_string(), "Error 429");
    }

    #[test]
    fn test_request_body_shape() {
        let messages = vec![
            ChatMessage::new(ChatRole::System, "bio"),
            ChatMessage::new(ChatRole::User, "hi"),
        ];
        let body = OpenAIRequest {
            model: "gpt-4o-mini",
            messages: &messages,
            max_tokens: 300,
            temperature: 0.5,
        };

        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "model": "gpt-4o-mini",
                "messages": [
                    {"role": "system", "content": "bio"},
                    {"role": "user", "content": "hi"}
                ],
                "max_tokens": 300,
                "temperature": 0.5
            })
        );
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_transport_error() {
        // Nothing listens on port 9 of the loopback interface
        let client = OpenAIClient::with_endpoint("http://127.0.0.1:9/v1/chat/completions");
        let request = CompletionRequest {
            api_key: "sk-test".to_string(),
            model: "gpt-4o-mini".to_string(),
            messages: vec![ChatMessage::new(ChatRole::User, "hi")],
            max_tokens: 300,
            temperature: 0.7,
        };

        let result = client.complete(&request).await;
        assert!(matches!(result, Err(CompletionError::Transport(_))));
    }
}
