//! Text-generation service client.
//!
//! Every extraction stage goes through the [`ChatClient`] trait: one
//! blocking, non-streaming completion per stage. The production client
//! targets an OpenAI-compatible `/chat/completions` endpoint; tests use
//! [`MockChatClient`] with scripted replies.

use std::collections::VecDeque;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::AppConfig;

#[derive(Error, Debug)]
pub enum ChatError {
    #[error("Cannot reach text-generation service at {0}")]
    Connection(String),

    #[error("Request timed out after {0}s")]
    Timeout(u64),

    #[error("Text-generation service returned error (status {status}): {body}")]
    Service { status: u16, body: String },

    #[error("HTTP client error: {0}")]
    HttpClient(String),

    #[error("Response parsing error: {0}")]
    ResponseParsing(String),
}

/// Message role on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    System,
    User,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// One non-streaming completion request.
#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub messages: Vec<ChatMessage>,
    pub temperature: f32,
    pub max_tokens: Option<u32>,
}

/// Text-generation service abstraction (allows mocking).
pub trait ChatClient: Send + Sync {
    fn complete(&self, request: &ChatRequest) -> Result<String, ChatError>;
}

/// OpenAI-compatible chat client over blocking HTTP.
pub struct OpenAiChatClient {
    base_url: String,
    api_key: String,
    model: String,
    client: reqwest::blocking::Client,
    timeout_secs: u64,
}

impl OpenAiChatClient {
    pub fn new(config: &AppConfig) -> Self {
        let client = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_secs(config.request_timeout_secs))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            model: config.chat_model.clone(),
            client,
            timeout_secs: config.request_timeout_secs,
        }
    }
}

/// Request body for /chat/completions
#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    stream: bool,
}

#[derive(Serialize)]
struct WireMessage<'a> {
    role: &'a str,
    content: &'a str,
}

/// Response body from /chat/completions
#[derive(Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: String,
}

impl ChatClient for OpenAiChatClient {
    fn complete(&self, request: &ChatRequest) -> Result<String, ChatError> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = ChatCompletionRequest {
            model: &self.model,
            messages: request
                .messages
                .iter()
                .map(|m| WireMessage {
                    role: m.role.as_str(),
                    content: &m.content,
                })
                .collect(),
            temperature: request.temperature,
            max_tokens: request.max_tokens,
            stream: false,
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .map_err(|e| {
                if e.is_connect() {
                    ChatError::Connection(self.base_url.clone())
                } else if e.is_timeout() {
                    ChatError::Timeout(self.timeout_secs)
                } else {
                    ChatError::HttpClient(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(ChatError::Service {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: ChatCompletionResponse = response
            .json()
            .map_err(|e| ChatError::ResponseParsing(e.to_string()))?;

        parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| ChatError::ResponseParsing("response contained no choices".into()))
    }
}

/// Mock chat client for testing — replays scripted replies in order and
/// records every request it receives.
pub struct MockChatClient {
    replies: Mutex<VecDeque<String>>,
    failure: Option<String>,
    seen: Mutex<Vec<ChatRequest>>,
}

impl MockChatClient {
    /// A client that returns `reply` for its one scripted call.
    pub fn new(reply: &str) -> Self {
        Self::scripted(vec![reply.to_string()])
    }

    /// A client that replays `replies` in order, then errors when exhausted.
    pub fn scripted(replies: Vec<String>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            failure: None,
            seen: Mutex::new(Vec::new()),
        }
    }

    /// A client whose every call fails with `message`.
    pub fn failing(message: &str) -> Self {
        Self {
            replies: Mutex::new(VecDeque::new()),
            failure: Some(message.to_string()),
            seen: Mutex::new(Vec::new()),
        }
    }

    /// Requests observed so far, in call order.
    pub fn seen(&self) -> Vec<ChatRequest> {
        self.seen.lock().unwrap().clone()
    }
}

impl ChatClient for MockChatClient {
    fn complete(&self, request: &ChatRequest) -> Result<String, ChatError> {
        self.seen.lock().unwrap().push(request.clone());
        if let Some(message) = &self.failure {
            return Err(ChatError::HttpClient(message.clone()));
        }
        let mut replies = self.replies.lock().unwrap();
        replies
            .pop_front()
            .ok_or_else(|| ChatError::HttpClient("mock replies exhausted".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mock_client_returns_configured_reply() {
        let client = MockChatClient::new("hello");
        let request = ChatRequest {
            messages: vec![ChatMessage::system("prompt")],
            temperature: 0.2,
            max_tokens: None,
        };
        assert_eq!(client.complete(&request).unwrap(), "hello");
    }

    #[test]
    fn mock_client_replays_in_order_then_errors() {
        let client = MockChatClient::scripted(vec!["one".into(), "two".into()]);
        let request = ChatRequest {
            messages: vec![ChatMessage::user("q")],
            temperature: 0.3,
            max_tokens: Some(100),
        };
        assert_eq!(client.complete(&request).unwrap(), "one");
        assert_eq!(client.complete(&request).unwrap(), "two");
        assert!(client.complete(&request).is_err());
        assert_eq!(client.seen().len(), 3);
    }

    #[test]
    fn failing_client_reports_http_error() {
        let client = MockChatClient::failing("boom");
        let request = ChatRequest {
            messages: vec![ChatMessage::system("prompt")],
            temperature: 0.2,
            max_tokens: None,
        };
        assert!(matches!(
            client.complete(&request),
            Err(ChatError::HttpClient(msg)) if msg == "boom"
        ));
    }

    #[test]
    fn wire_request_omits_absent_max_tokens() {
        let body = ChatCompletionRequest {
            model: "gpt-4",
            messages: vec![WireMessage {
                role: "system",
                content: "p",
            }],
            temperature: 0.2,
            max_tokens: None,
            stream: false,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert!(json.get("max_tokens").is_none());
        assert_eq!(json["stream"], serde_json::json!(false));
    }

    #[test]
    fn wire_request_includes_max_tokens_when_set() {
        let body = ChatCompletionRequest {
            model: "gpt-4",
            messages: vec![],
            temperature: 0.3,
            max_tokens: Some(1000),
            stream: false,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["max_tokens"], serde_json::json!(1000));
    }

    #[test]
    fn openai_client_trims_trailing_slash() {
        let mut config = AppConfig::new("sk-test");
        config.api_base_url = "https://api.openai.com/v1/".to_string();
        let client = OpenAiChatClient::new(&config);
        assert_eq!(client.base_url, "https://api.openai.com/v1");
    }

    #[test]
    fn roles_serialize_to_wire_names() {
        assert_eq!(Role::System.as_str(), "system");
        assert_eq!(Role::User.as_str(), "user");
    }
}
