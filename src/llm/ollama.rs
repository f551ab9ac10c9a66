//! Blocking Ollama chat client used as response and title generator.
//!
//! Requests go to `POST /api/chat` with `stream: false`. The HTTP client is
//! built with a connect timeout and an overall request timeout taken from
//! [`LlmConfig::timeout_secs`]; a generation that runs past it fails with
//! [`OllamaError::Http`] and the pipeline reports it like any other failure.

use std::time::Duration;

use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;
use url::Url;

use crate::chat::core::config::LlmConfig;
use crate::chat::core::message::Message;
use crate::chat::pipeline::hooks::{HookError, ResponseGenerator, TitleGenerator};

/// Default Ollama API endpoint.
pub const DEFAULT_OLLAMA_URL: &str = "http://127.0.0.1:11434";

/// Target context length (tokens).
const CONTEXT_LENGTH: u32 = 8_192;
/// Token budget for a reply.
const DEFAULT_NUM_PREDICT: u32 = 512;
/// Token budget for a title.
const TITLE_NUM_PREDICT: u32 = 24;
/// Default thread count if `available_parallelism()` is unavailable.
const DEFAULT_NUM_THREAD: u32 = 8;

/// Connect timeout.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Longest title kept, in characters.
const MAX_TITLE_CHARS: usize = 50;
/// How much of the first message is shown to the title prompt.
const TITLE_SOURCE_CHARS: usize = 200;

/// Errors produced by the Ollama client.
#[derive(Debug, Error)]
pub enum OllamaError {
    /// HTTP transport failure, timeouts included.
    #[error("ollama http client error: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-success HTTP status.
    #[error("ollama http status not ok: {0}")]
    Status(u16),

    /// Reply without a message body.
    #[error("ollama response malformed")]
    MalformedResponse,

    /// Base URL could not be parsed or joined.
    #[error("invalid ollama url: {0}")]
    Url(#[from] url::ParseError),
}

#[derive(Serialize)]
struct ChatOptions {
    num_ctx: u32,
    num_predict: u32,
    num_thread: u32,
}

#[derive(Serialize)]
struct WireMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
    stream: bool,
    keep_alive: &'a str,
    options: ChatOptions,
}

#[derive(Deserialize)]
struct ChatResponse {
    message: Option<ReplyMessage>,
}

#[derive(Deserialize)]
struct ReplyMessage {
    content: String,
}

/// Blocking client bound to one model.
#[derive(Clone, Debug)]
pub struct OllamaChat {
    client: Client,
    base_url: Url,
    model: String,
    keep_alive: String,
}

impl OllamaChat {
    /// Build a client from the `llm` section of the configuration.
    ///
    /// # Errors
    /// Returns an error if the base URL is invalid or the HTTP client cannot be built.
    pub fn from_config(config: &LlmConfig) -> Result<Self, OllamaError> {
        let mut base_url = Url::parse(config.base_url.as_deref().unwrap_or(DEFAULT_OLLAMA_URL))?;
        // `Url::join` replaces the last segment unless the path ends in '/'.
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            base_url,
            model: config.model.clone(),
            keep_alive: config.keep_alive.clone(),
        })
    }

    /// Model this client talks to.
    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Whether the server answers `GET /api/version`.
    ///
    /// # Errors
    /// Returns an error if the request cannot be sent.
    pub fn is_ready(&self) -> Result<bool, OllamaError> {
        let response = self.client.get(self.endpoint("api/version")?).send()?;
        Ok(response.status().is_success())
    }

    /// Send `messages` and return the assistant reply.
    ///
    /// # Errors
    /// Returns an error if the request fails, times out or the response is malformed.
    pub fn chat(&self, messages: &[Message]) -> Result<String, OllamaError> {
        self.post_chat(messages, DEFAULT_NUM_PREDICT)
    }

    fn post_chat(&self, messages: &[Message], num_predict: u32) -> Result<String, OllamaError> {
        let request = build_request(&self.model, &self.keep_alive, messages, num_predict);
        let response = self
            .client
            .post(self.endpoint("api/chat")?)
            .json(&request)
            .send()?;
        let status = response.status();
        if !status.is_success() {
            return Err(OllamaError::Status(status.as_u16()));
        }

        let body = response.json::<ChatResponse>()?;
        let reply = body.message.ok_or(OllamaError::MalformedResponse)?;
        debug!("Ollama replied with {} chars", reply.content.len());
        Ok(reply.content)
    }

    fn endpoint(&self, path: &str) -> Result<Url, OllamaError> {
        Ok(self.base_url.join(path)?)
    }
}

impl ResponseGenerator for OllamaChat {
    fn generate(&self, messages: &[Message]) -> Result<String, HookError> {
        Ok(self.chat(messages)?)
    }
}

impl TitleGenerator for OllamaChat {
    fn generate_title(&self, first_message: &str) -> Result<String, HookError> {
        let prompt = title_prompt(first_message);
        let raw = self.post_chat(&[Message::user(prompt)], TITLE_NUM_PREDICT)?;
        Ok(clean_title(&raw))
    }
}

fn build_request<'a>(
    model: &'a str,
    keep_alive: &'a str,
    messages: &'a [Message],
    num_predict: u32,
) -> ChatRequest<'a> {
    ChatRequest {
        model,
        messages: messages
            .iter()
            .map(|m| WireMessage {
                role: m.role.as_str(),
                content: &m.content,
            })
            .collect(),
        stream: false,
        keep_alive,
        options: ChatOptions {
            num_ctx: CONTEXT_LENGTH,
            num_predict,
            num_thread: detect_num_thread(),
        },
    }
}

fn title_prompt(first_message: &str) -> String {
    format!(
        r#"Generate a very short title (3-6 words maximum) for a conversation that starts with the message below.
Output ONLY the title, nothing else. No quotes, no punctuation at the end.
Do not use asterisks or any special formatting.

User: {}

Title:"#,
        first_message
            .chars()
            .take(TITLE_SOURCE_CHARS)
            .collect::<String>()
    )
}

/// Strip quoting and emphasis a model tends to wrap titles in, then cap the length.
#[must_use]
pub fn clean_title(raw: &str) -> String {
    raw.trim()
        .trim_matches('"')
        .trim_matches('*')
        .trim()
        .chars()
        .take(MAX_TITLE_CHARS)
        .collect()
}

fn detect_num_thread() -> u32 {
    std::thread::available_parallelism()
        .map(std::num::NonZeroUsize::get)
        .map_or(DEFAULT_NUM_THREAD, |v| u32::try_from(v).unwrap_or(u32::MAX))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_title() {
        assert_eq!(clean_title("  \"Rust borrow checker\"  "), "Rust borrow checker");
        assert_eq!(clean_title("**Weekend plans**\n"), "Weekend plans");
        assert_eq!(clean_title(&"x".repeat(80)).chars().count(), MAX_TITLE_CHARS);
    }

    #[test]
    fn test_request_body_shape() {
        let history = vec![Message::system("be brief"), Message::user("hi")];
        let request = build_request("m", "1h", &history, 7);
        let json = serde_json::to_value(&request).unwrap_or_default();

        assert_eq!(json["model"], "m");
        assert_eq!(json["stream"], false);
        assert_eq!(json["keep_alive"], "1h");
        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["messages"][1]["content"], "hi");
        assert_eq!(json["options"]["num_predict"], 7);
        assert_eq!(json["options"]["num_ctx"], CONTEXT_LENGTH);
    }

    #[test]
    fn test_endpoint_joins_base_url() {
        let config = LlmConfig {
            base_url: Some("http://10.0.0.5:19212".to_string()),
            ..LlmConfig::default()
        };
        let client = OllamaChat::from_config(&config).map_err(|e| e.to_string());
        let url = client.and_then(|c| c.endpoint("api/chat").map_err(|e| e.to_string()));
        assert_eq!(
            url.map(|u| u.to_string()).ok().as_deref(),
            Some("http://10.0.0.5:19212/api/chat")
        );
    }

    #[test]
    fn test_endpoint_keeps_base_path() {
        for base in ["http://host/ollama", "http://host/ollama/"] {
            let config = LlmConfig {
                base_url: Some(base.to_string()),
                ..LlmConfig::default()
            };
            let url = OllamaChat::from_config(&config)
                .map_err(|e| e.to_string())
                .and_then(|c| c.endpoint("api/chat").map_err(|e| e.to_string()));
            assert_eq!(
                url.map(|u| u.to_string()).ok().as_deref(),
                Some("http://host/ollama/api/chat")
            );
        }
    }

    #[test]
    fn test_unreachable_server_is_an_error() {
        let config = LlmConfig {
            base_url: Some("http://127.0.0.1:9".to_string()),
            timeout_secs: 2,
            ..LlmConfig::default()
        };
        let ready = OllamaChat::from_config(&config)
            .map_err(|e| e.to_string())
            .and_then(|c| c.is_ready().map_err(|e| e.to_string()));
        assert!(!ready.unwrap_or(false));
    }

    #[test]
    fn test_title_prompt_caps_source() {
        let prompt = title_prompt(&"y".repeat(500));
        assert!(prompt.contains(&"y".repeat(TITLE_SOURCE_CHARS)));
        assert!(!prompt.contains(&"y".repeat(TITLE_SOURCE_CHARS + 1)));
    }

    #[test]
    fn test_response_parse() {
        let body = r#"{"model":"m","message":{"role":"assistant","content":"Hello!"},"done":true}"#;
        let parsed: Result<ChatResponse, _> = serde_json::from_str(body);
        assert_eq!(
            parsed.ok().and_then(|r| r.message).map(|m| m.content).as_deref(),
            Some("Hello!")
        );
    }
}
