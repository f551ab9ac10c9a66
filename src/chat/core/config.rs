//! Configuration for the chat front-end and its collaborators.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use url::Url;

use crate::chat::core::errors::{ChatError, ChatResult};

/// Environment variable overriding the store document path.
pub const STORE_PATH_ENV: &str = "CHATSHELF_STORE";
/// Environment variable overriding the Ollama base URL.
pub const OLLAMA_URL_ENV: &str = "CHATSHELF_OLLAMA_URL";
/// Environment variable overriding the completion model.
pub const MODEL_ENV: &str = "CHATSHELF_MODEL";

/// Top-level configuration.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    /// Presentation settings.
    pub display: DisplayConfig,
    /// History and truncation policy.
    pub history: HistoryConfig,
    /// Store location settings.
    pub storage: StorageConfig,
    /// Collaborator settings.
    pub llm: LlmConfig,
}

impl ChatConfig {
    /// Read a JSON config file. A missing file yields the defaults.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read, parsed or validated.
    pub fn load(path: &Path) -> ChatResult<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let raw = fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `CHATSHELF_*` environment overrides.
    #[must_use]
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary key lookup.
    #[must_use]
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(path) = lookup(STORE_PATH_ENV) {
            self.storage.path = PathBuf::from(path);
        }
        if let Some(url) = lookup(OLLAMA_URL_ENV) {
            self.llm.base_url = Some(url);
        }
        if let Some(model) = lookup(MODEL_ENV) {
            self.llm.model = model;
        }
        self
    }

    /// Validate configuration invariants.
    ///
    /// # Errors
    /// Returns an error if any values are out of range or invalid.
    pub fn validate(&self) -> ChatResult<()> {
        if self.display.max_title_length == 0 {
            return Err(ChatError::InvalidConfig(
                "display.max_title_length must be > 0".to_string(),
            ));
        }

        if self.history.max_history_tokens == Some(0) {
            return Err(ChatError::InvalidConfig(
                "history.max_history_tokens must be > 0 when set".to_string(),
            ));
        }

        if self.storage.path.as_os_str().is_empty() {
            return Err(ChatError::InvalidConfig(
                "storage.path must not be empty".to_string(),
            ));
        }

        if self.llm.timeout_secs == 0 {
            return Err(ChatError::InvalidConfig(
                "llm.timeout_secs must be > 0".to_string(),
            ));
        }

        if let Some(base_url) = &self.llm.base_url {
            Url::parse(base_url)?;
        }

        Ok(())
    }
}

/// Labels, colors and sidebar behaviour.
///
/// The terminal front end reads the header, byline, placeholder, spinner,
/// new-conversation label, edit and sidebar settings. `page_title` and the
/// two colors are carried unchanged for graphical front ends.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    /// Window or page title.
    pub page_title: String,
    /// Sidebar header.
    pub header_title: String,
    /// Small text under the header.
    pub byline_text: String,
    /// Label of the "new conversation" action.
    pub new_conversation_label: String,
    /// Input prompt placeholder.
    pub chat_placeholder: String,
    /// Shown while the generator runs.
    pub spinner_text: String,
    /// Accent color.
    pub primary_color: String,
    /// Hover color.
    pub hover_color: String,
    /// Group the sidebar by creation date.
    pub date_grouping: bool,
    /// Append token counts to sidebar titles when a counter exists.
    pub show_token_count: bool,
    /// Offer rename/delete menus in the sidebar.
    pub show_edit_options: bool,
    /// Titles longer than this many characters are cut in the sidebar.
    pub max_title_length: usize,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            page_title: "AI Chat".to_string(),
            header_title: "chatshelf".to_string(),
            byline_text: "Conversations kept on your shelf".to_string(),
            new_conversation_label: "+ New Chat".to_string(),
            chat_placeholder: "Ask me anything...".to_string(),
            spinner_text: "Thinking...".to_string(),
            primary_color: "#4f8bf9".to_string(),
            hover_color: "#f0f2f6".to_string(),
            date_grouping: true,
            show_token_count: true,
            show_edit_options: true,
            max_title_length: 25,
        }
    }
}

/// History forwarding policy.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    /// Token budget for history sent to the generator. `None` disables truncation.
    pub max_history_tokens: Option<usize>,
    /// Leading system message for new conversations.
    pub system_prompt: Option<String>,
}

/// Store location settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// JSON document holding every conversation.
    pub path: PathBuf,
    /// Directory receiving backups.
    pub backup_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("conversations.json"),
            backup_dir: PathBuf::from("backups"),
        }
    }
}

/// Response backend selector.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Backend {
    /// Local or remote Ollama server.
    Ollama,
    /// Repeat the user back; useful offline.
    Echo,
    /// No generator: record history only.
    None,
}

/// Token counter selector.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenCounterKind {
    /// One token per whitespace-separated word.
    Words,
    /// One token per four characters.
    Chars,
    /// No counter.
    None,
}

/// Collaborator settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Which response generator to install.
    pub backend: Backend,
    /// Ollama model name.
    pub model: String,
    /// Optional custom base URL.
    pub base_url: Option<String>,
    /// Ollama keep-alive hint.
    pub keep_alive: String,
    /// Upper bound for a single generation request.
    pub timeout_secs: u64,
    /// Generate titles with the backend instead of the default title.
    pub generate_titles: bool,
    /// Which token counter to install.
    pub token_counter: TokenCounterKind,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            backend: Backend::Ollama,
            model: "ministral-3:8b-instruct-2512-q8_0".to_string(),
            base_url: None,
            keep_alive: "1h".to_string(),
            timeout_secs: 120,
            generate_titles: true,
            token_counter: TokenCounterKind::Words,
        }
    }
}
