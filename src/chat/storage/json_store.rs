//! Flat JSON document store for conversations.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing::{debug, warn};

use crate::chat::core::conversation::ConversationMap;
use crate::chat::core::errors::{ChatError, ChatResult};

/// Trait for whole-document conversation storage.
///
/// Every save overwrites the full document; there is no partial update path
/// and no locking. One writer per document is assumed.
pub trait ConversationStore: Send + Sync {
    /// Read every conversation.
    ///
    /// A missing document is an empty store, not an error.
    ///
    /// # Errors
    /// Returns [`ChatError::StoreRead`] if the document exists but is unreadable or malformed.
    fn load(&self) -> ChatResult<ConversationMap>;

    /// Replace the stored document with `conversations`.
    ///
    /// # Errors
    /// Returns [`ChatError::StoreWrite`] if the document cannot be written.
    fn save(&self, conversations: &ConversationMap) -> ChatResult<()>;

    /// Where the document lives, for logs and notices.
    fn location(&self) -> PathBuf;
}

/// JSON file implementation of conversation storage.
#[derive(Clone, Debug)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    /// Store backed by the document at `path`. Nothing is touched until the first load or save.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the backing document.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_error(&self, reason: impl ToString) -> ChatError {
        ChatError::StoreRead {
            path: self.path.clone(),
            reason: reason.to_string(),
        }
    }

    fn write_error(&self, reason: impl ToString) -> ChatError {
        ChatError::StoreWrite {
            path: self.path.clone(),
            reason: reason.to_string(),
        }
    }
}

impl ConversationStore for JsonFileStore {
    fn load(&self) -> ChatResult<ConversationMap> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!("No conversation store at {}, starting empty", self.path.display());
                return Ok(ConversationMap::new());
            }
            Err(err) => return Err(self.read_error(err)),
        };

        let parsed: ConversationMap =
            serde_json::from_str(&raw).map_err(|err| self.read_error(err))?;
        Ok(normalize_keys(parsed))
    }

    fn save(&self, conversations: &ConversationMap) -> ChatResult<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|err| self.write_error(err))?;
            }
        }

        let body = serde_json::to_string_pretty(conversations).map_err(|err| self.write_error(err))?;
        fs::write(&self.path, body).map_err(|err| self.write_error(err))?;
        debug!(
            "Saved {} conversations to {}",
            conversations.len(),
            self.path.display()
        );
        Ok(())
    }

    fn location(&self) -> PathBuf {
        self.path.clone()
    }
}

/// In-process store for tests and throwaway sessions.
#[derive(Debug, Default)]
pub struct MemoryStore {
    document: Mutex<ConversationMap>,
}

impl MemoryStore {
    /// Empty in-memory store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// In-memory store pre-filled with `conversations`.
    #[must_use]
    pub fn with_conversations(conversations: ConversationMap) -> Self {
        Self {
            document: Mutex::new(conversations),
        }
    }

    /// Copy of what was last saved.
    #[must_use]
    pub fn snapshot(&self) -> ConversationMap {
        self.document
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }
}

impl ConversationStore for MemoryStore {
    fn load(&self) -> ChatResult<ConversationMap> {
        self.document
            .lock()
            .map(|guard| guard.clone())
            .map_err(|err| ChatError::StoreRead {
                path: self.location(),
                reason: err.to_string(),
            })
    }

    fn save(&self, conversations: &ConversationMap) -> ChatResult<()> {
        let mut guard = self.document.lock().map_err(|err| ChatError::StoreWrite {
            path: self.location(),
            reason: err.to_string(),
        })?;
        guard.clone_from(conversations);
        Ok(())
    }

    fn location(&self) -> PathBuf {
        PathBuf::from(":memory:")
    }
}

/// The map key is authoritative; records whose `id` disagrees are re-keyed.
fn normalize_keys(conversations: ConversationMap) -> ConversationMap {
    conversations
        .into_iter()
        .map(|(key, mut conversation)| {
            if conversation.id != key {
                warn!(
                    "Conversation record {} stored under key {}, using the key",
                    conversation.id, key
                );
                conversation.id = key.clone();
            }
            (key, conversation)
        })
        .collect()
}
