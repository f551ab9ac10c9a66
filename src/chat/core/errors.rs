//! Error types for the chat subsystem.

use std::path::PathBuf;

use thiserror::Error;

use crate::chat::core::ids::ConversationId;

/// Chat subsystem error type.
#[derive(Debug, Error)]
pub enum ChatError {
    /// The store document exists but could not be read or parsed.
    #[error("failed to read conversation store {}: {reason}", path.display())]
    StoreRead {
        /// Location of the store document.
        path: PathBuf,
        /// Underlying failure.
        reason: String,
    },
    /// The store document could not be written.
    #[error("failed to write conversation store {}: {reason}", path.display())]
    StoreWrite {
        /// Location of the store document.
        path: PathBuf,
        /// Underlying failure.
        reason: String,
    },
    /// The response generator failed.
    #[error("response generation failed: {0}")]
    Callback(String),
    /// The token counter failed.
    #[error("token counting failed: {0}")]
    TokenCount(String),
    /// No conversation with this id exists.
    #[error("conversation not found: {0}")]
    ConversationNotFound(ConversationId),
    /// Submitted text was empty or whitespace only.
    #[error("message must not be empty")]
    EmptyMessage,
    /// Invalid configuration or unsupported values.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// An import document failed validation.
    #[error("invalid import document: {0}")]
    InvalidImport(String),
    /// A conversation id could not be parsed.
    #[error("invalid conversation id: {0:?}")]
    InvalidId(String),
    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    /// URL parse error.
    #[error("url parse error: {0}")]
    Url(#[from] url::ParseError),
    /// I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl ChatError {
    /// Whether the session can keep running after this error.
    ///
    /// Store and hook failures degrade the session; everything else is a
    /// rejected request.
    #[must_use]
    pub const fn is_degraded(&self) -> bool {
        matches!(
            self,
            Self::StoreRead { .. } | Self::StoreWrite { .. } | Self::Callback(_) | Self::TokenCount(_)
        )
    }
}

/// Convenience result alias for chat operations.
pub type ChatResult<T> = Result<T, ChatError>;
