//! Core chat types and identifiers.

pub mod config;
pub mod conversation;
pub mod errors;
pub mod ids;
pub mod message;
pub mod notice;

pub use config::{
    Backend, ChatConfig, DisplayConfig, HistoryConfig, LlmConfig, StorageConfig,
    TokenCounterKind,
};
pub use conversation::{Conversation, ConversationMap, DEFAULT_TITLE};
pub use errors::{ChatError, ChatResult};
pub use ids::ConversationId;
pub use message::{Message, Role};
pub use notice::{Notice, NoticeLevel};
