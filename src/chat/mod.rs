//! Conversation history: storage, session state and the message pipeline.

pub mod core;
pub mod format;
pub mod pipeline;
pub mod repository;
pub mod session;
pub mod storage;

pub use self::core::{
    ChatConfig, ChatError, ChatResult, Conversation, ConversationId, ConversationMap, Message,
    Notice, NoticeLevel, Role,
};
pub use pipeline::{ChatHooks, Reply, ResponseGenerator, TitleGenerator, TokenCounter};
pub use repository::{ConversationRepository, ImportMode};
pub use session::{ChatSession, SessionEvent, SessionPhase, SessionSnapshot, SessionState};
pub use storage::{ConversationStore, JsonFileStore, MemoryStore};
