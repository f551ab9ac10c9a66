//! Persistence of the conversation document.

pub mod json_store;
pub mod transfer;

pub use json_store::{ConversationStore, JsonFileStore, MemoryStore};
pub use transfer::{backup, export_to, read_import};
