//! Conversation repository: listing, grouping, search and statistics.

pub mod conversations;
pub mod grouping;
pub mod stats;

pub use conversations::{ConversationRepository, ImportMode};
pub use grouping::{DateGroup, date_label, group_by_date};
pub use stats::ConversationStats;
