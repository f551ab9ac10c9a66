//! Conversation records as they live in memory and on disk.

use std::collections::BTreeMap;

use chrono::{Local, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::chat::core::ids::ConversationId;
use crate::chat::core::message::{Message, Role};

/// Title used when no title generator is available.
pub const DEFAULT_TITLE: &str = "New Conversation";

/// All conversations of a store, keyed by id.
pub type ConversationMap = BTreeMap<ConversationId, Conversation>;

/// A titled, timestamped, ordered collection of messages.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    /// Unique identifier, duplicated from the map key.
    pub id: ConversationId,
    /// Display title. Never truncated in storage.
    pub title: String,
    /// Messages in chronological order.
    #[serde(default)]
    pub messages: Vec<Message>,
    /// Local wall-clock creation time.
    #[serde(with = "timestamp_serde")]
    pub created_at: NaiveDateTime,
    /// Token count of the full history, as reported by the last counter run.
    #[serde(default)]
    pub token_count: usize,
}

impl Conversation {
    /// Start a conversation stamped with the current local time.
    #[must_use]
    pub fn new(id: ConversationId, title: impl Into<String>, messages: Vec<Message>) -> Self {
        Self::with_created_at(id, title, messages, Local::now().naive_local())
    }

    /// Start a conversation with an explicit creation time.
    #[must_use]
    pub fn with_created_at(
        id: ConversationId,
        title: impl Into<String>,
        messages: Vec<Message>,
        created_at: NaiveDateTime,
    ) -> Self {
        Self {
            id,
            title: title.into(),
            messages,
            created_at,
            token_count: 0,
        }
    }

    /// Calendar date of creation.
    #[must_use]
    pub const fn created_date(&self) -> NaiveDate {
        self.created_at.date()
    }

    /// Number of messages with the given role.
    #[must_use]
    pub fn count_role(&self, role: Role) -> usize {
        self.messages.iter().filter(|m| m.role == role).count()
    }

    /// Case-insensitive match of an already lowercased needle against the
    /// title and every message body.
    #[must_use]
    pub fn matches_lowercase(&self, needle: &str) -> bool {
        self.title.to_lowercase().contains(needle)
            || self
                .messages
                .iter()
                .any(|m| m.content.to_lowercase().contains(needle))
    }
}

/// ISO-8601 timestamps without offset, read leniently.
///
/// Offset-carrying RFC 3339 values are converted to local time on read.
mod timestamp_serde {
    use chrono::{DateTime, Local, NaiveDateTime};
    use serde::{Deserialize, Deserializer, Serializer};

    const FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";

    pub fn serialize<S>(value: &NaiveDateTime, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(&value.format(FORMAT))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<NaiveDateTime, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        if let Ok(naive) = NaiveDateTime::parse_from_str(&raw, FORMAT) {
            return Ok(naive);
        }
        DateTime::parse_from_rfc3339(&raw)
            .map(|dt| dt.with_timezone(&Local).naive_local())
            .map_err(|err| serde::de::Error::custom(format!("invalid created_at {raw:?}: {err}")))
    }
}
