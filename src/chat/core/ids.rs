//! Conversation identifiers.
//!
//! Ids are opaque strings on disk. Freshly minted ids are UUID text, but any
//! non-blank string read back from a store document is accepted so that
//! documents written by other tools keep loading.
//!
//! ## Cargo features used by this module
//! - `uuid_v7`: mint time-ordered `UUIDv7` ids instead of random `UUIDv4`.

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::chat::core::errors::ChatError;

#[inline]
#[must_use]
fn mint_uuid() -> Uuid {
    #[cfg(feature = "uuid_v7")]
    {
        Uuid::now_v7()
    }
    #[cfg(not(feature = "uuid_v7"))]
    {
        Uuid::new_v4()
    }
}

/// Identifier of a stored conversation.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConversationId(String);

impl ConversationId {
    /// Mint a new unique identifier.
    #[must_use]
    pub fn new() -> Self {
        Self(mint_uuid().to_string())
    }

    /// Borrow the identifier text.
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the id is usable as a store key.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        !self.0.trim().is_empty()
    }
}

impl Default for ConversationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConversationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ConversationId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<Uuid> for ConversationId {
    fn from(value: Uuid) -> Self {
        Self(value.to_string())
    }
}

impl FromStr for ConversationId {
    type Err = ChatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(ChatError::InvalidId(s.to_string()));
        }
        Ok(Self(trimmed.to_string()))
    }
}
