//! Aggregate figures over all conversations.

use chrono::NaiveDateTime;
use serde::Serialize;

use crate::chat::core::conversation::Conversation;
use crate::chat::core::message::Role;

/// Totals across a set of conversations.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct ConversationStats {
    /// Number of conversations.
    pub conversations: usize,
    /// Number of messages across all conversations.
    pub messages: usize,
    /// System messages.
    pub system_messages: usize,
    /// User messages.
    pub user_messages: usize,
    /// Assistant messages.
    pub assistant_messages: usize,
    /// Sum of stored token counts.
    pub tokens: usize,
    /// Creation time of the oldest conversation.
    pub oldest: Option<NaiveDateTime>,
    /// Creation time of the newest conversation.
    pub newest: Option<NaiveDateTime>,
}

impl ConversationStats {
    /// Fold conversations into totals.
    #[must_use]
    pub fn collect<'a, I>(conversations: I) -> Self
    where
        I: IntoIterator<Item = &'a Conversation>,
    {
        conversations
            .into_iter()
            .fold(Self::default(), |mut stats, conversation| {
                stats.conversations += 1;
                stats.messages += conversation.messages.len();
                stats.system_messages += conversation.count_role(Role::System);
                stats.user_messages += conversation.count_role(Role::User);
                stats.assistant_messages += conversation.count_role(Role::Assistant);
                stats.tokens += conversation.token_count;
                stats.oldest = Some(
                    stats
                        .oldest
                        .map_or(conversation.created_at, |t| t.min(conversation.created_at)),
                );
                stats.newest = Some(
                    stats
                        .newest
                        .map_or(conversation.created_at, |t| t.max(conversation.created_at)),
                );
                stats
            })
    }

    /// Mean messages per conversation, zero when empty.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn average_messages(&self) -> f64 {
        if self.conversations == 0 {
            return 0.0;
        }
        self.messages as f64 / self.conversations as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::core::ids::ConversationId;
    use crate::chat::core::message::Message;
    use chrono::NaiveDate;

    fn at(day: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 1, day)
            .and_then(|d| d.and_hms_opt(12, 0, 0))
            .unwrap_or_default()
    }

    #[test]
    fn test_collect_totals() {
        let mut a = Conversation::with_created_at(
            ConversationId::new(),
            "a",
            vec![Message::system("s"), Message::user("u"), Message::assistant("r")],
            at(3),
        );
        a.token_count = 12;
        let b = Conversation::with_created_at(ConversationId::new(), "b", vec![Message::user("u")], at(1));

        let stats = ConversationStats::collect([&a, &b]);

        assert_eq!(stats.conversations, 2);
        assert_eq!(stats.messages, 4);
        assert_eq!(stats.user_messages, 2);
        assert_eq!(stats.system_messages, 1);
        assert_eq!(stats.assistant_messages, 1);
        assert_eq!(stats.tokens, 12);
        assert_eq!(stats.oldest, Some(at(1)));
        assert_eq!(stats.newest, Some(at(3)));
        assert!((stats.average_messages() - 2.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_empty_stats() {
        let stats = ConversationStats::collect(std::iter::empty::<&Conversation>());
        assert_eq!(stats, ConversationStats::default());
        assert!(stats.average_messages().abs() < f64::EPSILON);
    }
}
