//! Date grouping for the conversation sidebar.

use chrono::NaiveDate;

use crate::chat::core::conversation::Conversation;

/// Label for today's conversations.
pub const TODAY: &str = "Today";
/// Label for yesterday's conversations.
pub const YESTERDAY: &str = "Yesterday";

/// A run of conversations sharing one date label.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DateGroup<'a> {
    /// "Today", "Yesterday", a weekday name, or a formatted date.
    pub label: String,
    /// Members in the order they were given.
    pub conversations: Vec<&'a Conversation>,
}

/// Label a creation date relative to `today`.
///
/// Dates two to six days back get their weekday name. Older dates, and dates
/// after `today`, are spelled out as e.g. `Mar 4, 2025`.
#[must_use]
pub fn date_label(date: NaiveDate, today: NaiveDate) -> String {
    match today.signed_duration_since(date).num_days() {
        0 => TODAY.to_string(),
        1 => YESTERDAY.to_string(),
        2..=6 => date.format("%A").to_string(),
        _ => date.format("%b %-d, %Y").to_string(),
    }
}

/// Split an already ordered sequence into consecutive runs of equal label.
#[must_use]
pub fn group_by_date<'a, I>(conversations: I, today: NaiveDate) -> Vec<DateGroup<'a>>
where
    I: IntoIterator<Item = &'a Conversation>,
{
    let mut groups: Vec<DateGroup<'a>> = Vec::new();

    for conversation in conversations {
        let label = date_label(conversation.created_date(), today);
        match groups.last_mut() {
            Some(group) if group.label == label => group.conversations.push(conversation),
            _ => groups.push(DateGroup {
                label,
                conversations: vec![conversation],
            }),
        }
    }

    groups
}
