//! Text helpers for rendering conversations.

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use crate::chat::core::conversation::Conversation;
use crate::chat::core::message::Message;

const ELLIPSIS: &str = "...";

static CODE_FENCE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?s)```([A-Za-z0-9_+#.-]*)[ \t]*\r?\n(.*?)```").ok());

/// Sidebar title: cut to `max_len` characters, optionally followed by a token count.
///
/// `display_title("A very long conversation title here", 10, Some(42))`
/// gives `"A very lon... (42)"`.
#[must_use]
pub fn display_title(title: &str, max_len: usize, token_count: Option<usize>) -> String {
    let mut shown = if title.chars().count() > max_len {
        let mut cut: String = title.chars().take(max_len).collect();
        cut.push_str(ELLIPSIS);
        cut
    } else {
        title.to_string()
    };
    if let Some(tokens) = token_count {
        shown.push_str(&format!(" ({tokens})"));
    }
    shown
}

/// System message carrying `content`, trimmed.
#[must_use]
pub fn system_message(content: &str) -> Message {
    Message::system(content.trim())
}

/// A fenced code block found in message text.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CodeBlock {
    /// Info string after the opening fence, if any.
    pub language: Option<String>,
    /// Body without the fences.
    pub code: String,
}

/// All fenced code blocks in `text`, in order of appearance.
#[must_use]
pub fn extract_code_blocks(text: &str) -> Vec<CodeBlock> {
    let Some(fence) = CODE_FENCE.as_ref() else {
        return Vec::new();
    };
    fence
        .captures_iter(text)
        .map(|caps| {
            let language = caps
                .get(1)
                .map(|m| m.as_str())
                .filter(|lang| !lang.is_empty())
                .map(str::to_string);
            let code = caps
                .get(2)
                .map(|m| m.as_str().trim_end_matches(['\n', '\r']))
                .unwrap_or_default()
                .to_string();
            CodeBlock { language, code }
        })
        .collect()
}

/// One message as a markdown paragraph headed by its role.
#[must_use]
pub fn format_markdown_message(message: &Message) -> String {
    format!("**{}:** {}", message.role.label(), message.content.trim())
}

/// Whole conversation as a markdown document.
#[must_use]
pub fn transcript_markdown(conversation: &Conversation) -> String {
    let mut out = format!(
        "# {}\n\n_Created {}_\n",
        conversation.title,
        conversation.created_at.format("%Y-%m-%d %H:%M")
    );
    for message in &conversation.messages {
        out.push('\n');
        out.push_str(&format_markdown_message(message));
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_display_title_truncates_by_chars() {
        assert_eq!(display_title("short", 25, None), "short");
        assert_eq!(
            display_title("A very long conversation title here", 10, Some(42)),
            "A very lon... (42)"
        );
        assert_eq!(display_title("héllo wörld", 5, None), "héllo...");
        assert_eq!(display_title("exactly5", 8, Some(0)), "exactly5 (0)");
    }

    #[test]
    fn test_extract_code_blocks() {
        let text = "Try this:\n```rust\nfn main() {}\n```\nor\n```\nls -la\n```\n";
        let blocks = extract_code_blocks(text);
        assert_eq!(
            blocks,
            vec![
                CodeBlock {
                    language: Some("rust".to_string()),
                    code: "fn main() {}".to_string(),
                },
                CodeBlock {
                    language: None,
                    code: "ls -la".to_string(),
                },
            ]
        );
        assert!(extract_code_blocks("no code here").is_empty());
    }

    #[test]
    fn test_transcript_lists_messages_in_order() {
        let created = NaiveDate::from_ymd_opt(2025, 10, 15)
            .and_then(|d| d.and_hms_opt(9, 30, 0))
            .unwrap_or_default();
        let conversation = Conversation::with_created_at(
            "c1".parse().unwrap_or_default(),
            "Greetings",
            vec![system_message("  be nice "), Message::user("hi"), Message::assistant("hello")],
            created,
        );

        let text = transcript_markdown(&conversation);
        assert!(text.starts_with("# Greetings\n\n_Created 2025-10-15 09:30_\n"));
        let user = text.find("**User:** hi").unwrap_or(usize::MAX);
        let assistant = text.find("**Assistant:** hello").unwrap_or(0);
        assert!(user < assistant);
        assert!(text.contains("**System:** be nice"));
    }
}
