//! Offline responder for demos and tests.

use crate::chat::core::message::{Message, Role};
use crate::chat::pipeline::hooks::{HookError, ResponseGenerator};

/// Canned replies keyed on the latest user message.
#[derive(Clone, Copy, Debug, Default)]
pub struct EchoResponder;

impl ResponseGenerator for EchoResponder {
    fn generate(&self, messages: &[Message]) -> Result<String, HookError> {
        let last = messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map_or("", |m| m.content.as_str());
        let lowered = last.to_lowercase();

        let reply = if lowered.contains("hello") {
            "Hello there! How can I help you today?".to_string()
        } else if lowered.contains("help") {
            "I'm a simple offline responder. I answer 'hello' and 'help', and echo everything else."
                .to_string()
        } else if last.contains('?') {
            "That's an interesting question. Configure a model backend for a real answer."
                .to_string()
        } else {
            format!("I received your message: '{last}'.")
        };
        Ok(reply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reply(text: &str) -> String {
        EchoResponder
            .generate(&[Message::system("ignored"), Message::user(text)])
            .unwrap_or_default()
    }

    #[test]
    fn test_canned_replies() {
        assert!(reply("Hello bot").starts_with("Hello there"));
        assert!(reply("can you HELP").contains("offline responder"));
        assert!(reply("why?").contains("question"));
        assert_eq!(reply("ping"), "I received your message: 'ping'.");
    }
}
