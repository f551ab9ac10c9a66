//! Approximate token counters.
//!
//! Neither counter matches a real tokenizer; they give stable, monotonic
//! estimates suitable for budgeting history.

use crate::chat::core::message::Message;
use crate::chat::pipeline::hooks::{HookError, TokenCounter};

/// Characters per token assumed by [`CharCounter`].
const CHARS_PER_TOKEN: usize = 4;

/// One token per whitespace-separated word.
#[derive(Clone, Copy, Debug, Default)]
pub struct WordCounter;

impl TokenCounter for WordCounter {
    fn count_tokens(&self, messages: &[Message]) -> Result<usize, HookError> {
        Ok(messages
            .iter()
            .map(|m| m.content.split_whitespace().count())
            .sum())
    }
}

/// One token per four characters, rounded up per message.
#[derive(Clone, Copy, Debug, Default)]
pub struct CharCounter;

impl TokenCounter for CharCounter {
    fn count_tokens(&self, messages: &[Message]) -> Result<usize, HookError> {
        Ok(messages
            .iter()
            .map(|m| m.content.chars().count().div_ceil(CHARS_PER_TOKEN))
            .sum())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_word_counter() {
        let history = [Message::user("a b  c"), Message::assistant(" d ")];
        assert_eq!(WordCounter.count_tokens(&history).ok(), Some(4));
        assert_eq!(WordCounter.count_tokens(&[]).ok(), Some(0));
    }

    #[test]
    fn test_char_counter_rounds_up() {
        let history = [Message::user("abcde"), Message::assistant("éé")];
        assert_eq!(CharCounter.count_tokens(&history).ok(), Some(2 + 1));
    }
}
