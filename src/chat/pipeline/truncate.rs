//! History truncation to a token budget.

use tracing::debug;

use crate::chat::core::errors::{ChatError, ChatResult};
use crate::chat::core::message::Message;
use crate::chat::pipeline::hooks::TokenCounter;

/// Cut `messages` down to `max_tokens` as measured by `counter`.
///
/// A leading system message is always kept. When the whole history fits it
/// is returned unchanged. Otherwise messages are taken newest first while the
/// running total (system message included) stays within budget; the first
/// message that would overflow ends the scan, so nothing older survives.
/// The result is chronological with the system message in front.
///
/// # Errors
/// Returns [`ChatError::TokenCount`] if the counter fails.
pub fn truncate(
    messages: &[Message],
    max_tokens: usize,
    counter: &dyn TokenCounter,
) -> ChatResult<Vec<Message>> {
    if messages.is_empty() {
        return Ok(Vec::new());
    }

    let (system, rest) = match messages.split_first() {
        Some((first, rest)) if first.is_system() => (Some(first), rest),
        _ => (None, messages),
    };

    if count(counter, messages)? <= max_tokens {
        return Ok(messages.to_vec());
    }

    // Newest first.
    let mut kept: Vec<&Message> = Vec::new();
    for candidate in rest.iter().rev() {
        let mut trial: Vec<Message> = Vec::with_capacity(kept.len() + 2);
        trial.extend(system.cloned());
        trial.push(candidate.clone());
        trial.extend(kept.iter().rev().map(|m| (*m).clone()));

        if count(counter, &trial)? > max_tokens {
            break;
        }
        kept.push(candidate);
    }

    let mut out = Vec::with_capacity(kept.len() + 1);
    out.extend(system.cloned());
    out.extend(kept.into_iter().rev().cloned());

    debug!(
        "Truncated history from {} to {} messages (budget {max_tokens})",
        messages.len(),
        out.len()
    );
    Ok(out)
}

fn count(counter: &dyn TokenCounter, messages: &[Message]) -> ChatResult<usize> {
    counter
        .count_tokens(messages)
        .map_err(|err| ChatError::TokenCount(err.to_string()))
}
