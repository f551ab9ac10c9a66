//! Handling of one user message from input to persisted reply.

use serde::Serialize;
use tracing::{debug, error, warn};

use crate::chat::core::config::HistoryConfig;
use crate::chat::core::errors::{ChatError, ChatResult};
use crate::chat::core::ids::ConversationId;
use crate::chat::core::message::Message;
use crate::chat::core::notice::Notice;
use crate::chat::pipeline::hooks::ChatHooks;
use crate::chat::pipeline::truncate::truncate;
use crate::chat::repository::conversations::ConversationRepository;
use crate::chat::session::state::SessionState;

/// What became of the assistant turn.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "text")]
pub enum Reply {
    /// The generator answered; the reply was appended to the history.
    Generated(String),
    /// The generator failed; nothing was appended. Carries the error text.
    Failed(String),
    /// No generator installed.
    Skipped,
}

/// Result of [`submit`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SubmitOutcome {
    /// Conversation the message went into.
    pub conversation_id: ConversationId,
    /// Whether this message opened the conversation.
    pub created: bool,
    /// Number of messages handed to the generator.
    pub forwarded: usize,
    /// Assistant turn.
    pub reply: Reply,
}

/// Record `user_text`, ask the generator for a reply and persist the exchange.
///
/// An idle session gets a new conversation first. When a token budget and a
/// counter are both present only a truncated copy of the history is sent to
/// the generator; the stored history keeps every message. Hook failures are
/// reported as notices on `repo` and never abort the exchange.
///
/// # Errors
/// Returns [`ChatError::EmptyMessage`] for blank input, or
/// [`ChatError::ConversationNotFound`] if the attached conversation vanished.
pub fn submit(
    session: &mut SessionState,
    repo: &mut ConversationRepository,
    hooks: &ChatHooks,
    history: &HistoryConfig,
    user_text: &str,
) -> ChatResult<SubmitOutcome> {
    if user_text.trim().is_empty() {
        return Err(ChatError::EmptyMessage);
    }

    let existing = session.current_id().cloned();
    if existing.is_none() {
        if let Some(prompt) = history.system_prompt.as_deref() {
            session.push_message(Message::system(prompt));
        }
    }
    session.push_message(Message::user(user_text));

    let (conversation_id, created) = match existing {
        Some(id) => (id, false),
        None => {
            let id = repo.create(user_text, session.messages().to_vec(), hooks.titler());
            session.attach(id.clone());
            (id, true)
        }
    };

    let mut forwarded = 0;
    let reply = match hooks.responder() {
        Some(responder) => {
            let outgoing = outgoing_history(session.messages(), repo, hooks, history);
            forwarded = outgoing.len();
            match responder.generate(&outgoing) {
                Ok(text) => {
                    session.push_message(Message::assistant(text.clone()));
                    Reply::Generated(text)
                }
                Err(err) => {
                    let failure = ChatError::Callback(err.to_string());
                    error!("{failure}");
                    repo.push_notice(Notice::from(&failure));
                    Reply::Failed(failure.to_string())
                }
            }
        }
        None => Reply::Skipped,
    };

    let token_count = hooks.counter().and_then(|counter| {
        match counter.count_tokens(session.messages()) {
            Ok(tokens) => Some(tokens),
            Err(err) => {
                warn!("Token counting failed for {conversation_id}: {err}");
                repo.push_notice(Notice::warning(format!(
                    "Token count not updated: {err}"
                )));
                None
            }
        }
    });

    repo.update_messages(&conversation_id, session.messages().to_vec(), token_count)?;
    debug!(
        "Recorded exchange in {conversation_id} ({} messages)",
        session.messages().len()
    );

    Ok(SubmitOutcome {
        conversation_id,
        created,
        forwarded,
        reply,
    })
}

/// History to hand to the generator, cut to budget when possible.
fn outgoing_history(
    messages: &[Message],
    repo: &mut ConversationRepository,
    hooks: &ChatHooks,
    history: &HistoryConfig,
) -> Vec<Message> {
    let (Some(max_tokens), Some(counter)) = (history.max_history_tokens, hooks.counter()) else {
        return messages.to_vec();
    };

    match truncate(messages, max_tokens, counter) {
        Ok(kept) => kept,
        Err(err) => {
            warn!("Sending full history: {err}");
            repo.push_notice(Notice::warning(format!(
                "History not truncated: {err}"
            )));
            messages.to_vec()
        }
    }
}
