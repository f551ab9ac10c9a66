//! Per-session working set.

use std::collections::HashSet;

use serde::Serialize;
use tracing::debug;

use crate::chat::core::errors::{ChatError, ChatResult};
use crate::chat::core::ids::ConversationId;
use crate::chat::core::message::Message;
use crate::chat::repository::conversations::ConversationRepository;

/// Whether a conversation is attached to the session.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    /// No conversation yet; the next submit creates one.
    Idle,
    /// Working on an existing conversation.
    Active,
}

/// Transient state of one user session. Never persisted.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SessionState {
    current: Option<ConversationId>,
    messages: Vec<Message>,
    menu_open: HashSet<ConversationId>,
    title_edit: HashSet<ConversationId>,
}

impl SessionState {
    /// Fresh idle session.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current phase.
    #[must_use]
    pub const fn phase(&self) -> SessionPhase {
        if self.current.is_some() {
            SessionPhase::Active
        } else {
            SessionPhase::Idle
        }
    }

    /// Attached conversation, if any.
    #[must_use]
    pub const fn current_id(&self) -> Option<&ConversationId> {
        self.current.as_ref()
    }

    /// Working message list.
    #[must_use]
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Back to idle: no conversation, no messages, no open menus or edits.
    pub fn reset(&mut self) {
        self.current = None;
        self.messages.clear();
        self.menu_open.clear();
        self.title_edit.clear();
    }

    /// Attach `id` and load its stored messages.
    ///
    /// # Errors
    /// Returns [`ChatError::ConversationNotFound`] if `id` is unknown; the
    /// session is left as it was.
    pub fn switch(&mut self, repo: &ConversationRepository, id: &ConversationId) -> ChatResult<()> {
        let conversation = repo
            .get(id)
            .ok_or_else(|| ChatError::ConversationNotFound(id.clone()))?;
        self.current = Some(id.clone());
        self.messages.clone_from(&conversation.messages);
        debug!("Switched to conversation: {id}");
        Ok(())
    }

    /// Whether the action menu of `id` is open.
    #[must_use]
    pub fn is_menu_open(&self, id: &ConversationId) -> bool {
        self.menu_open.contains(id)
    }

    /// Whether the title of `id` is being edited.
    #[must_use]
    pub fn is_editing_title(&self, id: &ConversationId) -> bool {
        self.title_edit.contains(id)
    }

    /// Open the action menu of `id`.
    pub fn open_menu(&mut self, id: &ConversationId) {
        self.menu_open.insert(id.clone());
    }

    /// Close the action menu of `id`.
    pub fn close_menu(&mut self, id: &ConversationId) {
        self.menu_open.remove(id);
    }

    /// Start editing the title of `id`; its menu closes.
    pub fn begin_title_edit(&mut self, id: &ConversationId) {
        self.menu_open.remove(id);
        self.title_edit.insert(id.clone());
    }

    /// Stop editing the title of `id`.
    pub fn end_title_edit(&mut self, id: &ConversationId) {
        self.title_edit.remove(id);
    }

    /// Drop every trace of `id`; resets the session if it was attached.
    pub fn forget(&mut self, id: &ConversationId) {
        self.menu_open.remove(id);
        self.title_edit.remove(id);
        if self.current.as_ref() == Some(id) {
            self.reset();
        }
    }

    pub(crate) fn attach(&mut self, id: ConversationId) {
        self.current = Some(id);
    }

    pub(crate) fn push_message(&mut self, message: Message) {
        self.messages.push(message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::storage::json_store::MemoryStore;

    fn repo_with_one() -> (ConversationRepository, ConversationId) {
        let mut repo = ConversationRepository::open(Box::new(MemoryStore::new()));
        let id = repo.create(
            "hello",
            vec![Message::user("hello"), Message::assistant("hi")],
            None,
        );
        (repo, id)
    }

    #[test]
    fn test_new_session_is_idle() {
        let state = SessionState::new();
        assert_eq!(state.phase(), SessionPhase::Idle);
        assert!(state.current_id().is_none());
        assert!(state.messages().is_empty());
    }

    #[test]
    fn test_switch_loads_messages() {
        let (repo, id) = repo_with_one();
        let mut state = SessionState::new();

        assert!(state.switch(&repo, &id).is_ok());
        assert_eq!(state.phase(), SessionPhase::Active);
        assert_eq!(state.current_id(), Some(&id));
        assert_eq!(state.messages().len(), 2);
    }

    #[test]
    fn test_switch_to_unknown_is_error_and_noop() {
        let (repo, id) = repo_with_one();
        let mut state = SessionState::new();
        assert!(state.switch(&repo, &id).is_ok());
        let before = state.clone();

        let missing = ConversationId::new();
        assert!(matches!(
            state.switch(&repo, &missing),
            Err(ChatError::ConversationNotFound(_))
        ));
        assert_eq!(state, before);
    }

    #[test]
    fn test_reset_is_idempotent() {
        let (repo, id) = repo_with_one();
        let mut state = SessionState::new();
        assert!(state.switch(&repo, &id).is_ok());
        state.open_menu(&id);

        state.reset();
        let once = state.clone();
        state.reset();

        assert_eq!(state, once);
        assert_eq!(state, SessionState::new());
    }

    #[test]
    fn test_menu_and_edit_flags() {
        let id = ConversationId::new();
        let other = ConversationId::new();
        let mut state = SessionState::new();

        state.open_menu(&id);
        assert!(state.is_menu_open(&id));
        assert!(!state.is_menu_open(&other));

        state.begin_title_edit(&id);
        assert!(!state.is_menu_open(&id));
        assert!(state.is_editing_title(&id));

        state.end_title_edit(&id);
        assert!(!state.is_editing_title(&id));
    }

    #[test]
    fn test_forget_active_resets() {
        let (repo, id) = repo_with_one();
        let mut state = SessionState::new();
        assert!(state.switch(&repo, &id).is_ok());

        state.forget(&id);
        assert_eq!(state.phase(), SessionPhase::Idle);
        assert!(state.messages().is_empty());
    }
}
