//! Event dispatch: one user action in, one view snapshot out.

use std::path::PathBuf;

use chrono::Local;
use serde::Serialize;
use tracing::debug;

use crate::chat::core::config::ChatConfig;
use crate::chat::core::conversation::Conversation;
use crate::chat::core::errors::{ChatError, ChatResult};
use crate::chat::core::ids::ConversationId;
use crate::chat::core::message::Message;
use crate::chat::core::notice::Notice;
use crate::chat::format::display_title;
use crate::chat::pipeline::hooks::ChatHooks;
use crate::chat::pipeline::submit::{Reply, submit};
use crate::chat::repository::conversations::{ConversationRepository, ImportMode};
use crate::chat::session::state::{SessionPhase, SessionState};
use crate::chat::storage::transfer::{backup, export_to, read_import};

/// Something the user did.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionEvent {
    /// Detach from the current conversation.
    NewConversation,
    /// Attach to an existing conversation.
    Select(ConversationId),
    /// Open the options menu of a sidebar entry.
    OpenMenu(ConversationId),
    /// Close the options menu of a sidebar entry.
    CloseMenu(ConversationId),
    /// Start editing a title.
    BeginRename(ConversationId),
    /// Save an edited title. A blank title leaves the old one in place.
    CommitRename {
        /// Conversation being renamed.
        id: ConversationId,
        /// New title.
        title: String,
    },
    /// Abandon a title edit.
    CancelRename(ConversationId),
    /// Remove a conversation.
    Delete(ConversationId),
    /// Send a user message.
    Submit(String),
    /// Filter conversations by text.
    Search(String),
    /// Load conversations from an exported file.
    Import {
        /// File to read.
        path: PathBuf,
        /// Merge into or replace the current set.
        mode: ImportMode,
    },
    /// Write every conversation to a file.
    Export(PathBuf),
    /// Copy the store file into a directory.
    Backup(PathBuf),
}

/// One conversation as listed in the sidebar.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SidebarEntry {
    /// Conversation id.
    pub id: ConversationId,
    /// Shortened title, with token count when enabled.
    pub display_title: String,
    /// Whether this is the attached conversation.
    pub is_current: bool,
    /// Options menu state.
    pub menu_open: bool,
    /// Title edit state.
    pub editing: bool,
}

/// Sidebar section. `label` is `None` when date grouping is off.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SidebarGroup {
    /// Date label.
    pub label: Option<String>,
    /// Members, newest first.
    pub entries: Vec<SidebarEntry>,
}

/// Everything a front end needs to draw the session after an event.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SessionSnapshot {
    /// Idle or active.
    pub phase: SessionPhase,
    /// Attached conversation.
    pub current: Option<ConversationId>,
    /// Working message list.
    pub messages: Vec<Message>,
    /// Conversation list.
    pub sidebar: Vec<SidebarGroup>,
    /// Assistant turn produced by this event, if it was a submit.
    pub reply: Option<Reply>,
    /// Matches, if this event was a search.
    pub search_results: Option<Vec<SidebarEntry>>,
    /// Problems and confirmations raised since the last snapshot.
    pub notices: Vec<Notice>,
}

/// A user session bound to a repository and a set of hooks.
#[derive(Debug)]
pub struct ChatSession {
    config: ChatConfig,
    repo: ConversationRepository,
    state: SessionState,
    hooks: ChatHooks,
}

impl ChatSession {
    /// Start an idle session.
    #[must_use]
    pub fn new(config: ChatConfig, repo: ConversationRepository, hooks: ChatHooks) -> Self {
        Self {
            config,
            repo,
            state: SessionState::new(),
            hooks,
        }
    }

    /// Active configuration.
    #[must_use]
    pub const fn config(&self) -> &ChatConfig {
        &self.config
    }

    /// Underlying repository.
    #[must_use]
    pub const fn repository(&self) -> &ConversationRepository {
        &self.repo
    }

    /// Whether a submit will call a response generator.
    #[must_use]
    pub fn can_generate(&self) -> bool {
        self.hooks.responder().is_some()
    }

    /// Current session state.
    #[must_use]
    pub const fn state(&self) -> &SessionState {
        &self.state
    }

    /// Apply `event` and describe the result.
    ///
    /// # Errors
    /// Unknown ids, blank messages and unreadable import or export files are
    /// returned as errors. Store and hook failures do not fail the event;
    /// they show up in [`SessionSnapshot::notices`].
    pub fn handle(&mut self, event: SessionEvent) -> ChatResult<SessionSnapshot> {
        let mut reply = None;
        let mut search_results = None;

        match event {
            SessionEvent::NewConversation => self.state.reset(),
            SessionEvent::Select(id) => self.state.switch(&self.repo, &id)?,
            SessionEvent::OpenMenu(id) => {
                self.require(&id)?;
                self.state.open_menu(&id);
            }
            SessionEvent::CloseMenu(id) => self.state.close_menu(&id),
            SessionEvent::BeginRename(id) => {
                self.require(&id)?;
                self.state.begin_title_edit(&id);
            }
            SessionEvent::CommitRename { id, title } => {
                let title = title.trim();
                if title.is_empty() {
                    self.require(&id)?;
                } else {
                    self.repo.rename(&id, title)?;
                }
                self.state.end_title_edit(&id);
            }
            SessionEvent::CancelRename(id) => self.state.end_title_edit(&id),
            SessionEvent::Delete(id) => {
                self.repo.delete(&id)?;
                self.state.forget(&id);
            }
            SessionEvent::Submit(text) => {
                let outcome = submit(
                    &mut self.state,
                    &mut self.repo,
                    &self.hooks,
                    &self.config.history,
                    &text,
                )?;
                reply = Some(outcome.reply);
            }
            SessionEvent::Search(query) => {
                let hits: Vec<SidebarEntry> = self
                    .repo
                    .search(&query)
                    .into_iter()
                    .map(|c| self.entry(c))
                    .collect();
                debug!("Search '{query}' matched {} conversations", hits.len());
                search_results = Some(hits);
            }
            SessionEvent::Import { path, mode } => {
                let incoming = read_import(&path)?;
                let added = self.repo.import(incoming, mode);
                self.resync();
                self.repo.push_notice(Notice::info(format!(
                    "Imported {added} conversations from {}",
                    path.display()
                )));
            }
            SessionEvent::Export(path) => {
                export_to(self.repo.conversations(), &path)?;
                self.repo.push_notice(Notice::info(format!(
                    "Exported {} conversations to {}",
                    self.repo.len(),
                    path.display()
                )));
            }
            SessionEvent::Backup(dir) => {
                let written = backup(
                    &self.repo.store_location(),
                    &dir,
                    Local::now().naive_local(),
                )?;
                self.repo.push_notice(Notice::info(format!(
                    "Backup written to {}",
                    written.display()
                )));
            }
        }

        let mut snapshot = self.snapshot();
        snapshot.reply = reply;
        snapshot.search_results = search_results;
        Ok(snapshot)
    }

    /// Current view, draining pending notices.
    pub fn snapshot(&mut self) -> SessionSnapshot {
        SessionSnapshot {
            phase: self.state.phase(),
            current: self.state.current_id().cloned(),
            messages: self.state.messages().to_vec(),
            sidebar: self.sidebar(),
            reply: None,
            search_results: None,
            notices: self.repo.take_notices(),
        }
    }

    /// Ids and titles of the conversation list, grouped when enabled.
    #[must_use]
    pub fn sidebar(&self) -> Vec<SidebarGroup> {
        if self.config.display.date_grouping {
            self.repo
                .grouped_by_date(Local::now().date_naive())
                .into_iter()
                .map(|group| SidebarGroup {
                    label: Some(group.label),
                    entries: group.conversations.into_iter().map(|c| self.entry(c)).collect(),
                })
                .collect()
        } else {
            let entries: Vec<SidebarEntry> = self
                .repo
                .list_sorted_by_recency()
                .into_iter()
                .map(|c| self.entry(c))
                .collect();
            if entries.is_empty() {
                Vec::new()
            } else {
                vec![SidebarGroup {
                    label: None,
                    entries,
                }]
            }
        }
    }

    fn entry(&self, conversation: &Conversation) -> SidebarEntry {
        let display = &self.config.display;
        let tokens = (display.show_token_count && self.hooks.counter().is_some())
            .then_some(conversation.token_count);
        SidebarEntry {
            id: conversation.id.clone(),
            display_title: display_title(&conversation.title, display.max_title_length, tokens),
            is_current: self.state.current_id() == Some(&conversation.id),
            menu_open: self.state.is_menu_open(&conversation.id),
            editing: self.state.is_editing_title(&conversation.id),
        }
    }

    fn require(&self, id: &ConversationId) -> ChatResult<()> {
        if self.repo.contains(id) {
            Ok(())
        } else {
            Err(ChatError::ConversationNotFound(id.clone()))
        }
    }

    /// Re-read the attached conversation after the repository changed under it.
    fn resync(&mut self) {
        let Some(id) = self.state.current_id().cloned() else {
            return;
        };
        if self.state.switch(&self.repo, &id).is_err() {
            debug!("Active conversation {id} no longer exists");
            self.state.forget(&id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::core::conversation::ConversationMap;
    use crate::chat::core::notice::NoticeLevel;
    use crate::chat::pipeline::hooks::{HookError, ResponseGenerator, TokenCounter};
    use crate::chat::storage::json_store::{JsonFileStore, MemoryStore};

    struct Echo;

    impl ResponseGenerator for Echo {
        fn generate(&self, messages: &[Message]) -> Result<String, HookError> {
            Ok(format!("{} messages so far", messages.len()))
        }
    }

    struct Chars;

    impl TokenCounter for Chars {
        fn count_tokens(&self, messages: &[Message]) -> Result<usize, HookError> {
            Ok(messages.iter().map(|m| m.content.chars().count()).sum())
        }
    }

    fn session(config: ChatConfig) -> ChatSession {
        ChatSession::new(
            config,
            ConversationRepository::open(Box::new(MemoryStore::new())),
            ChatHooks::none().with_responder(Echo).with_counter(Chars),
        )
    }

    fn flat() -> ChatConfig {
        let mut config = ChatConfig::default();
        config.display.date_grouping = false;
        config.display.show_token_count = false;
        config
    }

    fn only_id(snapshot: &SessionSnapshot) -> ConversationId {
        snapshot.current.clone().unwrap_or_default()
    }

    #[test]
    fn test_submit_then_new_conversation() {
        let mut chat = session(flat());

        let first = chat.handle(SessionEvent::Submit("hello".to_string()));
        assert!(first.is_ok());
        let first = first.unwrap_or_else(|_| chat.snapshot());
        assert_eq!(first.phase, SessionPhase::Active);
        assert_eq!(first.reply, Some(Reply::Generated("1 messages so far".to_string())));
        assert_eq!(first.messages.len(), 2);
        assert_eq!(first.sidebar.len(), 1);
        assert_eq!(first.sidebar[0].label, None);
        assert!(first.sidebar[0].entries[0].is_current);

        let fresh = chat.handle(SessionEvent::NewConversation).map(|s| s.phase);
        assert_eq!(fresh.ok(), Some(SessionPhase::Idle));
        assert_eq!(chat.repository().len(), 1);
    }

    #[test]
    fn test_sidebar_groups_today_with_token_counts() {
        let mut config = ChatConfig::default();
        config.display.show_token_count = true;
        let mut chat = session(config);

        let snapshot = chat.handle(SessionEvent::Submit("hi".to_string()));
        let sidebar = snapshot.map(|s| s.sidebar).unwrap_or_default();
        assert_eq!(sidebar.len(), 1);
        assert_eq!(sidebar[0].label.as_deref(), Some("Today"));
        // "hi" (2) + "1 messages so far" (17)
        assert_eq!(sidebar[0].entries[0].display_title, "New Conversation (19)");
    }

    #[test]
    fn test_delete_active_goes_idle() {
        let mut chat = session(flat());
        let id = chat
            .handle(SessionEvent::Submit("bye".to_string()))
            .map(|s| only_id(&s))
            .unwrap_or_default();
        assert!(chat.handle(SessionEvent::OpenMenu(id.clone())).is_ok());

        let after = chat.handle(SessionEvent::Delete(id.clone()));
        let after = after.unwrap_or_else(|_| chat.snapshot());
        assert_eq!(after.phase, SessionPhase::Idle);
        assert!(after.messages.is_empty());
        assert!(after.sidebar.is_empty());
        assert!(!chat.state().is_menu_open(&id));
    }

    #[test]
    fn test_unknown_ids_are_errors() {
        let mut chat = session(flat());
        let ghost: ConversationId = "ghost".parse().unwrap_or_default();

        assert!(matches!(
            chat.handle(SessionEvent::Select(ghost.clone())),
            Err(ChatError::ConversationNotFound(_))
        ));
        assert!(matches!(
            chat.handle(SessionEvent::Delete(ghost.clone())),
            Err(ChatError::ConversationNotFound(_))
        ));
        assert!(matches!(
            chat.handle(SessionEvent::BeginRename(ghost)),
            Err(ChatError::ConversationNotFound(_))
        ));
    }

    #[test]
    fn test_rename_flow() {
        let mut chat = session(flat());
        let id = chat
            .handle(SessionEvent::Submit("topic".to_string()))
            .map(|s| only_id(&s))
            .unwrap_or_default();

        let editing = chat.handle(SessionEvent::BeginRename(id.clone()));
        assert!(editing.is_ok_and(|s| s.sidebar[0].entries[0].editing));

        let blank = chat.handle(SessionEvent::CommitRename {
            id: id.clone(),
            title: "  ".to_string(),
        });
        assert!(blank.is_ok());
        assert_eq!(
            chat.repository().get(&id).map(|c| c.title.as_str()),
            Some("New Conversation")
        );

        let renamed = chat.handle(SessionEvent::CommitRename {
            id: id.clone(),
            title: "Project notes".to_string(),
        });
        let entry = renamed
            .map(|s| s.sidebar[0].entries[0].clone())
            .map_err(|e| e.to_string());
        assert!(entry.as_ref().is_ok_and(|e| !e.editing));
        assert!(entry.is_ok_and(|e| e.display_title == "Project notes"));
    }

    #[test]
    fn test_search_returns_matches_only_for_that_event() {
        let mut chat = session(flat());
        assert!(chat.handle(SessionEvent::Submit("rust lifetimes".to_string())).is_ok());
        assert!(chat.handle(SessionEvent::NewConversation).is_ok());
        assert!(chat.handle(SessionEvent::Submit("bread recipe".to_string())).is_ok());

        let found = chat
            .handle(SessionEvent::Search("LIFETIMES".to_string()))
            .map(|s| s.search_results.unwrap_or_default().len());
        assert_eq!(found.ok(), Some(1));

        let next = chat.handle(SessionEvent::NewConversation);
        assert!(next.is_ok_and(|s| s.search_results.is_none()));
    }

    #[test]
    fn test_replace_import_resets_missing_active() {
        let dir = tempfile::tempdir().map_err(|e| e.to_string());
        let Ok(dir) = dir else {
            return;
        };
        let file = dir.path().join("export.json");
        assert!(export_to(&ConversationMap::new(), &file).is_ok());

        let mut chat = session(flat());
        assert!(chat.handle(SessionEvent::Submit("soon gone".to_string())).is_ok());

        let after = chat.handle(SessionEvent::Import {
            path: file,
            mode: ImportMode::Replace,
        });
        let after = after.unwrap_or_else(|_| chat.snapshot());
        assert_eq!(after.phase, SessionPhase::Idle);
        assert!(chat.repository().is_empty());
        assert_eq!(after.notices.len(), 1);
        assert_eq!(after.notices[0].level, NoticeLevel::Info);
    }

    #[test]
    fn test_export_backup_and_reload() {
        let dir = tempfile::tempdir().map_err(|e| e.to_string());
        let Ok(dir) = dir else {
            return;
        };
        let store_path = dir.path().join("conversations.json");
        let repo = ConversationRepository::open(Box::new(JsonFileStore::new(&store_path)));
        let mut chat = ChatSession::new(flat(), repo, ChatHooks::none());
        assert!(chat.handle(SessionEvent::Submit("keep me".to_string())).is_ok());

        let export = dir.path().join("out").join("all.json");
        assert!(chat.handle(SessionEvent::Export(export.clone())).is_ok());
        assert_eq!(read_import(&export).map(|m| m.len()).ok(), Some(1));

        let backed = chat.handle(SessionEvent::Backup(dir.path().join("backups")));
        assert!(backed.is_ok_and(|s| s.notices.len() == 1));

        let reopened = ConversationRepository::open(Box::new(JsonFileStore::new(&store_path)));
        assert_eq!(reopened.len(), 1);
    }
}
