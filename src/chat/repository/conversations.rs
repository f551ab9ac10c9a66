//! In-memory conversation repository backed by a [`ConversationStore`].

use std::path::PathBuf;

use tracing::{debug, error, info, warn};

use crate::chat::core::conversation::{Conversation, ConversationMap, DEFAULT_TITLE};
use crate::chat::core::errors::{ChatError, ChatResult};
use crate::chat::core::ids::ConversationId;
use crate::chat::core::message::Message;
use crate::chat::core::notice::Notice;
use crate::chat::pipeline::hooks::TitleGenerator;
use crate::chat::repository::grouping::{DateGroup, group_by_date};
use crate::chat::repository::stats::ConversationStats;
use crate::chat::storage::json_store::ConversationStore;

/// How an imported document is combined with the current conversations.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ImportMode {
    /// Add conversations whose id is not present yet; existing ones win.
    Merge,
    /// Drop everything and take the imported document as is.
    Replace,
}

/// All conversations of the running process.
///
/// Every mutation is flushed to the store right away. A failed flush leaves
/// the in-memory state as mutated and queues an error [`Notice`].
pub struct ConversationRepository {
    conversations: ConversationMap,
    store: Box<dyn ConversationStore>,
    notices: Vec<Notice>,
}

impl ConversationRepository {
    /// Load the repository from `store`.
    ///
    /// A malformed document is logged, reported as a notice and replaced by
    /// an empty repository. It is not overwritten until the next mutation.
    #[must_use]
    pub fn open(store: Box<dyn ConversationStore>) -> Self {
        let mut notices = Vec::new();
        let conversations = match store.load() {
            Ok(conversations) => {
                info!(
                    "Loaded {} conversations from {}",
                    conversations.len(),
                    store.location().display()
                );
                conversations
            }
            Err(err) => {
                error!("Error loading conversations: {err}");
                notices.push(Notice::from(&err));
                ConversationMap::new()
            }
        };

        Self {
            conversations,
            store,
            notices,
        }
    }

    /// Number of conversations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.conversations.len()
    }

    /// Whether there are no conversations.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.conversations.is_empty()
    }

    /// Look up one conversation.
    #[must_use]
    pub fn get(&self, id: &ConversationId) -> Option<&Conversation> {
        self.conversations.get(id)
    }

    /// Whether `id` exists.
    #[must_use]
    pub fn contains(&self, id: &ConversationId) -> bool {
        self.conversations.contains_key(id)
    }

    /// All conversations keyed by id.
    #[must_use]
    pub const fn conversations(&self) -> &ConversationMap {
        &self.conversations
    }

    /// Location of the backing document.
    #[must_use]
    pub fn store_location(&self) -> PathBuf {
        self.store.location()
    }

    /// Conversations, newest first. Equal timestamps order by id.
    #[must_use]
    pub fn list_sorted_by_recency(&self) -> Vec<&Conversation> {
        let mut sorted: Vec<&Conversation> = self.conversations.values().collect();
        sorted.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| a.id.cmp(&b.id))
        });
        sorted
    }

    /// Recency-ordered conversations grouped by date label relative to `today`.
    #[must_use]
    pub fn grouped_by_date(&self, today: chrono::NaiveDate) -> Vec<DateGroup<'_>> {
        group_by_date(self.list_sorted_by_recency(), today)
    }

    /// Start a conversation holding `initial_messages`.
    ///
    /// The title comes from `titler` applied to `first_message`; a blank or
    /// failed title falls back to [`DEFAULT_TITLE`], the failure being
    /// reported as a warning notice.
    pub fn create(
        &mut self,
        first_message: &str,
        initial_messages: Vec<Message>,
        titler: Option<&dyn TitleGenerator>,
    ) -> ConversationId {
        let title = titler.map_or_else(
            || DEFAULT_TITLE.to_string(),
            |titler| self.generate_title(titler, first_message),
        );

        let id = ConversationId::new();
        let conversation = Conversation::new(id.clone(), title, initial_messages);
        info!("Created conversation {id}: {}", conversation.title);
        self.conversations.insert(id.clone(), conversation);
        self.flush();
        id
    }

    /// Change the title of `id`.
    ///
    /// # Errors
    /// Returns [`ChatError::ConversationNotFound`] if `id` does not exist.
    pub fn rename(&mut self, id: &ConversationId, title: &str) -> ChatResult<()> {
        let conversation = self
            .conversations
            .get_mut(id)
            .ok_or_else(|| ChatError::ConversationNotFound(id.clone()))?;
        title.clone_into(&mut conversation.title);
        debug!("Renamed conversation {id} to: {title}");
        self.flush();
        Ok(())
    }

    /// Remove `id` and return what was stored.
    ///
    /// # Errors
    /// Returns [`ChatError::ConversationNotFound`] if `id` does not exist.
    pub fn delete(&mut self, id: &ConversationId) -> ChatResult<Conversation> {
        let removed = self
            .conversations
            .remove(id)
            .ok_or_else(|| ChatError::ConversationNotFound(id.clone()))?;
        info!("Deleted conversation: {id}");
        self.flush();
        Ok(removed)
    }

    /// Replace the history of `id`, and its token count when given.
    ///
    /// # Errors
    /// Returns [`ChatError::ConversationNotFound`] if `id` does not exist.
    pub fn update_messages(
        &mut self,
        id: &ConversationId,
        messages: Vec<Message>,
        token_count: Option<usize>,
    ) -> ChatResult<()> {
        let conversation = self
            .conversations
            .get_mut(id)
            .ok_or_else(|| ChatError::ConversationNotFound(id.clone()))?;
        conversation.messages = messages;
        if let Some(tokens) = token_count {
            conversation.token_count = tokens;
        }
        self.flush();
        Ok(())
    }

    /// Conversations whose title or any message contains `query`, ignoring
    /// case, newest first. A blank query matches everything.
    #[must_use]
    pub fn search(&self, query: &str) -> Vec<&Conversation> {
        let needle = query.trim().to_lowercase();
        self.list_sorted_by_recency()
            .into_iter()
            .filter(|c| needle.is_empty() || c.matches_lowercase(&needle))
            .collect()
    }

    /// Totals over every conversation.
    #[must_use]
    pub fn statistics(&self) -> ConversationStats {
        ConversationStats::collect(self.conversations.values())
    }

    /// Bring in conversations from another document. Returns how many were added.
    pub fn import(&mut self, incoming: ConversationMap, mode: ImportMode) -> usize {
        let added = match mode {
            ImportMode::Replace => {
                let count = incoming.len();
                self.conversations = incoming;
                count
            }
            ImportMode::Merge => {
                let mut count = 0;
                for (id, conversation) in incoming {
                    if self.conversations.contains_key(&id) {
                        debug!("Skipping imported conversation {id}: already present");
                        continue;
                    }
                    self.conversations.insert(id, conversation);
                    count += 1;
                }
                count
            }
        };
        info!("Imported {added} conversations ({mode:?})");
        self.flush();
        added
    }

    /// Write the whole repository to the store.
    ///
    /// Returns `false` when the write failed; the failure is logged and
    /// queued as a notice.
    pub fn flush(&mut self) -> bool {
        match self.store.save(&self.conversations) {
            Ok(()) => true,
            Err(err) => {
                error!("Error saving conversations: {err}");
                self.notices.push(Notice::from(&err));
                false
            }
        }
    }

    /// Queue a notice for the next snapshot.
    pub fn push_notice(&mut self, notice: Notice) {
        self.notices.push(notice);
    }

    /// Drain queued notices.
    pub fn take_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }

    fn generate_title(&mut self, titler: &dyn TitleGenerator, first_message: &str) -> String {
        match titler.generate_title(first_message) {
            Ok(title) if !title.trim().is_empty() => title.trim().to_string(),
            Ok(_) => DEFAULT_TITLE.to_string(),
            Err(err) => {
                warn!("Title generation failed: {err}");
                self.notices.push(Notice::warning(format!(
                    "Could not generate a title ({err}); using \"{DEFAULT_TITLE}\""
                )));
                DEFAULT_TITLE.to_string()
            }
        }
    }
}

impl std::fmt::Debug for ConversationRepository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConversationRepository")
            .field("conversations", &self.conversations.len())
            .field("store", &self.store.location())
            .field("notices", &self.notices)
            .finish()
    }
}
