//! Caller-supplied capabilities invoked by the pipeline.
//!
//! Each hook is independently optional. A missing response generator turns
//! the pipeline into pure history recording; a missing counter disables
//! truncation and token accounting; a missing title generator yields the
//! default title.

use crate::chat::core::message::Message;

/// Error type returned by hooks.
pub type HookError = Box<dyn std::error::Error + Send + Sync>;

/// Produces the assistant reply for a history.
pub trait ResponseGenerator: Send + Sync {
    /// Generate a reply for `messages`, oldest first.
    ///
    /// # Errors
    /// Returns an error if the backend fails; the pipeline surfaces it.
    fn generate(&self, messages: &[Message]) -> Result<String, HookError>;
}

/// Produces a conversation title from its first user message.
pub trait TitleGenerator: Send + Sync {
    /// Generate a title for a conversation opened with `first_message`.
    ///
    /// # Errors
    /// Returns an error if the backend fails; the default title is used instead.
    fn generate_title(&self, first_message: &str) -> Result<String, HookError>;
}

/// Counts tokens of a history.
pub trait TokenCounter: Send + Sync {
    /// Count tokens across `messages`.
    ///
    /// # Errors
    /// Returns an error if counting fails.
    fn count_tokens(&self, messages: &[Message]) -> Result<usize, HookError>;
}

impl<F> ResponseGenerator for F
where
    F: Fn(&[Message]) -> Result<String, HookError> + Send + Sync,
{
    fn generate(&self, messages: &[Message]) -> Result<String, HookError> {
        self(messages)
    }
}

impl<F> TitleGenerator for F
where
    F: Fn(&str) -> Result<String, HookError> + Send + Sync,
{
    fn generate_title(&self, first_message: &str) -> Result<String, HookError> {
        self(first_message)
    }
}

impl<F> TokenCounter for F
where
    F: Fn(&[Message]) -> Result<usize, HookError> + Send + Sync,
{
    fn count_tokens(&self, messages: &[Message]) -> Result<usize, HookError> {
        self(messages)
    }
}

/// The set of optional capabilities handed to a session.
#[derive(Default)]
pub struct ChatHooks {
    responder: Option<Box<dyn ResponseGenerator>>,
    titler: Option<Box<dyn TitleGenerator>>,
    counter: Option<Box<dyn TokenCounter>>,
}

impl ChatHooks {
    /// No capabilities: history recording only.
    #[must_use]
    pub fn none() -> Self {
        Self::default()
    }

    /// Install a response generator.
    #[must_use]
    pub fn with_responder(mut self, responder: impl ResponseGenerator + 'static) -> Self {
        self.responder = Some(Box::new(responder));
        self
    }

    /// Install a title generator.
    #[must_use]
    pub fn with_titler(mut self, titler: impl TitleGenerator + 'static) -> Self {
        self.titler = Some(Box::new(titler));
        self
    }

    /// Install a token counter.
    #[must_use]
    pub fn with_counter(mut self, counter: impl TokenCounter + 'static) -> Self {
        self.counter = Some(Box::new(counter));
        self
    }

    /// Installed response generator, if any.
    #[must_use]
    pub fn responder(&self) -> Option<&dyn ResponseGenerator> {
        self.responder.as_deref()
    }

    /// Installed title generator, if any.
    #[must_use]
    pub fn titler(&self) -> Option<&dyn TitleGenerator> {
        self.titler.as_deref()
    }

    /// Installed token counter, if any.
    #[must_use]
    pub fn counter(&self) -> Option<&dyn TokenCounter> {
        self.counter.as_deref()
    }
}

impl std::fmt::Debug for ChatHooks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatHooks")
            .field("responder", &self.responder.is_some())
            .field("titler", &self.titler.is_some())
            .field("counter", &self.counter.is_some())
            .finish()
    }
}
