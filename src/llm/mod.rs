//! Model backends and token counters that plug into the chat hooks.

pub mod echo;
pub mod ollama;
pub mod tokens;

use tracing::{info, warn};

use crate::chat::core::config::{Backend, LlmConfig, TokenCounterKind};
use crate::chat::pipeline::hooks::ChatHooks;

pub use echo::EchoResponder;
pub use ollama::{OllamaChat, OllamaError};
pub use tokens::{CharCounter, WordCounter};

/// Assemble the hooks described by `config`.
///
/// # Errors
/// Returns an error if the Ollama client cannot be built.
pub fn build_hooks(config: &LlmConfig) -> Result<ChatHooks, OllamaError> {
    let mut hooks = ChatHooks::none();

    match config.backend {
        Backend::Ollama => {
            let client = OllamaChat::from_config(config)?;
            info!("Using Ollama model {}", client.model());
            if config.generate_titles {
                hooks = hooks.with_titler(client.clone());
            }
            hooks = hooks.with_responder(client);
        }
        Backend::Echo => hooks = hooks.with_responder(EchoResponder),
        Backend::None => {}
    }

    hooks = match config.token_counter {
        TokenCounterKind::Words => hooks.with_counter(WordCounter),
        TokenCounterKind::Chars => hooks.with_counter(CharCounter),
        TokenCounterKind::None => hooks,
    };
    Ok(hooks)
}

/// Whether the configured backend can answer right now.
///
/// Only the Ollama backend needs a server; the others always report ready.
/// An unreachable server is logged, not treated as fatal: the pipeline will
/// report each failed generation as it happens.
#[must_use]
pub fn backend_reachable(config: &LlmConfig) -> bool {
    if config.backend != Backend::Ollama {
        return true;
    }
    let ready = OllamaChat::from_config(config).and_then(|client| client.is_ready());
    match ready {
        Ok(true) => true,
        Ok(false) => {
            warn!("Ollama answered but is not ready");
            false
        }
        Err(err) => {
            warn!("Ollama is not reachable: {err}");
            false
        }
    }
}
