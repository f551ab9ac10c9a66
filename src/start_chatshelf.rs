//! Startup helpers and the interactive terminal front end.

use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result, bail};
use tracing::{error, info};

use crate::chat::core::config::ChatConfig;
use crate::chat::core::errors::ChatError;
use crate::chat::core::ids::ConversationId;
use crate::chat::format::{format_markdown_message, transcript_markdown};
use crate::chat::pipeline::submit::Reply;
use crate::chat::repository::conversations::{ConversationRepository, ImportMode};
use crate::chat::session::events::{ChatSession, SessionEvent, SessionSnapshot};
use crate::chat::storage::json_store::JsonFileStore;
use crate::llm::{backend_reachable, build_hooks};

/// Config file read when none is given on the command line.
pub const DEFAULT_CONFIG_PATH: &str = "chatshelf.json";

const HELP: &str = "\
Commands:
  /new                      start a new conversation
  /list                     list conversations, newest first
  /open <n|id>              switch to a conversation
  /rename <n|id> <title>    rename a conversation
  /delete <n|id>            delete a conversation
  /search <text>            search titles and messages
  /stats                    show totals
  /transcript               print the current conversation as markdown
  /export <file>            write all conversations to a file
  /import <file> [replace]  merge (or replace with) conversations from a file
  /backup [dir]             copy the store file into a backup directory
  /help                     show this help
  /quit                     leave
Anything else is sent as a message.";

/// Install the `tracing` subscriber. Logs go to stderr; `RUST_LOG` overrides the `info` default.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .init();
}

/// Load the configuration at `path` and apply environment overrides.
///
/// # Errors
/// Returns an error if the file exists but is invalid.
pub fn load_config(path: &Path) -> Result<ChatConfig> {
    let config = ChatConfig::load(path)
        .with_context(|| format!("loading config from {}", path.display()))?
        .with_env_overrides();
    config.validate().context("validating config")?;
    Ok(config)
}

/// Open the store and hooks described by `config`.
///
/// # Errors
/// Returns an error if the model backend cannot be set up.
pub fn open_session(config: ChatConfig) -> Result<ChatSession> {
    let hooks = build_hooks(&config.llm).context("building model backend")?;
    if !backend_reachable(&config.llm) {
        info!("Model server not reachable yet; replies fail until it is up");
    }
    let store = JsonFileStore::new(&config.storage.path);
    let repo = ConversationRepository::open(Box::new(store));
    info!(
        "Opened {} with {} conversations",
        config.storage.path.display(),
        repo.len()
    );
    Ok(ChatSession::new(config, repo, hooks))
}

/// Run the terminal front end (used by the `chatshelf` binary).
///
/// # Returns
/// `ExitCode::SUCCESS` on `/quit` or end of input, `1` on failure.
#[must_use]
pub fn run() -> ExitCode {
    init_tracing();
    info!("Starting chatshelf v{}", env!("CARGO_PKG_VERSION"));

    let config_path = std::env::args_os()
        .nth(1)
        .map_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH), PathBuf::from);

    let outcome = load_config(&config_path).and_then(open_session).and_then(|mut session| {
        let stdin = std::io::stdin();
        let stdout = std::io::stdout();
        run_repl(&mut session, stdin.lock(), stdout.lock())
    });

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err:#}");
            ExitCode::from(1)
        }
    }
}

/// Read lines from `input` until `/quit` or end of input, answering on `output`.
///
/// Command mistakes are reported on `output` and do not end the loop.
///
/// # Errors
/// Returns an error only if reading input or writing output fails.
pub fn run_repl(session: &mut ChatSession, input: impl BufRead, mut output: impl Write) -> Result<()> {
    let display = session.config().display.clone();
    writeln!(output, "{} - type /help for commands", display.header_title)?;
    if !display.byline_text.is_empty() {
        writeln!(output, "{}", display.byline_text)?;
    }
    prompt(&mut output, &display.chat_placeholder)?;

    for line in input.lines() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() {
            prompt(&mut output, &display.chat_placeholder)?;
            continue;
        }

        match parse_command(line, session) {
            Ok(Command::Quit) => break,
            Ok(Command::Help) => writeln!(output, "{HELP}")?,
            Ok(Command::List) => write_list(session, &mut output)?,
            Ok(Command::Stats) => write_stats(session, &mut output)?,
            Ok(Command::Transcript) => write_transcript(session, &mut output)?,
            Ok(Command::Event(event)) => {
                let starts_new = matches!(event, SessionEvent::NewConversation);
                if matches!(event, SessionEvent::Submit(_)) && session.can_generate() {
                    writeln!(output, "{}", display.spinner_text)?;
                }
                match session.handle(event) {
                    Ok(snapshot) => {
                        if starts_new {
                            writeln!(output, "{}", display.new_conversation_label)?;
                        }
                        write_snapshot(&snapshot, &mut output)?;
                    }
                    Err(err) => writeln!(output, "{}: {err}", error_tag(&err))?,
                }
            }
            Err(err) => writeln!(output, "error: {err:#}")?,
        }
        prompt(&mut output, &display.chat_placeholder)?;
    }
    Ok(())
}

fn prompt(output: &mut impl Write, placeholder: &str) -> Result<()> {
    write!(output, "{placeholder} ")?;
    output.flush()?;
    Ok(())
}

/// Failures the session survives are warnings; rejected requests are errors.
const fn error_tag(err: &ChatError) -> &'static str {
    if err.is_degraded() { "warning" } else { "error" }
}

enum Command {
    Event(SessionEvent),
    List,
    Stats,
    Transcript,
    Help,
    Quit,
}

fn parse_command(line: &str, session: &ChatSession) -> Result<Command> {
    let Some(rest) = line.strip_prefix('/') else {
        return Ok(Command::Event(SessionEvent::Submit(line.to_string())));
    };
    let (name, args) = rest
        .split_once(char::is_whitespace)
        .map_or((rest, ""), |(name, args)| (name, args.trim()));

    let command = match name {
        "new" => Command::Event(SessionEvent::NewConversation),
        "list" | "ls" => Command::List,
        "open" => Command::Event(SessionEvent::Select(resolve(session, args)?)),
        "rename" => {
            require_edit_options(session)?;
            let (target, title) = args
                .split_once(char::is_whitespace)
                .context("usage: /rename <n|id> <title>")?;
            Command::Event(SessionEvent::CommitRename {
                id: resolve(session, target)?,
                title: title.trim().to_string(),
            })
        }
        "delete" | "rm" => {
            require_edit_options(session)?;
            Command::Event(SessionEvent::Delete(resolve(session, args)?))
        }
        "search" => Command::Event(SessionEvent::Search(args.to_string())),
        "stats" => Command::Stats,
        "transcript" => Command::Transcript,
        "export" => {
            if args.is_empty() {
                bail!("usage: /export <file>");
            }
            Command::Event(SessionEvent::Export(PathBuf::from(args)))
        }
        "import" => {
            let (path, mode) = match args.rsplit_once(char::is_whitespace) {
                Some((path, "replace")) => (path.trim(), ImportMode::Replace),
                _ => (args, ImportMode::Merge),
            };
            if path.is_empty() {
                bail!("usage: /import <file> [replace]");
            }
            Command::Event(SessionEvent::Import {
                path: PathBuf::from(path),
                mode,
            })
        }
        "backup" => {
            let dir = if args.is_empty() {
                session.config().storage.backup_dir.clone()
            } else {
                PathBuf::from(args)
            };
            Command::Event(SessionEvent::Backup(dir))
        }
        "help" | "?" => Command::Help,
        "quit" | "exit" | "q" => Command::Quit,
        other => bail!("unknown command /{other}"),
    };
    Ok(command)
}

fn require_edit_options(session: &ChatSession) -> Result<()> {
    if !session.config().display.show_edit_options {
        bail!("editing is disabled (display.show_edit_options = false)");
    }
    Ok(())
}

/// Ids in the order `/list` numbers them.
fn listed_ids(session: &ChatSession) -> Vec<ConversationId> {
    session
        .sidebar()
        .into_iter()
        .flat_map(|group| group.entries)
        .map(|entry| entry.id)
        .collect()
}

/// Turn a 1-based position in `/list`, or a literal id, into an id.
fn resolve(session: &ChatSession, reference: &str) -> Result<ConversationId> {
    if reference.is_empty() {
        bail!("missing conversation number or id");
    }
    if let Ok(position) = reference.parse::<usize>() {
        let listed = listed_ids(session);
        if let Some(id) = position.checked_sub(1).and_then(|i| listed.get(i)) {
            return Ok(id.clone());
        }
    }
    Ok(reference.parse()?)
}

fn write_snapshot(snapshot: &SessionSnapshot, output: &mut impl Write) -> Result<()> {
    for notice in &snapshot.notices {
        writeln!(output, "{notice}")?;
    }
    match &snapshot.reply {
        Some(Reply::Generated(text)) => writeln!(output, "{text}")?,
        Some(Reply::Failed(reason)) => writeln!(output, "(no reply: {reason})")?,
        Some(Reply::Skipped) | None => {}
    }
    if let Some(results) = &snapshot.search_results {
        if results.is_empty() {
            writeln!(output, "no matches")?;
        }
        for entry in results {
            writeln!(output, "  {}  {}", entry.id, entry.display_title)?;
        }
    }
    Ok(())
}

fn write_list(session: &ChatSession, output: &mut impl Write) -> Result<()> {
    let sidebar = session.sidebar();
    if sidebar.is_empty() {
        writeln!(output, "no conversations yet")?;
    }
    let mut position = 0;
    for group in &sidebar {
        if let Some(label) = &group.label {
            writeln!(output, "{label}")?;
        }
        for entry in &group.entries {
            position += 1;
            let marker = if entry.is_current { '*' } else { ' ' };
            let created = session
                .repository()
                .get(&entry.id)
                .map(|c| c.created_at.format("%Y-%m-%d %H:%M").to_string())
                .unwrap_or_default();
            writeln!(
                output,
                "{marker}{position:>3}. {}  [{created}]",
                entry.display_title
            )?;
        }
    }
    Ok(())
}

fn write_stats(session: &ChatSession, output: &mut impl Write) -> Result<()> {
    let stats = session.repository().statistics();
    writeln!(
        output,
        "{} conversations, {} messages ({} user, {} assistant, {} system), {} tokens, {:.1} messages per conversation",
        stats.conversations,
        stats.messages,
        stats.user_messages,
        stats.assistant_messages,
        stats.system_messages,
        stats.tokens,
        stats.average_messages()
    )?;
    Ok(())
}

fn write_transcript(session: &ChatSession, output: &mut impl Write) -> Result<()> {
    let conversation = session
        .state()
        .current_id()
        .and_then(|id| session.repository().get(id));
    match conversation {
        Some(conversation) => writeln!(output, "{}", transcript_markdown(conversation))?,
        None => {
            for message in session.state().messages() {
                writeln!(output, "{}", format_markdown_message(message))?;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::core::config::{Backend, TokenCounterKind};
    use crate::chat::storage::json_store::MemoryStore;

    fn offline_session() -> ChatSession {
        offline_session_with(|_| {})
    }

    fn offline_session_with(adjust: impl FnOnce(&mut ChatConfig)) -> ChatSession {
        let mut config = ChatConfig::default();
        config.llm.backend = Backend::Echo;
        config.llm.token_counter = TokenCounterKind::Words;
        adjust(&mut config);
        let hooks = build_hooks(&config.llm).unwrap_or_default();
        let repo = ConversationRepository::open(Box::new(MemoryStore::new()));
        ChatSession::new(config, repo, hooks)
    }

    fn drive(session: &mut ChatSession, script: &str) -> String {
        let mut out = Vec::new();
        let result = run_repl(session, script.as_bytes(), &mut out);
        assert!(result.is_ok());
        String::from_utf8(out).unwrap_or_default()
    }

    #[test]
    fn test_repl_chat_and_list() {
        let mut session = offline_session();
        let out = drive(&mut session, "hello\n/list\n/quit\nnever sent\n");

        assert!(out.contains("Hello there!"));
        assert!(out.contains("*  1. New Conversation (9)"));
        assert_eq!(session.repository().len(), 1);
    }

    #[test]
    fn test_repl_rename_and_delete_by_position() {
        let mut session = offline_session();
        drive(&mut session, "first\n/new\nsecond\n");
        assert_eq!(session.repository().len(), 2);

        drive(&mut session, "/rename 2 Oldest one\n");
        let titles: Vec<String> = session
            .repository()
            .list_sorted_by_recency()
            .iter()
            .map(|c| c.title.clone())
            .collect();
        assert!(titles.contains(&"Oldest one".to_string()));

        drive(&mut session, "/delete 1\n/delete 1\n");
        assert!(session.repository().is_empty());
    }

    #[test]
    fn test_repl_reports_mistakes_and_keeps_going() {
        let mut session = offline_session();
        let out = drive(&mut session, "/bogus\n/open 9\n/export\n/help\n");

        assert!(out.contains("unknown command /bogus"));
        assert!(out.contains("not found"));
        assert!(out.contains("usage: /export <file>"));
        assert!(out.contains("/transcript"));
    }

    #[test]
    fn test_list_follows_sidebar_rules() {
        let mut session = offline_session_with(|config| {
            config.llm.token_counter = TokenCounterKind::None;
            config.display.date_grouping = true;
            config.display.show_token_count = true;
        });
        let out = drive(&mut session, "hello\n/list\n");

        assert!(!out.contains("(0)"));
        assert!(out.contains("Today\n*  1. New Conversation  ["));
    }

    #[test]
    fn test_list_numbers_across_groups_without_headings() {
        let mut session = offline_session_with(|config| {
            config.display.date_grouping = false;
            config.display.show_token_count = false;
        });
        let out = drive(&mut session, "one\n/new\ntwo\n/list\n/open 2\n");

        assert!(!out.contains("Today"));
        assert!(out.contains("   2. New Conversation  ["));
        let listed = listed_ids(&session);
        assert_eq!(listed.len(), 2);
        assert_eq!(session.state().current_id(), listed.get(1));
    }

    #[test]
    fn test_display_texts_are_shown() {
        let mut session = offline_session_with(|config| {
            config.display.byline_text = "kept locally".to_string();
            config.display.chat_placeholder = "you>".to_string();
            config.display.spinner_text = "working...".to_string();
            config.display.new_conversation_label = "(fresh chat)".to_string();
        });
        let out = drive(&mut session, "hi\n/new\n");

        assert!(out.contains("kept locally\nyou> "));
        assert!(out.contains("working...\n"));
        assert!(out.contains("(fresh chat)"));
    }

    #[test]
    fn test_no_spinner_without_generator() {
        let mut session = offline_session_with(|config| {
            config.llm.backend = Backend::None;
            config.display.spinner_text = "working...".to_string();
        });
        let out = drive(&mut session, "note\n");
        assert!(!out.contains("working..."));
        assert_eq!(session.repository().len(), 1);
    }

    #[test]
    fn test_edit_commands_respect_show_edit_options() {
        let mut session = offline_session_with(|config| {
            config.display.show_edit_options = false;
        });
        let out = drive(&mut session, "keep\n/rename 1 Other\n/delete 1\n");

        assert_eq!(out.matches("editing is disabled").count(), 2);
        assert_eq!(session.repository().len(), 1);
        let titles: Vec<&str> = session
            .repository()
            .list_sorted_by_recency()
            .iter()
            .map(|c| c.title.as_str())
            .collect();
        assert_eq!(titles, vec!["New Conversation"]);
    }

    #[test]
    fn test_error_tag_follows_severity() {
        assert_eq!(error_tag(&ChatError::Callback("down".to_string())), "warning");
        assert_eq!(error_tag(&ChatError::EmptyMessage), "error");
    }

    #[test]
    fn test_parse_import_modes() {
        let session = offline_session();
        let merge = parse_command("/import dump.json", &session);
        assert!(matches!(
            merge,
            Ok(Command::Event(SessionEvent::Import { mode: ImportMode::Merge, .. }))
        ));
        let replace = parse_command("/import my dump.json replace", &session);
        assert!(matches!(
            replace,
            Ok(Command::Event(SessionEvent::Import { ref path, mode: ImportMode::Replace }))
                if path.as_path() == Path::new("my dump.json")
        ));
    }
}
