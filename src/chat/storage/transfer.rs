//! Export, import and backup of store documents.
//!
//! All three speak the store's own document format, so an export can be fed
//! straight back as a store file.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use tracing::info;

use crate::chat::core::conversation::ConversationMap;
use crate::chat::core::errors::{ChatError, ChatResult};

/// Write `conversations` to `path` in store format.
///
/// # Errors
/// Returns an error if serialization or the write fails.
pub fn export_to(conversations: &ConversationMap, path: &Path) -> ChatResult<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let body = serde_json::to_string_pretty(conversations)?;
    fs::write(path, body)?;
    info!(
        "Exported {} conversations to {}",
        conversations.len(),
        path.display()
    );
    Ok(())
}

/// Read and validate a document for import.
///
/// # Errors
/// Returns an error if the file is unreadable, malformed, or contains records
/// whose key and id disagree.
pub fn read_import(path: &Path) -> ChatResult<ConversationMap> {
    let raw = fs::read_to_string(path)?;
    let conversations: ConversationMap = serde_json::from_str(&raw)
        .map_err(|err| ChatError::InvalidImport(format!("{}: {err}", path.display())))?;

    for (key, conversation) in &conversations {
        if !key.is_valid() {
            return Err(ChatError::InvalidImport("blank conversation id".to_string()));
        }
        if &conversation.id != key {
            return Err(ChatError::InvalidImport(format!(
                "record {} is stored under key {key}",
                conversation.id
            )));
        }
    }

    Ok(conversations)
}

/// Copy the store document into `backup_dir`, stamped with `now`.
///
/// The copy is named `<stem>.backup-<YYYYmmdd-HHMMSS>.json`.
///
/// # Errors
/// Returns an error if the store document is missing or the copy fails.
pub fn backup(store_path: &Path, backup_dir: &Path, now: NaiveDateTime) -> ChatResult<PathBuf> {
    let stem = store_path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("conversations");
    let target = backup_dir.join(format!(
        "{stem}.backup-{}.json",
        now.format("%Y%m%d-%H%M%S")
    ));

    fs::create_dir_all(backup_dir)?;
    fs::copy(store_path, &target)?;
    info!("Backed up {} to {}", store_path.display(), target.display());
    Ok(target)
}
