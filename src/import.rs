//! `chatmem import`: load JSON-lines messages into the message table.

use anyhow::{Context, Result};
use std::path::Path;
use tracing::info;

use chatmem_core::models::Message;

use crate::config::Config;
use crate::db;
use crate::sqlite_store::SqliteStore;

/// Parse a JSON-lines file of `{session_id, ts, role, content}` objects.
/// Blank lines are skipped.
pub fn read_messages(path: &Path) -> Result<Vec<Message>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read message file: {}", path.display()))?;
    parse_messages(&content).with_context(|| format!("In message file: {}", path.display()))
}

pub fn parse_messages(content: &str) -> Result<Vec<Message>> {
    content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(i, line)| {
            serde_json::from_str::<Message>(line)
                .with_context(|| format!("Invalid message on line {}", i + 1))
        })
        .collect()
}

pub async fn run_import(config: &Config, path: &Path) -> Result<()> {
    let messages = read_messages(path)?;
    let pool = db::connect(config).await?;
    let store = SqliteStore::new(pool);
    let inserted = store.insert_messages(&messages).await?;
    info!(read = messages.len(), inserted, "imported messages");

    println!("import {}", path.display());
    println!("  read: {} messages", messages.len());
    println!("  inserted: {}", inserted);
    println!("  skipped (already present): {}", messages.len() - inserted);
    println!("ok");
    Ok(())
}
