//! `chatmem chunk`: preview chunking of a message file without any store.

use anyhow::Result;
use std::path::Path;

use chatmem_core::chunk::chunk_messages;
use chatmem_core::models::VectorRecord;
use chatmem_core::record::build_record;

use crate::config::Config;
use crate::import::read_messages;

/// Chunk every message in `path` and print the resulting records.
pub fn run_chunk_preview(config: &Config, path: &Path, json: bool) -> Result<()> {
    let messages = read_messages(path)?;
    let chunks = chunk_messages(&messages, &config.chunk_params(), &config.role_labels());
    let records: Vec<VectorRecord> = chunks
        .iter()
        .map(|chunk| build_record(chunk, &config.ingest.source_tag))
        .collect();

    if json {
        println!("{}", serde_json::to_string_pretty(&records)?);
        return Ok(());
    }

    for record in &records {
        let meta = &record.metadata;
        println!(
            "#{} {} (session {}, {} chars)",
            meta.ordinal, meta.start_timestamp, meta.session_id, meta.length
        );
        println!("    id: {}", record.id);
        println!("    simhash64: {}", meta.approx_fingerprint);
        for line in record.text.lines() {
            println!("    | {}", line);
        }
        println!();
    }
    println!("messages: {}", messages.len());
    println!("chunks: {}", records.len());
    Ok(())
}
