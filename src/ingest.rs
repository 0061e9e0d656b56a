//! `chatmem ingest`: chunk new messages into the vector store.

use anyhow::{anyhow, Result};
use chrono::{DateTime, NaiveDate, Utc};

use chatmem_core::ingest::{run_ingest, IngestOptions};
use chatmem_core::select::parse_timestamp;
use chatmem_core::store::memory::InMemoryVectorStore;
use chatmem_core::store::VectorStore;

use crate::config::Config;
use crate::db;
use crate::sqlite_store::SqliteStore;
use crate::vector_client::RecordsClient;

/// Records shown by a dry run.
const DRY_RUN_PREVIEW: usize = 3;

/// Parse `--since`: an ISO-8601 timestamp or a plain `YYYY-MM-DD` date
/// (midnight UTC).
pub fn parse_since(s: &str) -> Result<DateTime<Utc>> {
    if let Some(ts) = parse_timestamp(s) {
        return Ok(ts);
    }
    let date = NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
        .map_err(|_| anyhow!("Invalid --since value '{}': expected ISO-8601 or YYYY-MM-DD", s))?;
    date.and_hms_opt(0, 0, 0)
        .map(|naive| naive.and_utc())
        .ok_or_else(|| anyhow!("Invalid --since value '{}'", s))
}

pub async fn run_ingest_cmd(
    config: &Config,
    since: Option<String>,
    limit: Option<usize>,
    dry_run: bool,
) -> Result<()> {
    let since = since.as_deref().map(parse_since).transpose()?;

    let pool = db::connect(config).await?;
    let store = SqliteStore::new(pool);

    // A dry run never touches the index, so it needs neither host nor key.
    let vectors: Box<dyn VectorStore> = if dry_run {
        Box::new(InMemoryVectorStore::new())
    } else {
        Box::new(RecordsClient::from_config(&config.vector_store)?)
    };

    let opts = IngestOptions {
        namespace: config.vector_store.namespace.clone(),
        since,
        limit: limit.unwrap_or(config.ingest.limit),
        chunking: config.chunk_params(),
        labels: config.role_labels(),
        max_hamming: config.dedup.max_hamming,
        source_tag: config.ingest.source_tag.clone(),
        batch_size: config.vector_store.batch_size,
        dry_run,
    };

    let report = run_ingest(&store, &store, vectors.as_ref(), &opts).await?;

    if dry_run {
        println!("ingest {} (dry-run)", opts.namespace);
    } else {
        println!("ingest {}", opts.namespace);
    }
    match report.since {
        Some(ts) => println!("  since: {}", ts.to_rfc3339()),
        None => println!("  since: (beginning)"),
    }
    println!("  messages: {}", report.messages);
    println!("  chunks: {}", report.chunks);
    println!("  duplicates dropped: {}", report.duplicates);

    if dry_run {
        println!("  records: {}", report.records.len());
        for record in report.records.iter().take(DRY_RUN_PREVIEW) {
            println!("    {}", serde_json::to_string(record)?);
        }
        return Ok(());
    }

    println!("  upserted: {}", report.upserted);
    if let Some(ts) = report.last_message_ts {
        println!("  checkpoint: {}", ts.to_rfc3339());
    }
    println!("ok");
    Ok(())
}
