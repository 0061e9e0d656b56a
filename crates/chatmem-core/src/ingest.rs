//! Ingest pipeline: messages → chunks → records → vector store.
//!
//! One run reads the checkpoint, fetches messages newer than it, chunks
//! them, fingerprints and de-duplicates the chunks, upserts the survivors in
//! batches, and finally records the timestamp of the last message fetched.
//! The checkpoint is written only after every batch was upserted, so a
//! failed run is retried from the same point. Record ids are deterministic,
//! so re-processing the boundary message overwrites rather than duplicates.

use anyhow::Result;
use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::chunk::{chunk_messages, ChunkParams, RoleLabels};
use crate::dedup::{dedupe_records, DEFAULT_MAX_HAMMING};
use crate::models::VectorRecord;
use crate::record::{build_record, DEFAULT_SOURCE_TAG};
use crate::store::{CheckpointStore, MessageSource, VectorStore};

/// Records per upsert request.
pub const DEFAULT_BATCH_SIZE: usize = 96;

/// Parameters for one ingest run.
#[derive(Debug, Clone)]
pub struct IngestOptions {
    /// Vector-store namespace to write to.
    pub namespace: String,
    /// Start point; the stored checkpoint is used when `None`.
    pub since: Option<DateTime<Utc>>,
    /// Maximum messages fetched in one run.
    pub limit: usize,
    pub chunking: ChunkParams,
    pub labels: RoleLabels,
    pub max_hamming: u32,
    pub source_tag: String,
    pub batch_size: usize,
    /// Build records but write nothing.
    pub dry_run: bool,
}

impl IngestOptions {
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            since: None,
            limit: 1000,
            chunking: ChunkParams::default(),
            labels: RoleLabels::default(),
            max_hamming: DEFAULT_MAX_HAMMING,
            source_tag: DEFAULT_SOURCE_TAG.to_string(),
            batch_size: DEFAULT_BATCH_SIZE,
            dry_run: false,
        }
    }
}

/// Outcome of one ingest run.
#[derive(Debug, Clone, Default)]
pub struct IngestReport {
    pub since: Option<DateTime<Utc>>,
    pub messages: usize,
    pub chunks: usize,
    pub duplicates: usize,
    /// Records written (zero for a dry run).
    pub upserted: usize,
    /// Timestamp of the last message fetched.
    pub last_message_ts: Option<DateTime<Utc>>,
    /// Records that survived de-duplication, in chunk order.
    pub records: Vec<VectorRecord>,
}

/// Run the full ingest pipeline once.
pub async fn run_ingest(
    messages: &dyn MessageSource,
    checkpoints: &dyn CheckpointStore,
    vectors: &dyn VectorStore,
    opts: &IngestOptions,
) -> Result<IngestReport> {
    let since = match opts.since {
        Some(ts) => Some(ts),
        None => checkpoints.last_processed().await?,
    };

    let fetched = messages.fetch_messages(since, opts.limit).await?;
    let mut report = IngestReport {
        since,
        messages: fetched.len(),
        last_message_ts: fetched.last().map(|m| m.timestamp),
        ..Default::default()
    };
    if fetched.is_empty() {
        info!(since = ?since, "no new messages");
        return Ok(report);
    }

    let chunks = chunk_messages(&fetched, &opts.chunking, &opts.labels);
    report.chunks = chunks.len();

    let records: Vec<VectorRecord> = chunks
        .iter()
        .map(|chunk| build_record(chunk, &opts.source_tag))
        .collect();
    let records = dedupe_records(records, opts.max_hamming);
    report.duplicates = report.chunks - records.len();
    info!(
        messages = report.messages,
        chunks = report.chunks,
        duplicates = report.duplicates,
        "chunked batch"
    );

    if !opts.dry_run {
        for batch in records.chunks(opts.batch_size.max(1)) {
            vectors.upsert(&opts.namespace, batch).await?;
            report.upserted += batch.len();
            debug!(namespace = %opts.namespace, count = batch.len(), "upserted batch");
        }
        if let Some(ts) = report.last_message_ts {
            checkpoints.record_processed(ts).await?;
        }
        info!(upserted = report.upserted, "ingest complete");
    }

    report.records = records;
    Ok(report)
}
