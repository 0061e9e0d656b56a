//! Conversion of chunks into vector-store records.

use chrono::{DateTime, SecondsFormat, Utc};

use crate::fingerprint::fingerprint;
use crate::models::{Chunk, RecordMetadata, VectorRecord};

/// Default `source` tag for conversation chunks.
pub const DEFAULT_SOURCE_TAG: &str = "chat";

/// Deterministic record id: `chat_<YYYYMMDD>_<HHMMSS>_<ordinal:04>`.
///
/// The same start timestamp and ordinal always give the same id, so
/// re-running a batch overwrites records instead of duplicating them.
pub fn vector_id(start: &DateTime<Utc>, ordinal: usize) -> String {
    format!("chat_{}_{:04}", start.format("%Y%m%d_%H%M%S"), ordinal)
}

/// Format a timestamp as ISO-8601 with a `Z` suffix.
pub fn format_ts_iso(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Fingerprint a chunk and wrap it as a [`VectorRecord`].
pub fn build_record(chunk: &Chunk, source_tag: &str) -> VectorRecord {
    let fp = fingerprint(&chunk.text);
    VectorRecord {
        id: vector_id(&chunk.start_timestamp, chunk.ordinal),
        text: chunk.text.clone(),
        metadata: RecordMetadata {
            session_id: chunk.session_id.clone(),
            ordinal: chunk.ordinal,
            start_timestamp: format_ts_iso(&chunk.start_timestamp),
            exact_hash: fp.exact_hex(),
            approx_fingerprint: fp.approx_hex(),
            length: chunk.text.chars().count(),
            source: source_tag.to_string(),
        },
    }
}
