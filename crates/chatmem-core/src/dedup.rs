//! Ingest-time and result-time duplicate filtering.
//!
//! [`Deduplicator`] filters the records of one ingest run: a record is
//! dropped when its exact hash was already accepted, or when its simhash is
//! within `max_hamming` bits of *any* fingerprint accepted earlier in the
//! run. Every check is a linear scan over accepted fingerprints; a run holds
//! at most one batch of chunks.
//!
//! [`dedupe_hits`] collapses search results that carry the same content
//! signature.

use std::collections::HashSet;

use tracing::debug;

use crate::fingerprint::{content_hash, hamming_distance, parse_simhash};
use crate::models::{SelectedHit, VectorRecord};

/// Default Hamming-distance threshold for near-duplicates.
pub const DEFAULT_MAX_HAMMING: u32 = 3;

/// Why a record was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    ExactDuplicate,
    NearDuplicate { distance: u32 },
}

/// Per-run duplicate filter. State never outlives one run.
#[derive(Debug, Clone)]
pub struct Deduplicator {
    max_hamming: u32,
    seen_hashes: HashSet<String>,
    seen_simhashes: Vec<u64>,
}

impl Deduplicator {
    pub fn new(max_hamming: u32) -> Self {
        Self {
            max_hamming,
            seen_hashes: HashSet::new(),
            seen_simhashes: Vec::new(),
        }
    }

    /// Check `record` against everything accepted so far and, if it is new,
    /// remember it.
    pub fn check(&mut self, record: &VectorRecord) -> Result<(), Rejection> {
        let meta = &record.metadata;
        if self.seen_hashes.contains(&meta.exact_hash) {
            return Err(Rejection::ExactDuplicate);
        }

        // A record without a readable simhash can only be an exact duplicate.
        let simhash = parse_simhash(&meta.approx_fingerprint);
        if let Some(sh) = simhash {
            if let Some(distance) = self
                .seen_simhashes
                .iter()
                .map(|&prior| hamming_distance(sh, prior))
                .find(|&d| d <= self.max_hamming)
            {
                return Err(Rejection::NearDuplicate { distance });
            }
        }

        self.seen_hashes.insert(meta.exact_hash.clone());
        if let Some(sh) = simhash {
            self.seen_simhashes.push(sh);
        }
        Ok(())
    }

    /// Number of records accepted so far.
    pub fn accepted(&self) -> usize {
        self.seen_hashes.len()
    }
}

impl Default for Deduplicator {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_HAMMING)
    }
}

/// Drop exact and near duplicates, keeping survivors in input order.
pub fn dedupe_records(records: Vec<VectorRecord>, max_hamming: u32) -> Vec<VectorRecord> {
    let mut dedup = Deduplicator::new(max_hamming);
    records
        .into_iter()
        .filter(|record| match dedup.check(record) {
            Ok(()) => true,
            Err(reason) => {
                debug!(id = %record.id, ?reason, "dropping duplicate chunk");
                false
            }
        })
        .collect()
}

/// Signature used to collapse search results: exact hash, else simhash,
/// else a hash of the text. Empty fields count as absent.
pub fn hit_signature(hit: &SelectedHit) -> String {
    let fields = &hit.hit.fields;
    let non_empty = |v: &Option<String>| v.as_deref().filter(|s| !s.is_empty()).map(str::to_string);
    non_empty(&fields.exact_hash)
        .or_else(|| non_empty(&fields.approx_fingerprint))
        .unwrap_or_else(|| content_hash(fields.text.as_deref().unwrap_or("")))
}

/// Drop later hits whose signature was already seen. Order is preserved.
pub fn dedupe_hits(hits: Vec<SelectedHit>) -> Vec<SelectedHit> {
    let mut seen = HashSet::new();
    hits.into_iter()
        .filter(|hit| seen.insert(hit_signature(hit)))
        .collect()
}
