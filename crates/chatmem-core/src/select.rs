//! Retrieval-time hit selection.
//!
//! The vector store returns hits ranked by raw similarity. Raw similarity
//! alone tends to return a long tail of near-identical, low-value hits, so
//! [`select_hits`] walks the ranked list once and keeps a short prefix based
//! on a composite score:
//!
//! ```text
//! composite = alpha × (raw / top) + beta × recency − gamma × drop
//! recency   = 0.5 ^ (age_hours / half_life_hours)
//! drop      = max((prev_raw − raw) / prev_raw, 0)
//! ```
//!
//! where `prev_raw` is the raw score of the last accepted hit. A hit is
//! accepted while fewer than `rmin` hits are held or when its composite
//! reaches `accept_floor`. A rejected hit whose drop reaches `drop_knee`
//! ends the walk (a relevance cliff) once `rmin` is satisfied. The walk also
//! ends at the first raw score below `hard_clip`, even before `rmin` is met,
//! and once `rmax` hits are held. Accepted hits are returned by composite
//! score, highest first; ties keep their original order.
//!
//! The `hard_clip` stop assumes the input is sorted by descending raw
//! score, as the vector store returns it. Unsorted input would lose every
//! hit after the first low one.

use chrono::{DateTime, NaiveDateTime, Utc};
use tracing::debug;

use crate::models::{Hit, SelectedHit};

const SCORE_EPSILON: f64 = 1e-9;

/// Tuning parameters for [`select_hits`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SelectParams {
    /// Hits kept regardless of composite score.
    pub rmin: usize,
    /// Maximum hits returned.
    pub rmax: usize,
    /// Recency half-life in hours.
    pub half_life_hours: f64,
    /// Weight of the normalized similarity.
    pub alpha: f64,
    /// Weight of the recency term.
    pub beta: f64,
    /// Weight of the score-drop penalty.
    pub gamma: f64,
    /// Relative drop that ends selection.
    pub drop_knee: f64,
    /// Raw scores below this end selection.
    pub hard_clip: f64,
    /// Minimum composite score to accept a hit once `rmin` is met.
    pub accept_floor: f64,
}

impl Default for SelectParams {
    fn default() -> Self {
        Self {
            rmin: 0,
            rmax: 3,
            half_life_hours: 168.0,
            alpha: 0.7,
            beta: 0.25,
            gamma: 0.2,
            drop_knee: 0.25,
            hard_clip: 0.01,
            accept_floor: 0.35,
        }
    }
}

/// Select hits relative to the current time.
pub fn select_hits(hits: Vec<Hit>, params: &SelectParams) -> Vec<SelectedHit> {
    select_hits_at(hits, params, Utc::now())
}

/// Select hits relative to `now`.
pub fn select_hits_at(hits: Vec<Hit>, params: &SelectParams, now: DateTime<Utc>) -> Vec<SelectedHit> {
    if hits.is_empty() {
        return Vec::new();
    }

    let max_score = hits.iter().map(|h| h.raw_score).fold(f64::NEG_INFINITY, f64::max);
    let top = if max_score > 0.0 { max_score } else { SCORE_EPSILON };
    let mut prev = top;
    let mut chosen: Vec<SelectedHit> = Vec::new();

    for hit in hits {
        let raw = hit.raw_score;
        if raw < params.hard_clip {
            debug!(id = %hit.id, raw, "below hard clip, stopping");
            break;
        }

        let norm = (raw / top).clamp(0.0, 1.0);
        let ts = hit
            .fields
            .start_timestamp
            .as_deref()
            .or(hit.fields.timestamp.as_deref())
            .and_then(parse_timestamp);
        let recency = recency_weight(ts, now, params.half_life_hours);
        let drop = ((prev - raw) / prev.max(SCORE_EPSILON)).max(0.0);
        let composite = params.alpha * norm + params.beta * recency - params.gamma * drop;

        if chosen.len() < params.rmin || composite >= params.accept_floor {
            debug!(id = %hit.id, raw, composite, "accepted");
            prev = raw;
            chosen.push(SelectedHit {
                hit,
                composite_score: composite,
            });
        } else if drop >= params.drop_knee && chosen.len() >= params.rmin {
            debug!(id = %hit.id, raw, drop, "score cliff, stopping");
            break;
        } else {
            debug!(id = %hit.id, raw, composite, "skipped");
        }

        if chosen.len() >= params.rmax {
            break;
        }
    }

    // Stable: equal composites keep their ranked order.
    chosen.sort_by(|a, b| {
        b.composite_score
            .partial_cmp(&a.composite_score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    chosen
}

/// Recency weight in `(0, 1]`; `0.5` when the timestamp is unknown.
pub fn recency_weight(ts: Option<DateTime<Utc>>, now: DateTime<Utc>, half_life_hours: f64) -> f64 {
    let Some(ts) = ts else {
        return 0.5;
    };
    let age_hours = ((now - ts).num_milliseconds() as f64 / 3_600_000.0).max(0.0);
    0.5f64.powf(age_hours / half_life_hours.max(1e-6))
}

/// Parse an ISO-8601 timestamp. Accepts `Z`, explicit offsets, and naive
/// timestamps (read as UTC).
pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .map(|naive| naive.and_utc())
}
