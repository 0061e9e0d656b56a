//! Sliding-window conversation chunker.
//!
//! Turns an ordered list of [`Message`]s into overlapping [`Chunk`]s sized
//! for embedding. Messages are sanitized, split into sentences, and each
//! sentence is attributed to its speaker (`"User: …"`). Windows of whole
//! sentences are then cut with a character budget, and consecutive windows
//! share a tail/head overlap so that context spanning a boundary is never
//! lost.
//!
//! # Algorithm
//!
//! 1. Start a window at sentence `i`. Add sentences while the running
//!    length stays within `chunk_size`; the first sentence is always taken,
//!    even when it alone exceeds the budget.
//! 2. The first line of a window carries a `[yymmddDay HH:MM]` tag. Later
//!    lines carry one only if at least `ts_gap_minutes` passed since the
//!    previous sentence.
//! 3. Join the lines, run the [`PostProcessor`], and record the chunk with
//!    its first sentence's timestamp and the next ordinal.
//! 4. If the window reached the end, stop. Otherwise walk back from the
//!    window's last sentence, summing lengths until `overlap` characters are
//!    covered or the window start is reached, and start the next window
//!    there. The next start is always past the current one.
//!
//! Lengths are counted in characters of the attributed sentences, before
//! tags are added and before post-processing.
//!
//! # Example
//!
//! ```rust
//! use chatmem_core::chunk::{chunk_messages, ChunkParams, RoleLabels};
//! use chatmem_core::models::{Message, Role};
//! use chrono::{TimeZone, Utc};
//!
//! let messages = vec![Message {
//!     session_id: "s1".into(),
//!     timestamp: Utc.with_ymd_and_hms(2025, 3, 14, 9, 5, 0).unwrap(),
//!     role: Role::User,
//!     content: "Hello there. How are you?".into(),
//! }];
//! let chunks = chunk_messages(&messages, &ChunkParams::default(), &RoleLabels::default());
//! assert_eq!(chunks.len(), 1);
//! assert_eq!(chunks[0].text, "[250314Fri 09:05] User: Hello there.\nHow are you?");
//! ```

use chrono::{DateTime, Duration, Utc};

use crate::models::{Chunk, Message, Role, TimedSentence};
use crate::post_process::PostProcessor;
use crate::sanitize::sanitize;
use crate::sentence::split_sentences;

/// Window sizing parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkParams {
    /// Character budget per chunk.
    pub chunk_size: usize,
    /// Character budget for the backward slide between chunks.
    pub overlap: usize,
    /// Minimum gap before a sentence gets its own timestamp tag.
    pub ts_gap_minutes: i64,
}

impl Default for ChunkParams {
    fn default() -> Self {
        Self {
            chunk_size: 200,
            overlap: 50,
            ts_gap_minutes: 5,
        }
    }
}

/// Display labels used to attribute sentences to speakers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleLabels {
    pub user: String,
    pub assistant: String,
}

impl Default for RoleLabels {
    fn default() -> Self {
        Self {
            user: "User".to_string(),
            assistant: "Assistant".to_string(),
        }
    }
}

impl RoleLabels {
    /// Label for `role`; roles without a configured label use their name.
    pub fn label<'a>(&'a self, role: &'a Role) -> &'a str {
        match role {
            Role::User => &self.user,
            Role::Assistant => &self.assistant,
            Role::Other(name) => name,
        }
    }

    /// A post-processor that recognizes these labels.
    pub fn post_processor(&self) -> PostProcessor {
        PostProcessor::new(&[self.user.as_str(), self.assistant.as_str()])
    }
}

/// Format the inline timestamp tag, e.g. `[250314Fri 09:05]`.
pub fn format_ts_tag(ts: &DateTime<Utc>) -> String {
    format!("[{}]", ts.format("%y%m%d%a %H:%M"))
}

/// Sanitize, split, and attribute every message.
///
/// Messages whose content is empty after sanitizing produce no sentences.
pub fn timed_sentences(messages: &[Message], labels: &RoleLabels) -> Vec<TimedSentence> {
    let mut out = Vec::new();
    for msg in messages {
        let content = sanitize(msg.content.trim());
        if content.is_empty() {
            continue;
        }
        let label = labels.label(&msg.role);
        for sentence in split_sentences(&content) {
            out.push(TimedSentence {
                text: format!("{label}: {sentence}"),
                timestamp: msg.timestamp,
                session_id: msg.session_id.clone(),
            });
        }
    }
    out
}

/// Chunk a message list end to end.
pub fn chunk_messages(messages: &[Message], params: &ChunkParams, labels: &RoleLabels) -> Vec<Chunk> {
    let sentences = timed_sentences(messages, labels);
    slide_window(&sentences, params, &labels.post_processor())
}

/// Cut `sentences` into overlapping windows.
///
/// See the module docs for the algorithm. Returns no chunks for no
/// sentences; ordinals are contiguous from 0.
pub fn slide_window(
    sentences: &[TimedSentence],
    params: &ChunkParams,
    post: &PostProcessor,
) -> Vec<Chunk> {
    let lens: Vec<usize> = sentences.iter().map(|s| char_len(&s.text)).collect();
    let gap = Duration::minutes(params.ts_gap_minutes);

    window_spans(&lens, params)
        .into_iter()
        .enumerate()
        .map(|(ordinal, (start, end))| {
            let window = &sentences[start..end];
            let first = &window[0];
            let mut parts: Vec<String> = Vec::with_capacity(window.len());
            let mut last_ts = first.timestamp;

            for (idx, sentence) in window.iter().enumerate() {
                if idx == 0 || sentence.timestamp - last_ts >= gap {
                    parts.push(format!("{} {}", format_ts_tag(&sentence.timestamp), sentence.text));
                } else {
                    parts.push(sentence.text.clone());
                }
                last_ts = sentence.timestamp;
            }

            Chunk {
                text: post.process(&parts.join("\n")),
                start_timestamp: first.timestamp,
                ordinal,
                session_id: first.session_id.clone(),
            }
        })
        .collect()
}

/// Half-open sentence ranges `(start, end)` of each window, given the
/// character length of every sentence. Every range is non-empty and starts
/// after the previous one; the last range ends at `lens.len()`.
fn window_spans(lens: &[usize], params: &ChunkParams) -> Vec<(usize, usize)> {
    let n = lens.len();
    let mut spans = Vec::new();
    let mut i = 0;

    while i < n {
        let mut curr_len = 0;
        let mut j = i;
        while j < n {
            if curr_len + lens[j] > params.chunk_size && j > i {
                break;
            }
            curr_len += lens[j];
            j += 1;
        }
        spans.push((i, j));

        if j >= n {
            break;
        }

        // j > i here, so k starts at or after the window start.
        let mut back_len = 0;
        let mut k = j - 1;
        while k > i && back_len < params.overlap {
            back_len += lens[k];
            k -= 1;
        }
        i = k + 1;
    }

    spans
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}
