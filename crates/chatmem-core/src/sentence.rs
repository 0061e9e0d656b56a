//! CJK-aware sentence segmentation.
//!
//! A sentence ends after `.`, `!` or `?` when whitespace follows, or after
//! the full-width `。`, `！`, `？` whether or not whitespace follows (CJK
//! text usually has no space between sentences). The whitespace at a split
//! point is dropped and every sentence is trimmed; nothing else is removed.

use std::sync::OnceLock;

use regex::Regex;

fn boundary_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[.!?]\s+|[。！？]\s*").expect("boundary pattern is valid"))
}

/// Split `text` into trimmed, non-empty sentences.
///
/// ```rust
/// use chatmem_core::sentence::split_sentences;
///
/// let s = split_sentences("Hi there. How are you?我很好。谢谢！");
/// assert_eq!(s, vec!["Hi there.", "How are you?我很好。", "谢谢！"]);
/// ```
pub fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut start = 0;

    for m in boundary_re().find_iter(text) {
        // Keep the terminating punctuation, drop the whitespace after it.
        let punct_len = text[m.start()..]
            .chars()
            .next()
            .map(char::len_utf8)
            .unwrap_or(0);
        push_trimmed(&mut sentences, &text[start..m.start() + punct_len]);
        start = m.end();
    }
    push_trimmed(&mut sentences, &text[start..]);

    sentences
}

fn push_trimmed(out: &mut Vec<String>, piece: &str) {
    let trimmed = piece.trim();
    if !trimmed.is_empty() {
        out.push(trimmed.to_string());
    }
}
