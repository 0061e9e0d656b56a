//! Chunk text clean-up: blank-line collapsing and same-speaker merging.
//!
//! A chunk is built one sentence per line, so a speaker who wrote five
//! sentences would otherwise be labelled five times. The post-processor
//! folds those lines into one block under a single attribution:
//!
//! ```text
//! [250314Fri 09:05] User: Hi.          [250314Fri 09:05] User: Hi.
//! User: Are you there?          ──▶     Are you there?
//! Assistant: Yes.                       Assistant: Yes.
//! ```
//!
//! Line kinds recognized, in priority order:
//!
//! | Line | Effect |
//! |------|--------|
//! | `[ts] Label: text` | close the open block, open a new one with this prefix |
//! | `[ts]` | close the open block, emit the line verbatim, forget the speaker |
//! | `Label: text` | append to the open block if it has the same label, else open a new block |
//! | `Label: <attribution>` | inside a same-label block, handled as the inner attribution |
//! | anything else | close the open block, emit the line verbatim |
//!
//! Only the configured labels count as attributions. Processing is
//! idempotent.

use std::sync::OnceLock;

use regex::Regex;

fn blank_runs_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?:\r?\n){2,}").expect("blank-run pattern is valid"))
}

/// Collapse every run of two or more line breaks into one.
pub fn collapse_blank_lines(text: &str) -> String {
    blank_runs_re().replace_all(text, "\n").into_owned()
}

/// Merges consecutive same-speaker lines for a fixed set of role labels.
#[derive(Debug, Clone)]
pub struct PostProcessor {
    ts_role: Regex,
    ts_only: Regex,
    role: Regex,
}

/// Parts are stored right-trimmed; a merged part never keeps trailing blanks.
struct OpenBlock {
    prefix: String,
    label: String,
    parts: Vec<String>,
}

const TS_PATTERN: &str = r"\d{6}\w{3} \d{2}:\d{2}";

impl PostProcessor {
    /// Build a processor recognizing `labels` (e.g. `["User", "Assistant"]`).
    pub fn new<S: AsRef<str>>(labels: &[S]) -> Self {
        let alternation = if labels.is_empty() {
            // Matches nothing: no line can carry an attribution.
            r"[^\s\S]".to_string()
        } else {
            labels
                .iter()
                .map(|l| regex::escape(l.as_ref()))
                .collect::<Vec<_>>()
                .join("|")
        };

        let build = |pattern: String| Regex::new(&pattern).expect("escaped labels form a valid pattern");

        Self {
            ts_role: build(format!(r"^\[({TS_PATTERN})\]\s*({alternation}):\s*(.*)$")),
            ts_only: build(format!(r"^\[{TS_PATTERN}\]\s*$")),
            role: build(format!(r"^({alternation}):\s*(.*)$")),
        }
    }

    /// Collapse blank lines, then merge same-speaker lines.
    pub fn process(&self, text: &str) -> String {
        self.merge_roles(&collapse_blank_lines(text))
    }

    /// Merge consecutive lines attributed to the same speaker.
    pub fn merge_roles(&self, text: &str) -> String {
        let mut out: Vec<String> = Vec::new();
        let mut open: Option<OpenBlock> = None;

        for raw in text.trim().lines() {
            let mut line = raw;
            loop {
                if let Some(caps) = self.ts_role.captures(line) {
                    flush(&mut out, &mut open);
                    open = Some(OpenBlock {
                        prefix: format!("[{}] {}:", &caps[1], &caps[2]),
                        label: caps[2].to_string(),
                        parts: vec![caps[3].trim_end().to_string()],
                    });
                    break;
                }

                if self.ts_only.is_match(line) {
                    flush(&mut out, &mut open);
                    out.push(line.to_string());
                    break;
                }

                if let Some(caps) = self.role.captures(line) {
                    let label = caps.get(1).map_or("", |m| m.as_str());
                    let content = caps.get(2).map_or("", |m| m.as_str());
                    match open.as_mut() {
                        Some(block) if block.label == label => {
                            // A continuation lands on its own output line, so one
                            // that is itself an attribution is handled as such.
                            if self.is_attribution(content) {
                                line = content;
                                continue;
                            }
                            block.parts.push(content.trim_end().to_string());
                        }
                        _ => {
                            flush(&mut out, &mut open);
                            open = Some(OpenBlock {
                                prefix: format!("{label}:"),
                                label: label.to_string(),
                                parts: vec![content.trim_end().to_string()],
                            });
                        }
                    }
                    break;
                }

                flush(&mut out, &mut open);
                out.push(line.to_string());
                break;
            }
        }

        flush(&mut out, &mut open);
        out.join("\n")
    }

    fn is_attribution(&self, line: &str) -> bool {
        self.ts_role.is_match(line) || self.ts_only.is_match(line) || self.role.is_match(line)
    }
}

fn flush(out: &mut Vec<String>, open: &mut Option<OpenBlock>) {
    if let Some(block) = open.take() {
        let body = block
            .parts
            .iter()
            .filter(|p| !p.is_empty())
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join("\n");
        out.push(format!("{} {}", block.prefix, body).trim_end().to_string());
    }
}
