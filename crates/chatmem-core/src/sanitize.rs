//! Removes tool and directive noise from raw message text before chunking.
//!
//! Two kinds of noise are replaced with fixed placeholders:
//!
//! - fenced directive blocks (`~~~action … ~~~`, and the `memory`,
//!   `interest`, `debug` variants) become `[cmd]`;
//! - `function result: { … }` payloads become `function result: [result]`.
//!   The payload is matched by brace balancing, so nested JSON of any depth
//!   is consumed as a whole.
//!
//! Input that does not match is returned unchanged; sanitizing never fails.

use std::sync::OnceLock;

use regex::Regex;

/// Replacement for a fenced directive block.
pub const COMMAND_PLACEHOLDER: &str = "[cmd]";

/// Replacement for a `function result:` payload, marker included.
pub const RESULT_PLACEHOLDER: &str = "function result: [result]";

fn directive_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?s)~{3}(?:action|memory|interest|debug)\s*\n*.*?~{3}")
            .expect("directive pattern is valid")
    })
}

fn function_result_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"function\sresult:\s*\{").expect("function result pattern is valid")
    })
}

/// Strip directive blocks and function-result payloads from `text`.
pub fn sanitize(text: &str) -> String {
    let without_directives = directive_re().replace_all(text, COMMAND_PLACEHOLDER);
    replace_function_results(&without_directives)
}

fn replace_function_results(text: &str) -> String {
    let re = function_result_re();
    let mut out = String::with_capacity(text.len());
    let mut copied_up_to = 0;
    let mut search_from = 0;

    while let Some(m) = re.find_at(text, search_from) {
        // The pattern ends on the opening brace.
        let open = m.end() - 1;
        match matching_brace(text, open) {
            Some(close) => {
                out.push_str(&text[copied_up_to..m.start()]);
                out.push_str(RESULT_PLACEHOLDER);
                copied_up_to = close + 1;
                search_from = copied_up_to;
            }
            None => search_from = m.end(),
        }
    }

    out.push_str(&text[copied_up_to..]);
    out
}

/// Byte index of the brace closing the one at `open`, if balanced.
fn matching_brace(text: &str, open: usize) -> Option<usize> {
    let mut depth = 0usize;
    for (offset, c) in text[open..].char_indices() {
        match c {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(open + offset);
                }
            }
            _ => {}
        }
    }
    None
}
