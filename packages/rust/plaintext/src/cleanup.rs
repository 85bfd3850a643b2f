//! Post-flattening cleanup pipeline.
//!
//! Each pass is a function `&str -> String` applied in sequence.

use std::sync::LazyLock;

use regex::Regex;

/// Run the full cleanup pipeline on flattened text.
pub(crate) fn run_pipeline(text: &str) -> String {
    let mut result = text.to_string();

    result = normalize_line_breaks(&result);
    result = collapse_inline_whitespace(&result);
    result = drop_blank_lines(&result);

    result
}

// ---------------------------------------------------------------------------
// Pass 1: Normalize line breaks
// ---------------------------------------------------------------------------

/// Turn `\r\n` and lone `\r` into `\n`.
fn normalize_line_breaks(text: &str) -> String {
    text.replace("\r\n", "\n").replace('\r', "\n")
}

// ---------------------------------------------------------------------------
// Pass 2: Collapse whitespace within lines
// ---------------------------------------------------------------------------

/// Collapse runs of horizontal whitespace (including no-break spaces) to a
/// single space and trim each line.
fn collapse_inline_whitespace(text: &str) -> String {
    static WS_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"[^\S\n]+").expect("valid regex"));

    text.lines()
        .map(|line| WS_RE.replace_all(line, " ").trim().to_string())
        .collect::<Vec<_>>()
        .join("\n")
}

// ---------------------------------------------------------------------------
// Pass 3: Drop blank lines
// ---------------------------------------------------------------------------

/// Remove empty lines left behind by nested block elements.
fn drop_blank_lines(text: &str) -> String {
    text.lines()
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}
