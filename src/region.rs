//! Locating the code region of a document.
//!
//! Generated documents are usually plain component sources, but some are
//! whole HTML pages with the program inside an inline `<script>`. Tree-based
//! operations only look at the code region; offsets are mapped back to the
//! full document by the caller.

use once_cell::sync::Lazy;
use regex::Regex;
use std::ops::Range;

static SCRIPT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)<script\b([^>]*)>(.*?)</script\s*>").expect("script regex is valid")
});

const SCRIPT_TYPES: &[&str] = &[
    "text/babel",
    "module",
    "text/javascript",
    "application/javascript",
    "text/jsx",
    "text/typescript",
];

/// Byte range of the code region inside `document`.
///
/// HTML pages (first non-blank character is `<` and a `<script>` element is
/// present) resolve to the body of the largest inline script. Everything
/// else is code in its entirety.
pub fn code_region(document: &str) -> Range<usize> {
    let whole = 0..document.len();
    if !document.trim_start().starts_with('<') {
        return whole;
    }

    let mut best: Option<Range<usize>> = None;
    for caps in SCRIPT_RE.captures_iter(document) {
        let (Some(attrs), Some(body)) = (caps.get(1), caps.get(2)) else {
            continue;
        };
        if !is_inline_program(attrs.as_str()) {
            continue;
        }
        let range = body.range();
        if best.as_ref().map_or(true, |b| range.len() > b.len()) {
            best = Some(range);
        }
    }

    best.unwrap_or(whole)
}

fn is_inline_program(attrs: &str) -> bool {
    let attrs = attrs.to_ascii_lowercase();
    if attrs.contains("src=") {
        return false;
    }
    match attrs.find("type=") {
        None => true,
        Some(idx) => {
            let value = attrs[idx + 5..].trim_start_matches(['"', '\'']);
            SCRIPT_TYPES.iter().any(|t| value.starts_with(t))
        }
    }
}
