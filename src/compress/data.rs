//! Summarizing pure-data files.
//!
//! A data file declares nothing but constants with literal values. Every
//! declared name is kept; long array and object literals are replaced by a
//! comment with their item count or first-level keys.

use crate::edit::SpanEdit;
use crate::scan::{mask_source, scan_top_level, strip_comments, ScanKind, ScannedDecl};
use std::ops::Range;

/// Keys listed in an object summary before eliding the rest.
const MAX_LISTED_KEYS: usize = 12;

/// Whether `source` holds only literal-valued variable declarations.
pub fn is_data_only(source: &str) -> bool {
    let decls = scan_top_level(source);
    if decls.is_empty() {
        return false;
    }
    let masked = mask_source(source);

    let literal_values = decls.iter().all(|d| {
        matches!(d.kind, ScanKind::Const | ScanKind::Let | ScanKind::Var)
            && d.value_start.is_some_and(|v| is_literal(&masked[v..d.end]))
    });
    if !literal_values {
        return false;
    }

    let mut rest = String::new();
    let mut last = 0;
    for d in &decls {
        rest.push_str(&source[last..d.start]);
        last = d.end;
    }
    rest.push_str(&source[last..]);
    strip_comments(&rest).lines().all(|line| {
        let line = line.trim();
        line.is_empty() || line == ";" || line.starts_with("export ")
    })
}

fn is_literal(masked_value: &str) -> bool {
    let value = masked_value.trim_start();
    let starts_literal = value.starts_with(['[', '{', '"', '\'', '`', '-'])
        || value.starts_with(|c: char| c.is_ascii_digit())
        || ["true", "false", "null"].iter().any(|k| value.starts_with(k));
    starts_literal && !value.contains("=>") && !value.contains("function")
}

/// Summarize long literals, skipping declarations named in `focus`.
///
/// Returns the new text and the number of literals summarized, or `None`
/// when nothing qualified.
pub fn summarize(source: &str, min_chars: usize, focus: &[String]) -> Option<(String, usize)> {
    let masked = mask_source(source);
    let bytes = masked.as_bytes();

    let mut edits = Vec::new();
    for decl in scan_top_level(source) {
        if focus.iter().any(|f| f == &decl.name) {
            continue;
        }
        let Some(range) = literal_range(&masked, &decl) else {
            continue;
        };
        if range.len() < min_chars {
            continue;
        }
        let entries = first_level_entries(bytes, range.clone());
        let summary = if bytes[range.start] == b'[' {
            format!("[/* {} items */]", entries.len())
        } else {
            object_summary(source, &masked, &entries)
        };
        tracing::trace!(name = %decl.name, bytes = range.len(), "summarizing literal");
        edits.push(SpanEdit::new(
            range.start,
            range.end,
            summary,
            &source[range],
        ));
    }

    if edits.is_empty() {
        return None;
    }
    let count = edits.len();
    match SpanEdit::apply_all(source, edits) {
        Ok(text) => Some((text, count)),
        Err(e) => {
            tracing::warn!(error = %e, "literal summary splice failed");
            None
        }
    }
}

/// Byte range of a declaration's array or object initializer.
fn literal_range(masked: &str, decl: &ScannedDecl) -> Option<Range<usize>> {
    let value_start = decl.value_start?;
    let value = &masked[value_start..decl.end];
    let open = value_start + (value.len() - value.trim_start().len());
    let bytes = masked.as_bytes();
    let close_char = match bytes.get(open)? {
        b'[' => b']',
        b'{' => b'}',
        _ => return None,
    };

    let mut depth = 0i32;
    for (i, &b) in bytes.iter().enumerate().take(decl.end).skip(open) {
        match b {
            b'[' | b'{' | b'(' => depth += 1,
            b']' | b'}' | b')' => {
                depth -= 1;
                if depth == 0 {
                    return (b == close_char).then_some(open..i + 1);
                }
            }
            _ => {}
        }
    }
    None
}

/// Non-empty comma-separated entries directly inside `range`.
fn first_level_entries(bytes: &[u8], range: Range<usize>) -> Vec<Range<usize>> {
    let inner = range.start + 1..range.end - 1;
    let mut entries = Vec::new();
    let mut depth = 0i32;
    let mut start = inner.start;

    let push = |entries: &mut Vec<Range<usize>>, r: Range<usize>| {
        if bytes[r.clone()].iter().any(|b| !b.is_ascii_whitespace()) {
            entries.push(r);
        }
    };
    for i in inner.clone() {
        match bytes[i] {
            b'[' | b'{' | b'(' => depth += 1,
            b']' | b'}' | b')' => depth -= 1,
            b',' if depth == 0 => {
                push(&mut entries, start..i);
                start = i + 1;
            }
            _ => {}
        }
    }
    push(&mut entries, start..inner.end);
    entries
}

fn object_summary(source: &str, masked: &str, entries: &[Range<usize>]) -> String {
    let keys: Vec<String> = entries
        .iter()
        .map(|entry| entry_key(source, masked, entry.clone()))
        .collect();
    let mut listed = keys
        .iter()
        .take(MAX_LISTED_KEYS)
        .cloned()
        .collect::<Vec<_>>()
        .join(", ");
    if keys.len() > MAX_LISTED_KEYS {
        listed.push_str(", ...");
    }
    format!("{{ /* {} keys: {} */ }}", keys.len(), listed)
}

fn entry_key(source: &str, masked: &str, entry: Range<usize>) -> String {
    let mut depth = 0i32;
    let mut key_end = entry.end;
    for i in entry.clone() {
        match masked.as_bytes()[i] {
            b'[' | b'{' | b'(' => depth += 1,
            b']' | b'}' | b')' => depth -= 1,
            b':' if depth == 0 => {
                key_end = i;
                break;
            }
            _ => {}
        }
    }
    source[entry.start..key_end]
        .trim()
        .trim_matches(['"', '\'', '`'])
        .to_string()
}
