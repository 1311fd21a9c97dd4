//! Lightweight, tree-free scanning of JavaScript-family text.
//!
//! The scanner masks string and comment contents, then tracks bracket
//! depth to find top-level declarations. It is used where a syntax tree is
//! unavailable or too expensive: scope restriction, heuristic validation of
//! large documents, and the pure-data compression path.

use crate::token::is_ident_char;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;
use std::ops::Range;

static DECL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(?:export\s+(?:default\s+)?)?(?:declare\s+)?(?:async\s+)?(function\s*\*?|class|const|let|var|interface|type|enum)\s+([A-Za-z_$][\w$]*)",
    )
    .expect("declaration regex is valid")
});

static DESTRUCTURE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:const|let|var)\s*[\{\[]([^=]*)[\}\]]\s*=").expect("destructure regex is valid")
});

static BINDING_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:function\s*\*?|class|const|let|var|interface|type|enum)\s+([A-Za-z_$][\w$]*)")
        .expect("binding regex is valid")
});

static IMPORT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)import\s+(.*?)\s+from\s").expect("import regex is valid")
});

static CALL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"([A-Z][\w$]*)\s*(?:\(|\.[A-Za-z_$][\w$]*\s*\()")
        .expect("call regex is valid")
});

static JSX_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<([A-Z][\w$]*)[\s/>]").expect("jsx regex is valid"));

/// Keyword that introduced a scanned declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanKind {
    Function,
    Class,
    Const,
    Let,
    Var,
    Interface,
    Type,
    Enum,
}

impl ScanKind {
    fn from_keyword(keyword: &str) -> Self {
        match keyword.trim_end_matches(|c: char| c == '*' || c.is_whitespace()) {
            "function" => ScanKind::Function,
            "class" => ScanKind::Class,
            "const" => ScanKind::Const,
            "let" => ScanKind::Let,
            "var" => ScanKind::Var,
            "interface" => ScanKind::Interface,
            "type" => ScanKind::Type,
            _ => ScanKind::Enum,
        }
    }

    fn is_block(self) -> bool {
        matches!(
            self,
            ScanKind::Function | ScanKind::Class | ScanKind::Interface | ScanKind::Enum
        )
    }
}

/// A top-level declaration found by the scanner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScannedDecl {
    pub name: String,
    pub kind: ScanKind,
    pub start: usize,
    pub end: usize,
    /// Byte offset of the initializer after `=`, for variable-like kinds
    pub value_start: Option<usize>,
}

/// Replace string and comment contents with spaces, keeping byte offsets
/// and newlines intact. Delimiters stay visible.
///
/// Single and double quoted strings only count when they close on the same
/// line, so apostrophes in JSX text do not swallow the rest of the file.
pub fn mask_source(source: &str) -> String {
    let bytes = source.as_bytes();
    let mut out = bytes.to_vec();
    let mut i = 0;

    let blank = |out: &mut Vec<u8>, range: Range<usize>| {
        for b in &mut out[range] {
            if *b != b'\n' {
                *b = b' ';
            }
        }
    };

    while i < bytes.len() {
        match bytes[i] {
            b'/' if bytes.get(i + 1) == Some(&b'/') => {
                let end = memchr_newline(bytes, i);
                blank(&mut out, i + 2..end);
                i = end;
            }
            b'/' if bytes.get(i + 1) == Some(&b'*') => {
                let end = find_from(bytes, i + 2, b"*/").map_or(bytes.len(), |p| p + 2);
                blank(&mut out, i + 2..end.saturating_sub(2).max(i + 2));
                i = end;
            }
            quote @ (b'"' | b'\'') => {
                let line_end = memchr_newline(bytes, i);
                match closing_quote(bytes, i + 1, line_end, quote) {
                    Some(close) => {
                        blank(&mut out, i + 1..close);
                        i = close + 1;
                    }
                    None => i += 1,
                }
            }
            b'`' => {
                let close = closing_quote(bytes, i + 1, bytes.len(), b'`').unwrap_or(bytes.len());
                blank(&mut out, i + 1..close);
                i = close + 1;
            }
            _ => i += 1,
        }
    }

    String::from_utf8_lossy(&out).into_owned()
}

fn memchr_newline(bytes: &[u8], from: usize) -> usize {
    bytes[from..]
        .iter()
        .position(|&b| b == b'\n')
        .map_or(bytes.len(), |p| from + p)
}

fn find_from(bytes: &[u8], from: usize, needle: &[u8]) -> Option<usize> {
    if from >= bytes.len() {
        return None;
    }
    bytes[from..]
        .windows(needle.len())
        .position(|w| w == needle)
        .map(|p| from + p)
}

fn closing_quote(bytes: &[u8], from: usize, limit: usize, quote: u8) -> Option<usize> {
    let mut j = from;
    while j < limit {
        match bytes[j] {
            b'\\' => j += 2,
            b if b == quote => return Some(j),
            _ => j += 1,
        }
    }
    None
}

/// Scan top-level declarations using bracket balance.
pub fn scan_top_level(source: &str) -> Vec<ScannedDecl> {
    let masked = mask_source(source);
    let bytes = masked.as_bytes();
    let mut decls = Vec::new();
    let mut depth: i32 = 0;
    let mut pos = 0;

    while pos < bytes.len() {
        let line_end = memchr_newline(bytes, pos);
        if depth == 0 {
            let line = &masked[pos..line_end];
            let indent = line.len() - line.trim_start().len();
            let stmt_start = pos + indent;
            if let Some(caps) = DECL_RE.captures(&masked[stmt_start..]) {
                let kind = ScanKind::from_keyword(&caps[1]);
                let name = caps[2].to_string();
                let header_end = stmt_start + caps.get(0).map_or(0, |m| m.end());
                let (end, value_start) = declaration_end(bytes, header_end, kind);
                decls.push(ScannedDecl {
                    name,
                    kind,
                    start: stmt_start,
                    end,
                    value_start,
                });
                pos = next_line_start(bytes, end);
                continue;
            }
        }
        depth += bracket_delta(&bytes[pos..line_end]);
        depth = depth.max(0);
        pos = line_end + 1;
    }

    decls
}

fn next_line_start(bytes: &[u8], from: usize) -> usize {
    memchr_newline(bytes, from) + 1
}

fn bracket_delta(bytes: &[u8]) -> i32 {
    bytes.iter().fold(0, |acc, &b| match b {
        b'{' | b'(' | b'[' => acc + 1,
        b'}' | b')' | b']' => acc - 1,
        _ => acc,
    })
}

/// End offset of a declaration starting its body scan at `from`.
fn declaration_end(bytes: &[u8], from: usize, kind: ScanKind) -> (usize, Option<usize>) {
    let mut depth: i32 = 0;
    let mut opened_block = false;
    let mut value_start = None;
    let mut i = from;

    while i < bytes.len() {
        let b = bytes[i];
        match b {
            b'{' | b'(' | b'[' => {
                if b == b'{' && depth == 0 {
                    opened_block = true;
                }
                depth += 1;
            }
            b'}' | b')' | b']' => {
                depth -= 1;
                if depth <= 0 && b == b'}' && opened_block && kind.is_block() {
                    return (i + 1, value_start);
                }
                depth = depth.max(0);
            }
            b'=' if depth == 0 && value_start.is_none() && !kind.is_block() => {
                if bytes.get(i + 1) != Some(&b'>') && bytes.get(i + 1) != Some(&b'=') {
                    value_start = Some(i + 1);
                }
            }
            b';' if depth == 0 => return (i + 1, value_start),
            b'\n' if depth == 0 && !kind.is_block() && statement_ends_at_newline(bytes, i) => {
                return (trim_end_offset(bytes, i), value_start);
            }
            _ => {}
        }
        i += 1;
    }

    (trim_end_offset(bytes, bytes.len()), value_start)
}

/// Automatic semicolon insertion approximation for `const x = ...` lines.
fn statement_ends_at_newline(bytes: &[u8], newline: usize) -> bool {
    let before = bytes[..newline]
        .iter()
        .rev()
        .find(|b| !b.is_ascii_whitespace())
        .copied();
    if matches!(
        before,
        Some(b'=' | b',' | b'(' | b'[' | b'{' | b'+' | b'-' | b'*' | b'/' | b'&' | b'|' | b'?' | b':' | b'>')
    ) {
        return false;
    }
    let after = bytes[newline..]
        .iter()
        .find(|b| !b.is_ascii_whitespace())
        .copied();
    !matches!(
        after,
        Some(b'.' | b'?' | b':' | b'+' | b'-' | b'*' | b'/' | b'&' | b'|' | b')' | b']' | b'}' | b',')
    )
}

fn trim_end_offset(bytes: &[u8], mut end: usize) -> usize {
    while end > 0 && bytes[end - 1].is_ascii_whitespace() {
        end -= 1;
    }
    end
}

/// Byte ranges of the named top-level declarations, in source order.
pub fn scoped_ranges(source: &str, names: &[String]) -> Vec<Range<usize>> {
    scan_top_level(source)
        .into_iter()
        .filter(|d| names.iter().any(|n| n == &d.name))
        .map(|d| d.start..d.end)
        .collect()
}

/// Names bound anywhere in the text, found with regular expressions.
pub fn heuristic_bindings(source: &str) -> HashSet<String> {
    let masked = mask_source(source);
    let mut names: HashSet<String> = BINDING_RE
        .captures_iter(&masked)
        .map(|c| c[1].to_string())
        .collect();

    for caps in DESTRUCTURE_RE.captures_iter(&masked) {
        names.extend(identifiers_in(&caps[1]));
    }
    for caps in IMPORT_RE.captures_iter(&masked) {
        let clause = caps[1].replace(" as ", " ");
        names.extend(identifiers_in(&clause));
    }
    names
}

/// Capitalized call-like references found with regular expressions.
pub fn heuristic_references(source: &str) -> HashSet<String> {
    let masked = mask_source(source);
    let mut names: HashSet<String> = CALL_RE
        .captures_iter(&masked)
        .filter_map(|c| c.get(1))
        .filter(|m| {
            let before = masked[..m.start()].chars().next_back();
            !before.is_some_and(|c| is_ident_char(c) || c == '.')
        })
        .map(|m| m.as_str().to_string())
        .collect();
    names.extend(JSX_RE.captures_iter(&masked).map(|c| c[1].to_string()));
    names
}

fn identifiers_in(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !is_ident_char(c))
        .filter(|w| !w.is_empty() && !w.chars().next().is_some_and(|c| c.is_ascii_digit()))
        .map(str::to_string)
}

/// Whether `word` occurs as a whole identifier anywhere in `source`.
pub fn mentions_identifier(source: &str, word: &str) -> bool {
    source.match_indices(word).any(|(idx, _)| {
        let before = source[..idx].chars().next_back();
        let after = source[idx + word.len()..].chars().next();
        !before.is_some_and(is_ident_char) && !after.is_some_and(is_ident_char)
    })
}

/// Remove `//`, `/* */` and JSX `{/* */}` comments from a snippet.
///
/// String literals are left alone; lines that held nothing but a comment
/// are dropped.
pub fn strip_comments(snippet: &str) -> String {
    let masked = mask_source(snippet);
    let bytes = snippet.as_bytes();
    let mbytes = masked.as_bytes();
    let mut out = String::with_capacity(snippet.len());
    let mut i = 0;
    let mut last = 0;

    while i < mbytes.len() {
        let is_jsx_comment = mbytes[i] == b'{' && masked[i + 1..].trim_start().starts_with("/*");
        if is_jsx_comment {
            let inner = i + 1 + (masked[i + 1..].len() - masked[i + 1..].trim_start().len());
            if let Some(close) = find_from(mbytes, inner + 2, b"*/") {
                let after = close + 2;
                let rest = &masked[after..];
                if rest.trim_start().starts_with('}') {
                    let brace = after + (rest.len() - rest.trim_start().len());
                    out.push_str(&snippet[last..i]);
                    i = brace + 1;
                    last = i;
                    continue;
                }
            }
        }
        if mbytes[i] == b'/' && matches!(mbytes.get(i + 1), Some(b'/') | Some(b'*')) {
            let end = if mbytes[i + 1] == b'/' {
                memchr_newline(mbytes, i)
            } else {
                find_from(mbytes, i + 2, b"*/").map_or(bytes.len(), |p| p + 2)
            };
            out.push_str(&snippet[last..i]);
            i = end;
            last = end;
            continue;
        }
        i += 1;
    }
    out.push_str(&snippet[last..]);

    out.lines()
        .filter(|line| !line.trim().is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}
