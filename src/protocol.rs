//! Parsing of the collaborator's edit-block wire format.
//!
//! ```text
//! @@ lines 12-20 @@
//! <<<<<<< SEARCH
//! old text
//! =======
//! new text
//! >>>>>>> REPLACE
//!
//! <<<<<<< DEFINITION Header
//! function Header() { ... }
//! >>>>>>> END
//! ```
//!
//! Alternate marker spellings, 4 to 9 marker characters and a missing
//! final closing marker are tolerated. Markdown fences and prose outside
//! blocks are ignored.

use crate::edit::{Edit, LineHint};
use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt::Write as _;
use thiserror::Error;

static SEARCH_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^\s*<{4,9}\s*(?:SEARCH|ORIGINAL|FIND)\s*$").expect("search marker regex is valid")
});

static DEFINITION_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^\s*<{4,9}\s*DEFINITION\s+([A-Za-z_$][\w$]*)\s*$")
        .expect("definition marker regex is valid")
});

static DIVIDER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*={5,9}\s*$").expect("divider regex is valid"));

static CLOSE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^\s*>{4,9}\s*(?:REPLACE|UPDATED|END)?\s*$").expect("close marker regex is valid")
});

static HINT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)^\s*(?:@@\s*lines?\s+(\d+)(?:\s*-\s*(\d+))?\s*@@|\[\s*lines?\s+(\d+)(?:\s*-\s*(\d+))?\s*\]|lines?\s*:?\s*(\d+)(?:\s*-\s*(\d+))?)\s*$",
    )
    .expect("line hint regex is valid")
});

static FENCE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*(?:```|~~~)[\w+-]*\s*$").expect("fence regex is valid"));

static CODE_HINT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^\s*(?:import\s|export\s|function\s|const\s|let\s|class\s|<!DOCTYPE|<html)")
        .expect("code hint regex is valid")
});

/// Minimum lines for unstructured code to count as a full rewrite.
const REWRITE_MIN_LINES: usize = 5;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("response contains no edit blocks")]
    NoEdits,

    #[error("response is a full document rewrite ({} lines) instead of edit blocks", .text.lines().count())]
    FullRewrite { text: String },

    #[error("malformed edit block at line {line}: {message}")]
    Malformed { line: usize, message: String },
}

fn parse_hint(line: &str) -> Option<LineHint> {
    let caps = HINT_RE.captures(line)?;
    let number = |i: usize| caps.get(i).and_then(|m| m.as_str().parse::<usize>().ok());
    let (start, end) = [(1, 2), (3, 4), (5, 6)]
        .into_iter()
        .find_map(|(s, e)| number(s).map(|start| (start, number(e))))?;
    (start > 0).then(|| LineHint::new(start, end.filter(|&e| e >= start)))
}

enum State {
    Outside,
    Search {
        opened_at: usize,
        lines: Vec<String>,
    },
    Replace {
        search: Vec<String>,
        lines: Vec<String>,
    },
    Definition {
        name: String,
        lines: Vec<String>,
    },
}

/// Parse a collaborator response into edits.
pub fn parse_edits(text: &str) -> Result<Vec<Edit>, ProtocolError> {
    let mut edits = Vec::new();
    let mut state = State::Outside;
    let mut pending_hint: Option<LineHint> = None;
    let mut block_hint: Option<LineHint> = None;
    let mut outside = Vec::new();

    for (idx, line) in text.lines().enumerate() {
        let line_no = idx + 1;
        state = match state {
            State::Outside => {
                if SEARCH_RE.is_match(line) {
                    block_hint = pending_hint.take();
                    State::Search {
                        opened_at: line_no,
                        lines: Vec::new(),
                    }
                } else if let Some(caps) = DEFINITION_RE.captures(line) {
                    pending_hint = None;
                    State::Definition {
                        name: caps[1].to_string(),
                        lines: Vec::new(),
                    }
                } else if let Some(hint) = parse_hint(line) {
                    pending_hint = Some(hint);
                    State::Outside
                } else {
                    if !FENCE_RE.is_match(line) && !line.trim().is_empty() {
                        outside.push(line);
                    }
                    State::Outside
                }
            }
            State::Search { opened_at, mut lines } => {
                if DIVIDER_RE.is_match(line) {
                    State::Replace {
                        search: lines,
                        lines: Vec::new(),
                    }
                } else if SEARCH_RE.is_match(line) || CLOSE_RE.is_match(line) {
                    return Err(ProtocolError::Malformed {
                        line: opened_at,
                        message: format!("expected '=======' before line {line_no}"),
                    });
                } else {
                    lines.push(line.to_string());
                    State::Search { opened_at, lines }
                }
            }
            State::Replace { search, mut lines } => {
                if CLOSE_RE.is_match(line) {
                    edits.push(finish(search, lines, block_hint.take()));
                    State::Outside
                } else if SEARCH_RE.is_match(line) {
                    // closing marker forgotten between blocks
                    edits.push(finish(search, lines, block_hint.take()));
                    block_hint = pending_hint.take();
                    State::Search {
                        opened_at: line_no,
                        lines: Vec::new(),
                    }
                } else {
                    lines.push(line.to_string());
                    State::Replace { search, lines }
                }
            }
            State::Definition { name, mut lines } => {
                if CLOSE_RE.is_match(line) {
                    edits.push(Edit::definition(name, strip_fences(lines).join("\n")));
                    State::Outside
                } else {
                    lines.push(line.to_string());
                    State::Definition { name, lines }
                }
            }
        };
    }

    match state {
        State::Outside => {}
        State::Search { opened_at, .. } => {
            return Err(ProtocolError::Malformed {
                line: opened_at,
                message: "input ended inside a search block".to_string(),
            })
        }
        State::Replace { search, lines } => edits.push(finish(search, lines, block_hint.take())),
        State::Definition { name, lines } => {
            edits.push(Edit::definition(name, strip_fences(lines).join("\n")))
        }
    }

    if !edits.is_empty() {
        return Ok(edits);
    }
    let code = outside.join("\n");
    if outside.len() >= REWRITE_MIN_LINES && CODE_HINT_RE.is_match(&code) {
        return Err(ProtocolError::FullRewrite {
            text: extract_code(text),
        });
    }
    Err(ProtocolError::NoEdits)
}

fn finish(search: Vec<String>, replace: Vec<String>, hint: Option<LineHint>) -> Edit {
    let mut edit = Edit::new(
        strip_fences(search).join("\n"),
        strip_fences(replace).join("\n"),
    );
    edit.line_hint = hint;
    edit
}

/// Drop a fence wrapped tightly around block content.
fn strip_fences(mut lines: Vec<String>) -> Vec<String> {
    if lines.first().is_some_and(|l| FENCE_RE.is_match(l))
        && lines.last().is_some_and(|l| FENCE_RE.is_match(l))
        && lines.len() >= 2
    {
        lines.pop();
        lines.remove(0);
    }
    lines
}

/// The body of the first fenced block, or the whole text without fences.
fn extract_code(text: &str) -> String {
    let mut inside = false;
    let mut body = Vec::new();
    for line in text.lines() {
        if FENCE_RE.is_match(line) {
            if inside {
                return body.join("\n");
            }
            inside = true;
            continue;
        }
        if inside {
            body.push(line);
        }
    }
    if body.is_empty() {
        text.trim().to_string()
    } else {
        body.join("\n")
    }
}

/// Render edits back into wire format.
pub fn render_edits(edits: &[Edit]) -> String {
    let mut out = String::new();
    for edit in edits {
        if !out.is_empty() {
            out.push('\n');
        }
        if let Some(target) = &edit.target {
            let _ = writeln!(out, "<<<<<<< DEFINITION {target}");
            let _ = writeln!(out, "{}", edit.replace);
            out.push_str(">>>>>>> END\n");
            continue;
        }
        if let Some(hint) = edit.line_hint {
            match hint.end {
                Some(end) => {
                    let _ = writeln!(out, "@@ lines {}-{} @@", hint.start, end);
                }
                None => {
                    let _ = writeln!(out, "@@ line {} @@", hint.start);
                }
            }
        }
        let _ = writeln!(out, "<<<<<<< SEARCH\n{}\n=======", edit.search);
        let _ = writeln!(out, "{}\n>>>>>>> REPLACE", edit.replace);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_standard_blocks() {
        let text = "Here are the changes:\n\n<<<<<<< SEARCH\nconst a = 1;\n=======\nconst a = 2;\n>>>>>>> REPLACE\n\n<<<<<<< SEARCH\nfoo();\nbar();\n=======\nfoo();\n>>>>>>> REPLACE\n";
        let edits = parse_edits(text).unwrap();
        assert_eq!(edits.len(), 2);
        assert_eq!(edits[0], Edit::new("const a = 1;", "const a = 2;"));
        assert_eq!(edits[1].search, "foo();\nbar();");
        assert_eq!(edits[1].replace, "foo();");
    }

    #[test]
    fn alternate_spellings_and_missing_final_close() {
        let text = "<<<< ORIGINAL\nold\n=====\nnew\n>>>>> UPDATED\n<<<<<<<<< FIND\nx\n=========\ny";
        let edits = parse_edits(text).unwrap();
        assert_eq!(edits, vec![Edit::new("old", "new"), Edit::new("x", "y")]);
    }

    #[test]
    fn forgotten_close_between_blocks() {
        let text = "<<<<<<< SEARCH\na\n=======\nb\n<<<<<<< SEARCH\nc\n=======\nd\n>>>>>>> REPLACE";
        let edits = parse_edits(text).unwrap();
        assert_eq!(edits, vec![Edit::new("a", "b"), Edit::new("c", "d")]);
    }

    #[test]
    fn line_hints_attach_to_next_block() {
        for (hint_line, expected) in [
            ("@@ lines 12-20 @@", LineHint::new(12, Some(20))),
            ("[lines 3-4]", LineHint::new(3, Some(4))),
            ("LINES: 7-9", LineHint::new(7, Some(9))),
            ("line 5", LineHint::new(5, None)),
        ] {
            let text = format!("{hint_line}\n<<<<<<< SEARCH\na\n=======\nb\n>>>>>>> REPLACE\n");
            let edits = parse_edits(&text).unwrap();
            assert_eq!(edits[0].line_hint, Some(expected), "{hint_line}");
        }
    }

    #[test]
    fn definition_blocks() {
        let text = "<<<<<<< DEFINITION Header\nfunction Header() {\n  return null;\n}\n>>>>>>> END\n";
        let edits = parse_edits(text).unwrap();
        assert_eq!(edits[0].target.as_deref(), Some("Header"));
        assert_eq!(edits[0].replace, "function Header() {\n  return null;\n}");
    }

    #[test]
    fn fences_inside_blocks_are_stripped() {
        let text = "```diff\n<<<<<<< SEARCH\n```js\nold();\n```\n=======\nnew();\n>>>>>>> REPLACE\n```";
        let edits = parse_edits(text).unwrap();
        assert_eq!(edits, vec![Edit::new("old();", "new();")]);
    }

    #[test]
    fn search_without_divider_is_malformed() {
        let text = "<<<<<<< SEARCH\nold\n>>>>>>> REPLACE\n";
        assert!(matches!(
            parse_edits(text),
            Err(ProtocolError::Malformed { line: 1, .. })
        ));
        assert!(matches!(
            parse_edits("<<<<<<< SEARCH\nold\n"),
            Err(ProtocolError::Malformed { .. })
        ));
    }

    #[test]
    fn full_rewrite_is_a_protocol_violation() {
        let text = "Sure, here is the updated file:\n```jsx\nimport React from \"react\";\n\nfunction App() {\n  return <div>Hi</div>;\n}\n\nexport default App;\n```\n";
        match parse_edits(text) {
            Err(ProtocolError::FullRewrite { text }) => {
                assert!(text.starts_with("import React"));
                assert!(text.ends_with("export default App;"));
            }
            other => panic!("unexpected: {other:?}"),
        }
        assert_eq!(parse_edits("I could not find anything to change."), Err(ProtocolError::NoEdits));
    }

    #[test]
    fn render_round_trips_through_parser() {
        let edits = vec![
            Edit::new("a();\nb();", "c();").with_line_hint(LineHint::new(2, Some(3))),
            Edit::definition("Foo", "function Foo() {}"),
        ];
        assert_eq!(parse_edits(&render_edits(&edits)).unwrap(), edits);
    }
}
