//! Intent-aware structural compression of documents sent to the collaborator.
//!
//! Function-like bodies whose residual size reaches the intent's threshold
//! are collapsed to `{ /* N lines hidden */ }`. Pure-data files have their
//! long literals summarized instead, and sources that cannot be parsed are
//! truncated. Compression never makes a document longer: when nothing was
//! hidden the input is returned byte-for-byte.

pub mod data;

use crate::config::CompressorConfig;
use crate::edit::SpanEdit;
use crate::intent::EditIntent;
use crate::region::code_region;
use crate::scan::{mentions_identifier, scan_top_level};
use crate::ts::{self, top_level_declarations, visit_descendants, ParsedSource, Visit};
use serde::Serialize;
use std::ops::Range;

/// Node kinds whose `body` field is collapsible.
const FUNCTION_KINDS: &[&str] = &[
    "function_declaration",
    "function_expression",
    "function",
    "generator_function_declaration",
    "generator_function",
    "arrow_function",
    "method_definition",
];

/// How a document was compressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum CompressionMode {
    Unchanged,
    Structural,
    Data,
    Truncated,
}

impl CompressionMode {
    pub fn as_str(self) -> &'static str {
        match self {
            CompressionMode::Unchanged => "unchanged",
            CompressionMode::Structural => "structural",
            CompressionMode::Data => "data",
            CompressionMode::Truncated => "truncated",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompressionStats {
    pub original_lines: usize,
    pub result_lines: usize,
    /// Bodies collapsed, literals summarized, or lines truncated
    pub hidden: usize,
    pub mode: CompressionMode,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Compressed {
    pub code: String,
    pub stats: CompressionStats,
}

impl Compressed {
    fn unchanged(code: &str) -> Self {
        let lines = line_count(code);
        Self {
            code: code.to_string(),
            stats: CompressionStats {
                original_lines: lines,
                result_lines: lines,
                hidden: 0,
                mode: CompressionMode::Unchanged,
            },
        }
    }

    fn changed(original: &str, code: String, hidden: usize, mode: CompressionMode) -> Self {
        let stats = CompressionStats {
            original_lines: line_count(original),
            result_lines: line_count(&code),
            hidden,
            mode,
        };
        Self { code, stats }
    }
}

/// Per-call compression options.
#[derive(Debug, Clone)]
pub struct CompressOptions<'a> {
    pub intent: EditIntent,
    /// Overrides `compressor.min_lines`
    pub min_lines: Option<usize>,
    /// The edit request; declarations it mentions stay expanded
    pub request: Option<&'a str>,
}

impl<'a> CompressOptions<'a> {
    pub fn new(intent: EditIntent) -> Self {
        Self {
            intent,
            min_lines: None,
            request: None,
        }
    }

    pub fn with_min_lines(mut self, min_lines: usize) -> Self {
        self.min_lines = Some(min_lines);
        self
    }

    pub fn with_request(mut self, request: &'a str) -> Self {
        self.request = Some(request);
        self
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Compressor<'a> {
    config: &'a CompressorConfig,
}

impl<'a> Compressor<'a> {
    pub fn new(config: &'a CompressorConfig) -> Self {
        Self { config }
    }

    /// Compress `code` for the given intent.
    pub fn compress(&self, code: &str, options: &CompressOptions<'_>) -> Compressed {
        let min_lines = options.min_lines.unwrap_or(self.config.min_lines);
        let lines = line_count(code);
        if lines < min_lines {
            tracing::debug!(lines, min_lines, "document below compression floor");
            return Compressed::unchanged(code);
        }

        let threshold = self.config.threshold_for(options.intent);
        let breadth = options.intent.retrieval_breadth();
        let region = code_region(code);
        let region_text = &code[region.clone()];

        if data::is_data_only(region_text) {
            let names: Vec<String> = scan_top_level(region_text)
                .into_iter()
                .map(|d| d.name)
                .collect();
            let focus = focus_names(names, options.request, breadth);
            let summarized = data::summarize(region_text, self.config.data_literal_min_chars, &focus);
            return match summarized {
                Some((text, count)) => {
                    let mut out = String::with_capacity(code.len());
                    out.push_str(&code[..region.start]);
                    out.push_str(&text);
                    out.push_str(&code[region.end..]);
                    self.finish(code, out, count, CompressionMode::Data)
                }
                None => Compressed::unchanged(code),
            };
        }

        match ts::analyze(code) {
            Ok(parsed) => {
                let focus = focus_ranges(&parsed, options.request, breadth);
                match collapse_bodies(code, &parsed, threshold, &focus) {
                    Some((text, hidden)) => self.finish(code, text, hidden, CompressionMode::Structural),
                    None => Compressed::unchanged(code),
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "syntax tree unavailable, truncating");
                match truncate(code, self.config.truncate_lines) {
                    Some((text, dropped)) => self.finish(code, text, dropped, CompressionMode::Truncated),
                    None => Compressed::unchanged(code),
                }
            }
        }
    }

    fn finish(&self, original: &str, text: String, hidden: usize, mode: CompressionMode) -> Compressed {
        if hidden == 0 || text.len() >= original.len() {
            tracing::debug!(?mode, "compression did not shrink the document");
            return Compressed::unchanged(original);
        }
        let compressed = Compressed::changed(original, text, hidden, mode);
        tracing::debug!(
            ?mode,
            hidden,
            original_lines = compressed.stats.original_lines,
            result_lines = compressed.stats.result_lines,
            "document compressed"
        );
        compressed
    }
}

fn line_count(text: &str) -> usize {
    text.lines().count()
}

/// Names mentioned in the request, at most `breadth` of them.
fn focus_names(names: Vec<String>, request: Option<&str>, breadth: usize) -> Vec<String> {
    let Some(request) = request else {
        return Vec::new();
    };
    let mut focus: Vec<String> = Vec::new();
    for name in names {
        if focus.len() >= breadth {
            break;
        }
        if !focus.contains(&name) && mentions_identifier(request, &name) {
            focus.push(name);
        }
    }
    focus
}

fn focus_ranges(parsed: &ParsedSource<'_>, request: Option<&str>, breadth: usize) -> Vec<Range<usize>> {
    let declarations = top_level_declarations(parsed);
    let names = declarations.iter().map(|d| d.name.clone()).collect();
    let focus = focus_names(names, request, breadth);
    declarations
        .into_iter()
        .filter(|d| focus.contains(&d.name))
        .map(|d| d.byte_start..d.byte_end)
        .collect()
}

/// A function body considered for collapsing.
#[derive(Debug, Clone, PartialEq, Eq)]
struct SkeletonNode {
    body: Range<usize>,
    /// Size left once nested hidden bodies are removed
    residual: usize,
    hidden: bool,
}

/// Collapse bodies innermost-first by residual size.
///
/// Returns the spliced text and the number of stubs, or `None` if no body
/// qualified.
fn collapse_bodies(
    code: &str,
    parsed: &ParsedSource<'_>,
    threshold: usize,
    focus: &[Range<usize>],
) -> Option<(String, usize)> {
    let mut nodes: Vec<SkeletonNode> = Vec::new();
    visit_descendants(parsed.root_node(), |node| {
        if FUNCTION_KINDS.contains(&node.kind()) {
            if let Some(body) = node.child_by_field_name("body") {
                if body.kind() == "statement_block" {
                    let body = parsed.document_range(body);
                    nodes.push(SkeletonNode {
                        residual: body.len(),
                        body,
                        hidden: false,
                    });
                }
            }
        }
        Visit::Continue
    });
    // innermost first
    nodes.sort_by_key(|n| (n.body.len(), n.body.start));

    let contains = |outer: &Range<usize>, inner: &Range<usize>| {
        outer.start <= inner.start && inner.end <= outer.end
    };

    for i in 0..nodes.len() {
        let body = nodes[i].body.clone();
        if focus.iter().any(|f| contains(f, &body)) {
            continue;
        }
        let nested: usize = nodes[..i]
            .iter()
            .filter(|n| n.hidden && contains(&body, &n.body))
            .map(|n| n.body.len())
            .sum();
        nodes[i].residual = body.len() - nested;
        if nodes[i].residual < threshold {
            continue;
        }
        for inner in nodes[..i].iter_mut() {
            if contains(&body, &inner.body) {
                inner.hidden = false;
            }
        }
        nodes[i].hidden = true;
    }

    let edits: Vec<SpanEdit> = nodes
        .into_iter()
        .filter(|n| n.hidden)
        .map(|n| {
            let before = &code[n.body.clone()];
            let stub = format!("{{ /* {} lines hidden */ }}", line_count(before));
            SpanEdit::new(n.body.start, n.body.end, stub, before)
        })
        .collect();
    if edits.is_empty() {
        return None;
    }

    let hidden = edits.len();
    match SpanEdit::apply_all(code, edits) {
        Ok(text) => Some((text, hidden)),
        Err(e) => {
            tracing::warn!(error = %e, "body collapse splice failed");
            None
        }
    }
}

/// Keep the first `keep` lines and append a truncation marker.
///
/// Returns the text and the number of dropped lines, or `None` if the
/// document already fits.
pub fn truncate(code: &str, keep: usize) -> Option<(String, usize)> {
    let total = line_count(code);
    if total <= keep + 1 {
        return None;
    }
    let dropped = total - keep;
    let mut out: String = code.lines().take(keep).collect::<Vec<_>>().join("\n");
    out.push_str(&format!("\n/* ... {dropped} lines truncated ... */\n"));
    Some((out, dropped))
}

/// Compress with a default-configured compressor.
pub fn compress(code: &str, intent: EditIntent, min_lines: usize) -> Compressed {
    let config = CompressorConfig::default();
    Compressor::new(&config).compress(code, &CompressOptions::new(intent).with_min_lines(min_lines))
}
