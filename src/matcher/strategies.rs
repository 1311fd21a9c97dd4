use crate::matcher::lcs::{align, choose_anchors};
use crate::matcher::{MatchContext, MatchSpan, MatchStrategy, StrategyKind};
use crate::scan::{scan_top_level, strip_comments};
use crate::token::{tokenize, Token};
use crate::ts;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;
use std::ops::Range;

static EXPORT_PREFIX_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^export\s+(?:default\s+)?").expect("export prefix regex is valid"));

fn exact_eq(a: &Token<'_>, b: &Token<'_>) -> bool {
    a.normalized == b.normalized
}

/// Token equality that tolerates small typos in identifier-like tokens.
///
/// Up to one edit for tokens of at most five characters, two for longer
/// ones. Punctuation and tokens shorter than three characters must match.
pub fn fuzzy_eq(a: &Token<'_>, b: &Token<'_>) -> bool {
    if a.normalized == b.normalized {
        return true;
    }
    if !a.is_word() || !b.is_word() {
        return false;
    }
    let la = a.text.chars().count();
    let lb = b.text.chars().count();
    let (shorter, longer) = (la.min(lb), la.max(lb));
    if shorter < 3 {
        return false;
    }
    let allowed = if longer <= 5 { 1 } else { 2 };
    longer - shorter <= allowed && strsim::levenshtein(a.text, b.text) <= allowed
}

/// A line of the source with the byte range of its trimmed content.
#[derive(Debug, Clone, Copy)]
struct SourceLine<'a> {
    content: &'a str,
    start: usize,
    end: usize,
}

fn source_lines(source: &str) -> Vec<SourceLine<'_>> {
    let mut lines = Vec::new();
    let mut offset = 0;
    for raw in source.split_inclusive('\n') {
        let body = raw.trim_end_matches(['\n', '\r']);
        let lead = body.len() - body.trim_start().len();
        let content = body.trim();
        lines.push(SourceLine {
            content,
            start: offset + lead,
            end: offset + lead + content.len(),
        });
        offset += raw.len();
    }
    lines
}

/// Trimmed snippet lines without leading/trailing blank lines.
fn snippet_lines(snippet: &str) -> Vec<&str> {
    let lines: Vec<&str> = snippet.lines().map(str::trim).collect();
    let first = lines.iter().position(|l| !l.is_empty());
    let last = lines.iter().rposition(|l| !l.is_empty());
    match (first, last) {
        (Some(f), Some(l)) => lines[f..=l].to_vec(),
        _ => Vec::new(),
    }
}

fn lines_agree(a: &str, b: &str) -> bool {
    if a == b {
        return true;
    }
    let ta = tokenize(a);
    let tb = tokenize(b);
    ta.len() == tb.len() && ta.iter().zip(&tb).all(|(x, y)| exact_eq(x, y))
}

/// Byte range from the first to the last non-blank line of `lines`.
fn content_range(lines: &[SourceLine<'_>]) -> Option<Range<usize>> {
    let first = lines.iter().find(|l| !l.content.is_empty())?;
    let last = lines.iter().rev().find(|l| !l.content.is_empty())?;
    Some(first.start..last.end)
}

/// Compare the hinted lines (and a few on either side) with the snippet.
#[derive(Debug, Clone, Copy, Default)]
pub struct LineHintStrategy;

impl MatchStrategy for LineHintStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::LineHint
    }

    fn find(&self, ctx: &MatchContext<'_>) -> Option<MatchSpan> {
        let hint = ctx.line_hint?;
        let wanted = snippet_lines(ctx.search);
        let lines = source_lines(ctx.source);
        let n = wanted.len();
        if n == 0 || lines.len() < n {
            return None;
        }

        let center = hint.start.saturating_sub(1);
        let slack = ctx.config.line_hint_slack;
        let lo = center.saturating_sub(slack);
        let hi = (center + slack).min(lines.len() - n);

        // (ratio, distance from hint, start line)
        let mut best: Option<(f64, usize, usize)> = None;
        for start in lo..=hi {
            let agree = wanted
                .iter()
                .zip(&lines[start..start + n])
                .filter(|(w, l)| lines_agree(w, l.content))
                .count();
            let ratio = agree as f64 / n as f64;
            if ratio < ctx.config.line_hint_agreement {
                continue;
            }
            let distance = start.abs_diff(center);
            let better = best.map_or(true, |(r, d, _)| ratio > r || (ratio == r && distance < d));
            if better {
                best = Some((ratio, distance, start));
            }
        }

        let (ratio, _, start) = best?;
        if ratio < 1.0 && ExactStrategy.find(ctx).is_some() {
            tracing::trace!(ratio, "partial hinted lines lose to an exact copy");
            return None;
        }
        let range = content_range(&lines[start..start + n])?;
        if !ctx.allows(&range) {
            return None;
        }
        Some(MatchSpan::from_bytes(
            ctx.source_tokens,
            range,
            ratio,
            StrategyKind::LineHint,
        ))
    }
}

/// Contiguous token equality; the first occurrence wins.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExactStrategy;

impl MatchStrategy for ExactStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Exact
    }

    fn find(&self, ctx: &MatchContext<'_>) -> Option<MatchSpan> {
        let search = ctx.search_tokens;
        let source = ctx.source_tokens;
        let m = search.len();
        let mut regions = ctx.token_regions();
        regions.sort_unstable();

        for (start, end) in regions {
            if end - start < m {
                continue;
            }
            for i in start..=end - m {
                if source[i].normalized != search[0].normalized {
                    continue;
                }
                if source[i..i + m]
                    .iter()
                    .zip(search)
                    .all(|(a, b)| exact_eq(a, b))
                {
                    return MatchSpan::from_tokens(source, i, i + m, 1.0, StrategyKind::Exact);
                }
            }
        }
        None
    }
}

/// Best anchored LCS alignment of `search` over the allowed regions.
///
/// Returns `(score, start_token, end_token)`.
fn anchored_alignment<F>(
    ctx: &MatchContext<'_>,
    search: &[Token<'_>],
    eq: F,
) -> Option<(f64, usize, usize)>
where
    F: Fn(&Token<'_>, &Token<'_>) -> bool,
{
    let m = search.len();
    if m == 0 || m > ctx.config.max_fuzzy_tokens {
        return None;
    }
    let source = ctx.source_tokens;
    let slack = (m / 4).max(4);

    let mut seen = HashSet::new();
    let mut windows = Vec::new();
    'regions: for (rs, re) in ctx.token_regions() {
        let anchors = choose_anchors(search, &source[rs..re], ctx.config.max_anchors);
        for k in anchors {
            let anchor = &search[k];
            for p in rs..re {
                if !eq(anchor, &source[p]) {
                    continue;
                }
                let ws = p.saturating_sub(k + slack).max(rs);
                let we = (p + (m - k) + slack).min(re);
                if seen.insert((ws, we)) {
                    windows.push((ws, we));
                    if windows.len() >= ctx.config.max_windows {
                        break 'regions;
                    }
                }
            }
        }
    }

    let mut best: Option<(f64, usize, usize)> = None;
    for (ws, we) in windows {
        let Some(alignment) = align(&source[ws..we], search, &eq) else {
            continue;
        };
        let score = alignment.score(m);
        let start = ws + alignment.first;
        let end = ws + alignment.last + 1;
        let better = best.map_or(true, |(s, b, _)| score > s || (score == s && start < b));
        if better {
            best = Some((score, start, end));
        }
    }
    best
}

/// Anchored LCS alignment with exact token equality.
#[derive(Debug, Clone, Copy, Default)]
pub struct AnchoredFuzzyStrategy;

impl MatchStrategy for AnchoredFuzzyStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::AnchoredFuzzy
    }

    fn find(&self, ctx: &MatchContext<'_>) -> Option<MatchSpan> {
        let (score, start, end) = anchored_alignment(ctx, ctx.search_tokens, exact_eq)?;
        if score <= ctx.fuzzy_threshold() {
            return None;
        }
        MatchSpan::from_tokens(ctx.source_tokens, start, end, score, self.kind())
    }
}

/// Anchored alignment after removing comments from the snippet.
#[derive(Debug, Clone, Copy, Default)]
pub struct CommentInsensitiveStrategy;

impl MatchStrategy for CommentInsensitiveStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::CommentInsensitive
    }

    fn find(&self, ctx: &MatchContext<'_>) -> Option<MatchSpan> {
        let stripped = strip_comments(ctx.search);
        let tokens = tokenize(&stripped);
        if tokens.is_empty() || tokens.len() == ctx.search_tokens.len() {
            return None;
        }
        let (score, start, end) = anchored_alignment(ctx, &tokens, exact_eq)?;
        if score <= ctx.fuzzy_threshold() {
            return None;
        }
        MatchSpan::from_tokens(ctx.source_tokens, start, end, score, self.kind())
    }
}

/// Anchored alignment whose token equality tolerates typos.
#[derive(Debug, Clone, Copy, Default)]
pub struct FuzzyTokenStrategy;

impl MatchStrategy for FuzzyTokenStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::FuzzyToken
    }

    fn find(&self, ctx: &MatchContext<'_>) -> Option<MatchSpan> {
        let (score, start, end) = anchored_alignment(ctx, ctx.search_tokens, fuzzy_eq)?;
        if score <= ctx.config.fuzzy_token_threshold {
            return None;
        }
        MatchSpan::from_tokens(ctx.source_tokens, start, end, score, self.kind())
    }
}

/// Name of the single top-level declaration `snippet` consists of.
pub fn declared_name(snippet: &str) -> Option<String> {
    if let Some(declaration) = ts::sole_declaration(snippet) {
        return Some(declaration.name);
    }
    let trimmed = snippet.trim();
    let scanned = scan_top_level(trimmed);
    match scanned.as_slice() {
        [only] if only.start == 0 && only.end + 1 >= trimmed.len() => Some(only.name.clone()),
        _ => None,
    }
}

/// Byte range of the top-level declaration called `name` in a document.
///
/// An `export` wrapper stays outside the range unless `replacement` brings
/// its own, so the new text cannot drop the export. Deletions take the whole
/// statement. Uses the syntax tree when available and the declaration
/// scanner otherwise. Ambiguous names resolve to nothing.
pub fn declaration_range(document: &str, name: &str, replacement: &str) -> Option<Range<usize>> {
    let replacement = replacement.trim_start();
    let keep_export = !replacement.is_empty() && !EXPORT_PREFIX_RE.is_match(replacement);

    match ts::analyze(document) {
        Ok(parsed) => {
            return ts::find_declaration(&parsed, name).ok().map(|d| {
                if keep_export {
                    d.inner_start..d.inner_end
                } else {
                    d.byte_start..d.byte_end
                }
            });
        }
        Err(err) => tracing::debug!(%err, "syntax tree unavailable, scanning for declaration"),
    }
    let mut found = scan_top_level(document)
        .into_iter()
        .filter(|d| d.name == name);
    match (found.next(), found.next()) {
        (Some(decl), None) => {
            let prefix = match EXPORT_PREFIX_RE.find(&document[decl.start..decl.end]) {
                Some(m) if keep_export => m.end(),
                _ => 0,
            };
            Some(decl.start + prefix..decl.end)
        }
        _ => None,
    }
}

/// Replace a same-named top-level declaration when the replacement is one.
#[derive(Debug, Clone, Copy, Default)]
pub struct StructuralStrategy;

impl MatchStrategy for StructuralStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Structural
    }

    fn find(&self, ctx: &MatchContext<'_>) -> Option<MatchSpan> {
        let replacement = ctx.replacement?;
        let name = declared_name(replacement)?;
        let range = declaration_range(ctx.source, &name, replacement)?;
        Some(MatchSpan::from_bytes(
            ctx.source_tokens,
            range,
            1.0,
            StrategyKind::Structural,
        ))
    }
}

/// Use the snippet's first and last non-blank lines as literal anchors.
#[derive(Debug, Clone, Copy, Default)]
pub struct AnchorLineStrategy;

impl MatchStrategy for AnchorLineStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::AnchorLine
    }

    fn find(&self, ctx: &MatchContext<'_>) -> Option<MatchSpan> {
        let wanted = snippet_lines(ctx.search);
        if wanted.len() < 2 {
            return None;
        }
        let first = wanted[0];
        let last = wanted[wanted.len() - 1];
        let lines = source_lines(ctx.source);

        let unique = |needle: &str| -> Option<usize> {
            let mut hits = lines.iter().enumerate().filter(|(_, l)| {
                l.content == needle && ctx.allows(&(l.start..l.end))
            });
            match (hits.next(), hits.next()) {
                (Some((idx, _)), None) => Some(idx),
                _ => None,
            }
        };

        let top = unique(first)?;
        let bottom = unique(last)?;
        if bottom <= top || bottom - top > ctx.config.anchor_line_max_distance {
            return None;
        }

        let range = lines[top].start..lines[bottom].end;
        if !ctx.allows(&range) {
            return None;
        }
        let enclosed = bottom - top + 1;
        let score = wanted.len().min(enclosed) as f64 / wanted.len().max(enclosed) as f64;
        Some(MatchSpan::from_bytes(
            ctx.source_tokens,
            range,
            score,
            StrategyKind::AnchorLine,
        ))
    }
}
