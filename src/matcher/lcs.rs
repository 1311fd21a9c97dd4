//! Longest-common-subsequence alignment over token windows.

use crate::token::Token;
use std::collections::{HashMap, HashSet};

/// Result of aligning a search sequence against a window of source tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Alignment {
    /// Number of aligned token pairs (L)
    pub matched: usize,
    /// Window-relative index of the first aligned source token
    pub first: usize,
    /// Window-relative index of the last aligned source token (inclusive)
    pub last: usize,
}

impl Alignment {
    /// Width of the aligned source span (S).
    pub fn span_width(&self) -> usize {
        self.last - self.first + 1
    }

    /// `2·L / (M + S)`: rewards alignments that are both complete and dense.
    pub fn score(&self, search_len: usize) -> f64 {
        dense_score(self.matched, search_len, self.span_width())
    }
}

pub fn dense_score(matched: usize, search_len: usize, span_width: usize) -> f64 {
    let denom = search_len + span_width;
    if denom == 0 {
        return 0.0;
    }
    2.0 * matched as f64 / denom as f64
}

/// Align `search` against `window` with a custom token equality.
///
/// The backtrack starts from the earliest window position that reaches the
/// full LCS length and takes matches as late as possible, which keeps the
/// aligned span tight.
pub fn align<F>(window: &[Token<'_>], search: &[Token<'_>], eq: F) -> Option<Alignment>
where
    F: Fn(&Token<'_>, &Token<'_>) -> bool,
{
    let m = search.len();
    let w = window.len();
    if m == 0 || w == 0 {
        return None;
    }

    let cols = w + 1;
    let mut dp = vec![0u32; (m + 1) * cols];
    for i in 1..=m {
        for j in 1..=w {
            let idx = i * cols + j;
            dp[idx] = if eq(&search[i - 1], &window[j - 1]) {
                dp[(i - 1) * cols + (j - 1)] + 1
            } else {
                dp[(i - 1) * cols + j].max(dp[i * cols + (j - 1)])
            };
        }
    }

    let best = dp[m * cols + w];
    if best == 0 {
        return None;
    }

    let end = (1..=w).find(|&j| dp[m * cols + j] == best)?;

    let mut i = m;
    let mut j = end;
    let mut first = end - 1;
    let mut last = None;
    while i > 0 && j > 0 {
        let here = dp[i * cols + j];
        if here == 0 {
            break;
        }
        if eq(&search[i - 1], &window[j - 1]) && here == dp[(i - 1) * cols + (j - 1)] + 1 {
            if last.is_none() {
                last = Some(j - 1);
            }
            first = j - 1;
            i -= 1;
            j -= 1;
        } else if dp[i * cols + (j - 1)] == here {
            j -= 1;
        } else {
            i -= 1;
        }
    }

    Some(Alignment {
        matched: best as usize,
        first,
        last: last?,
    })
}

/// Pick up to `max` anchor positions in `search`.
///
/// Anchors are the rarest search tokens that occur in the source at all,
/// longer tokens winning ties. When nothing occurs, head, middle and tail
/// are used so approximate strategies still have somewhere to look.
pub fn choose_anchors(search: &[Token<'_>], source: &[Token<'_>], max: usize) -> Vec<usize> {
    let wanted: HashSet<&str> = search.iter().map(|t| t.normalized).collect();
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for token in source {
        if wanted.contains(token.normalized) {
            *counts.entry(token.normalized).or_default() += 1;
        }
    }

    let mut seen = HashSet::new();
    let mut candidates: Vec<(usize, usize, usize)> = search
        .iter()
        .enumerate()
        .filter_map(|(idx, t)| {
            let count = counts.get(t.normalized).copied().unwrap_or(0);
            (count > 0 && seen.insert(t.normalized)).then_some((count, t.text.len(), idx))
        })
        .collect();
    candidates.sort_by(|a, b| a.0.cmp(&b.0).then(b.1.cmp(&a.1)).then(a.2.cmp(&b.2)));

    let mut anchors: Vec<usize> = candidates.into_iter().take(max).map(|c| c.2).collect();
    if anchors.is_empty() && !search.is_empty() {
        anchors = vec![0, search.len() / 2, search.len() - 1];
        anchors.dedup();
    }
    anchors
}
