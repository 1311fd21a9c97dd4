//! Locating an approximate search snippet inside a document.
//!
//! The [`Matcher`] runs an ordered list of [`MatchStrategy`] objects and
//! returns the first span a strategy accepts. The default cascade goes from
//! cheap and precise to expensive and permissive:
//!
//! 1. [`LineHintStrategy`]: compare the hinted lines directly
//! 2. [`ExactStrategy`]: contiguous token equality
//! 3. [`AnchoredFuzzyStrategy`]: anchored LCS alignment
//! 4. [`CommentInsensitiveStrategy`]: the same with comments stripped
//! 5. [`FuzzyTokenStrategy`]: LCS with edit-distance tolerant tokens
//! 6. [`StructuralStrategy`]: same-named top-level declaration
//! 7. [`AnchorLineStrategy`]: unique first/last lines
//!
//! Strategies only see a [`MatchContext`], so each one can be constructed
//! and tested on its own.

pub mod lcs;
pub mod strategies;

pub use strategies::{
    declaration_range, declared_name, fuzzy_eq, AnchorLineStrategy, AnchoredFuzzyStrategy,
    CommentInsensitiveStrategy, ExactStrategy, FuzzyTokenStrategy, LineHintStrategy,
    StructuralStrategy,
};

use crate::config::MatcherConfig;
use crate::edit::{preview, LineHint};
use crate::token::{token_range_within, tokenize, Token};
use std::fmt;
use std::ops::Range;

/// Which strategy produced a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StrategyKind {
    LineHint,
    Exact,
    AnchoredFuzzy,
    CommentInsensitive,
    FuzzyToken,
    Structural,
    AnchorLine,
}

impl StrategyKind {
    pub fn as_str(self) -> &'static str {
        match self {
            StrategyKind::LineHint => "line-hint",
            StrategyKind::Exact => "exact",
            StrategyKind::AnchoredFuzzy => "anchored-fuzzy",
            StrategyKind::CommentInsensitive => "comment-insensitive",
            StrategyKind::FuzzyToken => "fuzzy-token",
            StrategyKind::Structural => "structural",
            StrategyKind::AnchorLine => "anchor-line",
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A located span. Token indices are inclusive-exclusive over the source
/// tokens; the byte range is what actually gets replaced.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchSpan {
    pub start_token: usize,
    pub end_token: usize,
    pub byte_start: usize,
    pub byte_end: usize,
    pub score: f64,
    pub strategy: StrategyKind,
}

impl MatchSpan {
    pub fn byte_range(&self) -> Range<usize> {
        self.byte_start..self.byte_end
    }

    pub(crate) fn from_bytes(
        tokens: &[Token<'_>],
        range: Range<usize>,
        score: f64,
        strategy: StrategyKind,
    ) -> Self {
        let (start_token, end_token) = token_range_within(tokens, range.clone());
        Self {
            start_token,
            end_token,
            byte_start: range.start,
            byte_end: range.end,
            score,
            strategy,
        }
    }

    pub(crate) fn from_tokens(
        tokens: &[Token<'_>],
        start_token: usize,
        end_token: usize,
        score: f64,
        strategy: StrategyKind,
    ) -> Option<Self> {
        if start_token >= end_token || end_token > tokens.len() {
            return None;
        }
        Some(Self {
            start_token,
            end_token,
            byte_start: tokens[start_token].start,
            byte_end: tokens[end_token - 1].end,
            score,
            strategy,
        })
    }
}

/// Everything a strategy may look at for one edit.
#[derive(Debug, Clone, Copy)]
pub struct MatchContext<'a> {
    pub source: &'a str,
    pub source_tokens: &'a [Token<'a>],
    pub search: &'a str,
    pub search_tokens: &'a [Token<'a>],
    pub replacement: Option<&'a str>,
    pub line_hint: Option<LineHint>,
    /// Byte ranges a text strategy must stay inside; empty means anywhere
    pub restrict: &'a [Range<usize>],
    pub relaxed: bool,
    pub config: &'a MatcherConfig,
}

impl<'a> MatchContext<'a> {
    /// Searchable token index ranges, one per restriction.
    pub fn token_regions(&self) -> Vec<(usize, usize)> {
        if self.restrict.is_empty() {
            return vec![(0, self.source_tokens.len())];
        }
        self.restrict
            .iter()
            .map(|r| token_range_within(self.source_tokens, r.clone()))
            .filter(|(s, e)| s < e)
            .collect()
    }

    /// Whether a byte span is allowed by the restriction.
    pub fn allows(&self, range: &Range<usize>) -> bool {
        self.restrict.is_empty()
            || self
                .restrict
                .iter()
                .any(|r| r.start <= range.start && range.end <= r.end)
    }

    /// Acceptance threshold for the anchored LCS strategies.
    pub fn fuzzy_threshold(&self) -> f64 {
        if self.relaxed {
            self.config.relaxed_threshold
        } else {
            self.config.fuzzy_threshold
        }
    }
}

/// One step of the fallback cascade.
pub trait MatchStrategy: Send + Sync {
    fn kind(&self) -> StrategyKind;

    /// Return a span if this strategy accepts one.
    fn find(&self, ctx: &MatchContext<'_>) -> Option<MatchSpan>;
}

/// Options for a single [`Matcher::locate`] call.
#[derive(Debug, Clone, Default)]
pub struct MatchOptions<'a> {
    pub replacement: Option<&'a str>,
    pub line_hint: Option<LineHint>,
    pub restrict: &'a [Range<usize>],
    pub relaxed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchFailure {
    pub reason: String,
}

impl fmt::Display for MatchFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.reason)
    }
}

impl std::error::Error for MatchFailure {}

/// An ordered cascade of strategies.
pub struct Matcher {
    strategies: Vec<Box<dyn MatchStrategy>>,
    config: MatcherConfig,
}

impl fmt::Debug for Matcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Matcher")
            .field("strategies", &self.kinds())
            .field("config", &self.config)
            .finish()
    }
}

impl Default for Matcher {
    fn default() -> Self {
        Self::cascade(MatcherConfig::default())
    }
}

impl Matcher {
    /// An empty matcher; add strategies with [`Matcher::push`].
    pub fn new(config: MatcherConfig) -> Self {
        Self {
            strategies: Vec::new(),
            config,
        }
    }

    /// The standard seven-step cascade.
    pub fn cascade(config: MatcherConfig) -> Self {
        let mut matcher = Self::new(config);
        matcher.push(LineHintStrategy);
        matcher.push(ExactStrategy);
        matcher.push(AnchoredFuzzyStrategy);
        matcher.push(CommentInsensitiveStrategy);
        matcher.push(FuzzyTokenStrategy);
        matcher.push(StructuralStrategy);
        matcher.push(AnchorLineStrategy);
        matcher
    }

    pub fn push(&mut self, strategy: impl MatchStrategy + 'static) {
        self.strategies.push(Box::new(strategy));
    }

    /// Insert a strategy at `index` in the cascade.
    pub fn insert(&mut self, index: usize, strategy: impl MatchStrategy + 'static) {
        let index = index.min(self.strategies.len());
        self.strategies.insert(index, Box::new(strategy));
    }

    pub fn kinds(&self) -> Vec<StrategyKind> {
        self.strategies.iter().map(|s| s.kind()).collect()
    }

    pub fn config(&self) -> &MatcherConfig {
        &self.config
    }

    /// Tokenize both sides and run the cascade.
    pub fn locate(
        &self,
        source: &str,
        search: &str,
        options: &MatchOptions<'_>,
    ) -> Result<MatchSpan, MatchFailure> {
        let source_tokens = tokenize(source);
        let search_tokens = tokenize(search);
        let ctx = MatchContext {
            source,
            source_tokens: &source_tokens,
            search,
            search_tokens: &search_tokens,
            replacement: options.replacement,
            line_hint: options.line_hint,
            restrict: options.restrict,
            relaxed: options.relaxed,
            config: &self.config,
        };
        self.find(&ctx)
    }

    /// Run the cascade over a prepared context.
    pub fn find(&self, ctx: &MatchContext<'_>) -> Result<MatchSpan, MatchFailure> {
        if ctx.search_tokens.is_empty() {
            return Err(MatchFailure {
                reason: "search block is empty".to_string(),
            });
        }

        for strategy in &self.strategies {
            if let Some(span) = strategy.find(ctx) {
                tracing::debug!(
                    strategy = %span.strategy,
                    score = span.score,
                    byte_start = span.byte_start,
                    byte_end = span.byte_end,
                    "search block located"
                );
                return Ok(span);
            }
            tracing::trace!(strategy = %strategy.kind(), "strategy found no match");
        }

        Err(MatchFailure {
            reason: format!(
                "search block not found after {} strategies: \"{}\"",
                self.strategies.len(),
                preview(ctx.search, 60)
            ),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Nowhere;

    impl MatchStrategy for Nowhere {
        fn kind(&self) -> StrategyKind {
            StrategyKind::Exact
        }

        fn find(&self, _ctx: &MatchContext<'_>) -> Option<MatchSpan> {
            None
        }
    }

    #[test]
    fn cascade_order() {
        let matcher = Matcher::default();
        assert_eq!(
            matcher.kinds(),
            vec![
                StrategyKind::LineHint,
                StrategyKind::Exact,
                StrategyKind::AnchoredFuzzy,
                StrategyKind::CommentInsensitive,
                StrategyKind::FuzzyToken,
                StrategyKind::Structural,
                StrategyKind::AnchorLine,
            ]
        );
    }

    #[test]
    fn exact_copy_wins_with_full_score() {
        let source = "const a = 1;\nfunction foo() {\n  return a + 1;\n}\n";
        let span = Matcher::default()
            .locate(source, "return a + 1;", &MatchOptions::default())
            .unwrap();

        assert_eq!(span.strategy, StrategyKind::Exact);
        assert_eq!(span.score, 1.0);
        assert_eq!(&source[span.byte_range()], "return a + 1;");
    }

    #[test]
    fn failure_cites_snippet_prefix() {
        let err = Matcher::default()
            .locate("const a = 1;", "totally different text", &MatchOptions::default())
            .unwrap_err();
        assert!(err.reason.contains("totally different text"), "{err}");
    }

    #[test]
    fn empty_search_fails() {
        let err = Matcher::default()
            .locate("const a = 1;", "  \n ", &MatchOptions::default())
            .unwrap_err();
        assert!(err.reason.contains("empty"));
    }

    #[test]
    fn strategies_can_be_inserted() {
        let mut matcher = Matcher::new(MatcherConfig::default());
        matcher.push(ExactStrategy);
        matcher.insert(0, Nowhere);
        assert_eq!(matcher.kinds(), vec![StrategyKind::Exact, StrategyKind::Exact]);

        let span = matcher
            .locate("let x = 1;", "x = 1", &MatchOptions::default())
            .unwrap();
        assert_eq!(span.start_token, 1);
        assert_eq!(span.end_token, 4);
    }
}
