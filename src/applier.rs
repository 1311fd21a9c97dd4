//! Transactional application of a batch of search/replace edits.
//!
//! Each edit is located, spliced into a working copy, validated, and either
//! committed to the working copy or discarded. After the batch the whole
//! result is validated against the pristine text; on failure the entire
//! batch is reverted. The [`Document`] is therefore left either untouched
//! or holding a text that passed every gate.

use crate::config::EngineConfig;
use crate::edit::{whole_line_range, Edit, SpanEdit};
use crate::matcher::{declaration_range, MatchOptions, Matcher, StrategyKind};
use crate::region::code_region;
use crate::scan::scoped_ranges;
use crate::ts::{syntax_health, SyntaxHealth};
use crate::validate::{changed_bytes, dedupe_top_level, DocumentFacts, ValidationMode, Validator};
use std::fmt;
use std::ops::Range;

/// The text being patched. Mutated only by [`PatchApplier::apply`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    text: String,
    original: String,
}

impl Document {
    pub fn new(text: impl Into<String>) -> Self {
        let text = text.into();
        Self {
            original: text.clone(),
            text,
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// The text this document was created with.
    pub fn original(&self) -> &str {
        &self.original
    }

    pub fn is_modified(&self) -> bool {
        self.text != self.original
    }

    pub fn into_text(self) -> String {
        self.text
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApplyOptions {
    /// Accept weaker anchored alignments
    pub relaxed: bool,
    /// Restrict text strategies to these top-level declarations
    pub scope: Vec<String>,
}

impl ApplyOptions {
    pub fn relaxed() -> Self {
        Self {
            relaxed: true,
            ..Self::default()
        }
    }

    pub fn scoped<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            scope: names.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    /// No strategy located the search text
    MatchNotFound,
    /// A validator check rejected the result
    ValidationRejected,
    /// No syntax tree and no fallback could stand in
    ParseUnavailable,
    /// The collaborator answered outside the edit protocol
    ProtocolViolation,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FailureKind::MatchNotFound => "match not found",
            FailureKind::ValidationRejected => "validation rejected",
            FailureKind::ParseUnavailable => "parse unavailable",
            FailureKind::ProtocolViolation => "protocol violation",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Failure {
    /// `None` for batch-level failures
    pub edit_index: Option<usize>,
    pub kind: FailureKind,
    pub message: String,
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.edit_index {
            Some(index) => write!(f, "edit #{}: {}: {}", index + 1, self.kind, self.message),
            None => write!(f, "batch: {}: {}", self.kind, self.message),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditOutcome {
    Applied,
    /// Search equals replacement; nothing to do
    Unchanged,
    Failed,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EditReport {
    pub index: usize,
    pub outcome: EditOutcome,
    pub strategy: Option<StrategyKind>,
    pub score: Option<f64>,
}

/// Result of one batch.
#[derive(Debug, Clone, PartialEq)]
pub struct PatchStats {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub failures: Vec<Failure>,
    pub warnings: Vec<String>,
    pub reports: Vec<EditReport>,
    /// The whole batch was rolled back by the final validation
    pub reverted: bool,
}

impl PatchStats {
    fn new(total: usize) -> Self {
        Self {
            total,
            succeeded: 0,
            failed: 0,
            failures: Vec::new(),
            warnings: Vec::new(),
            reports: Vec::with_capacity(total),
            reverted: false,
        }
    }

    pub fn failure_reasons(&self) -> Vec<String> {
        self.failures.iter().map(ToString::to_string).collect()
    }

    /// Nothing succeeded although there was something to do.
    pub fn is_total_failure(&self) -> bool {
        self.total > 0 && self.succeeded == 0
    }

    fn record_failure(&mut self, index: usize, kind: FailureKind, message: String) {
        self.failed += 1;
        self.failures.push(Failure {
            edit_index: Some(index),
            kind,
            message,
        });
        self.reports.push(EditReport {
            index,
            outcome: EditOutcome::Failed,
            strategy: None,
            score: None,
        });
    }

    fn revert(&mut self, message: String) {
        self.reverted = true;
        self.succeeded = 0;
        self.failed = self.total;
        for report in &mut self.reports {
            report.outcome = EditOutcome::Failed;
        }
        self.failures.push(Failure {
            edit_index: None,
            kind: FailureKind::ValidationRejected,
            message,
        });
    }
}

enum Step {
    Applied {
        text: String,
        facts: DocumentFacts,
        strategy: StrategyKind,
        score: f64,
    },
    Unchanged,
}

struct StepFailure {
    kind: FailureKind,
    message: String,
}

impl StepFailure {
    fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// Applies edit batches with a matcher cascade and the validator gate.
#[derive(Debug)]
pub struct PatchApplier {
    config: EngineConfig,
    matcher: Matcher,
}

impl Default for PatchApplier {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl PatchApplier {
    pub fn new(config: EngineConfig) -> Self {
        let matcher = Matcher::cascade(config.matcher.clone());
        Self { config, matcher }
    }

    /// Use a custom strategy cascade.
    pub fn with_matcher(config: EngineConfig, matcher: Matcher) -> Self {
        Self { config, matcher }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Apply `edits` in order. All edits are attempted.
    pub fn apply(&self, document: &mut Document, edits: &[Edit], options: &ApplyOptions) -> PatchStats {
        let pristine = document.text.as_str();
        let validator = Validator::new(&self.config.validator);
        let mut stats = PatchStats::new(edits.len());
        let mut working = pristine.to_string();
        let mut baseline: Option<DocumentFacts> = None;

        for (index, edit) in edits.iter().enumerate() {
            let _span = tracing::debug_span!("edit", index).entered();
            match self.apply_one(&working, edit, options, &validator, &mut baseline, &mut stats.warnings) {
                Ok(Step::Applied {
                    text,
                    facts,
                    strategy,
                    score,
                }) => {
                    tracing::debug!(%strategy, score, "edit applied");
                    working = text;
                    baseline = Some(facts);
                    stats.succeeded += 1;
                    stats.reports.push(EditReport {
                        index,
                        outcome: EditOutcome::Applied,
                        strategy: Some(strategy),
                        score: Some(score),
                    });
                }
                Ok(Step::Unchanged) => {
                    tracing::debug!("edit is a no-op");
                    stats.succeeded += 1;
                    stats.reports.push(EditReport {
                        index,
                        outcome: EditOutcome::Unchanged,
                        strategy: None,
                        score: None,
                    });
                }
                Err(failure) => {
                    tracing::debug!(kind = %failure.kind, message = %failure.message, "edit failed");
                    stats.record_failure(index, failure.kind, failure.message);
                }
            }
        }

        if working == pristine {
            return stats;
        }

        if let Err(err) = validator.check_batch(pristine, &working) {
            tracing::warn!(%err, "batch rejected by final validation, reverting");
            stats.revert(err.to_string());
            return stats;
        }

        document.text = working;
        stats
    }

    /// Convenience wrapper over [`PatchApplier::apply`] for plain text.
    pub fn apply_text(&self, text: &str, edits: &[Edit], options: &ApplyOptions) -> (String, PatchStats) {
        let mut document = Document::new(text);
        let stats = self.apply(&mut document, edits, options);
        (document.into_text(), stats)
    }

    fn apply_one(
        &self,
        working: &str,
        edit: &Edit,
        options: &ApplyOptions,
        validator: &Validator<'_>,
        baseline: &mut Option<DocumentFacts>,
        warnings: &mut Vec<String>,
    ) -> Result<Step, StepFailure> {
        if edit.target.is_none() && edit.search == edit.replace {
            return Ok(Step::Unchanged);
        }

        let (range, strategy, score) = self.locate(working, edit, options, warnings)?;

        let replacement = if working.trim().is_empty() {
            edit.replace.as_str()
        } else {
            edit.replace.trim()
        };
        let range = if replacement.is_empty() {
            whole_line_range(working, range)
        } else {
            range
        };

        let span = SpanEdit::capture(working, range.clone(), replacement)
            .map_err(|err| StepFailure::new(FailureKind::MatchNotFound, err.to_string()))?;
        let mut candidate = span
            .apply_to(working)
            .map_err(|err| StepFailure::new(FailureKind::MatchNotFound, err.to_string()))?;

        if !replacement.is_empty() {
            let inserted = range.start..range.start + replacement.len();
            if let Some(deduped) = dedupe_seams(&candidate, inserted) {
                warnings.push("removed context lines duplicated at an edit boundary".to_string());
                candidate = deduped;
            }
        }

        if candidate == working {
            return Ok(Step::Unchanged);
        }

        let mode = validator.mode_for(working.len(), changed_bytes(working, &candidate));
        if mode == ValidationMode::Heuristic {
            tracing::debug!("using heuristic validation");
            warnings.push("large document with a small change: syntax check skipped".to_string());
        }
        let base = match baseline.take() {
            Some(facts) if facts.mode == mode => facts,
            _ => validator.facts(working, mode),
        };
        let checked = validator.check_edit(working, &base, &candidate);
        *baseline = Some(base);
        let mut facts = checked
            .map_err(|err| StepFailure::new(FailureKind::ValidationRejected, err.to_string()))?;

        if let Some((fixed, names)) = dedupe_top_level(&candidate, mode) {
            if let Some(base) = baseline.as_ref() {
                if let Ok(fixed_facts) = validator.check_relative(base, &fixed) {
                    warnings.push(format!(
                        "removed earlier duplicate declarations: {}",
                        names.join(", ")
                    ));
                    candidate = fixed;
                    facts = fixed_facts;
                }
            }
        }

        Ok(Step::Applied {
            text: candidate,
            facts,
            strategy,
            score,
        })
    }

    fn locate(
        &self,
        working: &str,
        edit: &Edit,
        options: &ApplyOptions,
        warnings: &mut Vec<String>,
    ) -> Result<(Range<usize>, StrategyKind, f64), StepFailure> {
        if let Some(target) = &edit.target {
            return match declaration_range(working, target, &edit.replace) {
                Some(range) => Ok((range, StrategyKind::Structural, 1.0)),
                None if syntax_health(working) == SyntaxHealth::Unavailable => Err(StepFailure::new(
                    FailureKind::ParseUnavailable,
                    format!("cannot parse document to find declaration '{target}'"),
                )),
                None => Err(StepFailure::new(
                    FailureKind::MatchNotFound,
                    format!("no unique top-level declaration named '{target}'"),
                )),
            };
        }

        if edit.search.trim().is_empty() {
            return if working.trim().is_empty() {
                Ok((0..working.len(), StrategyKind::Exact, 1.0))
            } else {
                Err(StepFailure::new(
                    FailureKind::MatchNotFound,
                    "empty search block on a non-empty document",
                ))
            };
        }

        let restrict = self.scope_ranges(working, &options.scope, warnings);
        let match_options = MatchOptions {
            replacement: Some(&edit.replace),
            line_hint: edit.line_hint,
            restrict: &restrict,
            relaxed: options.relaxed,
        };
        let span = self
            .matcher
            .locate(working, &edit.search, &match_options)
            .map_err(|failure| StepFailure::new(FailureKind::MatchNotFound, failure.reason))?;
        if options.relaxed && span.strategy == StrategyKind::AnchoredFuzzy
            && span.score <= self.config.matcher.fuzzy_threshold
        {
            warnings.push(format!(
                "edit matched only under the relaxed threshold (score {:.2})",
                span.score
            ));
        }
        Ok((span.byte_range(), span.strategy, span.score))
    }

    fn scope_ranges(
        &self,
        working: &str,
        scope: &[String],
        warnings: &mut Vec<String>,
    ) -> Vec<Range<usize>> {
        if scope.is_empty() {
            return Vec::new();
        }
        let region = code_region(working);
        let ranges: Vec<Range<usize>> = scoped_ranges(&working[region.clone()], scope)
            .into_iter()
            .map(|r| r.start + region.start..r.end + region.start)
            .collect();
        if ranges.is_empty() {
            warnings.push(format!(
                "scope targets not found ({}); searching the whole document",
                scope.join(", ")
            ));
        }
        ranges
    }
}

/// A context line that carries no identity of its own.
fn is_trivial_line(line: &str) -> bool {
    line.chars().all(|c| "{}()[];,".contains(c))
        || (line.starts_with("</") && line.ends_with('>') && !line.contains(' '))
}

/// Remove context lines the replacement repeated at either boundary.
///
/// `inserted` is the byte range of the replacement inside `candidate`.
/// Lines are compared trimmed; overlaps made only of closing brackets or
/// closing tags are left alone.
pub fn dedupe_seams(candidate: &str, inserted: Range<usize>) -> Option<String> {
    let body: Vec<&str> = candidate[inserted.clone()].lines().map(str::trim).collect();
    if body.len() < 2 {
        return None;
    }
    let mut removals = Vec::new();

    // tail: replacement's last lines repeated right after it
    let after = &candidate[inserted.end..];
    if let Some(nl) = after.find('\n') {
        if after[..nl].trim().is_empty() {
            let tail_start = inserted.end + nl + 1;
            let mut lines = Vec::new();
            let mut offset = tail_start;
            for raw in candidate[tail_start..].split_inclusive('\n').take(body.len()) {
                lines.push((raw.trim(), offset + raw.len()));
                offset += raw.len();
            }
            for k in (1..body.len()).rev() {
                if k > lines.len() {
                    continue;
                }
                let ours = &body[body.len() - k..];
                let theirs = lines[..k].iter().map(|(l, _)| *l);
                if ours.iter().copied().eq(theirs) && ours.iter().any(|l| !is_trivial_line(l)) {
                    removals.push(SpanEdit::capture(candidate, tail_start..lines[k - 1].1, "").ok()?);
                    break;
                }
            }
        }
    }

    // head: replacement's first lines repeated right before it
    let before = &candidate[..inserted.start];
    let line_start = before.rfind('\n').map_or(0, |i| i + 1);
    if line_start > 0 && before[line_start..].trim().is_empty() {
        let preceding: Vec<(&str, usize)> = {
            let mut lines = Vec::new();
            let mut offset = 0;
            for raw in candidate[..line_start].split_inclusive('\n') {
                lines.push((raw.trim(), offset));
                offset += raw.len();
            }
            lines
        };
        for k in (1..body.len()).rev() {
            if k > preceding.len() {
                continue;
            }
            let ours = &body[..k];
            let window = &preceding[preceding.len() - k..];
            let theirs = window.iter().map(|(l, _)| *l);
            if ours.iter().copied().eq(theirs) && ours.iter().any(|l| !is_trivial_line(l)) {
                removals.push(SpanEdit::capture(candidate, window[0].1..line_start, "").ok()?);
                break;
            }
        }
    }

    if removals.is_empty() {
        return None;
    }
    tracing::debug!(count = removals.len(), "deduplicated edit seams");
    SpanEdit::apply_all(candidate, removals).ok()
}
