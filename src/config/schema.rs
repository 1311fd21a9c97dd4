use crate::intent::EditIntent;
use serde::Deserialize;
use std::fmt;

/// Every tuning constant of the engine, loadable from TOML.
#[derive(Debug, Deserialize, Default, Clone, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    pub matcher: MatcherConfig,
    pub validator: ValidatorConfig,
    pub compressor: CompressorConfig,
    pub repair: RepairConfig,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct MatcherConfig {
    /// Fraction of hinted lines that must agree with the snippet
    pub line_hint_agreement: f64,
    /// Lines tried on either side of the hinted start
    pub line_hint_slack: usize,
    /// Anchored fuzzy acceptance (score must be strictly greater)
    pub fuzzy_threshold: f64,
    /// Anchored fuzzy acceptance in relaxed mode
    pub relaxed_threshold: f64,
    /// Acceptance for the edit-distance tolerant retry
    pub fuzzy_token_threshold: f64,
    pub max_anchors: usize,
    pub max_windows: usize,
    /// Search sequences longer than this skip the LCS strategies
    pub max_fuzzy_tokens: usize,
    /// Max distance between the first and last anchor lines
    pub anchor_line_max_distance: usize,
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self {
            line_hint_agreement: 0.7,
            line_hint_slack: 3,
            fuzzy_threshold: 0.85,
            relaxed_threshold: 0.60,
            fuzzy_token_threshold: 0.70,
            max_anchors: 5,
            max_windows: 48,
            max_fuzzy_tokens: 1500,
            anchor_line_max_distance: 500,
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct ValidatorConfig {
    /// A candidate shorter than this is suspicious...
    pub truncation_min_chars: usize,
    /// ...when the original was longer than this
    pub truncation_original_chars: usize,
    pub min_size_ratio: f64,
    pub max_size_ratio: f64,
    /// Baselines shorter than this skip the size-ratio check
    pub size_check_floor: usize,
    /// Documents at least this large may use heuristic validation
    pub heuristic_threshold_bytes: usize,
    /// Max changed-bytes / document-bytes for heuristic validation
    pub heuristic_change_ratio: f64,
    /// Names treated as defined in addition to the built-in globals
    pub extra_globals: Vec<String>,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            truncation_min_chars: 100,
            truncation_original_chars: 500,
            min_size_ratio: 0.5,
            max_size_ratio: 3.0,
            size_check_floor: 200,
            heuristic_threshold_bytes: 256 * 1024,
            heuristic_change_ratio: 0.02,
            extra_globals: Vec::new(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct CompressorConfig {
    /// Files with fewer lines are returned unchanged
    pub min_lines: usize,
    /// Lines kept by the truncation fallback
    pub truncate_lines: usize,
    /// Array/object literals at least this long are summarized in data files
    pub data_literal_min_chars: usize,
    pub thresholds: IntentThresholds,
}

impl Default for CompressorConfig {
    fn default() -> Self {
        Self {
            min_lines: 120,
            truncate_lines: 400,
            data_literal_min_chars: 160,
            thresholds: IntentThresholds::default(),
        }
    }
}

impl CompressorConfig {
    pub fn threshold_for(&self, intent: EditIntent) -> usize {
        let t = &self.thresholds;
        match intent {
            EditIntent::Style => t.style,
            EditIntent::Content => t.content,
            EditIntent::BugFix => t.bug_fix,
            EditIntent::Feature => t.feature,
            EditIntent::Refactor => t.refactor,
            EditIntent::Unknown => t.unknown,
        }
    }
}

/// Minimum residual body size (chars) before a body is collapsed.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct IntentThresholds {
    pub style: usize,
    pub content: usize,
    pub bug_fix: usize,
    pub feature: usize,
    pub refactor: usize,
    pub unknown: usize,
}

impl Default for IntentThresholds {
    fn default() -> Self {
        Self {
            style: EditIntent::Style.default_threshold(),
            content: EditIntent::Content.default_threshold(),
            bug_fix: EditIntent::BugFix.default_threshold(),
            feature: EditIntent::Feature.default_threshold(),
            refactor: EditIntent::Refactor.default_threshold(),
            unknown: EditIntent::Unknown.default_threshold(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct RepairConfig {
    pub max_attempts: usize,
}

impl Default for RepairConfig {
    fn default() -> Self {
        Self { max_attempts: 2 }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut issues = Vec::new();

        let m = &self.matcher;
        for (field, value) in [
            ("matcher.line_hint_agreement", m.line_hint_agreement),
            ("matcher.fuzzy_threshold", m.fuzzy_threshold),
            ("matcher.relaxed_threshold", m.relaxed_threshold),
            ("matcher.fuzzy_token_threshold", m.fuzzy_token_threshold),
        ] {
            if !(value > 0.0 && value <= 1.0) {
                issues.push(ValidationIssue::OutOfRange {
                    field,
                    message: format!("{value} is not in (0, 1]"),
                });
            }
        }
        if m.relaxed_threshold > m.fuzzy_threshold {
            issues.push(ValidationIssue::InvalidCombo {
                message: "matcher.relaxed_threshold must not exceed matcher.fuzzy_threshold"
                    .to_string(),
            });
        }
        for (field, value) in [
            ("matcher.max_anchors", m.max_anchors),
            ("matcher.max_windows", m.max_windows),
            ("matcher.max_fuzzy_tokens", m.max_fuzzy_tokens),
            ("matcher.anchor_line_max_distance", m.anchor_line_max_distance),
        ] {
            if value == 0 {
                issues.push(ValidationIssue::OutOfRange {
                    field,
                    message: "must be at least 1".to_string(),
                });
            }
        }

        let v = &self.validator;
        if !(v.min_size_ratio > 0.0 && v.min_size_ratio < v.max_size_ratio) {
            issues.push(ValidationIssue::InvalidCombo {
                message: format!(
                    "validator size ratio bounds [{}, {}] are not increasing and positive",
                    v.min_size_ratio, v.max_size_ratio
                ),
            });
        }
        if !(v.heuristic_change_ratio > 0.0 && v.heuristic_change_ratio <= 1.0) {
            issues.push(ValidationIssue::OutOfRange {
                field: "validator.heuristic_change_ratio",
                message: format!("{} is not in (0, 1]", v.heuristic_change_ratio),
            });
        }
        if v.extra_globals.iter().any(|g| g.trim().is_empty()) {
            issues.push(ValidationIssue::OutOfRange {
                field: "validator.extra_globals",
                message: "contains an empty name".to_string(),
            });
        }

        let c = &self.compressor;
        if c.truncate_lines == 0 {
            issues.push(ValidationIssue::OutOfRange {
                field: "compressor.truncate_lines",
                message: "must be at least 1".to_string(),
            });
        }

        if !(1..=2).contains(&self.repair.max_attempts) {
            issues.push(ValidationIssue::OutOfRange {
                field: "repair.max_attempts",
                message: format!("{} is not 1 or 2", self.repair.max_attempts),
            });
        }

        if issues.is_empty() {
            Ok(())
        } else {
            Err(ValidationError { issues })
        }
    }
}

#[derive(Debug, Clone)]
pub struct ValidationError {
    pub issues: Vec<ValidationIssue>,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, issue) in self.issues.iter().enumerate() {
            if idx > 0 {
                writeln!(f)?;
            }
            write!(f, "{issue}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}

#[derive(Debug, Clone)]
pub enum ValidationIssue {
    OutOfRange {
        field: &'static str,
        message: String,
    },
    InvalidCombo {
        message: String,
    },
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationIssue::OutOfRange { field, message } => {
                write!(f, "'{field}' out of range: {message}")
            }
            ValidationIssue::InvalidCombo { message } => {
                write!(f, "invalid engine configuration: {message}")
            }
        }
    }
}
