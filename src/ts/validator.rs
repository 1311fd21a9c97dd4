use crate::pool;
use crate::region::code_region;
use crate::ts::errors::TreeSitterError;

/// Syntax health of a document's code region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyntaxHealth {
    /// A tree was produced with this many error nodes
    Parsed { errors: usize },
    /// No usable tree
    Unavailable,
}

impl std::fmt::Display for SyntaxHealth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SyntaxHealth::Parsed { errors: 0 } => write!(f, "clean parse"),
            SyntaxHealth::Parsed { errors } => write!(f, "{errors} error nodes"),
            SyntaxHealth::Unavailable => write!(f, "no usable tree"),
        }
    }
}

impl SyntaxHealth {
    /// Whether `self` is worse than `baseline`.
    pub fn regressed_from(self, baseline: SyntaxHealth) -> bool {
        match (baseline, self) {
            (_, SyntaxHealth::Parsed { errors: 0 }) => false,
            (SyntaxHealth::Parsed { errors: old }, SyntaxHealth::Parsed { errors: new }) => new > old,
            (SyntaxHealth::Parsed { .. }, SyntaxHealth::Unavailable) => true,
            (SyntaxHealth::Unavailable, _) => false,
        }
    }
}

/// Parse the code region of `document` and report its error count.
pub fn syntax_health(document: &str) -> SyntaxHealth {
    let region = code_region(document);
    let offset = region.start;
    let code = &document[region];
    pool::with_parser(|parser| match parser.parse_region(code, offset) {
        Ok(parsed) => SyntaxHealth::Parsed {
            errors: parsed.error_count(),
        },
        Err(_) => SyntaxHealth::Unavailable,
    })
}

/// Validate that a document's code region has no syntax errors.
pub fn validate_syntax(document: &str) -> Result<(), TreeSitterError> {
    let region = code_region(document);
    let offset = region.start;
    let code = &document[region];
    let errors = pool::with_parser(|parser| {
        parser
            .parse_region(code, offset)
            .map(|parsed| parsed.error_nodes())
    })?;

    match errors.len() {
        0 => Ok(()),
        1 => Err(TreeSitterError::SyntaxError {
            byte_start: errors[0].byte_start + offset,
            byte_end: errors[0].byte_end + offset,
        }),
        n => Err(TreeSitterError::MultipleSyntaxErrors { count: n }),
    }
}

/// Check that `edited` does not parse worse than `original`.
///
/// Offsets shift after an edit, so error nodes are compared by count rather
/// than by position. A region that stops parsing altogether is always a
/// regression.
pub fn validate_edit(original: &str, edited: &str) -> Result<(), TreeSitterError> {
    let before = syntax_health(original);
    let after = syntax_health(edited);
    if !after.regressed_from(before) {
        return Ok(());
    }
    match (before, after) {
        (SyntaxHealth::Parsed { errors: old }, SyntaxHealth::Parsed { errors: new }) => {
            Err(TreeSitterError::MultipleSyntaxErrors { count: new - old })
        }
        _ => Err(TreeSitterError::Unavailable {
            reason: "edited code region no longer parses".to_string(),
        }),
    }
}
