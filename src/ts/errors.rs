use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TreeSitterError {
    #[error("failed to set language {grammar} for parser")]
    LanguageSet { grammar: &'static str },

    #[error("parser produced no tree for {grammar}")]
    ParseFailed { grammar: &'static str },

    #[error("syntax tree unavailable: {reason}")]
    Unavailable { reason: String },

    #[error("invalid tree-sitter query: {message}")]
    InvalidQuery { message: String },

    #[error("declaration matched {count} locations, expected exactly 1")]
    AmbiguousMatch { count: usize },

    #[error("declaration not found: {name}")]
    TargetNotFound { name: String },

    #[error("syntax error detected at byte {byte_start}..{byte_end}")]
    SyntaxError { byte_start: usize, byte_end: usize },

    #[error("multiple syntax errors detected: {count} ERROR nodes")]
    MultipleSyntaxErrors { count: usize },
}

impl TreeSitterError {
    /// True when the analyzer could not give callers a usable tree at all.
    pub fn is_unavailable(&self) -> bool {
        matches!(
            self,
            TreeSitterError::Unavailable { .. }
                | TreeSitterError::ParseFailed { .. }
                | TreeSitterError::LanguageSet { .. }
        )
    }
}
