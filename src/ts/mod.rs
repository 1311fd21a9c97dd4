//! Tree-sitter integration for JavaScript-family documents.
//!
//! The analyzer parses the code region of a document with an
//! error-recovering parser and exposes declaration lookup, binding and
//! reference enumeration, and a generic descendant visitor. Callers either
//! get a tree or a [`TreeSitterError`] whose [`is_unavailable`] tells them
//! to fall back to text-only strategies.
//!
//! [`is_unavailable`]: TreeSitterError::is_unavailable

pub mod errors;
pub mod locator;
pub mod parser;
pub mod query;
pub mod validator;

pub use errors::TreeSitterError;
pub use locator::{
    all_bindings, capitalized_references, capitalized_top_level_names, find_declaration,
    top_level_declarations, visit_descendants, Declaration, DeclarationKind, Reference, Visit,
};
pub use parser::{ErrorNode, Grammar, JsParser, ParsedSource};
pub use query::{QueryEngine, QueryMatch};
pub use validator::{syntax_health, validate_edit, validate_syntax, SyntaxHealth};

use crate::pool;
use crate::region::code_region;

/// Parse the code region of a full document with the pooled parser.
///
/// Node offsets inside the returned tree are region-relative; use
/// [`ParsedSource::document_range`] for document offsets.
pub fn analyze(document: &str) -> Result<ParsedSource<'_>, TreeSitterError> {
    let region = code_region(document);
    let offset = region.start;
    let code = &document[region];
    pool::with_parser(|parser| parser.parse_region(code, offset))
}

/// If `snippet` is exactly one named top-level declaration, return it.
///
/// Offsets in the returned declaration are relative to `snippet`.
pub fn sole_declaration(snippet: &str) -> Option<Declaration> {
    let trimmed = snippet.trim();
    if trimmed.is_empty() {
        return None;
    }
    let parsed = pool::with_parser(|parser| parser.parse_region(snippet, 0)).ok()?;
    if parsed.has_errors() {
        return None;
    }

    let root = parsed.root_node();
    let mut cursor = root.walk();
    let statements: Vec<_> = root
        .named_children(&mut cursor)
        .filter(|n| n.kind() != "comment")
        .collect();
    if statements.len() != 1 {
        return None;
    }

    let mut declarations = top_level_declarations(&parsed);
    if declarations.len() != 1 {
        return None;
    }
    let declaration = declarations.remove(0);
    (declaration.kind != DeclarationKind::Import).then_some(declaration)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn analyze_maps_region_offsets() {
        let doc = "<html><script>\nfunction App() { return 1; }\n</script></html>";
        let parsed = analyze(doc).unwrap();
        let app = find_declaration(&parsed, "App").unwrap();
        assert_eq!(&doc[app.byte_start..app.byte_end], "function App() { return 1; }");
    }

    #[test]
    fn sole_declaration_detects_whole_units() {
        let decl = sole_declaration("// header\nfunction Foo() {\n  return 1;\n}\n").unwrap();
        assert_eq!(decl.name, "Foo");
        assert_eq!(decl.kind, DeclarationKind::Function);

        assert!(sole_declaration("const a = 1;\nconst b = 2;").is_none());
        assert!(sole_declaration("return x + 1;").is_none());
        assert!(sole_declaration("").is_none());
    }
}
