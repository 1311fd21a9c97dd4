use crate::ts::errors::TreeSitterError;
use crate::ts::parser::{Grammar, ParsedSource};
use std::collections::HashMap;
use tree_sitter::{Query, QueryCursor, StreamingIterator};

/// A match from a tree-sitter query with captured nodes.
#[derive(Debug, Clone)]
pub struct QueryMatch {
    /// The full match byte range (code-region offsets)
    pub byte_start: usize,
    pub byte_end: usize,
    /// Named captures: capture_name -> node info
    pub captures: HashMap<String, CapturedNode>,
}

#[derive(Debug, Clone)]
pub struct CapturedNode {
    pub byte_start: usize,
    pub byte_end: usize,
    pub text: String,
    pub kind: String,
}

/// Engine for executing tree-sitter queries against a parsed code region.
pub struct QueryEngine {
    query: Query,
    capture_names: Vec<String>,
}

impl QueryEngine {
    /// Compile a query for one grammar.
    ///
    /// Node names differ slightly between the JavaScript and TypeScript
    /// grammars, so queries are compiled per grammar rather than once.
    pub fn new(grammar: Grammar, query_str: &str) -> Result<Self, TreeSitterError> {
        let language = grammar.ts_language();
        let query = Query::new(&language, query_str).map_err(|e| TreeSitterError::InvalidQuery {
            message: e.to_string(),
        })?;

        let capture_names = query.capture_names().iter().map(|s| s.to_string()).collect();

        Ok(Self {
            query,
            capture_names,
        })
    }

    /// Execute the query against parsed source and return all matches.
    pub fn find_all(&self, parsed: &ParsedSource<'_>) -> Vec<QueryMatch> {
        let mut cursor = QueryCursor::new();
        let mut matches = cursor.matches(&self.query, parsed.root_node(), parsed.source.as_bytes());

        let mut results = Vec::new();

        while let Some(m) = matches.next() {
            let mut captures = HashMap::new();
            let mut overall_start = usize::MAX;
            let mut overall_end = 0usize;

            for capture in m.captures {
                let node = capture.node;
                let name = &self.capture_names[capture.index as usize];

                overall_start = overall_start.min(node.start_byte());
                overall_end = overall_end.max(node.end_byte());

                captures.insert(
                    name.clone(),
                    CapturedNode {
                        byte_start: node.start_byte(),
                        byte_end: node.end_byte(),
                        text: parsed.node_text(node).to_string(),
                        kind: node.kind().to_string(),
                    },
                );
            }

            if overall_start != usize::MAX {
                results.push(QueryMatch {
                    byte_start: overall_start,
                    byte_end: overall_end,
                    captures,
                });
            }
        }

        results
    }

    /// Get capture names defined in the query.
    pub fn capture_names(&self) -> &[String] {
        &self.capture_names
    }
}

/// Common tree-sitter queries for JavaScript-family sources.
pub mod queries {
    use crate::ts::parser::Grammar;

    /// Call-like uses of a bare identifier: calls, method calls on an
    /// identifier receiver, and `new` expressions.
    pub const CALL_REFERENCES: &str = r#"
(call_expression function: (identifier) @callee)
(call_expression function: (member_expression object: (identifier) @callee))
(new_expression constructor: (identifier) @callee)
"#;

    /// JSX element names, which are component calls after compilation.
    pub const JSX_REFERENCES: &str = r#"
(jsx_opening_element name: (identifier) @callee)
(jsx_self_closing_element name: (identifier) @callee)
"#;

    /// Reference query text for a grammar.
    pub fn references(grammar: Grammar) -> String {
        if grammar.has_jsx() {
            format!("{CALL_REFERENCES}{JSX_REFERENCES}")
        } else {
            CALL_REFERENCES.to_string()
        }
    }
}
