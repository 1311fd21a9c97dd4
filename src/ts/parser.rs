use crate::ts::errors::TreeSitterError;
use ast_grep_language::{LanguageExt, SupportLang};
use std::ops::Range;
use tree_sitter::{Parser, Tree};

/// Grammar configurations tried when parsing a code region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Grammar {
    /// JavaScript with JSX
    JavaScript,
    /// TypeScript with JSX
    Tsx,
    /// Plain TypeScript (no JSX, accepts `<T>expr` casts)
    TypeScript,
}

impl Grammar {
    /// Order in which grammars are tried, least permissive first.
    pub const CASCADE: [Grammar; 3] = [Grammar::JavaScript, Grammar::Tsx, Grammar::TypeScript];

    pub fn name(self) -> &'static str {
        match self {
            Grammar::JavaScript => "javascript",
            Grammar::Tsx => "tsx",
            Grammar::TypeScript => "typescript",
        }
    }

    /// Whether the grammar has JSX element nodes.
    pub fn has_jsx(self) -> bool {
        !matches!(self, Grammar::TypeScript)
    }

    fn support_lang(self) -> SupportLang {
        match self {
            Grammar::JavaScript => SupportLang::JavaScript,
            Grammar::Tsx => SupportLang::Tsx,
            Grammar::TypeScript => SupportLang::TypeScript,
        }
    }

    /// The tree-sitter language backing this grammar.
    pub fn ts_language(self) -> tree_sitter::Language {
        self.support_lang().get_ts_language()
    }
}

/// Tree-sitter parser wrapper for JavaScript-family sources.
pub struct JsParser {
    parser: Parser,
    current: Option<Grammar>,
}

impl JsParser {
    pub fn new() -> Self {
        Self {
            parser: Parser::new(),
            current: None,
        }
    }

    fn ensure_grammar(&mut self, grammar: Grammar) -> Result<(), TreeSitterError> {
        if self.current == Some(grammar) {
            return Ok(());
        }
        self.parser
            .set_language(&grammar.ts_language())
            .map_err(|_| TreeSitterError::LanguageSet {
                grammar: grammar.name(),
            })?;
        self.current = Some(grammar);
        Ok(())
    }

    /// Parse source with one specific grammar.
    pub fn parse(&mut self, source: &str, grammar: Grammar) -> Result<Tree, TreeSitterError> {
        self.ensure_grammar(grammar)?;
        self.parser
            .parse(source, None)
            .ok_or(TreeSitterError::ParseFailed {
                grammar: grammar.name(),
            })
    }

    /// Parse a code region trying each grammar of [`Grammar::CASCADE`].
    ///
    /// The first error-free tree wins. Otherwise the tree with the fewest
    /// error nodes is returned, unless errors dominate the region, in which
    /// case the tree is reported as unavailable.
    pub fn parse_region<'a>(
        &mut self,
        source: &'a str,
        offset: usize,
    ) -> Result<ParsedSource<'a>, TreeSitterError> {
        let mut best: Option<(usize, ParsedSource<'a>)> = None;
        let mut last_error = None;

        for grammar in Grammar::CASCADE {
            let tree = match self.parse(source, grammar) {
                Ok(tree) => tree,
                Err(e) => {
                    last_error = Some(e);
                    continue;
                }
            };
            let parsed = ParsedSource {
                source,
                tree,
                grammar,
                offset,
            };
            let errors = parsed.error_count();
            if errors == 0 {
                return Ok(parsed);
            }
            let better = best.as_ref().map_or(true, |(count, _)| errors < *count);
            if better {
                best = Some((errors, parsed));
            }
        }

        let Some((_, parsed)) = best else {
            return Err(last_error.unwrap_or(TreeSitterError::Unavailable {
                reason: "no grammar configuration produced a tree".to_string(),
            }));
        };

        let root = parsed.root_node();
        let covered: usize = parsed
            .error_nodes()
            .iter()
            .map(|e| e.byte_end - e.byte_start)
            .sum();
        if root.is_error() || covered * 2 > source.len() {
            return Err(TreeSitterError::Unavailable {
                reason: format!(
                    "error nodes cover {covered} of {} bytes with every grammar",
                    source.len()
                ),
            });
        }

        Ok(parsed)
    }
}

impl Default for JsParser {
    fn default() -> Self {
        Self::new()
    }
}

/// A parsed code region with its tree-sitter tree.
pub struct ParsedSource<'a> {
    /// The code region text (not the whole document for HTML pages)
    pub source: &'a str,
    pub tree: Tree,
    /// Grammar configuration that produced the tree
    pub grammar: Grammar,
    /// Byte offset of `source` within the full document
    pub offset: usize,
}

impl<'a> ParsedSource<'a> {
    /// Get the root node of the tree.
    pub fn root_node(&self) -> tree_sitter::Node<'_> {
        self.tree.root_node()
    }

    /// Check if the tree contains any ERROR or MISSING nodes.
    pub fn has_errors(&self) -> bool {
        self.tree.root_node().has_error()
    }

    /// Outermost ERROR and MISSING nodes in the tree.
    pub fn error_nodes(&self) -> Vec<ErrorNode> {
        let mut errors = Vec::new();
        collect_error_nodes(self.tree.root_node(), self.source, &mut errors);
        errors
    }

    pub fn error_count(&self) -> usize {
        if !self.has_errors() {
            return 0;
        }
        self.error_nodes().len()
    }

    /// Extract text for a node's byte range.
    pub fn node_text(&self, node: tree_sitter::Node<'_>) -> &'a str {
        &self.source[node.byte_range()]
    }

    /// A node's byte range translated to full-document offsets.
    pub fn document_range(&self, node: tree_sitter::Node<'_>) -> Range<usize> {
        node.start_byte() + self.offset..node.end_byte() + self.offset
    }
}

/// Information about an ERROR or MISSING node in the parse tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorNode {
    pub byte_start: usize,
    pub byte_end: usize,
    /// 1-based line within the code region
    pub line: usize,
    pub column: usize,
    pub context: String,
}

fn collect_error_nodes(node: tree_sitter::Node<'_>, source: &str, errors: &mut Vec<ErrorNode>) {
    if node.is_error() || node.is_missing() {
        let byte_start = node.start_byte();
        let byte_end = node.end_byte();
        let start = node.start_position();

        let context_start = floor_char_boundary(source, byte_start.saturating_sub(20));
        let context_end = floor_char_boundary(source, (byte_end + 20).min(source.len()));
        let context = source
            .get(context_start..context_end)
            .unwrap_or("")
            .replace('\n', "\\n");

        errors.push(ErrorNode {
            byte_start,
            byte_end,
            line: start.row + 1,
            column: start.column + 1,
            context,
        });
        return;
    }

    if !node.has_error() {
        return;
    }

    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        collect_error_nodes(child, source, errors);
    }
}

fn floor_char_boundary(source: &str, mut idx: usize) -> usize {
    while idx > 0 && !source.is_char_boundary(idx) {
        idx -= 1;
    }
    idx
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_valid_jsx() {
        let mut parser = JsParser::new();
        let source = "function App() { return <div className=\"x\">hi</div>; }";
        let parsed = parser.parse_region(source, 0).unwrap();

        assert!(!parsed.has_errors());
        assert_eq!(parsed.grammar, Grammar::JavaScript);
        assert_eq!(parsed.root_node().kind(), "program");
    }

    #[test]
    fn typescript_annotations_fall_through_to_tsx() {
        let mut parser = JsParser::new();
        let source = "interface Props { name: string }\nconst App = (p: Props) => <b>{p.name}</b>;\n";
        let parsed = parser.parse_region(source, 0).unwrap();

        assert!(!parsed.has_errors());
        assert_eq!(parsed.grammar, Grammar::Tsx);
    }

    #[test]
    fn small_error_keeps_tree_available() {
        let mut parser = JsParser::new();
        let source = "function one() { return 1; }\nfunction two() { return 2; }\nfunction three() { return 3; }\nfunction broken( { }\n";
        let parsed = parser.parse_region(source, 0).unwrap();

        assert!(parsed.has_errors());
        assert!(!parsed.error_nodes().is_empty());
    }

    #[test]
    fn garbage_is_unavailable() {
        let mut parser = JsParser::new();
        let result = parser.parse_region(")))) ]]]] }}}} ((((", 0);
        assert!(matches!(result, Err(e) if e.is_unavailable()));
    }

    #[test]
    fn document_range_applies_offset() {
        let mut parser = JsParser::new();
        let parsed = parser.parse_region("let a = 1;", 10).unwrap();
        let root = parsed.root_node();
        assert_eq!(parsed.document_range(root), 10..20);
    }
}
