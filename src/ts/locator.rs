use crate::ts::errors::TreeSitterError;
use crate::ts::parser::ParsedSource;
use crate::ts::query::{queries, QueryEngine};
use std::collections::{BTreeSet, HashSet};
use tree_sitter::Node;

/// Kind of a top-level declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeclarationKind {
    Function,
    Class,
    Variable,
    Interface,
    TypeAlias,
    Enum,
    Import,
}

/// A named top-level declaration with its full-document byte span.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Declaration {
    pub name: String,
    pub kind: DeclarationKind,
    /// Span of the whole statement, including an `export` wrapper
    pub byte_start: usize,
    pub byte_end: usize,
    /// Span of the declaration alone; equals the statement span when not exported
    pub inner_start: usize,
    pub inner_end: usize,
    pub exported: bool,
    /// The statement binds this name and nothing else
    pub sole_binding: bool,
}

/// A call-like use of an identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
    pub name: String,
    /// Full-document byte offset of the identifier
    pub byte_start: usize,
}

/// Traversal control returned by visitor callbacks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visit {
    Continue,
    SkipChildren,
    Stop,
}

/// Visit `root` and every descendant in document order.
pub fn visit_descendants<'t, F>(root: Node<'t>, mut f: F)
where
    F: FnMut(Node<'t>) -> Visit,
{
    let mut cursor = root.walk();
    'outer: loop {
        match f(cursor.node()) {
            Visit::Stop => return,
            Visit::Continue if cursor.goto_first_child() => continue,
            _ => {}
        }
        loop {
            if cursor.depth() == 0 {
                return;
            }
            if cursor.goto_next_sibling() {
                continue 'outer;
            }
            if !cursor.goto_parent() {
                return;
            }
        }
    }
}

pub fn is_capitalized(name: &str) -> bool {
    name.chars().next().is_some_and(|c| c.is_uppercase())
}

/// Every named top-level declaration of the code region, in source order.
pub fn top_level_declarations(parsed: &ParsedSource<'_>) -> Vec<Declaration> {
    let root = parsed.root_node();
    let mut declarations = Vec::new();
    let mut cursor = root.walk();

    for child in root.named_children(&mut cursor) {
        let (inner, exported) = if child.kind() == "export_statement" {
            match child.child_by_field_name("declaration") {
                Some(inner) => (inner, true),
                None => continue,
            }
        } else {
            (child, false)
        };

        let Some(kind) = declaration_kind(inner.kind()) else {
            continue;
        };

        let names = declared_names(inner, parsed.source);
        let sole_binding = names.len() == 1;
        let range = parsed.document_range(child);
        let inner_range = parsed.document_range(inner);
        for name in names {
            declarations.push(Declaration {
                name,
                kind,
                byte_start: range.start,
                byte_end: range.end,
                inner_start: inner_range.start,
                inner_end: inner_range.end,
                exported,
                sole_binding,
            });
        }
    }

    declarations
}

fn declaration_kind(kind: &str) -> Option<DeclarationKind> {
    Some(match kind {
        "function_declaration" | "generator_function_declaration" => DeclarationKind::Function,
        "class_declaration" | "abstract_class_declaration" => DeclarationKind::Class,
        "lexical_declaration" | "variable_declaration" => DeclarationKind::Variable,
        "interface_declaration" => DeclarationKind::Interface,
        "type_alias_declaration" => DeclarationKind::TypeAlias,
        "enum_declaration" => DeclarationKind::Enum,
        "import_statement" => DeclarationKind::Import,
        _ => return None,
    })
}

fn declared_names(node: Node<'_>, source: &str) -> Vec<String> {
    let mut names = Vec::new();
    match node.kind() {
        "lexical_declaration" | "variable_declaration" => {
            let mut cursor = node.walk();
            for declarator in node.named_children(&mut cursor) {
                if declarator.kind() != "variable_declarator" {
                    continue;
                }
                if let Some(pattern) = declarator.child_by_field_name("name") {
                    pattern_binding_names(pattern, source, &mut names);
                }
            }
        }
        "import_statement" => import_binding_names(node, source, &mut names),
        _ => {
            if let Some(name) = node.child_by_field_name("name") {
                names.push(source[name.byte_range()].to_string());
            }
        }
    }
    names
}

fn pattern_binding_names(node: Node<'_>, source: &str, names: &mut Vec<String>) {
    match node.kind() {
        "identifier" | "shorthand_property_identifier_pattern" => {
            names.push(source[node.byte_range()].to_string());
        }
        "pair_pattern" => {
            if let Some(value) = node.child_by_field_name("value") {
                pattern_binding_names(value, source, names);
            }
        }
        "assignment_pattern" | "object_assignment_pattern" => {
            if let Some(left) = node.child_by_field_name("left") {
                pattern_binding_names(left, source, names);
            }
        }
        "required_parameter" | "optional_parameter" => {
            if let Some(pattern) = node.child_by_field_name("pattern") {
                pattern_binding_names(pattern, source, names);
            }
        }
        "object_pattern" | "array_pattern" | "rest_pattern" => {
            let mut cursor = node.walk();
            for child in node.named_children(&mut cursor) {
                pattern_binding_names(child, source, names);
            }
        }
        _ => {}
    }
}

fn import_binding_names(node: Node<'_>, source: &str, names: &mut Vec<String>) {
    visit_descendants(node, |n| match n.kind() {
        "import_specifier" => {
            let binding = n
                .child_by_field_name("alias")
                .or_else(|| n.child_by_field_name("name"));
            if let Some(binding) = binding {
                names.push(source[binding.byte_range()].to_string());
            }
            Visit::SkipChildren
        }
        "namespace_import" | "import_clause" => Visit::Continue,
        "identifier" => {
            names.push(source[n.byte_range()].to_string());
            Visit::SkipChildren
        }
        "string" => Visit::SkipChildren,
        _ => Visit::Continue,
    });
}

/// Locate a top-level declaration by exact name, expecting exactly one.
pub fn find_declaration(
    parsed: &ParsedSource<'_>,
    name: &str,
) -> Result<Declaration, TreeSitterError> {
    let mut found: Vec<Declaration> = top_level_declarations(parsed)
        .into_iter()
        .filter(|d| d.name == name && d.kind != DeclarationKind::Import)
        .collect();

    match found.len() {
        0 => Err(TreeSitterError::TargetNotFound {
            name: name.to_string(),
        }),
        1 => Ok(found.remove(0)),
        n => Err(TreeSitterError::AmbiguousMatch { count: n }),
    }
}

/// Capitalized names declared at top level (imports included).
pub fn capitalized_top_level_names(parsed: &ParsedSource<'_>) -> BTreeSet<String> {
    top_level_declarations(parsed)
        .into_iter()
        .map(|d| d.name)
        .filter(|name| is_capitalized(name))
        .collect()
}

/// Every name bound anywhere in the code region: declarations, parameters,
/// destructuring targets, catch parameters and imports.
pub fn all_bindings(parsed: &ParsedSource<'_>) -> HashSet<String> {
    let source = parsed.source;
    let mut names = Vec::new();

    visit_descendants(parsed.root_node(), |node| {
        match node.kind() {
            "function_declaration"
            | "generator_function_declaration"
            | "function_expression"
            | "function"
            | "generator_function"
            | "class_declaration"
            | "abstract_class_declaration"
            | "class"
            | "interface_declaration"
            | "type_alias_declaration"
            | "enum_declaration" => {
                if let Some(name) = node.child_by_field_name("name") {
                    names.push(source[name.byte_range()].to_string());
                }
            }
            "variable_declarator" => {
                if let Some(pattern) = node.child_by_field_name("name") {
                    pattern_binding_names(pattern, source, &mut names);
                }
            }
            "formal_parameters" => {
                let mut cursor = node.walk();
                for param in node.named_children(&mut cursor) {
                    pattern_binding_names(param, source, &mut names);
                }
            }
            "arrow_function" => {
                if let Some(param) = node.child_by_field_name("parameter") {
                    pattern_binding_names(param, source, &mut names);
                }
            }
            "catch_clause" => {
                if let Some(param) = node.child_by_field_name("parameter") {
                    pattern_binding_names(param, source, &mut names);
                }
            }
            "import_statement" => {
                import_binding_names(node, source, &mut names);
                return Visit::SkipChildren;
            }
            _ => {}
        }
        Visit::Continue
    });

    names.into_iter().collect()
}

/// Call-like uses of capitalized identifiers (calls, `new`, JSX elements).
pub fn capitalized_references(
    parsed: &ParsedSource<'_>,
) -> Result<Vec<Reference>, TreeSitterError> {
    let engine = QueryEngine::new(parsed.grammar, &queries::references(parsed.grammar))?;
    let mut references: Vec<Reference> = engine
        .find_all(parsed)
        .into_iter()
        .filter_map(|m| m.captures.get("callee").cloned())
        .filter(|callee| is_capitalized(&callee.text))
        .map(|callee| Reference {
            name: callee.text,
            byte_start: callee.byte_start + parsed.offset,
        })
        .collect();
    references.sort_by_key(|r| r.byte_start);
    references.dedup();
    Ok(references)
}
