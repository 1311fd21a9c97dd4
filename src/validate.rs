//! Validation gate run after every edit and after a whole batch.
//!
//! Checks, in order:
//!
//! - **a. truncation**: a tiny candidate replacing a large original
//! - **b. syntax**: the code region must not parse worse than before
//! - **c. references**: call-like uses of capitalized names must resolve
//! - **d. definition loss**: a removed top-level name must not still be used
//! - **e. size ratio**: the batch result must stay within sane bounds
//! - **f. duplicate bindings**: corrective, keeps the later definition
//!
//! Checks b and c are relative to a baseline so pre-existing problems in
//! a document never block unrelated edits.

use crate::config::ValidatorConfig;
use crate::edit::{whole_line_range, SpanEdit};
use crate::region::code_region;
use crate::scan::{heuristic_bindings, heuristic_references, mentions_identifier, scan_top_level};
use crate::ts::{self, locator::is_capitalized, DeclarationKind, SyntaxHealth};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use thiserror::Error;

/// Capitalized names the runtime provides without a declaration.
pub const ENVIRONMENT_GLOBALS: &[&str] = &[
    "AbortController", "Array", "ArrayBuffer", "Audio", "BigInt", "Blob", "Boolean",
    "BroadcastChannel", "CSS", "Chart", "Component", "CustomEvent", "DOMParser", "DataView",
    "Date", "Document", "Element", "Error", "Event", "EventSource", "EventTarget", "File",
    "FileReader", "Float32Array", "Float64Array", "FormData", "Fragment", "Function", "Headers",
    "HTMLElement", "Image", "Infinity", "Int16Array", "Int32Array", "Int8Array", "Intl",
    "IntersectionObserver", "JSON", "L", "Map", "Math", "MessageChannel", "MutationObserver",
    "NaN", "Node", "Notification", "Number", "Object", "Option", "Promise", "Proxy",
    "PureComponent", "React", "ReactDOM", "Recharts", "Reflect", "RegExp", "Request",
    "ResizeObserver", "Response", "Set", "StrictMode", "String", "Suspense", "Symbol",
    "SyntaxError", "THREE", "TextDecoder", "TextEncoder", "TypeError", "URL",
    "URLSearchParams", "Uint16Array", "Uint32Array", "Uint8Array", "Uint8ClampedArray",
    "WeakMap", "WeakRef", "WeakSet", "WebSocket", "Worker", "XMLHttpRequest",
];

/// How thoroughly a candidate is checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationMode {
    /// Full syntax tree: parse health, tree bindings and references
    Tree,
    /// Declaration scanner and regular expressions; syntax check skipped
    Heuristic,
}

/// What the checks need to know about one document state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentFacts {
    pub mode: ValidationMode,
    /// `None` in heuristic mode
    pub health: Option<SyntaxHealth>,
    /// Capitalized top-level names
    pub top_level: BTreeSet<String>,
    /// Capitalized call-like references with no definition
    pub unresolved: BTreeSet<String>,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("result looks truncated: {candidate} chars where the original had {original}")]
    Truncated { candidate: usize, original: usize },

    #[error("syntax regressed from {before} to {after}")]
    SyntaxRegression {
        before: SyntaxHealth,
        after: SyntaxHealth,
    },

    #[error("unresolved references: {}", .names.join(", "))]
    UnresolvedReferences { names: Vec<String> },

    #[error("definitions removed but still referenced: {}", .names.join(", "))]
    DefinitionLost { names: Vec<String> },

    #[error("size ratio {ratio:.2} outside [{min}, {max}]")]
    SizeRatio { ratio: f64, min: f64, max: f64 },
}

/// Validator over a borrowed configuration.
#[derive(Debug, Clone, Copy)]
pub struct Validator<'a> {
    config: &'a ValidatorConfig,
}

impl<'a> Validator<'a> {
    pub fn new(config: &'a ValidatorConfig) -> Self {
        Self { config }
    }

    /// Large documents with small changes use the cheaper heuristic mode.
    pub fn mode_for(&self, document_len: usize, changed_bytes: usize) -> ValidationMode {
        if document_len >= self.config.heuristic_threshold_bytes
            && (changed_bytes as f64) <= document_len as f64 * self.config.heuristic_change_ratio
        {
            ValidationMode::Heuristic
        } else {
            ValidationMode::Tree
        }
    }

    fn is_global(&self, name: &str) -> bool {
        ENVIRONMENT_GLOBALS.contains(&name)
            || self.config.extra_globals.iter().any(|g| g == name)
    }

    /// Collect the facts about `document` the relative checks compare.
    pub fn facts(&self, document: &str, mode: ValidationMode) -> DocumentFacts {
        let code = &document[code_region(document)];

        if mode == ValidationMode::Tree {
            match ts::analyze(document) {
                Ok(parsed) => {
                    let bindings = ts::all_bindings(&parsed);
                    let references: Vec<String> = match ts::capitalized_references(&parsed) {
                        Ok(refs) => refs.into_iter().map(|r| r.name).collect(),
                        Err(err) => {
                            tracing::debug!(%err, "reference query failed, using heuristics");
                            heuristic_references(code).into_iter().collect()
                        }
                    };
                    return DocumentFacts {
                        mode,
                        health: Some(SyntaxHealth::Parsed {
                            errors: parsed.error_count(),
                        }),
                        top_level: ts::capitalized_top_level_names(&parsed),
                        unresolved: self.unresolved(references, &bindings),
                    };
                }
                Err(err) => {
                    tracing::debug!(%err, "syntax tree unavailable for validation");
                    let mut facts = self.heuristic_facts(code);
                    facts.mode = mode;
                    facts.health = Some(SyntaxHealth::Unavailable);
                    return facts;
                }
            }
        }
        self.heuristic_facts(code)
    }

    fn heuristic_facts(&self, code: &str) -> DocumentFacts {
        let bindings = heuristic_bindings(code);
        DocumentFacts {
            mode: ValidationMode::Heuristic,
            health: None,
            top_level: scan_top_level(code)
                .into_iter()
                .map(|d| d.name)
                .filter(|n| is_capitalized(n))
                .collect(),
            unresolved: self.unresolved(heuristic_references(code), &bindings),
        }
    }

    fn unresolved(
        &self,
        references: impl IntoIterator<Item = String>,
        bindings: &HashSet<String>,
    ) -> BTreeSet<String> {
        references
            .into_iter()
            .filter(|name| !bindings.contains(name) && !self.is_global(name))
            .collect()
    }

    /// Check a.
    pub fn check_truncation(&self, original: &str, candidate: &str) -> Result<(), ValidationError> {
        let original_len = original.chars().count();
        let candidate_len = candidate.chars().count();
        if candidate_len < self.config.truncation_min_chars
            && original_len > self.config.truncation_original_chars
        {
            return Err(ValidationError::Truncated {
                candidate: candidate_len,
                original: original_len,
            });
        }
        Ok(())
    }

    /// Check e. Skipped for baselines below the size floor.
    pub fn check_size_ratio(&self, baseline: &str, candidate: &str) -> Result<(), ValidationError> {
        if baseline.len() < self.config.size_check_floor {
            return Ok(());
        }
        let ratio = candidate.len() as f64 / baseline.len() as f64;
        if ratio < self.config.min_size_ratio || ratio > self.config.max_size_ratio {
            return Err(ValidationError::SizeRatio {
                ratio,
                min: self.config.min_size_ratio,
                max: self.config.max_size_ratio,
            });
        }
        Ok(())
    }

    /// Checks b, c and d of `candidate` against a baseline's facts.
    pub fn check_relative(
        &self,
        baseline: &DocumentFacts,
        candidate: &str,
    ) -> Result<DocumentFacts, ValidationError> {
        let facts = self.facts(candidate, baseline.mode);

        if let (Some(before), Some(after)) = (baseline.health, facts.health) {
            if after.regressed_from(before) {
                return Err(ValidationError::SyntaxRegression { before, after });
            }
        }

        let introduced: Vec<String> = facts
            .unresolved
            .difference(&baseline.unresolved)
            .cloned()
            .collect();
        if !introduced.is_empty() {
            return Err(ValidationError::UnresolvedReferences { names: introduced });
        }

        let code = &candidate[code_region(candidate)];
        let lost: Vec<String> = baseline
            .top_level
            .difference(&facts.top_level)
            .filter(|name| mentions_identifier(code, name))
            .cloned()
            .collect();
        if !lost.is_empty() {
            return Err(ValidationError::DefinitionLost { names: lost });
        }

        Ok(facts)
    }

    /// Per-edit gate: checks a to d.
    pub fn check_edit(
        &self,
        baseline: &str,
        baseline_facts: &DocumentFacts,
        candidate: &str,
    ) -> Result<DocumentFacts, ValidationError> {
        self.check_truncation(baseline, candidate)?;
        self.check_relative(baseline_facts, candidate)
    }

    /// Whole-batch gate against the pristine document: checks a to e.
    pub fn check_batch(&self, pristine: &str, candidate: &str) -> Result<(), ValidationError> {
        self.check_truncation(pristine, candidate)?;
        self.check_size_ratio(pristine, candidate)?;
        let mode = self.mode_for(pristine.len(), changed_bytes(pristine, candidate));
        let baseline = self.facts(pristine, mode);
        self.check_relative(&baseline, candidate).map(|_| ())
    }
}

/// Size of the region that differs between two texts, after removing the
/// common prefix and suffix.
pub fn changed_bytes(a: &str, b: &str) -> usize {
    let (a, b) = (a.as_bytes(), b.as_bytes());
    let prefix = a.iter().zip(b).take_while(|(x, y)| x == y).count();
    let max_suffix = a.len().min(b.len()) - prefix;
    let suffix = a
        .iter()
        .rev()
        .zip(b.iter().rev())
        .take(max_suffix)
        .take_while(|(x, y)| x == y)
        .count();
    a.len().max(b.len()) - prefix - suffix
}

/// Check f: when a name is declared twice at top level, drop every earlier
/// declaration. Returns the corrected text and the names that were deduped.
pub fn dedupe_top_level(document: &str, mode: ValidationMode) -> Option<(String, Vec<String>)> {
    // name -> spans in source order
    let mut spans: BTreeMap<String, Vec<(usize, usize)>> = BTreeMap::new();
    let parsed = match mode {
        ValidationMode::Tree => ts::analyze(document).ok(),
        ValidationMode::Heuristic => None,
    };
    match parsed {
        Some(parsed) => {
            for decl in ts::top_level_declarations(&parsed) {
                if decl.sole_binding && decl.kind != DeclarationKind::Import {
                    spans
                        .entry(decl.name)
                        .or_default()
                        .push((decl.byte_start, decl.byte_end));
                }
            }
        }
        None => {
            let region = code_region(document);
            for decl in scan_top_level(&document[region.clone()]) {
                spans
                    .entry(decl.name)
                    .or_default()
                    .push((region.start + decl.start, region.start + decl.end));
            }
        }
    }

    let mut names = Vec::new();
    let mut removals = Vec::new();
    for (name, found) in spans {
        if found.len() < 2 {
            continue;
        }
        for &(start, end) in &found[..found.len() - 1] {
            let range = whole_line_range(document, start..end);
            match SpanEdit::capture(document, range, "") {
                Ok(edit) => removals.push(edit),
                Err(err) => {
                    tracing::debug!(%err, name, "cannot remove duplicate declaration");
                    return None;
                }
            }
        }
        names.push(name);
    }
    if removals.is_empty() {
        return None;
    }

    match SpanEdit::apply_all(document, removals) {
        Ok(text) => {
            tracing::debug!(?names, "removed earlier duplicate declarations");
            Some((text, names))
        }
        Err(err) => {
            tracing::debug!(%err, "duplicate declaration cleanup skipped");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const APP: &str = r#"import React, { useState } from "react";

function Header({ title }) {
  return <h1 className="header">{title}</h1>;
}

function Footer() {
  return <footer>Made with care</footer>;
}

export default function App() {
  const [count, setCount] = useState(0);
  return (
    <div>
      <Header title="Counter" />
      <button onClick={() => setCount(count + 1)}>{count}</button>
      <Footer />
    </div>
  );
}
"#;

    #[test]
    fn truncation_detected() {
        let config = ValidatorConfig::default();
        let v = Validator::new(&config);
        let original = "x".repeat(600);
        assert!(matches!(
            v.check_truncation(&original, "tiny"),
            Err(ValidationError::Truncated { .. })
        ));
        assert!(v.check_truncation("short", "tiny").is_ok());
    }

    #[test]
    fn size_ratio_bounds() {
        let config = ValidatorConfig::default();
        let v = Validator::new(&config);
        let base = "a".repeat(400);
        assert!(v.check_size_ratio(&base, &"a".repeat(300)).is_ok());
        assert!(v.check_size_ratio(&base, &"a".repeat(100)).is_err());
        assert!(v.check_size_ratio(&base, &"a".repeat(1300)).is_err());
        // below the floor nothing is checked
        assert!(v.check_size_ratio("abc", &"a".repeat(1000)).is_ok());
    }

    #[test]
    fn clean_document_has_no_unresolved_names() {
        let config = ValidatorConfig::default();
        let facts = Validator::new(&config).facts(APP, ValidationMode::Tree);
        assert!(facts.unresolved.is_empty(), "{:?}", facts.unresolved);
        assert!(facts.top_level.contains("Header"));
        assert_eq!(facts.health, Some(SyntaxHealth::Parsed { errors: 0 }));
    }

    #[test]
    fn removing_used_component_is_rejected() {
        let config = ValidatorConfig::default();
        let v = Validator::new(&config);
        let baseline = v.facts(APP, ValidationMode::Tree);
        let start = APP.find("function Footer").unwrap();
        let end = APP.find("export default").unwrap();
        let candidate = format!("{}{}", &APP[..start], &APP[end..]);

        let err = v.check_edit(APP, &baseline, &candidate).unwrap_err();
        assert!(matches!(err, ValidationError::UnresolvedReferences { ref names } if names == &["Footer"]));
    }

    #[test]
    fn heuristic_mode_catches_lost_definitions() {
        let config = ValidatorConfig::default();
        let v = Validator::new(&config);
        let baseline = v.facts(APP, ValidationMode::Heuristic);
        assert_eq!(baseline.health, None);
        let candidate = APP.replace("function Header({ title })", "function Heading({ title })");

        let err = v.check_relative(&baseline, &candidate).unwrap_err();
        assert!(
            matches!(err, ValidationError::UnresolvedReferences { .. } | ValidationError::DefinitionLost { .. }),
            "{err}"
        );
    }

    #[test]
    fn syntax_regression_is_rejected() {
        let config = ValidatorConfig::default();
        let v = Validator::new(&config);
        let baseline = v.facts(APP, ValidationMode::Tree);
        let candidate = APP.replace("return <footer>Made with care</footer>;", "return (<footer>;");
        assert!(matches!(
            v.check_relative(&baseline, &candidate),
            Err(ValidationError::SyntaxRegression { .. })
        ));
    }

    #[test]
    fn pre_existing_unresolved_names_do_not_block() {
        let config = ValidatorConfig::default();
        let v = Validator::new(&config);
        let doc = "function App() {\n  return <Missing />;\n}\n";
        let baseline = v.facts(doc, ValidationMode::Tree);
        assert!(baseline.unresolved.contains("Missing"));

        let candidate = doc.replace("return", "  return");
        assert!(v.check_relative(&baseline, &candidate).is_ok());
    }

    #[test]
    fn extra_globals_resolve() {
        let mut config = ValidatorConfig::default();
        let doc = "function App() {\n  return Lodash.map([1], (x) => x);\n}\n";
        let facts = Validator::new(&config).facts(doc, ValidationMode::Tree);
        assert!(facts.unresolved.contains("Lodash"));

        config.extra_globals.push("Lodash".to_string());
        let facts = Validator::new(&config).facts(doc, ValidationMode::Tree);
        assert!(facts.unresolved.is_empty());
    }

    #[test]
    fn mode_selection() {
        let config = ValidatorConfig::default();
        let v = Validator::new(&config);
        assert_eq!(v.mode_for(1000, 10), ValidationMode::Tree);
        assert_eq!(v.mode_for(1_000_000, 100), ValidationMode::Heuristic);
        assert_eq!(v.mode_for(1_000_000, 500_000), ValidationMode::Tree);
    }

    #[test]
    fn changed_bytes_ignores_common_ends() {
        assert_eq!(changed_bytes("abcXdef", "abcYYdef"), 2);
        assert_eq!(changed_bytes("same", "same"), 0);
        assert_eq!(changed_bytes("aaa", "aaaa"), 1);
    }

    #[test]
    fn duplicate_declarations_keep_the_later_one() {
        let doc = "const Title = \"old\";\nfunction App() {\n  return Title;\n}\nconst Title = \"new\";\n";
        let expected = "function App() {\n  return Title;\n}\nconst Title = \"new\";\n";
        for mode in [ValidationMode::Tree, ValidationMode::Heuristic] {
            let (fixed, names) = dedupe_top_level(doc, mode).unwrap();
            assert_eq!(names, vec!["Title"]);
            assert_eq!(fixed, expected);
            assert!(dedupe_top_level(&fixed, mode).is_none());
        }
    }
}
