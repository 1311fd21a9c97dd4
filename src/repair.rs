//! Bounded self-repair after a batch in which nothing applied.
//!
//! The loop describes what failed and why, asks the collaborator for a
//! corrected edit set through a [`RepairClient`], and retries the applier.
//! It gives up after `repair.max_attempts` rounds so the caller can fall
//! back to regenerating the whole document.

use crate::applier::{ApplyOptions, Document, PatchApplier, PatchStats};
use crate::edit::Edit;
use crate::protocol::{parse_edits, ProtocolError};
use std::fmt::Write as _;
use thiserror::Error;

/// Longest search text quoted back in a diagnostic.
const QUOTE_LIMIT: usize = 600;

#[derive(Error, Debug)]
pub enum RepairClientError {
    #[error("Collaborator unavailable: {0}")]
    Unavailable(String),

    #[error("Collaborator request failed: {0}")]
    Failed(String),
}

/// What the collaborator is given for one repair round.
#[derive(Debug, Clone)]
pub struct RepairRequest<'a> {
    /// Current document text, unchanged by the failed batch
    pub document: &'a str,
    /// 1-based repair round
    pub attempt: usize,
    /// Human-readable description of the failures
    pub diagnostics: String,
    pub failed_edits: &'a [Edit],
}

/// The collaborator that produces corrected edits as wire text.
pub trait RepairClient {
    fn request_edits(&mut self, request: &RepairRequest<'_>) -> Result<String, RepairClientError>;
}

impl<F> RepairClient for F
where
    F: FnMut(&RepairRequest<'_>) -> Result<String, RepairClientError>,
{
    fn request_edits(&mut self, request: &RepairRequest<'_>) -> Result<String, RepairClientError> {
        self(request)
    }
}

#[derive(Debug)]
pub enum RepairOutcome {
    /// The original batch applied at least partially; no repair ran
    Applied { stats: PatchStats },
    /// A repair round applied at least one edit
    Repaired { stats: PatchStats, attempts: usize },
    /// Every round failed; offer a full regeneration
    Exhausted { stats: PatchStats, attempts: usize },
    /// The collaborator rewrote the document instead of sending edits
    ProtocolViolation { text: String, attempts: usize },
    ClientFailed {
        error: RepairClientError,
        attempts: usize,
    },
}

impl RepairOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, RepairOutcome::Applied { .. } | RepairOutcome::Repaired { .. })
    }

    pub fn attempts(&self) -> usize {
        match self {
            RepairOutcome::Applied { .. } => 0,
            RepairOutcome::Repaired { attempts, .. }
            | RepairOutcome::Exhausted { attempts, .. }
            | RepairOutcome::ProtocolViolation { attempts, .. }
            | RepairOutcome::ClientFailed { attempts, .. } => *attempts,
        }
    }

    /// Stats of the last batch that ran.
    pub fn stats(&self) -> Option<&PatchStats> {
        match self {
            RepairOutcome::Applied { stats }
            | RepairOutcome::Repaired { stats, .. }
            | RepairOutcome::Exhausted { stats, .. } => Some(stats),
            RepairOutcome::ProtocolViolation { .. } | RepairOutcome::ClientFailed { .. } => None,
        }
    }
}

#[derive(Debug)]
pub struct RepairLoop<'a> {
    applier: &'a PatchApplier,
    max_attempts: usize,
}

impl<'a> RepairLoop<'a> {
    pub fn new(applier: &'a PatchApplier) -> Self {
        Self {
            applier,
            max_attempts: applier.config().repair.max_attempts,
        }
    }

    /// Apply `edits`, repairing through `client` if nothing applied.
    pub fn run(
        &self,
        document: &mut Document,
        edits: &[Edit],
        options: &ApplyOptions,
        client: &mut dyn RepairClient,
    ) -> RepairOutcome {
        let stats = self.applier.apply(document, edits, options);
        if !stats.is_total_failure() {
            return RepairOutcome::Applied { stats };
        }

        let mut failed_edits = edits.to_vec();
        let mut diagnostics = describe_failures(&failed_edits, &stats);
        let mut last_stats = stats;

        for attempt in 1..=self.max_attempts {
            let _span = tracing::debug_span!("repair", attempt).entered();
            let request = RepairRequest {
                document: document.text(),
                attempt,
                diagnostics: diagnostics.clone(),
                failed_edits: &failed_edits,
            };
            let reply = match client.request_edits(&request) {
                Ok(reply) => reply,
                Err(error) => {
                    tracing::warn!(%error, "repair request failed");
                    return RepairOutcome::ClientFailed {
                        error,
                        attempts: attempt,
                    };
                }
            };

            let repaired = match parse_edits(&reply) {
                Ok(repaired) => repaired,
                Err(ProtocolError::FullRewrite { text }) => {
                    tracing::warn!("collaborator answered with a full rewrite");
                    return RepairOutcome::ProtocolViolation {
                        text,
                        attempts: attempt,
                    };
                }
                Err(e) => {
                    tracing::debug!(error = %e, "repair reply unusable");
                    diagnostics = describe_protocol_error(&e);
                    continue;
                }
            };

            let stats = self.applier.apply(document, &repaired, options);
            tracing::debug!(
                succeeded = stats.succeeded,
                failed = stats.failed,
                "repair round finished"
            );
            if !stats.is_total_failure() {
                return RepairOutcome::Repaired {
                    stats,
                    attempts: attempt,
                };
            }
            diagnostics = describe_failures(&repaired, &stats);
            failed_edits = repaired;
            last_stats = stats;
        }

        tracing::warn!(attempts = self.max_attempts, "repair attempts exhausted");
        RepairOutcome::Exhausted {
            stats: last_stats,
            attempts: self.max_attempts,
        }
    }
}

/// Describe which edits failed and why, for the collaborator.
pub fn describe_failures(edits: &[Edit], stats: &PatchStats) -> String {
    let mut out = String::from("None of the previous edits could be applied to the document.\n");

    for failure in &stats.failures {
        out.push('\n');
        let Some(index) = failure.edit_index else {
            let _ = writeln!(out, "The batch as a whole was rejected ({}): {}", failure.kind, failure.message);
            continue;
        };
        let _ = writeln!(out, "Edit #{} failed ({}): {}", index + 1, failure.kind, failure.message);
        let Some(edit) = edits.get(index) else {
            continue;
        };
        match &edit.target {
            Some(target) => {
                let _ = writeln!(out, "It replaced the declaration `{target}`.");
            }
            None => {
                let _ = writeln!(out, "Its search text was:\n```\n{}\n```", quote(&edit.search, QUOTE_LIMIT));
            }
        }
    }

    out.push_str(FORMAT_REMINDER);
    out
}

/// The snippet's own lines, cut at `max_chars` characters.
fn quote(text: &str, max_chars: usize) -> String {
    let text = text.trim_matches('\n');
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}\n/* ... */", &text[..cut]),
        None => text.to_string(),
    }
}

fn describe_protocol_error(error: &ProtocolError) -> String {
    format!("The previous reply could not be used: {error}.\n{FORMAT_REMINDER}")
}

const FORMAT_REMINDER: &str = "
Copy every SEARCH block character for character from the current document,
keep each block small, and reply with edit blocks only:

<<<<<<< SEARCH
exact current text
=======
replacement text
>>>>>>> REPLACE
";

#[cfg(test)]
mod tests {
    use super::*;
    use crate::applier::FailureKind;
    use crate::config::EngineConfig;

    const DOC: &str = "function greet() {\n  return \"hi\";\n}\n";

    fn missing_edit() -> Vec<Edit> {
        vec![Edit::new("return \"bonjour\" + name + suffix;", "return \"hello\";")]
    }

    #[test]
    fn applied_batches_skip_the_client() {
        let applier = PatchApplier::default();
        let mut document = Document::new(DOC);
        let mut client = |_: &RepairRequest<'_>| -> Result<String, RepairClientError> {
            panic!("client must not be called");
        };

        let outcome = RepairLoop::new(&applier).run(
            &mut document,
            &[Edit::new("return \"hi\";", "return \"hello\";")],
            &ApplyOptions::default(),
            &mut client,
        );

        assert!(matches!(outcome, RepairOutcome::Applied { .. }));
        assert_eq!(outcome.attempts(), 0);
        assert!(document.text().contains("hello"));
    }

    #[test]
    fn repaired_on_first_attempt() {
        let applier = PatchApplier::default();
        let mut document = Document::new(DOC);
        let mut seen = Vec::new();
        let mut client = |request: &RepairRequest<'_>| -> Result<String, RepairClientError> {
            seen.push(request.diagnostics.clone());
            Ok("<<<<<<< SEARCH\n  return \"hi\";\n=======\n  return \"hello\";\n>>>>>>> REPLACE\n".to_string())
        };

        let outcome = RepairLoop::new(&applier).run(
            &mut document,
            &missing_edit(),
            &ApplyOptions::default(),
            &mut client,
        );

        assert!(outcome.is_success());
        assert_eq!(outcome.attempts(), 1);
        assert_eq!(document.text(), "function greet() {\n  return \"hello\";\n}\n");
        assert_eq!(seen.len(), 1);
        assert!(seen[0].contains("Edit #1 failed (match not found)"), "{}", seen[0]);
        assert!(seen[0].contains("bonjour"));
    }

    #[test]
    fn exhaustion_is_bounded() {
        let applier = PatchApplier::default();
        let mut document = Document::new(DOC);
        let mut calls = 0;
        let mut client = |_: &RepairRequest<'_>| -> Result<String, RepairClientError> {
            calls += 1;
            Ok("<<<<<<< SEARCH\nnot in the document at all\n=======\nx\n>>>>>>> REPLACE".to_string())
        };

        let outcome = RepairLoop::new(&applier).run(
            &mut document,
            &missing_edit(),
            &ApplyOptions::default(),
            &mut client,
        );

        assert!(matches!(outcome, RepairOutcome::Exhausted { attempts: 2, .. }));
        assert_eq!(calls, 2);
        assert_eq!(document.text(), DOC);
        let stats = outcome.stats().unwrap();
        assert_eq!(stats.failures[0].kind, FailureKind::MatchNotFound);
    }

    #[test]
    fn full_rewrite_ends_the_loop() {
        let mut config = EngineConfig::default();
        config.repair.max_attempts = 1;
        let applier = PatchApplier::new(config);
        let mut document = Document::new(DOC);
        let rewrite = "```js\nimport a from \"a\";\nconst b = 1;\nfunction greet() {\n  return \"hello\";\n}\nexport default greet;\n```";
        let mut client = |_: &RepairRequest<'_>| -> Result<String, RepairClientError> { Ok(rewrite.to_string()) };

        let outcome = RepairLoop::new(&applier).run(
            &mut document,
            &missing_edit(),
            &ApplyOptions::default(),
            &mut client,
        );

        match outcome {
            RepairOutcome::ProtocolViolation { text, attempts } => {
                assert_eq!(attempts, 1);
                assert!(text.contains("return \"hello\";"));
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert_eq!(document.text(), DOC);
    }

    #[test]
    fn unusable_reply_feeds_the_next_round() {
        let applier = PatchApplier::default();
        let mut document = Document::new(DOC);
        let mut rounds: Vec<String> = Vec::new();
        let mut client = |request: &RepairRequest<'_>| -> Result<String, RepairClientError> {
            rounds.push(request.diagnostics.clone());
            if request.attempt == 1 {
                Ok("Sorry, I cannot help with that.".to_string())
            } else {
                Ok("<<<<<<< SEARCH\nreturn \"hi\";\n=======\nreturn \"hey\";\n>>>>>>> REPLACE".to_string())
            }
        };

        let outcome = RepairLoop::new(&applier).run(
            &mut document,
            &missing_edit(),
            &ApplyOptions::default(),
            &mut client,
        );

        assert!(matches!(outcome, RepairOutcome::Repaired { attempts: 2, .. }));
        assert!(rounds[1].contains("no edit blocks"), "{}", rounds[1]);
        assert!(document.text().contains("return \"hey\";"));
    }

    #[test]
    fn client_errors_surface() {
        let applier = PatchApplier::default();
        let mut document = Document::new(DOC);
        let mut client = |_: &RepairRequest<'_>| -> Result<String, RepairClientError> {
            Err(RepairClientError::Unavailable("offline".to_string()))
        };

        let outcome = RepairLoop::new(&applier).run(
            &mut document,
            &missing_edit(),
            &ApplyOptions::default(),
            &mut client,
        );
        assert!(matches!(outcome, RepairOutcome::ClientFailed { attempts: 1, .. }));
        assert!(!outcome.is_success());
    }

    #[test]
    fn failure_description_quotes_search_lines_verbatim() {
        let edits = vec![Edit::new("function go() {\n    run(  1 );\n}", "x")];
        let stats = PatchApplier::default()
            .apply_text("const a = 1;\n", &edits, &ApplyOptions::default())
            .1;
        let text = describe_failures(&edits, &stats);
        assert!(text.contains("```\nfunction go() {\n    run(  1 );\n}\n```"), "{text}");
    }

    #[test]
    fn long_quotes_are_cut_by_characters() {
        let quoted = quote(&"é".repeat(10), 4);
        assert_eq!(quoted, "éééé\n/* ... */");
        assert_eq!(quote("\nshort\n", 40), "short");
    }
}
