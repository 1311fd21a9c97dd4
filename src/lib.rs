//! Artifact Patcher: search/replace patching for LLM-generated documents
//!
//! Generated artifacts (single-file JavaScript, JSX and TypeScript
//! components, or HTML pages with an inline script) are edited by asking a
//! language model for small search/replace blocks instead of a full rewrite.
//! The model's search text is approximate, so this crate locates it with a
//! cascade of increasingly permissive strategies, splices the replacement
//! with a verified byte-span primitive, and gates every step behind a
//! validator that compares the result to its pre-edit baseline.
//!
//! # Architecture
//!
//! - [`protocol`] parses the model's wire text into [`Edit`]s
//! - [`matcher`] locates each search snippet ([`Matcher`])
//! - [`applier`] runs the transactional batch ([`PatchApplier`])
//! - [`validate`] holds the relative validation checks
//! - [`repair`] retries a failed batch through a [`RepairClient`]
//! - [`compress`] and [`intent`] shrink documents before they are sent out
//!
//! # Guarantees
//!
//! - Every mutation verifies its expected before-text
//! - A batch leaves the document untouched or fully validated
//! - Conditions are returned as data, never as panics
//!
//! # Example
//!
//! ```no_run
//! use artifact_patcher::{parse_edits, ApplyOptions, Document, PatchApplier};
//!
//! let reply = "<<<<<<< SEARCH\nreturn 1;\n=======\nreturn 2;\n>>>>>>> REPLACE\n";
//! let edits = parse_edits(reply).expect("valid edit blocks");
//!
//! let mut document = Document::new("function f() {\n  return 1;\n}\n");
//! let stats = PatchApplier::default().apply(&mut document, &edits, &ApplyOptions::default());
//! println!("{} of {} edits applied", stats.succeeded, stats.total);
//! ```

pub mod applier;
pub mod compress;
pub mod config;
pub mod edit;
pub mod intent;
pub mod matcher;
pub mod pool;
pub mod protocol;
pub mod region;
pub mod repair;
pub mod scan;
pub mod token;
pub mod ts;
pub mod validate;

// Re-exports
pub use applier::{
    dedupe_seams, ApplyOptions, Document, EditOutcome, EditReport, Failure, FailureKind,
    PatchApplier, PatchStats,
};
pub use compress::{compress, CompressOptions, Compressed, CompressionMode, CompressionStats, Compressor};
pub use config::{load_from_path, load_from_str, ConfigError, EngineConfig};
pub use edit::{atomic_write, read_document, Edit, EditError, EditVerification, LineHint, SpanEdit};
pub use intent::{classify, Classification, ClassificationCache, EditIntent};
pub use matcher::{MatchContext, MatchOptions, MatchSpan, MatchStrategy, Matcher, StrategyKind};
pub use protocol::{parse_edits, render_edits, ProtocolError};
pub use repair::{RepairClient, RepairClientError, RepairLoop, RepairOutcome, RepairRequest};
pub use ts::TreeSitterError;
pub use validate::{ValidationError, ValidationMode, Validator};
