//! Thread-local parser pooling.
//!
//! Every validator check and compressor pass needs a parse. Creating a
//! tree-sitter parser per call is wasteful, so each thread keeps one
//! [`JsParser`] and reuses it. Callers that offload batches to worker
//! threads get one parser per worker.

use crate::ts::JsParser;
use std::cell::RefCell;

thread_local! {
    static JS_PARSER: RefCell<JsParser> = RefCell::new(JsParser::new());
}

/// Execute function with the pooled parser instance for this thread.
///
/// # Example
///
/// ```no_run
/// use artifact_patcher::pool::with_parser;
///
/// let has_errors = with_parser(|parser| {
///     parser
///         .parse_region("const a = 1;", 0)
///         .map(|parsed| parsed.has_errors())
/// });
/// ```
pub fn with_parser<F, R>(f: F) -> R
where
    F: FnOnce(&mut JsParser) -> R,
{
    JS_PARSER.with(|cell| f(&mut cell.borrow_mut()))
}
