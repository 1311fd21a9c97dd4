use std::fs;
use std::io::Write;
use std::ops::Range;
use std::path::Path;
use thiserror::Error;
use xxhash_rust::xxh3::xxh3_64;

/// A search/replace instruction produced by the collaborator.
///
/// Consumed once by [`PatchApplier::apply`](crate::PatchApplier::apply).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Edit {
    /// Text the collaborator believes is in the document
    pub search: String,
    /// Text to put in its place
    pub replace: String,
    /// Approximate 1-based line range of the search text
    pub line_hint: Option<LineHint>,
    /// Replace this top-level declaration wholesale instead of searching
    pub target: Option<String>,
}

impl Edit {
    pub fn new(search: impl Into<String>, replace: impl Into<String>) -> Self {
        Self {
            search: search.into(),
            replace: replace.into(),
            line_hint: None,
            target: None,
        }
    }

    /// A structural replacement of the named top-level declaration.
    pub fn definition(target: impl Into<String>, replace: impl Into<String>) -> Self {
        Self {
            search: String::new(),
            replace: replace.into(),
            line_hint: None,
            target: Some(target.into()),
        }
    }

    pub fn with_line_hint(mut self, hint: LineHint) -> Self {
        self.line_hint = Some(hint);
        self
    }

    /// Short, single-line preview of the search text for reports.
    pub fn search_preview(&self) -> String {
        preview(&self.search, 60)
    }
}

/// 1-based, inclusive line range attached to an [`Edit`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineHint {
    pub start: usize,
    pub end: Option<usize>,
}

impl LineHint {
    pub fn new(start: usize, end: Option<usize>) -> Self {
        Self { start, end }
    }
}

pub(crate) fn preview(text: &str, max_chars: usize) -> String {
    let flat: String = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= max_chars {
        flat
    } else {
        let mut cut: String = flat.chars().take(max_chars).collect();
        cut.push('…');
        cut
    }
}

/// Grow `range` to whole lines (including the trailing newline) when
/// nothing but whitespace shares those lines with it.
pub fn whole_line_range(text: &str, range: Range<usize>) -> Range<usize> {
    let line_start = text[..range.start].rfind('\n').map_or(0, |i| i + 1);
    let line_end = text[range.end..]
        .find('\n')
        .map_or(text.len(), |i| range.end + i + 1);

    let before = &text[line_start..range.start];
    let after = &text[range.end..line_end];
    if before.trim().is_empty() && after.trim().is_empty() {
        line_start..line_end
    } else {
        range
    }
}

/// The fundamental mutation primitive: byte-span replacement with verification.
///
/// Every change the applier, the repair loop or the compressor makes to a
/// document compiles down to this.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use = "SpanEdit does nothing until applied"]
pub struct SpanEdit {
    /// Starting byte offset (inclusive)
    pub byte_start: usize,
    /// Ending byte offset (exclusive)
    pub byte_end: usize,
    /// New text to insert at [byte_start, byte_end)
    pub new_text: String,
    /// Verification of what we expect to find before applying
    pub expected_before: EditVerification,
}

/// Verification strategy for edit safety.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditVerification {
    /// Exact text match required
    ExactMatch(String),
    /// xxh3 hash of expected text (faster for large spans)
    Hash(u64),
}

impl EditVerification {
    /// Check if the provided text matches the verification criteria.
    pub fn matches(&self, text: &str) -> bool {
        match self {
            EditVerification::ExactMatch(expected) => text == expected,
            EditVerification::Hash(expected_hash) => xxh3_64(text.as_bytes()) == *expected_hash,
        }
    }

    /// Create verification from text, using hash for text over 1KB.
    pub fn from_text(text: &str) -> Self {
        if text.len() > 1024 {
            EditVerification::Hash(xxh3_64(text.as_bytes()))
        } else {
            EditVerification::ExactMatch(text.to_string())
        }
    }
}

#[derive(Error, Debug)]
pub enum EditError {
    #[error("Before-text verification failed at byte {byte_start}")]
    BeforeTextMismatch {
        byte_start: usize,
        byte_end: usize,
        found: String,
    },

    #[error("Invalid byte range: [{byte_start}, {byte_end}) in text of length {len}")]
    InvalidByteRange {
        byte_start: usize,
        byte_end: usize,
        len: usize,
    },

    #[error("Span [{byte_start}, {byte_end}) does not fall on character boundaries")]
    NotCharBoundary { byte_start: usize, byte_end: usize },

    #[error("Overlapping spans at byte {0}")]
    Overlap(usize),

    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl SpanEdit {
    /// Create a span edit whose verification is derived from `expected_before`.
    pub fn new(
        byte_start: usize,
        byte_end: usize,
        new_text: impl Into<String>,
        expected_before: &str,
    ) -> Self {
        Self {
            byte_start,
            byte_end,
            new_text: new_text.into(),
            expected_before: EditVerification::from_text(expected_before),
        }
    }

    /// Capture the current text of `range` in `text` as the expected before-text.
    pub fn capture(
        text: &str,
        range: Range<usize>,
        new_text: impl Into<String>,
    ) -> Result<Self, EditError> {
        let current = slice(text, range.start, range.end)?;
        Ok(Self::new(range.start, range.end, new_text, current))
    }

    pub fn range(&self) -> Range<usize> {
        self.byte_start..self.byte_end
    }

    fn validate<'a>(&self, text: &'a str) -> Result<&'a str, EditError> {
        let current = slice(text, self.byte_start, self.byte_end)?;

        // Already applied
        if current == self.new_text {
            return Ok(current);
        }

        if !self.expected_before.matches(current) {
            return Err(EditError::BeforeTextMismatch {
                byte_start: self.byte_start,
                byte_end: self.byte_end,
                found: preview(current, 80),
            });
        }
        Ok(current)
    }

    /// Apply this edit to `text`, returning the new text.
    pub fn apply_to(&self, text: &str) -> Result<String, EditError> {
        self.validate(text)?;
        let mut out =
            String::with_capacity(text.len() + self.new_text.len() - (self.byte_end - self.byte_start));
        out.push_str(&text[..self.byte_start]);
        out.push_str(&self.new_text);
        out.push_str(&text[self.byte_end..]);
        Ok(out)
    }

    /// Apply several non-overlapping edits to `text` in one pass.
    ///
    /// Edits are sorted by byte_start descending and spliced bottom-to-top
    /// to avoid offset invalidation.
    pub fn apply_all(text: &str, mut edits: Vec<SpanEdit>) -> Result<String, EditError> {
        if edits.is_empty() {
            return Ok(text.to_string());
        }
        edits.sort_by(|a, b| b.byte_start.cmp(&a.byte_start));

        for edit in &edits {
            edit.validate(text)?;
        }
        for window in edits.windows(2) {
            let (later, earlier) = (&window[0], &window[1]);
            if earlier.byte_end > later.byte_start {
                return Err(EditError::Overlap(later.byte_start));
            }
        }

        let mut out = text.to_string();
        for edit in &edits {
            out.replace_range(edit.range(), &edit.new_text);
        }
        Ok(out)
    }
}

fn slice(text: &str, byte_start: usize, byte_end: usize) -> Result<&str, EditError> {
    if byte_start > byte_end || byte_end > text.len() {
        return Err(EditError::InvalidByteRange {
            byte_start,
            byte_end,
            len: text.len(),
        });
    }
    text.get(byte_start..byte_end)
        .ok_or(EditError::NotCharBoundary {
            byte_start,
            byte_end,
        })
}

/// Atomic file write: tempfile + fsync + rename, then bump the mtime.
///
/// Either the full write succeeds or the file is unchanged.
pub fn atomic_write(path: &Path, content: &[u8]) -> Result<(), EditError> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };

    let mut temp = tempfile::NamedTempFile::new_in(parent)?;
    temp.write_all(content)?;
    temp.as_file().sync_all()?;
    temp.persist(path).map_err(|e| e.error)?;

    filetime::set_file_mtime(path, filetime::FileTime::now())?;
    Ok(())
}

/// Read a document, rejecting anything that is not UTF-8.
pub fn read_document(path: &Path) -> Result<String, EditError> {
    let bytes = fs::read(path)?;
    String::from_utf8(bytes)
        .map_err(|e| EditError::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, e)))
}
