//! Source file spans and locations

use derive_more::Display;
use serde::{Deserialize, Serialize};
use std::ops::Range;

/// A unique identifier for a source file
#[derive(Copy, Clone, Debug, Default, Display, Hash, Eq, PartialEq, Serialize, Deserialize)]
#[display("#{_0}")]
pub struct FileId(pub u32);

impl FileId {
    /// Create a file id
    pub fn new(id: u32) -> Self {
        Self(id)
    }
}

/// A byte offset span in a source file, with the line/column of its start
#[derive(Copy, Clone, Debug, Default, Display, Hash, Eq, PartialEq, Serialize, Deserialize)]
#[display("{line}:{col}")]
pub struct Span {
    /// First byte
    pub start: u32,
    /// One past the last byte
    pub end: u32,
    /// 1-based line of `start`
    #[serde(default)]
    pub line: u32,
    /// 1-based column of `start`
    #[serde(default)]
    pub col: u32,
}

impl Span {
    /// Span covering `start..end` with no line information
    pub fn new(start: u32, end: u32) -> Self {
        Self {
            start,
            end,
            line: 0,
            col: 0,
        }
    }

    /// Attach a line/column to the span
    #[must_use]
    pub fn at(self, line: u32, col: u32) -> Self {
        Self { line, col, ..self }
    }

    /// Byte range of the span
    pub fn range(&self) -> Range<usize> {
        self.start as usize..self.end as usize
    }

    /// Length in bytes
    pub fn len(&self) -> u32 {
        self.end.saturating_sub(self.start)
    }

    /// Whether the span covers no bytes
    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }
}

/// A span with associated file
#[derive(Copy, Clone, Debug, Default, Display, Hash, Eq, PartialEq, Serialize, Deserialize)]
#[display("{file}:{span}")]
pub struct FileSpan {
    /// Owning file
    pub file: FileId,
    /// Location within the file
    pub span: Span,
}

impl FileSpan {
    /// Pair a span with its file
    pub fn new(file: FileId, span: Span) -> Self {
        Self { file, span }
    }

    /// Byte range of the span
    pub fn range(&self) -> Range<usize> {
        self.span.range()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_uses_line_and_column() {
        let span = FileSpan::new(FileId(2), Span::new(10, 14).at(3, 7));
        assert_eq!(span.to_string(), "#2:3:7");
    }

    #[test]
    fn test_span_len_and_range() {
        let span = Span::new(4, 9);
        assert_eq!(span.len(), 5);
        assert_eq!(span.range(), 4..9);
        assert!(!span.is_empty());
        assert!(Span::new(3, 3).is_empty());
    }

    #[test]
    fn test_line_info_is_optional_in_serialized_form() {
        let span: Span = serde_json::from_str(r#"{"start":1,"end":2}"#).unwrap();
        assert_eq!(span, Span::new(1, 2));
    }
}
