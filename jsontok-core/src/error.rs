//! Error kinds and diagnostic context.
//!
//! Errors are a flat `#[repr(u8)]` enum mapped to static messages - no heap
//! allocation on the error path. `NeedMoreData` is the one recoverable kind:
//! it means the pending chunk queue ran dry before a token could be
//! completed, and supplying another chunk resumes the scan.
//!
//! On a hard error the tokenizer builds an [`ErrorContext`]: a window of
//! reconstructed source lines around the failing byte, enough to render a
//! caret diagnostic without access to the full document.

use std::fmt;

use memchr::{memchr_iter, memrchr_iter};

/// Tokenizer and serializer error kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Error {
    /// Input starved mid-token. Supply a chunk and retry - not a failure.
    NeedMoreData = 0,
    InvalidToken,
    ExpectedPropertyName,
    ExpectedDelimiter,
    ExpectedDataToken,
    ExpectedObjectStart,
    ExpectedObjectEnd,
    ExpectedArrayStart,
    ExpectedArrayEnd,
    IllegalPropertyName,
    IllegalPropertyType,
    IllegalDataValue,
    EncounteredIllegalChar,
    FailedToParseBoolean,
    FailedToParseDouble,
    FailedToParseFloat,
    FailedToParseInt,
    /// A zero-copy reference would span a chunk boundary; fall back to the
    /// copying capture protocol.
    NonContiguousMemory,
    UnknownError,
}

impl Error {
    /// Human-readable message for this error kind.
    pub fn message(self) -> &'static str {
        match self {
            Self::NeedMoreData => "need more data",
            Self::InvalidToken => "invalid token",
            Self::ExpectedPropertyName => "expected property name",
            Self::ExpectedDelimiter => "expected delimiter",
            Self::ExpectedDataToken => "expected data token",
            Self::ExpectedObjectStart => "expected object start",
            Self::ExpectedObjectEnd => "expected object end",
            Self::ExpectedArrayStart => "expected array start",
            Self::ExpectedArrayEnd => "expected array end",
            Self::IllegalPropertyName => "illegal property name",
            Self::IllegalPropertyType => "illegal property type",
            Self::IllegalDataValue => "illegal data value",
            Self::EncounteredIllegalChar => "encountered illegal character",
            Self::FailedToParseBoolean => "failed to parse boolean",
            Self::FailedToParseDouble => "failed to parse double",
            Self::FailedToParseFloat => "failed to parse float",
            Self::FailedToParseInt => "failed to parse integer",
            Self::NonContiguousMemory => "non-contiguous memory",
            Self::UnknownError => "unknown error",
        }
    }

    /// True only for `NeedMoreData` - the caller can retry after adding a
    /// chunk. Every other kind leaves the tokenizer at the failure point.
    #[inline]
    pub fn is_recoverable(self) -> bool {
        matches!(self, Self::NeedMoreData)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

impl std::error::Error for Error {}

/// Window configuration for the diagnostic builder.
#[derive(Debug, Clone, Copy)]
pub(crate) struct ContextConfig {
    /// Max complete lines collected on each side of the error line
    pub line_context: usize,
    /// Byte range searched for newlines in each direction
    pub line_range: usize,
    /// Half-width of the fallback window when no newline is in range
    pub range: usize,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            line_context: 4,
            line_range: 256,
            range: 38,
        }
    }
}

/// Reconstructed source excerpt around a parse error.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ErrorContext {
    /// Index into `lines` of the line containing the error
    pub line: usize,
    /// Column of the failing byte within that line
    pub character: usize,
    pub error: Option<Error>,
    pub lines: Vec<String>,
}

impl ErrorContext {
    pub(crate) fn clear(&mut self) {
        self.line = 0;
        self.character = 0;
        self.error = None;
        self.lines.clear();
    }

    /// Render the excerpt with a caret pointing at the failing byte.
    pub fn render(&self) -> String {
        let Some(error) = self.error else {
            return String::new();
        };
        let mut out = format!("error: {}\n", error.message());
        for (i, line) in self.lines.iter().enumerate() {
            out.push_str(line);
            out.push('\n');
            if i == self.line {
                for _ in 0..self.character {
                    out.push(' ');
                }
                out.push_str("^\n");
            }
        }
        out
    }
}

fn lossy(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

/// Build a diagnostic context from the live chunk at error time.
///
/// Collects up to `line_context` complete lines on each side of the cursor,
/// bounded by `line_range` bytes in each direction. When no newline is in
/// range, falls back to a fixed window of `range` bytes around the cursor.
pub(crate) fn build_context(
    error: Error,
    data: &[u8],
    cursor: usize,
    cfg: &ContextConfig,
) -> ErrorContext {
    let cursor = cursor.min(data.len());
    let back_stop = cursor.saturating_sub(cfg.line_range);
    let fwd_stop = (cursor + cfg.line_range).min(data.len());

    // Line starts behind the cursor, nearest first.
    let mut starts: Vec<usize> = Vec::new();
    for nl in memrchr_iter(b'\n', &data[back_stop..cursor]) {
        starts.push(back_stop + nl + 1);
        if starts.len() == cfg.line_context {
            break;
        }
    }
    // Line ends ahead of the cursor, nearest first.
    let mut ends: Vec<usize> = Vec::new();
    for nl in memchr_iter(b'\n', &data[cursor..fwd_stop]) {
        ends.push(cursor + nl);
        if ends.len() == cfg.line_context {
            break;
        }
    }

    if starts.is_empty() && ends.is_empty() {
        // Single pathological line: fixed-width window centered on the cursor.
        let left = cursor.saturating_sub(cfg.range);
        let right = (cursor + cfg.range).min(data.len());
        return ErrorContext {
            line: 0,
            character: cursor - left,
            error: Some(error),
            lines: vec![lossy(&data[left..right])],
        };
    }

    // If the backward search ran out before hitting the limit, the window
    // start opens a (possibly partial) further line.
    if starts.len() < cfg.line_context && starts.last().copied().unwrap_or(cursor) > back_stop {
        starts.push(back_stop);
    }

    let mut lines = Vec::with_capacity(starts.len() + ends.len() + 1);
    // Complete lines before the error line, oldest first.
    for i in (1..starts.len()).rev() {
        lines.push(lossy(&data[starts[i]..starts[i - 1] - 1]));
    }
    let cur_start = starts.first().copied().unwrap_or(back_stop);
    let cur_end = ends.first().copied().unwrap_or(fwd_stop);
    let line = lines.len();
    lines.push(lossy(&data[cur_start..cur_end]));
    // Lines after the error line; the last one may be truncated by the range.
    for i in 0..ends.len() {
        let start = ends[i] + 1;
        let end = if i + 1 < ends.len() { ends[i + 1] } else { fwd_stop };
        if start < end {
            lines.push(lossy(&data[start..end]));
        }
    }

    ErrorContext {
        line,
        character: cursor - cur_start,
        error: Some(error),
        lines,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_are_static() {
        assert_eq!(Error::NeedMoreData.message(), "need more data");
        assert_eq!(Error::ExpectedDelimiter.message(), "expected delimiter");
        assert!(Error::NeedMoreData.is_recoverable());
        assert!(!Error::InvalidToken.is_recoverable());
    }

    #[test]
    fn context_multi_line() {
        let data = b"line one\nline two\nline x three\nline four\nline five";
        // Cursor on the 'x' of line three.
        let cursor = 18 + 5;
        let ctx = build_context(Error::InvalidToken, data, cursor, &ContextConfig::default());
        assert_eq!(ctx.lines.len(), 5);
        assert_eq!(ctx.lines[0], "line one");
        assert_eq!(ctx.lines[2], "line x three");
        assert_eq!(ctx.line, 2);
        assert_eq!(ctx.character, 5);

        let rendered = ctx.render();
        assert!(rendered.starts_with("error: invalid token\n"));
        assert!(rendered.contains("line x three\n     ^\n"));
    }

    #[test]
    fn context_limits_line_count() {
        let data: Vec<u8> = (0..20).flat_map(|i| format!("l{i}\n").into_bytes()).collect();
        let cursor = data.len() / 2;
        let cfg = ContextConfig { line_context: 2, ..ContextConfig::default() };
        let ctx = build_context(Error::InvalidToken, &data, cursor, &cfg);
        // At most 2 behind + current + 2 ahead.
        assert!(ctx.lines.len() <= 5);
        assert!(ctx.line < ctx.lines.len());
    }

    #[test]
    fn context_single_line_fallback() {
        let data = vec![b'a'; 500];
        let cfg = ContextConfig::default();
        let ctx = build_context(Error::EncounteredIllegalChar, &data, 250, &cfg);
        assert_eq!(ctx.lines.len(), 1);
        assert_eq!(ctx.line, 0);
        assert_eq!(ctx.character, cfg.range);
        assert_eq!(ctx.lines[0].len(), cfg.range * 2);
    }

    #[test]
    fn context_cursor_at_start() {
        let ctx = build_context(
            Error::EncounteredIllegalChar,
            b"#bad\nrest\n",
            0,
            &ContextConfig::default(),
        );
        assert_eq!(ctx.line, 0);
        assert_eq!(ctx.character, 0);
        assert_eq!(ctx.lines[0], "#bad");
    }
}
