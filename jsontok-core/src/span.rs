//! Byte spans over chunked input.
//!
//! Tokens never carry raw pointers into caller memory. A span is either a
//! `ChunkSlice` - chunk-relative indices resolved through the tokenizer's
//! chunk queue - or an owned copy produced when a token straddled a chunk
//! boundary. Resolving a slice whose chunk has been released yields `None`
//! instead of a dangling reference.

/// A reference to a byte range within one input chunk.
///
/// 12 bytes: chunk index (u32) + start (u32) + end (u32). The chunk index is
/// absolute over the stream, so a slice stays unambiguous after earlier
/// chunks are released.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkSlice {
    /// Absolute index of the chunk in the input stream
    pub chunk_idx: u32,
    /// Start offset within the chunk
    pub start: u32,
    /// End offset within the chunk (exclusive)
    pub end: u32,
}

impl ChunkSlice {
    #[inline]
    pub fn new(chunk_idx: u32, start: u32, end: u32) -> Self {
        Self { chunk_idx, start, end }
    }

    /// Length of the slice in bytes.
    #[inline]
    pub fn len(&self) -> usize {
        (self.end - self.start) as usize
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// Token payload: either a view into a live input chunk, or bytes the
/// tokenizer had to copy because the token crossed a chunk boundary.
///
/// Consumers read both variants through [`crate::Tokenizer::resolve`] (or
/// [`crate::Tokenizer::view`] for a whole token); only tests and the
/// zero-copy assertions need to distinguish them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Span {
    /// Zero-copy reference into an input chunk.
    Borrowed(ChunkSlice),
    /// Bytes reassembled in the continuation buffer.
    Owned(Box<[u8]>),
}

impl Span {
    /// The empty span. Owned so it resolves without consulting any chunk.
    pub fn empty() -> Self {
        Span::Owned(Box::default())
    }

    #[inline]
    pub fn len(&self) -> usize {
        match self {
            Span::Borrowed(slice) => slice.len(),
            Span::Owned(bytes) => bytes.len(),
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// True when the span aliases chunk storage rather than owning a copy.
    #[inline]
    pub fn is_borrowed(&self) -> bool {
        matches!(self, Span::Borrowed(_))
    }
}

impl Default for Span {
    fn default() -> Self {
        Span::empty()
    }
}
