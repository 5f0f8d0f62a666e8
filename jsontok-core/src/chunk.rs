//! Input chunk storage.
//!
//! The tokenizer consumes a FIFO of caller-supplied chunks. Chunks are
//! indexed absolutely over the stream; once the scanner has consumed every
//! byte of the front chunk it is popped and released, and any `ChunkSlice`
//! still pointing at it resolves to `None` from then on.

use std::collections::VecDeque;

use crate::span::ChunkSlice;

/// One contiguous region of input bytes.
#[derive(Debug)]
pub struct Chunk {
    data: Box<[u8]>,
    /// Offset of this chunk in the overall input stream
    stream_offset: u64,
}

impl Chunk {
    pub(crate) fn new(data: Vec<u8>, stream_offset: u64) -> Self {
        Self {
            data: data.into_boxed_slice(),
            stream_offset,
        }
    }

    #[inline]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Offset of this chunk's first byte in the overall stream.
    #[inline]
    pub fn stream_offset(&self) -> u64 {
        self.stream_offset
    }
}

/// FIFO of pending input chunks with stable absolute indexing.
///
/// `first_index` advances as chunks are released, so stale slices can be
/// detected instead of resolving into the wrong chunk.
#[derive(Debug, Default)]
pub struct ChunkQueue {
    chunks: VecDeque<Chunk>,
    first_index: u32,
    total_bytes: u64,
}

impl ChunkQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk to the queue. Zero-length input is ignored.
    pub fn push(&mut self, data: Vec<u8>) {
        if data.is_empty() {
            return;
        }
        let offset = self.total_bytes;
        self.total_bytes += data.len() as u64;
        self.chunks.push_back(Chunk::new(data, offset));
    }

    #[inline]
    pub fn front(&self) -> Option<&Chunk> {
        self.chunks.front()
    }

    /// Absolute index of the front chunk.
    #[inline]
    pub fn front_index(&self) -> u32 {
        self.first_index
    }

    pub(crate) fn pop_front(&mut self) -> Option<Chunk> {
        let chunk = self.chunks.pop_front()?;
        self.first_index += 1;
        Some(chunk)
    }

    /// Resolve a slice to bytes, or `None` if its chunk has been released
    /// (or the slice is out of bounds).
    pub fn resolve(&self, slice: ChunkSlice) -> Option<&[u8]> {
        if slice.chunk_idx < self.first_index {
            return None;
        }
        let chunk = self.chunks.get((slice.chunk_idx - self.first_index) as usize)?;
        chunk.data().get(slice.start as usize..slice.end as usize)
    }

    /// Number of chunks currently queued.
    #[inline]
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Total bytes received through this queue.
    #[inline]
    pub fn total_bytes(&self) -> u64 {
        self.total_bytes
    }
}
