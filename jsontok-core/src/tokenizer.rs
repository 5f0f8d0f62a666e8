//! Incremental JSON tokenizer.
//!
//! The tokenizer consumes a FIFO of input chunks and produces one [`Token`]
//! per [`Tokenizer::next_token`] call. Tokens fully contained in one chunk
//! borrow that chunk's bytes (zero copy); a token that straddles a chunk
//! boundary is reassembled in the continuation buffer and carries owned
//! storage instead. Starvation is not a failure: `next_token` returns
//! [`Error::NeedMoreData`] after giving the registered need-more-data
//! callbacks a chance to push a chunk synchronously, and the next call
//! resumes the scan exactly where it stopped.
//!
//! There is no internal I/O, no thread, and no lock; one call scans until it
//! either finishes a token or hits a clean starvation boundary.

use memchr::memchr2;

use crate::callback::{CallbackSet, Subscription};
use crate::chunk::ChunkQueue;
use crate::error::{build_context, ContextConfig, Error, ErrorContext};
use crate::span::{ChunkSlice, Span};
use crate::token::{reclassify, Token, TokenType, TokenView};

/// Where the state machine is within the current name/value pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TokenState {
    FindingName,
    FindingDelimiter,
    FindingData,
    FindingTokenEnd,
}

/// Scan progress within the current name or value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScanState {
    NoStartFound,
    FindingEnd,
    FoundEnd,
}

/// Continuation buffer: owned bytes of a token split across chunks.
///
/// At most one token is ever in flight, so one buffer per tokenizer
/// suffices. Cleared at the start of every new token.
#[derive(Debug, Default)]
struct Pending {
    active: bool,
    name_type_set: bool,
    value_type_set: bool,
    name_type: TokenType,
    value_type: TokenType,
    name: Vec<u8>,
    value: Vec<u8>,
}

impl Pending {
    fn clear(&mut self) {
        if !self.active {
            return;
        }
        self.active = false;
        self.name_type_set = false;
        self.value_type_set = false;
        self.name_type = TokenType::Error;
        self.value_type = TokenType::Error;
        self.name.clear();
        self.value.clear();
    }
}

#[inline]
fn is_ascii_word(byte: u8) -> bool {
    // The bare-word class: A-Z, 0-9, and the '^'..'z' run (^ _ ` a-z).
    matches!(byte, b'A'..=b'Z' | b'^'..=b'z' | b'0'..=b'9')
}

#[inline]
fn slice_of<'a>(data: &'a [u8], slice: &ChunkSlice) -> &'a [u8] {
    &data[slice.start as usize..slice.end as usize]
}

fn local_bytes<'a>(data: &'a [u8], span: &'a Span) -> &'a [u8] {
    match span {
        Span::Borrowed(slice) => slice_of(data, slice),
        Span::Owned(bytes) => bytes,
    }
}

/// The state machine proper. Split from [`Tokenizer`] so a scan can borrow
/// the front chunk from the queue while mutating scanner state.
#[derive(Debug)]
struct Scanner {
    token_state: TokenState,
    scan_state: ScanState,
    scan_type: TokenType,
    is_escaped: bool,
    /// A comma was consumed, so a further name or value must follow before
    /// any closing bracket (unless trailing commas are allowed).
    expecting_value: bool,
    allow_ascii_properties: bool,
    allow_new_lines: bool,
    allow_trailing_comma: bool,
    /// Scan position within the front chunk
    cursor: usize,
    /// Start of the current name/value content within the front chunk
    value_start: usize,
    pending: Pending,
}

impl Scanner {
    fn new() -> Self {
        Self {
            token_state: TokenState::FindingName,
            scan_state: ScanState::NoStartFound,
            scan_type: TokenType::Error,
            is_escaped: false,
            expecting_value: false,
            allow_ascii_properties: false,
            allow_new_lines: false,
            allow_trailing_comma: false,
            cursor: 0,
            value_start: 0,
            pending: Pending::default(),
        }
    }

    fn reset_for_new_token(&mut self) {
        self.pending.clear();
        self.reset_for_new_value();
    }

    fn reset_for_new_value(&mut self) {
        self.scan_state = ScanState::NoStartFound;
        self.scan_type = TokenType::Error;
        self.value_start = 0;
    }

    /// Called when the front chunk is released: chunk-relative positions
    /// restart from zero.
    fn rebase(&mut self) {
        self.cursor = 0;
        self.value_start = 0;
    }

    /// Skip whitespace and classify the first significant byte.
    fn find_start(&mut self, data: &[u8]) -> Result<(TokenType, usize), Error> {
        for pos in self.cursor..data.len() {
            let ty = match data[pos] {
                b' ' | b'\n' | b'\r' | b'\t' => continue,
                b'"' => TokenType::String,
                b'{' => TokenType::ObjectStart,
                b'}' => TokenType::ObjectEnd,
                b'[' => TokenType::ArrayStart,
                b']' => TokenType::ArrayEnd,
                b'-' | b'+' | b'0'..=b'9' => TokenType::Number,
                byte if is_ascii_word(byte) => TokenType::Ascii,
                _ => {
                    self.cursor = pos;
                    return Err(Error::EncounteredIllegalChar);
                }
            };
            return Ok((ty, pos));
        }
        Err(Error::NeedMoreData)
    }

    /// Find the closing quote, honoring backslash escapes. The escape flag
    /// survives chunk boundaries.
    fn find_string_end(&mut self, data: &[u8]) -> Result<usize, Error> {
        let mut pos = self.cursor;
        while pos < data.len() {
            if self.is_escaped {
                self.is_escaped = false;
                pos += 1;
                continue;
            }
            match memchr2(b'"', b'\\', &data[pos..]) {
                Some(offset) => {
                    let at = pos + offset;
                    if data[at] == b'"' {
                        self.cursor = at + 1;
                        return Ok(at);
                    }
                    self.is_escaped = true;
                    pos = at + 1;
                }
                None => break,
            }
        }
        Err(Error::NeedMoreData)
    }

    fn find_ascii_end(&mut self, data: &[u8]) -> Result<usize, Error> {
        for pos in self.cursor..data.len() {
            if !is_ascii_word(data[pos]) {
                self.cursor = pos;
                return Ok(pos);
            }
        }
        Err(Error::NeedMoreData)
    }

    fn find_number_end(&mut self, data: &[u8]) -> Result<usize, Error> {
        for pos in self.cursor..data.len() {
            match data[pos] {
                b'0'..=b'9' | b'.' | b'+' | b'-' | b'e' | b'E' => {}
                _ => {
                    self.cursor = pos;
                    return Ok(pos);
                }
            }
        }
        Err(Error::NeedMoreData)
    }

    /// After a property name: expect `:` (value follows), or treat `,`/`]`
    /// as proof the scanned name was really an anonymous value.
    fn find_delimiter(&mut self, data: &[u8]) -> Result<(), Error> {
        for pos in self.cursor..data.len() {
            match data[pos] {
                b':' => {
                    self.token_state = TokenState::FindingData;
                    self.expecting_value = false;
                    self.cursor = pos + 1;
                    return Ok(());
                }
                b',' => {
                    self.token_state = TokenState::FindingName;
                    self.expecting_value = true;
                    self.cursor = pos + 1;
                    return Ok(());
                }
                b']' => {
                    self.token_state = TokenState::FindingName;
                    self.expecting_value = false;
                    self.cursor = pos;
                    return Ok(());
                }
                b' ' | b'\n' | b'\r' | b'\t' => {}
                _ => {
                    self.cursor = pos;
                    return Err(Error::ExpectedDelimiter);
                }
            }
        }
        Err(Error::NeedMoreData)
    }

    /// After a completed value: consume the separator or stop at a closing
    /// bracket.
    fn find_token_end(&mut self, data: &[u8]) -> Result<(), Error> {
        for pos in self.cursor..data.len() {
            match data[pos] {
                b',' => {
                    self.expecting_value = true;
                    self.cursor = pos + 1;
                    return Ok(());
                }
                b'\n' if self.allow_new_lines => {
                    self.cursor = pos + 1;
                    return Ok(());
                }
                b']' | b'}' => {
                    self.cursor = pos;
                    return Ok(());
                }
                b' ' | b'\t' | b'\r' | b'\n' => {}
                _ => {
                    self.cursor = pos;
                    return Err(Error::InvalidToken);
                }
            }
        }
        Err(Error::NeedMoreData)
    }

    /// Locate the next name or value in the chunk: find its start (unless a
    /// previous chunk already did), then its end. The returned slice indexes
    /// the current chunk only; continuation assembly happens in the caller.
    fn scan_value(&mut self, chunk_idx: u32, data: &[u8]) -> Result<(ChunkSlice, TokenType), Error> {
        if self.scan_state == ScanState::NoStartFound {
            let (ty, pos) = self.find_start(data)?;
            self.scan_type = ty;
            if ty.is_structural() {
                self.value_start = pos;
                self.cursor = pos + 1;
                self.scan_state = ScanState::FoundEnd;
                return Ok((ChunkSlice::new(chunk_idx, pos as u32, pos as u32 + 1), ty));
            }
            if ty == TokenType::String {
                // Content starts after the opening quote.
                self.value_start = pos + 1;
                self.cursor = pos + 1;
            } else {
                self.value_start = pos;
                self.cursor = pos + 1;
            }
            self.scan_state = ScanState::FindingEnd;
        }

        let end = match self.scan_type {
            TokenType::String => self.find_string_end(data)?,
            TokenType::Ascii => self.find_ascii_end(data)?,
            TokenType::Number => self.find_number_end(data)?,
            _ => return Err(Error::InvalidToken),
        };
        self.scan_state = ScanState::FoundEnd;
        Ok((
            ChunkSlice::new(chunk_idx, self.value_start as u32, end as u32),
            self.scan_type,
        ))
    }

    /// Copy the partial name/value scanned from this chunk into the
    /// continuation buffer before the chunk is released.
    fn stash_partial_name(&mut self, data: &[u8]) {
        if self.scan_state == ScanState::NoStartFound {
            return;
        }
        self.pending.active = true;
        self.pending.name.extend_from_slice(&data[self.value_start..]);
        if !self.pending.name_type_set {
            self.pending.name_type = self.scan_type;
            self.pending.name_type_set = true;
        }
    }

    fn stash_completed_name(&mut self, data: &[u8], name: &Span, name_type: TokenType) {
        if self.pending.active {
            return;
        }
        self.pending.active = true;
        self.pending.name.extend_from_slice(local_bytes(data, name));
        self.pending.name_type = name_type;
        self.pending.name_type_set = true;
    }

    fn stash_partial_value(&mut self, data: &[u8]) {
        if self.scan_state == ScanState::NoStartFound {
            return;
        }
        self.pending.value.extend_from_slice(&data[self.value_start..]);
        if !self.pending.value_type_set {
            self.pending.value_type = self.scan_type;
            self.pending.value_type_set = true;
        }
    }

    /// Run the state machine over one chunk. `Ok` fills `token`;
    /// `Err(NeedMoreData)` means the chunk is exhausted (partial state is
    /// stashed in the continuation buffer); anything else is a hard error
    /// with the cursor left at the failure point.
    fn scan(&mut self, chunk_idx: u32, data: &[u8], token: &mut Token) -> Result<(), Error> {
        let mut tmp_name = Span::empty();
        let mut tmp_name_type = TokenType::Ascii;

        while self.cursor < data.len() {
            match self.token_state {
                TokenState::FindingName => {
                    let (slice, ty) = match self.scan_value(chunk_idx, data) {
                        Ok(found) => found,
                        Err(Error::NeedMoreData) => {
                            self.stash_partial_name(data);
                            return Err(Error::NeedMoreData);
                        }
                        Err(error) => return Err(error),
                    };

                    match ty {
                        TokenType::ObjectEnd | TokenType::ArrayEnd => {
                            if self.expecting_value && !self.allow_trailing_comma {
                                return Err(Error::ExpectedDataToken);
                            }
                            *token = Token::anonymous(Span::Borrowed(slice), ty);
                            self.token_state = TokenState::FindingTokenEnd;
                            return Ok(());
                        }
                        TokenType::ObjectStart | TokenType::ArrayStart => {
                            *token = Token::anonymous(Span::Borrowed(slice), ty);
                            self.expecting_value = false;
                            self.token_state = TokenState::FindingName;
                            return Ok(());
                        }
                        _ => {}
                    }

                    // A scalar: it is a property name until the delimiter
                    // proves otherwise.
                    if self.pending.active {
                        self.pending.name.extend_from_slice(slice_of(data, &slice));
                        self.pending.name_type = reclassify(self.pending.name_type, &self.pending.name);
                        tmp_name_type = self.pending.name_type;
                    } else {
                        tmp_name_type = reclassify(ty, slice_of(data, &slice));
                        tmp_name = Span::Borrowed(slice);
                    }
                    self.token_state = TokenState::FindingDelimiter;
                    self.reset_for_new_value();
                }

                TokenState::FindingDelimiter => {
                    match self.find_delimiter(data) {
                        Ok(()) => {}
                        Err(Error::NeedMoreData) => {
                            self.stash_completed_name(data, &tmp_name, tmp_name_type);
                            return Err(Error::NeedMoreData);
                        }
                        Err(error) => return Err(error),
                    }
                    self.reset_for_new_value();

                    if self.token_state == TokenState::FindingName {
                        // `,` or `]`: the scanned name was an anonymous value.
                        let (span, ty) = if self.pending.active {
                            (
                                Span::Owned(std::mem::take(&mut self.pending.name).into_boxed_slice()),
                                self.pending.name_type,
                            )
                        } else {
                            (std::mem::take(&mut tmp_name), tmp_name_type)
                        };
                        if ty == TokenType::Ascii && !self.allow_ascii_properties {
                            return Err(Error::IllegalDataValue);
                        }
                        *token = Token::anonymous(span, ty);
                        return Ok(());
                    }

                    // `:`: the name must be a string, or a bare word when the
                    // dialect allows it. Reclassified literals never qualify.
                    let name_type = if self.pending.active { self.pending.name_type } else { tmp_name_type };
                    if name_type != TokenType::String
                        && !(self.allow_ascii_properties && name_type == TokenType::Ascii)
                    {
                        return Err(Error::IllegalPropertyName);
                    }
                }

                TokenState::FindingData => {
                    let (slice, ty) = match self.scan_value(chunk_idx, data) {
                        Ok(found) => found,
                        Err(Error::NeedMoreData) => {
                            self.stash_completed_name(data, &tmp_name, tmp_name_type);
                            self.stash_partial_value(data);
                            return Err(Error::NeedMoreData);
                        }
                        Err(error) => return Err(error),
                    };

                    let (name_span, name_type, value_span, raw_type) = if self.pending.active {
                        self.pending.value.extend_from_slice(slice_of(data, &slice));
                        if !self.pending.value_type_set {
                            self.pending.value_type = ty;
                            self.pending.value_type_set = true;
                        }
                        let raw_type = self.pending.value_type;
                        (
                            Span::Owned(std::mem::take(&mut self.pending.name).into_boxed_slice()),
                            self.pending.name_type,
                            Span::Owned(std::mem::take(&mut self.pending.value).into_boxed_slice()),
                            raw_type,
                        )
                    } else {
                        (std::mem::take(&mut tmp_name), tmp_name_type, Span::Borrowed(slice), ty)
                    };

                    let value_type = match &value_span {
                        Span::Owned(bytes) => reclassify(raw_type, bytes),
                        Span::Borrowed(chunk_slice) => reclassify(raw_type, slice_of(data, chunk_slice)),
                    };
                    if value_type == TokenType::Ascii && !self.allow_ascii_properties {
                        return Err(Error::IllegalDataValue);
                    }

                    self.token_state = if matches!(raw_type, TokenType::ObjectStart | TokenType::ArrayStart) {
                        TokenState::FindingName
                    } else {
                        TokenState::FindingTokenEnd
                    };
                    *token = Token {
                        name: name_span,
                        name_type,
                        value: value_span,
                        value_type,
                    };
                    return Ok(());
                }

                TokenState::FindingTokenEnd => {
                    self.find_token_end(data)?;
                    self.token_state = TokenState::FindingName;
                }
            }
        }

        // Chunk consumed exactly at a state boundary: a name completed in
        // this chunk must not die with it.
        if matches!(self.token_state, TokenState::FindingDelimiter | TokenState::FindingData) {
            self.stash_completed_name(data, &tmp_name, tmp_name_type);
        }
        Err(Error::NeedMoreData)
    }
}

/// In-progress copying capture (see [`Tokenizer::copy_from_value`]).
#[derive(Debug)]
struct Capture {
    id: u64,
    /// Capture start within the front chunk; rebased to 0 on release.
    start: usize,
    buffer: Vec<u8>,
}

/// Handle to an in-progress copying capture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureHandle(u64);

/// Start marker for a zero-copy sub-tree reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawValueMark {
    chunk_idx: u32,
    start: u32,
}

/// The streaming tokenizer. See the module docs for the contract.
pub struct Tokenizer {
    scanner: Scanner,
    chunks: ChunkQueue,
    resume_pending: bool,
    need_data_callbacks: CallbackSet<Box<dyn FnMut(&mut ChunkQueue)>>,
    release_callbacks: CallbackSet<Box<dyn FnMut(&[u8])>>,
    token_transformer: Option<Box<dyn FnMut(&mut Token)>>,
    captures: Vec<Capture>,
    next_capture_id: u64,
    context_config: ContextConfig,
    error_context: ErrorContext,
}

impl Tokenizer {
    pub fn new() -> Self {
        Self {
            scanner: Scanner::new(),
            chunks: ChunkQueue::new(),
            resume_pending: false,
            need_data_callbacks: CallbackSet::new(),
            release_callbacks: CallbackSet::new(),
            token_transformer: None,
            captures: Vec::new(),
            next_capture_id: 0,
            context_config: ContextConfig::default(),
            error_context: ErrorContext::default(),
        }
    }

    /// Append an input chunk. Zero-length input is a no-op. Safe to call
    /// from within a need-more-data callback (which receives the queue).
    pub fn add_chunk(&mut self, data: impl Into<Vec<u8>>) {
        self.chunks.push(data.into());
    }

    /// Number of chunks queued and not yet released.
    pub fn pending_chunks(&self) -> usize {
        self.chunks.len()
    }

    /// Allow bare ASCII words as property names and values.
    pub fn set_allow_ascii_properties(&mut self, allow: bool) {
        self.scanner.allow_ascii_properties = allow;
    }

    /// Allow a newline to terminate a value like a comma would.
    pub fn set_allow_newline_as_separator(&mut self, allow: bool) {
        self.scanner.allow_new_lines = allow;
    }

    /// Tolerate a trailing comma before `]` or `}`.
    pub fn set_allow_trailing_comma(&mut self, allow: bool) {
        self.scanner.allow_trailing_comma = allow;
    }

    /// Configure the diagnostic excerpt: max lines collected around the
    /// error and the fallback byte window when input has no newlines.
    pub fn set_error_context_config(&mut self, line_context: usize, range_context: usize) {
        self.context_config.line_context = line_context;
        self.context_config.range = range_context;
    }

    /// The callback fires whenever the chunk queue runs dry; it may push
    /// chunks to let the current `next_token` call continue synchronously.
    pub fn register_need_more_data_callback(
        &mut self,
        callback: impl FnMut(&mut ChunkQueue) + 'static,
    ) -> Subscription {
        self.need_data_callbacks.add(Box::new(callback))
    }

    /// The callback fires with a chunk's bytes right before the chunk is
    /// dropped. Chunks are released in FIFO order, only once fully consumed.
    pub fn register_release_callback(
        &mut self,
        callback: impl FnMut(&[u8]) + 'static,
    ) -> Subscription {
        self.release_callbacks.add(Box::new(callback))
    }

    /// Post-processing hook applied to every produced token before return.
    pub fn register_token_transformer(&mut self, transformer: impl FnMut(&mut Token) + 'static) {
        self.token_transformer = Some(Box::new(transformer));
    }

    /// Produce the next token in document order.
    ///
    /// Returns [`Error::NeedMoreData`] when input starves; supplying a chunk
    /// and calling again resumes mid-token. Any other error is final for the
    /// scan position it reports; [`Tokenizer::error_context`] then holds a
    /// diagnostic excerpt.
    pub fn next_token(&mut self) -> Result<Token, Error> {
        if self.chunks.is_empty() {
            self.request_more_data();
        }
        self.error_context.clear();
        if self.chunks.is_empty() {
            return Err(Error::NeedMoreData);
        }
        if !self.resume_pending {
            self.scanner.reset_for_new_token();
        }

        let mut token = Token::default();
        loop {
            let outcome = match self.chunks.front() {
                Some(chunk) => self.scanner.scan(self.chunks.front_index(), chunk.data(), &mut token),
                None => Err(Error::NeedMoreData),
            };
            match outcome {
                Ok(()) => {
                    self.resume_pending = false;
                    if let Some(transformer) = self.token_transformer.as_mut() {
                        transformer(&mut token);
                    }
                    return Ok(token);
                }
                Err(Error::NeedMoreData) => {
                    self.release_front_chunk();
                    self.request_more_data();
                    if self.chunks.is_empty() {
                        self.resume_pending = true;
                        return Err(Error::NeedMoreData);
                    }
                }
                Err(error) => {
                    self.resume_pending = false;
                    let context = match self.chunks.front() {
                        Some(chunk) => {
                            build_context(error, chunk.data(), self.scanner.cursor, &self.context_config)
                        }
                        None => ErrorContext::default(),
                    };
                    self.error_context = context;
                    return Err(error);
                }
            }
        }
    }

    /// Resolve a token span against this tokenizer's live chunks. `None`
    /// means the backing chunk has been released.
    pub fn resolve<'a>(&'a self, span: &'a Span) -> Option<&'a [u8]> {
        match span {
            Span::Owned(bytes) => Some(bytes),
            Span::Borrowed(slice) => self.chunks.resolve(*slice),
        }
    }

    /// Resolve a raw chunk slice (e.g. one returned by
    /// [`Tokenizer::raw_value_end`]).
    pub fn resolve_slice(&self, slice: ChunkSlice) -> Option<&[u8]> {
        self.chunks.resolve(slice)
    }

    /// Resolve both spans of a token into a [`TokenView`].
    pub fn view<'a>(&'a self, token: &'a Token) -> Option<TokenView<'a>> {
        Some(TokenView {
            name: self.resolve(&token.name)?,
            name_type: token.name_type,
            value: self.resolve(&token.value)?,
            value_type: token.value_type,
        })
    }

    /// Skip past the current value and return the first token after it. For
    /// an `ObjectStart`/`ArrayStart` token this consumes the whole sub-tree
    /// including its matching close.
    pub fn skip_to_next(&mut self, token: &Token) -> Result<Token, Error> {
        match token.value_type {
            TokenType::ObjectStart | TokenType::ArrayStart => {
                let mut depth = 1usize;
                loop {
                    let next = self.next_token()?;
                    match next.value_type {
                        TokenType::ObjectStart | TokenType::ArrayStart => depth += 1,
                        TokenType::ObjectEnd | TokenType::ArrayEnd => {
                            depth -= 1;
                            if depth == 0 {
                                return self.next_token();
                            }
                        }
                        _ => {}
                    }
                }
            }
            _ => self.next_token(),
        }
    }

    /// Begin capturing raw document bytes from the start of `token`'s value.
    ///
    /// Keep calling `next_token` until the region of interest (typically the
    /// matching close bracket) has been consumed, then collect the bytes
    /// with [`Tokenizer::copy_including_value`]. The capture survives chunk
    /// releases by copying each chunk's tail as it retires.
    pub fn copy_from_value(&mut self, token: &Token) -> CaptureHandle {
        let id = self.next_capture_id;
        self.next_capture_id += 1;
        let (start, buffer) = match &token.value {
            // A reassembled token: seed with its owned bytes, then follow
            // the live chunk from the current scan position.
            Span::Owned(bytes) => (self.scanner.cursor, bytes.to_vec()),
            Span::Borrowed(slice) => {
                debug_assert_eq!(slice.chunk_idx, self.chunks.front_index());
                (slice.start as usize, Vec::new())
            }
        };
        self.captures.push(Capture { id, start, buffer });
        CaptureHandle(id)
    }

    /// Finish a capture: returns every document byte from the capture start
    /// through the current scan position (i.e. through the token most
    /// recently produced).
    pub fn copy_including_value(&mut self, handle: CaptureHandle) -> Vec<u8> {
        let index = self
            .captures
            .iter()
            .position(|capture| capture.id == handle.0)
            .expect("capture handle does not belong to this tokenizer");
        let mut capture = self.captures.swap_remove(index);
        if let Some(chunk) = self.chunks.front() {
            capture
                .buffer
                .extend_from_slice(&chunk.data()[capture.start..self.scanner.cursor]);
        }
        capture.buffer
    }

    /// Mark the start of a zero-copy sub-tree reference at `token`'s value.
    ///
    /// Fails with [`Error::NonContiguousMemory`] if the value does not
    /// live in the current chunk; the caller falls back to
    /// [`Tokenizer::copy_from_value`].
    pub fn raw_value_start(&self, token: &Token) -> Result<RawValueMark, Error> {
        match &token.value {
            Span::Borrowed(slice) if slice.chunk_idx == self.chunks.front_index() => Ok(RawValueMark {
                chunk_idx: slice.chunk_idx,
                start: slice.start,
            }),
            _ => Err(Error::NonContiguousMemory),
        }
    }

    /// Close a zero-copy reference at the current scan position. Fails with
    /// [`Error::NonContiguousMemory`] if a chunk boundary was crossed since
    /// the mark was taken.
    pub fn raw_value_end(&self, mark: RawValueMark) -> Result<ChunkSlice, Error> {
        if mark.chunk_idx != self.chunks.front_index() {
            return Err(Error::NonContiguousMemory);
        }
        Ok(ChunkSlice::new(mark.chunk_idx, mark.start, self.scanner.cursor as u32))
    }

    /// Diagnostic excerpt for the most recent hard error.
    pub fn error_context(&self) -> &ErrorContext {
        &self.error_context
    }

    /// Render the diagnostic excerpt with a caret. Empty if the last call
    /// did not fail hard.
    pub fn make_error_string(&self) -> String {
        self.error_context.render()
    }

    fn request_more_data(&mut self) {
        let chunks = &mut self.chunks;
        self.need_data_callbacks.invoke(|callback| callback(chunks));
    }

    fn release_front_chunk(&mut self) {
        let Some(chunk) = self.chunks.pop_front() else {
            return;
        };
        // Captures must not lose the retiring chunk's tail.
        for capture in &mut self.captures {
            capture.buffer.extend_from_slice(&chunk.data()[capture.start..]);
            capture.start = 0;
        }
        self.scanner.rebase();
        self.release_callbacks.invoke(|callback| callback(chunk.data()));
    }
}

impl Default for Tokenizer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn value_of(tokenizer: &Tokenizer, token: &Token) -> Vec<u8> {
        tokenizer.resolve(&token.value).unwrap().to_vec()
    }

    #[test]
    fn single_chunk_object() {
        let mut tokenizer = Tokenizer::new();
        tokenizer.add_chunk(&br#"{"key":"value"}"#[..]);

        let open = tokenizer.next_token().unwrap();
        assert_eq!(open.value_type, TokenType::ObjectStart);
        assert!(open.is_anonymous());

        let member = tokenizer.next_token().unwrap();
        assert_eq!(member.name_type, TokenType::String);
        assert_eq!(tokenizer.resolve(&member.name).unwrap(), b"key");
        assert_eq!(member.value_type, TokenType::String);
        assert_eq!(value_of(&tokenizer, &member), b"value");

        let close = tokenizer.next_token().unwrap();
        assert_eq!(close.value_type, TokenType::ObjectEnd);

        assert_eq!(tokenizer.next_token(), Err(Error::NeedMoreData));
    }

    #[test]
    fn contained_token_is_zero_copy() {
        let mut tokenizer = Tokenizer::new();
        tokenizer.add_chunk(&br#"{"key":"value"}"#[..]);
        tokenizer.next_token().unwrap();
        let member = tokenizer.next_token().unwrap();

        // Both spans reference the chunk at their original offsets.
        match &member.value {
            Span::Borrowed(slice) => {
                assert_eq!(slice.chunk_idx, 0);
                assert_eq!(slice.start, 8);
                assert_eq!(slice.end, 13);
            }
            Span::Owned(_) => panic!("value inside one chunk must borrow"),
        }
    }

    #[test]
    fn straddling_token_is_reassembled() {
        let mut tokenizer = Tokenizer::new();
        tokenizer.add_chunk(&br#"{"key":"val"#[..]);
        tokenizer.next_token().unwrap();

        assert_eq!(tokenizer.next_token(), Err(Error::NeedMoreData));

        tokenizer.add_chunk(&br#"ue"}"#[..]);
        let member = tokenizer.next_token().unwrap();
        assert!(matches!(member.value, Span::Owned(_)));
        assert_eq!(value_of(&tokenizer, &member), b"value");
        assert_eq!(tokenizer.resolve(&member.name).unwrap(), b"key");
    }

    #[test]
    fn need_more_data_callback_feeds_synchronously() {
        let mut tokenizer = Tokenizer::new();
        tokenizer.add_chunk(&br#"{"a":"#[..]);
        tokenizer.next_token().unwrap();

        let sub = tokenizer.register_need_more_data_callback({
            let mut fed = false;
            move |queue| {
                if !fed {
                    queue.push(b"1} ".to_vec());
                    fed = true;
                }
            }
        });
        let member = tokenizer.next_token().unwrap();
        assert_eq!(value_of(&tokenizer, &member), b"1");
        assert_eq!(member.value_type, TokenType::Number);
        drop(sub);
    }

    #[test]
    fn transformer_runs_on_every_token() {
        let mut tokenizer = Tokenizer::new();
        tokenizer.add_chunk(&b"[1,2]"[..]);
        tokenizer.register_token_transformer(|token| {
            if token.value_type == TokenType::Number {
                token.value = Span::Owned(Box::from(&b"0"[..]));
            }
        });
        tokenizer.next_token().unwrap();
        let first = tokenizer.next_token().unwrap();
        assert_eq!(value_of(&tokenizer, &first), b"0");
    }

    #[test]
    fn error_context_points_at_failure() {
        let mut tokenizer = Tokenizer::new();
        tokenizer.add_chunk(&b"{\n  \"a\" % 1\n}"[..]);
        tokenizer.next_token().unwrap();
        assert_eq!(tokenizer.next_token(), Err(Error::ExpectedDelimiter));

        let rendered = tokenizer.make_error_string();
        assert!(rendered.contains("expected delimiter"));
        assert!(rendered.contains("\"a\" % 1"));
        assert!(rendered.contains("^"));
    }
}
