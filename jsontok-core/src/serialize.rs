//! Chunked JSON serializer.
//!
//! The serializer writes token views into caller-supplied buffers and never
//! allocates output storage itself. When the current buffer fills up it
//! invokes the registered request-buffer callbacks, which may append fresh
//! buffers so the write continues; [`Serializer::write`] returns `false`
//! only when every buffer is exhausted and no callback supplied another.

use crate::token::{TokenType, TokenView};

static SPACES: &[u8] = &[b' '; 32];

/// Output formatting knobs. `Copy`, so a serializer can be re-seeded with a
/// tweaked copy (e.g. a different starting depth) between documents.
#[derive(Debug, Clone, Copy)]
pub struct SerializerOptions {
    pretty: bool,
    convert_ascii_to_string: bool,
    shift_size: u8,
    depth: u16,
    token_delimiter: &'static str,
    value_delimiter: &'static str,
    postfix: &'static str,
}

impl SerializerOptions {
    /// Human-readable output: indentation, `" : "` between name and value,
    /// one token per line.
    pub fn pretty() -> Self {
        Self {
            pretty: true,
            convert_ascii_to_string: true,
            shift_size: 4,
            depth: 0,
            token_delimiter: ",",
            value_delimiter: " : ",
            postfix: "\n",
        }
    }

    /// Minimal output: no whitespace at all.
    pub fn compact() -> Self {
        Self {
            pretty: false,
            convert_ascii_to_string: true,
            shift_size: 4,
            depth: 0,
            token_delimiter: ",",
            value_delimiter: ":",
            postfix: "",
        }
    }

    pub fn is_pretty(&self) -> bool {
        self.pretty
    }

    pub fn set_pretty(&mut self, pretty: bool) {
        self.pretty = pretty;
        self.value_delimiter = if pretty { " : " } else { ":" };
        self.postfix = if pretty { "\n" } else { "" };
    }

    /// Whether bare-word tokens are quoted on output so the result is
    /// standard JSON. On by default.
    pub fn convert_ascii_to_string(&self) -> bool {
        self.convert_ascii_to_string
    }

    pub fn set_convert_ascii_to_string(&mut self, convert: bool) {
        self.convert_ascii_to_string = convert;
    }

    /// Current nesting depth; drives indentation in pretty mode. Seed it
    /// when serializing a sub-tree that logically sits below the root.
    pub fn depth(&self) -> u16 {
        self.depth
    }

    pub fn set_depth(&mut self, depth: u16) {
        self.depth = depth;
    }

    pub fn shift_size(&self) -> u8 {
        self.shift_size
    }

    pub fn set_shift_size(&mut self, shift_size: u8) {
        self.shift_size = shift_size;
    }

    /// Separator written between sibling tokens. `","` by default.
    pub fn token_delimiter(&self) -> &'static str {
        self.token_delimiter
    }

    pub fn set_token_delimiter(&mut self, delimiter: &'static str) {
        self.token_delimiter = delimiter;
    }
}

impl Default for SerializerOptions {
    fn default() -> Self {
        Self::compact()
    }
}

/// A caller-supplied output buffer. The capacity observed when the buffer
/// was appended is the hard limit; the serializer never reallocates it.
#[derive(Debug)]
pub struct SerializerBuffer {
    buffer: Vec<u8>,
    capacity: usize,
}

impl SerializerBuffer {
    fn new(buffer: Vec<u8>) -> Self {
        let capacity = buffer.capacity();
        Self { buffer, capacity }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.buffer
    }

    pub fn used(&self) -> usize {
        self.buffer.len()
    }

    pub fn free(&self) -> usize {
        self.capacity - self.buffer.len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.buffer
    }

    /// Append at most `free()` bytes; returns how many were taken.
    fn append(&mut self, data: &[u8]) -> usize {
        let take = data.len().min(self.free());
        self.buffer.extend_from_slice(&data[..take]);
        take
    }
}

type RequestBufferCallback = Box<dyn FnMut(&mut Serializer)>;
type ViewTransformer = Box<dyn for<'b> FnMut(&mut TokenView<'b>)>;

/// Token-to-bytes serializer. See the module docs for the buffer contract.
pub struct Serializer {
    options: SerializerOptions,
    buffers: Vec<SerializerBuffer>,
    current: usize,
    first: bool,
    token_start: bool,
    request_buffer_callbacks: Vec<RequestBufferCallback>,
    transformer: Option<ViewTransformer>,
}

impl Serializer {
    pub fn new(options: SerializerOptions) -> Self {
        Self {
            options,
            buffers: Vec::new(),
            current: 0,
            first: true,
            token_start: true,
            request_buffer_callbacks: Vec::new(),
            transformer: None,
        }
    }

    pub fn options(&self) -> &SerializerOptions {
        &self.options
    }

    pub fn options_mut(&mut self) -> &mut SerializerOptions {
        &mut self.options
    }

    /// Hand the serializer an output buffer. Its pre-reserved capacity is
    /// the write limit; its existing length counts as already used.
    pub fn append_buffer(&mut self, buffer: Vec<u8>) {
        self.buffers.push(SerializerBuffer::new(buffer));
    }

    /// The callback fires when all appended buffers are full; it may call
    /// [`Serializer::append_buffer`] to keep the write going.
    pub fn add_request_buffer_callback(&mut self, callback: impl FnMut(&mut Serializer) + 'static) {
        self.request_buffer_callbacks.push(Box::new(callback));
    }

    /// Post-processing hook applied to every token view before writing.
    pub fn set_transformer(&mut self, transformer: impl for<'b> FnMut(&mut TokenView<'b>) + 'static) {
        self.transformer = Some(Box::new(transformer));
    }

    pub fn buffers(&self) -> &[SerializerBuffer] {
        &self.buffers
    }

    pub fn take_buffers(&mut self) -> Vec<SerializerBuffer> {
        self.current = 0;
        std::mem::take(&mut self.buffers)
    }

    /// Serialize one token. Returns `false` if output space ran out; bytes
    /// written before exhaustion stay in the buffers.
    pub fn write(&mut self, view: &TokenView<'_>) -> bool {
        let mut view = *view;
        if let Some(transformer) = self.transformer.take() {
            let mut transformer = transformer;
            transformer(&mut view);
            self.transformer = Some(transformer);
        }

        let closing = matches!(view.value_type, TokenType::ObjectEnd | TokenType::ArrayEnd);
        if !self.token_start && !closing && !self.write_bytes(self.options.token_delimiter.as_bytes()) {
            return false;
        }
        if self.first {
            self.first = false;
        } else if !self.write_bytes(self.options.postfix.as_bytes()) {
            return false;
        }
        if closing {
            self.options.depth = self.options.depth.saturating_sub(1);
        }
        if !self.write_indentation() {
            return false;
        }
        if !view.name.is_empty() {
            if !self.write_value(view.name_type, view.name) {
                return false;
            }
            if !self.write_bytes(self.options.value_delimiter.as_bytes()) {
                return false;
            }
        }
        if !self.write_value(view.value_type, view.value) {
            return false;
        }
        match view.value_type {
            TokenType::ObjectStart | TokenType::ArrayStart => {
                self.options.depth = self.options.depth.saturating_add(1);
                self.token_start = true;
            }
            _ => self.token_start = false,
        }
        true
    }

    fn write_value(&mut self, ty: TokenType, data: &[u8]) -> bool {
        match ty {
            TokenType::String => self.write_quoted(data),
            TokenType::Ascii if self.options.convert_ascii_to_string => self.write_quoted(data),
            _ => self.write_bytes(data),
        }
    }

    /// Wrap in quotes unless the bytes already carry them.
    fn write_quoted(&mut self, data: &[u8]) -> bool {
        if data.first() == Some(&b'"') {
            return self.write_bytes(data);
        }
        self.write_bytes(b"\"") && self.write_bytes(data) && self.write_bytes(b"\"")
    }

    fn write_indentation(&mut self) -> bool {
        if !self.options.pretty {
            return true;
        }
        let mut remaining = usize::from(self.options.depth) * usize::from(self.options.shift_size);
        while remaining > 0 {
            let step = remaining.min(SPACES.len());
            if !self.write_bytes(&SPACES[..step]) {
                return false;
            }
            remaining -= step;
        }
        true
    }

    fn write_bytes(&mut self, data: &[u8]) -> bool {
        let mut written = 0;
        while written < data.len() {
            if self.current >= self.buffers.len() {
                self.ask_for_more_buffers();
                if self.current >= self.buffers.len() {
                    return false;
                }
            }
            let taken = self.buffers[self.current].append(&data[written..]);
            written += taken;
            if self.buffers[self.current].free() == 0 {
                self.current += 1;
            }
        }
        true
    }

    /// Callbacks may re-enter the serializer to append buffers, so take
    /// them out for the duration of the call.
    fn ask_for_more_buffers(&mut self) {
        let mut callbacks = std::mem::take(&mut self.request_buffer_callbacks);
        for callback in &mut callbacks {
            callback(self);
        }
        // Merge callbacks registered during invocation.
        callbacks.append(&mut self.request_buffer_callbacks);
        self.request_buffer_callbacks = callbacks;
    }
}

impl Default for Serializer {
    fn default() -> Self {
        Self::new(SerializerOptions::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn collect(serializer: &mut Serializer) -> String {
        let mut out = Vec::new();
        for buffer in serializer.take_buffers() {
            out.extend_from_slice(buffer.bytes());
        }
        String::from_utf8(out).unwrap()
    }

    fn write_small_object(serializer: &mut Serializer) {
        assert!(serializer.write(&TokenView::object_start()));
        assert!(serializer.write(&TokenView::named(b"key", TokenType::Number, b"5")));
        assert!(serializer.write(&TokenView::object_end()));
    }

    #[test]
    fn compact_object() {
        let mut serializer = Serializer::new(SerializerOptions::compact());
        serializer.append_buffer(Vec::with_capacity(64));
        write_small_object(&mut serializer);
        assert_eq!(collect(&mut serializer), r#"{"key":5}"#);
    }

    #[test]
    fn pretty_object() {
        let mut serializer = Serializer::new(SerializerOptions::pretty());
        serializer.append_buffer(Vec::with_capacity(64));
        write_small_object(&mut serializer);
        assert_eq!(collect(&mut serializer), "{\n    \"key\" : 5\n}");
    }

    #[test]
    fn compact_array() {
        let mut serializer = Serializer::new(SerializerOptions::compact());
        serializer.append_buffer(Vec::with_capacity(64));
        assert!(serializer.write(&TokenView::array_start()));
        assert!(serializer.write(&TokenView::unnamed(TokenType::Number, b"1")));
        assert!(serializer.write(&TokenView::unnamed(TokenType::Number, b"2")));
        assert!(serializer.write(&TokenView::array_end()));
        assert_eq!(collect(&mut serializer), "[1,2]");
    }

    #[test]
    fn custom_token_delimiter() {
        let mut options = SerializerOptions::compact();
        options.set_token_delimiter(";");
        let mut serializer = Serializer::new(options);
        serializer.append_buffer(Vec::with_capacity(64));
        assert!(serializer.write(&TokenView::array_start()));
        assert!(serializer.write(&TokenView::unnamed(TokenType::Number, b"1")));
        assert!(serializer.write(&TokenView::unnamed(TokenType::Number, b"2")));
        assert!(serializer.write(&TokenView::array_end()));
        assert_eq!(collect(&mut serializer), "[1;2]");
    }

    #[test]
    fn exhaustion_returns_false_and_keeps_prefix() {
        let mut serializer = Serializer::new(SerializerOptions::compact());
        serializer.append_buffer(Vec::with_capacity(4));
        assert!(serializer.write(&TokenView::object_start()));
        assert!(!serializer.write(&TokenView::named(b"key", TokenType::Number, b"5")));
        let buffers = serializer.take_buffers();
        assert_eq!(buffers.len(), 1);
        assert_eq!(buffers[0].used(), 4);
        assert_eq!(buffers[0].bytes(), b"{\"ke");
    }

    #[test]
    fn request_buffer_callback_extends_output() {
        let mut serializer = Serializer::new(SerializerOptions::compact());
        serializer.append_buffer(Vec::with_capacity(4));
        serializer.add_request_buffer_callback(|serializer| {
            serializer.append_buffer(Vec::with_capacity(4));
        });
        write_small_object(&mut serializer);
        assert_eq!(collect(&mut serializer), r#"{"key":5}"#);
    }

    #[test]
    fn transformer_rewrites_views() {
        let mut serializer = Serializer::new(SerializerOptions::compact());
        serializer.append_buffer(Vec::with_capacity(64));
        serializer.set_transformer(|view| {
            if view.value_type == TokenType::Number {
                view.value = b"0";
            }
        });
        write_small_object(&mut serializer);
        assert_eq!(collect(&mut serializer), r#"{"key":0}"#);
    }

    #[test]
    fn bare_words_are_quoted_by_default() {
        let mut serializer = Serializer::new(SerializerOptions::compact());
        serializer.append_buffer(Vec::with_capacity(64));
        assert!(serializer.write(&TokenView::object_start()));
        assert!(serializer.write(&TokenView::named(b"key", TokenType::Ascii, b"word")));
        assert!(serializer.write(&TokenView::object_end()));
        assert_eq!(collect(&mut serializer), r#"{"key":"word"}"#);
    }
}
