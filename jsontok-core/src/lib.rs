//! jsontok Core
//!
//! Streaming, pull-based JSON tokenizer and chunked serializer. Produces
//! name/value token pairs without building an AST, borrowing token bytes
//! from the caller's input chunks wherever a token fits in one chunk.
//!
//! # Architecture
//!
//! - **chunk.rs** - Input chunk FIFO with stable chunk indices
//! - **span.rs** - Borrowed/owned token spans
//! - **token.rs** - Token types, tokens, resolved token views
//! - **tokenizer.rs** - The incremental state machine
//! - **serialize.rs** - Token-to-bytes serializer over caller buffers
//! - **value.rs** - Scalar conversions, string escape/unescape
//! - **error.rs** - Error codes and diagnostic excerpts
//! - **callback.rs** - Subscription-managed callback slots

pub mod callback;
pub mod chunk;
pub mod error;
pub mod serialize;
pub mod span;
pub mod token;
pub mod tokenizer;
pub mod value;

pub use callback::Subscription;
pub use chunk::{Chunk, ChunkQueue};
pub use error::{Error, ErrorContext};
pub use serialize::{Serializer, SerializerBuffer, SerializerOptions};
pub use span::{ChunkSlice, Span};
pub use token::{Token, TokenType, TokenView};
pub use tokenizer::{CaptureHandle, RawValueMark, Tokenizer};
