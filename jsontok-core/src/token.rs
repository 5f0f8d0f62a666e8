//! Token model.
//!
//! A token is one name/value structural unit: a property with its value, an
//! anonymous array element, or a single structural bracket. The tokenizer
//! emits tokens whose spans index into its chunk queue; [`TokenView`] is the
//! resolved form that the serializer and binding code operate on.

use crate::span::Span;

/// Structural classification of a token's name or value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum TokenType {
    Error = 0,
    String,
    /// Bare ASCII word - an unquoted property name or literal value.
    Ascii,
    Number,
    ObjectStart,
    ObjectEnd,
    ArrayStart,
    ArrayEnd,
    Bool,
    Null,
}

impl TokenType {
    /// True for the four single-byte bracket types.
    #[inline]
    pub fn is_structural(self) -> bool {
        matches!(
            self,
            TokenType::ObjectStart | TokenType::ObjectEnd | TokenType::ArrayStart | TokenType::ArrayEnd
        )
    }
}

/// Reclassify a finished `Ascii` span as `Null` or `Bool` when it is exactly
/// one of the three JSON literals. Case-sensitive, exact length.
pub(crate) fn reclassify(ty: TokenType, bytes: &[u8]) -> TokenType {
    if ty != TokenType::Ascii {
        return ty;
    }
    match bytes {
        b"null" => TokenType::Null,
        b"true" | b"false" => TokenType::Bool,
        _ => TokenType::Ascii,
    }
}

/// One name/value unit produced by the tokenizer.
///
/// Anonymous tokens (array elements, top-level values, brackets) carry an
/// empty name with `name_type == Ascii`; an empty name with
/// `name_type == String` is a genuine empty-string key.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub name: Span,
    pub name_type: TokenType,
    pub value: Span,
    pub value_type: TokenType,
}

impl Token {
    pub(crate) fn anonymous(value: Span, value_type: TokenType) -> Self {
        Self {
            name: Span::empty(),
            name_type: TokenType::Ascii,
            value,
            value_type,
        }
    }

    /// Anonymous tokens have an empty name of `Ascii` type.
    pub fn is_anonymous(&self) -> bool {
        self.name.is_empty() && self.name_type == TokenType::Ascii
    }
}

impl Default for TokenType {
    fn default() -> Self {
        TokenType::Error
    }
}

impl Default for Token {
    fn default() -> Self {
        Self::anonymous(Span::empty(), TokenType::Error)
    }
}

/// A token with its spans resolved to byte slices.
///
/// This is what the serializer writes and what binding code inspects. Views
/// produced by [`crate::Tokenizer::view`] borrow from the tokenizer; views
/// fabricated by serialization code usually borrow static bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenView<'a> {
    pub name: &'a [u8],
    pub name_type: TokenType,
    pub value: &'a [u8],
    pub value_type: TokenType,
}

impl<'a> TokenView<'a> {
    /// A named member, e.g. a struct field about to be serialized.
    pub fn named(name: &'a [u8], value_type: TokenType, value: &'a [u8]) -> Self {
        Self {
            name,
            name_type: TokenType::Ascii,
            value,
            value_type,
        }
    }

    /// An anonymous value (array element or top-level).
    pub fn unnamed(value_type: TokenType, value: &'a [u8]) -> Self {
        Self::named(b"", value_type, value)
    }

    pub fn object_start() -> TokenView<'static> {
        TokenView::unnamed(TokenType::ObjectStart, b"{")
    }

    pub fn object_end() -> TokenView<'static> {
        TokenView::unnamed(TokenType::ObjectEnd, b"}")
    }

    pub fn array_start() -> TokenView<'static> {
        TokenView::unnamed(TokenType::ArrayStart, b"[")
    }

    pub fn array_end() -> TokenView<'static> {
        TokenView::unnamed(TokenType::ArrayEnd, b"]")
    }
}
