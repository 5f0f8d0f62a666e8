//! Conversions between raw token bytes and Rust values.
//!
//! Token values arrive exactly as they appear in the document: numbers as
//! digit runs, strings with their escapes intact. These helpers do the
//! final hop into native types, and back.

use std::borrow::Cow;

use memchr::memchr;

use crate::error::Error;
use crate::token::{TokenType, TokenView};

pub fn parse_bool(bytes: &[u8]) -> Result<bool, Error> {
    match bytes {
        b"true" => Ok(true),
        b"false" => Ok(false),
        _ => Err(Error::FailedToParseBoolean),
    }
}

pub fn parse_i64(bytes: &[u8]) -> Result<i64, Error> {
    std::str::from_utf8(bytes)
        .ok()
        .and_then(|text| text.parse().ok())
        .ok_or(Error::FailedToParseInt)
}

pub fn parse_u64(bytes: &[u8]) -> Result<u64, Error> {
    std::str::from_utf8(bytes)
        .ok()
        .and_then(|text| text.parse().ok())
        .ok_or(Error::FailedToParseInt)
}

pub fn parse_f64(bytes: &[u8]) -> Result<f64, Error> {
    std::str::from_utf8(bytes)
        .ok()
        .and_then(|text| text.parse().ok())
        .ok_or(Error::FailedToParseDouble)
}

pub fn parse_f32(bytes: &[u8]) -> Result<f32, Error> {
    std::str::from_utf8(bytes)
        .ok()
        .and_then(|text| text.parse().ok())
        .ok_or(Error::FailedToParseFloat)
}

impl<'a> TokenView<'a> {
    /// Interpret the value as a boolean. `Bool` tokens and quoted
    /// `"true"`/`"false"` strings both qualify.
    pub fn to_bool(&self) -> Result<bool, Error> {
        parse_bool(self.value)
    }

    pub fn to_i64(&self) -> Result<i64, Error> {
        parse_i64(self.value)
    }

    pub fn to_u64(&self) -> Result<u64, Error> {
        parse_u64(self.value)
    }

    pub fn to_f64(&self) -> Result<f64, Error> {
        parse_f64(self.value)
    }

    pub fn is_null(&self) -> bool {
        self.value_type == TokenType::Null
    }
}

fn hex_nibble(byte: u8) -> Result<u32, Error> {
    match byte {
        b'0'..=b'9' => Ok(u32::from(byte - b'0')),
        b'a'..=b'f' => Ok(u32::from(byte - b'a') + 10),
        b'A'..=b'F' => Ok(u32::from(byte - b'A') + 10),
        _ => Err(Error::InvalidToken),
    }
}

fn hex_quad(bytes: &[u8]) -> Result<u32, Error> {
    if bytes.len() < 4 {
        return Err(Error::InvalidToken);
    }
    let mut unit = 0;
    for &byte in &bytes[..4] {
        unit = unit << 4 | hex_nibble(byte)?;
    }
    Ok(unit)
}

/// Decode the backslash escapes of a string token's content. Input without
/// a backslash is passed through unchanged.
///
/// `\uXXXX` units are decoded to UTF-8, pairing surrogates; a lone or
/// malformed surrogate fails with [`Error::InvalidToken`].
pub fn unescape(bytes: &[u8]) -> Result<Cow<'_, [u8]>, Error> {
    let Some(first) = memchr(b'\\', bytes) else {
        return Ok(Cow::Borrowed(bytes));
    };

    let mut out = Vec::with_capacity(bytes.len());
    out.extend_from_slice(&bytes[..first]);
    let mut pos = first;
    while pos < bytes.len() {
        if bytes[pos] != b'\\' {
            out.push(bytes[pos]);
            pos += 1;
            continue;
        }
        let Some(&escape) = bytes.get(pos + 1) else {
            return Err(Error::InvalidToken);
        };
        pos += 2;
        match escape {
            b'"' => out.push(b'"'),
            b'\\' => out.push(b'\\'),
            b'/' => out.push(b'/'),
            b'b' => out.push(0x08),
            b'f' => out.push(0x0c),
            b'n' => out.push(b'\n'),
            b'r' => out.push(b'\r'),
            b't' => out.push(b'\t'),
            b'u' => {
                let unit = hex_quad(&bytes[pos..])?;
                pos += 4;
                let scalar = match unit {
                    0xd800..=0xdbff => {
                        // High surrogate: the low half must follow.
                        if bytes.get(pos) != Some(&b'\\') || bytes.get(pos + 1) != Some(&b'u') {
                            return Err(Error::InvalidToken);
                        }
                        let low = hex_quad(&bytes[pos + 2..])?;
                        pos += 6;
                        if !(0xdc00..=0xdfff).contains(&low) {
                            return Err(Error::InvalidToken);
                        }
                        0x10000 + ((unit - 0xd800) << 10) + (low - 0xdc00)
                    }
                    0xdc00..=0xdfff => return Err(Error::InvalidToken),
                    unit => unit,
                };
                let ch = char::from_u32(scalar).ok_or(Error::InvalidToken)?;
                let mut utf8 = [0u8; 4];
                out.extend_from_slice(ch.encode_utf8(&mut utf8).as_bytes());
            }
            _ => return Err(Error::InvalidToken),
        }
    }
    Ok(Cow::Owned(out))
}

/// Escape bytes for embedding in a JSON string literal. Input needing no
/// escapes is passed through unchanged.
pub fn escape(bytes: &[u8]) -> Cow<'_, [u8]> {
    let needs_escape = |byte: u8| byte == b'"' || byte == b'\\' || byte < 0x20;
    if !bytes.iter().copied().any(needs_escape) {
        return Cow::Borrowed(bytes);
    }

    let mut out = Vec::with_capacity(bytes.len() + 8);
    for &byte in bytes {
        match byte {
            b'"' => out.extend_from_slice(b"\\\""),
            b'\\' => out.extend_from_slice(b"\\\\"),
            0x08 => out.extend_from_slice(b"\\b"),
            0x0c => out.extend_from_slice(b"\\f"),
            b'\n' => out.extend_from_slice(b"\\n"),
            b'\r' => out.extend_from_slice(b"\\r"),
            b'\t' => out.extend_from_slice(b"\\t"),
            byte if byte < 0x20 => {
                const HEX: &[u8; 16] = b"0123456789abcdef";
                out.extend_from_slice(b"\\u00");
                out.push(HEX[usize::from(byte >> 4)]);
                out.push(HEX[usize::from(byte & 0x0f)]);
            }
            byte => out.push(byte),
        }
    }
    Cow::Owned(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Builds the six-byte `backslash-u-XXXX` escape for `hex`.
    fn unicode_escape(hex: &str) -> Vec<u8> {
        let mut out = vec![b'\\', b'u'];
        out.extend_from_slice(hex.as_bytes());
        out
    }

    #[test]
    fn numbers_parse() {
        assert_eq!(parse_i64(b"-42"), Ok(-42));
        assert_eq!(parse_u64(b"42"), Ok(42));
        assert_eq!(parse_f64(b"1.5e3"), Ok(1500.0));
        assert_eq!(parse_i64(b"1.5"), Err(Error::FailedToParseInt));
        assert_eq!(parse_f64(b"abc"), Err(Error::FailedToParseDouble));
    }

    #[test]
    fn booleans_parse() {
        assert_eq!(parse_bool(b"true"), Ok(true));
        assert_eq!(parse_bool(b"false"), Ok(false));
        assert_eq!(parse_bool(b"yes"), Err(Error::FailedToParseBoolean));
    }

    #[test]
    fn unescape_passthrough_borrows() {
        let out = unescape(b"plain text").unwrap();
        assert!(matches!(out, Cow::Borrowed(_)));
        assert_eq!(&*out, b"plain text");
    }

    #[test]
    fn unescape_simple_escapes() {
        let out = unescape(br#"a\"b\\c\nd\te"#).unwrap();
        assert_eq!(&*out, b"a\"b\\c\nd\te");
    }

    #[test]
    fn unescape_unicode() {
        assert_eq!(&*unescape(&unicode_escape("0041")).unwrap(), b"A");
        assert_eq!(&*unescape(&unicode_escape("00e9")).unwrap(), "\u{e9}".as_bytes());
        // Surrogate pair for U+1F600.
        let mut pair = unicode_escape("d83d");
        pair.extend_from_slice(&unicode_escape("de00"));
        assert_eq!(&*unescape(&pair).unwrap(), "\u{1f600}".as_bytes());
    }

    #[test]
    fn unescape_rejects_bad_input() {
        assert_eq!(unescape(br"\q").unwrap_err(), Error::InvalidToken);
        assert_eq!(unescape(br"\u12").unwrap_err(), Error::InvalidToken);
        assert_eq!(unescape(br"\ud83d").unwrap_err(), Error::InvalidToken);
        assert_eq!(unescape(br"\ude00").unwrap_err(), Error::InvalidToken);
        assert_eq!(unescape(b"trailing\\").unwrap_err(), Error::InvalidToken);
    }

    #[test]
    fn escape_round_trips() {
        let escaped = escape(b"a\"b\\c\nd\x01");
        let mut expected = br#"a\"b\\c\nd"#.to_vec();
        expected.extend_from_slice(&unicode_escape("0001"));
        assert_eq!(&*escaped, &expected[..]);
        assert_eq!(&*unescape(&escaped).unwrap(), b"a\"b\\c\nd\x01");
    }
}
