//! Byte-order-mark detection and text decoding for statement and balance
//! exports.
//!
//! Trading platforms write their HTML statements as UTF-16 on Windows and the
//! balance CSVs as either UTF-16 or UTF-8. Decoding is total: any byte
//! sequence produces text, with malformed sequences replaced by U+FFFD.

use encoding_rs::{UTF_8, UTF_16BE, UTF_16LE};
use std::fmt;

const UTF16_LE_MARKER: [u8; 2] = [0xFF, 0xFE];
const UTF16_BE_MARKER: [u8; 2] = [0xFE, 0xFF];
const UTF8_MARKER: [u8; 3] = [0xEF, 0xBB, 0xBF];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextEncoding {
    Utf8,
    Utf16Le,
    Utf16Be,
}

impl fmt::Display for TextEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TextEncoding::Utf8 => write!(f, "UTF-8"),
            TextEncoding::Utf16Le => write!(f, "UTF-16LE"),
            TextEncoding::Utf16Be => write!(f, "UTF-16BE"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedText {
    pub text: String,
    pub encoding: TextEncoding,
}

/// Detect the encoding from the leading marker bytes and decode the rest.
///
/// The marker itself never appears in the returned text.
pub fn decode(bytes: &[u8]) -> DecodedText {
    let (encoding, body) = if bytes.starts_with(&UTF16_LE_MARKER) {
        (TextEncoding::Utf16Le, &bytes[UTF16_LE_MARKER.len()..])
    } else if bytes.starts_with(&UTF16_BE_MARKER) {
        (TextEncoding::Utf16Be, &bytes[UTF16_BE_MARKER.len()..])
    } else if bytes.starts_with(&UTF8_MARKER) {
        (TextEncoding::Utf8, &bytes[UTF8_MARKER.len()..])
    } else {
        (TextEncoding::Utf8, bytes)
    };

    let codec = match encoding {
        TextEncoding::Utf8 => UTF_8,
        TextEncoding::Utf16Le => UTF_16LE,
        TextEncoding::Utf16Be => UTF_16BE,
    };
    let (text, _had_errors) = codec.decode_without_bom_handling(body);

    DecodedText {
        text: text.into_owned(),
        encoding,
    }
}
