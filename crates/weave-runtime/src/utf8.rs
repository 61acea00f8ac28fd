//! Byte level UTF-8 decoding and encoding.
//!
//! Decoding is stricter than [`std::str::from_utf8`], only code points which are safe to embed
//! in XML documents are accepted. Encoding is the exact inverse of the decoding table and picks
//! the shortest sequence for a code point.

use std::{fmt::Display, ops::RangeInclusive};

/// Shape of one encoded sequence length.
#[derive(Clone, Copy, Debug)]
struct Encoding {
    len: usize,
    /// Bits of the leading byte that identify the sequence length.
    lead_mask: u8,
    lead_tag: u8,
    min: u32,
    max: u32,
}

impl Encoding {
    fn matches_lead(&self, byte: u8) -> bool {
        byte & self.lead_mask == self.lead_tag
    }
}

const CONTINUATION_MASK: u8 = 0b1100_0000;
const CONTINUATION_TAG: u8 = 0b1000_0000;
const CONTINUATION_BITS: u32 = 6;

#[rustfmt::skip]
const ENCODINGS: [Encoding; 4] = [
    // 0xxxxxxx
    Encoding { len: 1, lead_mask: 0b1000_0000, lead_tag: 0b0000_0000, min: 0x0,      max: 0x7F },
    // 110xxxxx 10xxxxxx
    Encoding { len: 2, lead_mask: 0b1110_0000, lead_tag: 0b1100_0000, min: 0x80,     max: 0x7FF },
    // 1110xxxx 10xxxxxx 10xxxxxx
    Encoding { len: 3, lead_mask: 0b1111_0000, lead_tag: 0b1110_0000, min: 0x800,    max: 0xFFFF },
    // 11110xxx 10xxxxxx 10xxxxxx 10xxxxxx
    Encoding { len: 4, lead_mask: 0b1111_1000, lead_tag: 0b1111_0000, min: 0x1_0000, max: 0x1F_FFFF },
];

/// <http://en.wikipedia.org/wiki/Valid_characters_in_XML#Non-restricted_characters>
#[rustfmt::skip]
pub const XML_SAFE_RANGES: &[RangeInclusive<u32>] = &[
    // the only C0 controls acceptable in XML 1.0 and 1.1
    0x0009..=0x000A,
    0x000D..=0x000D,
    // Basic Latin without the last C0 control
    0x0020..=0x007E,
    // the only C1 control accepted by both XML 1.0 and 1.1
    0x0085..=0x0085,
    // rest of the BMP, without non-characters and surrogates
    0x00A0..=0xD7FF,
    0xE000..=0xFDCF,
    0xFDE0..=0xFFFD,
    // supplementary planes, without the two non-characters at the end of each
    0x1_0000..=0x1_FFFD,
    0x2_0000..=0x2_FFFD,
    0x3_0000..=0x3_FFFD,
    0x4_0000..=0x4_FFFD,
    0x5_0000..=0x5_FFFD,
    0x6_0000..=0x6_FFFD,
    0x7_0000..=0x7_FFFD,
    0x8_0000..=0x8_FFFD,
    0x9_0000..=0x9_FFFD,
    0xA_0000..=0xA_FFFD,
    0xB_0000..=0xB_FFFD,
    0xC_0000..=0xC_FFFD,
    0xD_0000..=0xD_FFFD,
    0xE_0000..=0xE_FFFD,
    0xF_0000..=0xF_FFFD,
    0x10_0000..=0x10_FFFD,
];

const SURROGATES: RangeInclusive<u32> = 0xD800..=0xDFFF;

pub fn is_xml_safe(codepoint: u32) -> bool {
    XML_SAFE_RANGES
        .iter()
        .any(|range| range.contains(&codepoint))
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Decoded {
    pub codepoint: u32,
    /// Length of the encoded sequence in bytes.
    pub len: usize,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum DecodeError {
    EndOfInput,
    IllegalLeadingByte(u8),
    Truncated,
    IllegalContinuationByte(u8),
    /// The code point fits in a shorter sequence.
    Overlong(u32),
    Surrogate(u32),
    /// Well formed, but outside of [`XML_SAFE_RANGES`].
    Unsafe(u32),
}

impl std::error::Error for DecodeError {}
impl Display for DecodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match *self {
            DecodeError::EndOfInput => write!(f, "unexpected end of input"),
            DecodeError::IllegalLeadingByte(b) => write!(f, "illegal leading byte 0x{b:02X}"),
            DecodeError::Truncated => write!(f, "truncated sequence"),
            DecodeError::IllegalContinuationByte(b) => {
                write!(f, "illegal continuation byte 0x{b:02X}")
            }
            DecodeError::Overlong(c) => write!(f, "overlong encoding of U+{c:04X}"),
            DecodeError::Surrogate(c) => write!(f, "encoded surrogate U+{c:04X}"),
            DecodeError::Unsafe(c) => write!(f, "disallowed code point U+{c:04X}"),
        }
    }
}

/// Decodes exactly one character starting at `pos`.
pub fn decode(input: &[u8], pos: usize) -> Result<Decoded, DecodeError> {
    let rest = input.get(pos..).unwrap_or_default();
    let Some(&lead) = rest.first() else {
        return Err(DecodeError::EndOfInput);
    };

    let encoding = ENCODINGS
        .iter()
        .find(|e| e.matches_lead(lead))
        .ok_or(DecodeError::IllegalLeadingByte(lead))?;

    let Some(bytes) = rest.get(..encoding.len) else {
        return Err(DecodeError::Truncated);
    };

    let mut codepoint = u32::from(lead & !encoding.lead_mask);
    for &byte in &bytes[1..] {
        if byte & CONTINUATION_MASK != CONTINUATION_TAG {
            return Err(DecodeError::IllegalContinuationByte(byte));
        }
        codepoint = (codepoint << CONTINUATION_BITS) | u32::from(byte & !CONTINUATION_MASK);
    }

    if codepoint < encoding.min {
        return Err(DecodeError::Overlong(codepoint));
    }
    if SURROGATES.contains(&codepoint) {
        return Err(DecodeError::Surrogate(codepoint));
    }
    if !is_xml_safe(codepoint) {
        return Err(DecodeError::Unsafe(codepoint));
    }

    Ok(Decoded {
        codepoint,
        len: encoding.len,
    })
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct EncodeError(pub u32);

impl std::error::Error for EncodeError {}
impl Display for EncodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "code point 0x{:X} cannot be encoded in UTF-8", self.0)
    }
}

/// Encodes a code point using the shortest possible sequence.
///
/// Surrogates and other code points rejected by [`decode`] are still encoded, only values which
/// do not fit into four bytes are an error.
pub fn encode(codepoint: u32) -> Result<Vec<u8>, EncodeError> {
    let encoding = ENCODINGS
        .iter()
        .find(|e| codepoint <= e.max)
        .ok_or(EncodeError(codepoint))?;

    let mut out = vec![0; encoding.len];
    let mut rest = codepoint;
    for byte in out[1..].iter_mut().rev() {
        *byte = CONTINUATION_TAG | (rest & 0x3F) as u8;
        rest >>= CONTINUATION_BITS;
    }
    out[0] = encoding.lead_tag | rest as u8;

    Ok(out)
}
