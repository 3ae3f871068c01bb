//! UTF-8 encoding and decoding of runes over byte strings.
//!
//! Strings are raw byte sequences, so decoding is tolerant: every malformed
//! sequence decodes to [`REPLACEMENT`] consuming a single byte.

use smallvec::SmallVec;

pub const REPLACEMENT: i32 = 0xFFFD;

const MAX_RUNE: i64 = 0x10FFFF;

/// Encoded form of a single rune. Never longer than four bytes.
pub type EncodedRune = SmallVec<[u8; 4]>;

fn is_continuation(byte: Option<&u8>) -> Option<u32> {
    match byte {
        Some(&b) if (0x80..0xC0).contains(&b) => Some((b & 0x3F) as u32),
        _ => None,
    }
}

/// Decode the rune starting at `pos`, returning it with its width in bytes.
///
/// `pos` must be in bounds.
pub fn decode_rune(bytes: &[u8], pos: usize) -> (i32, usize) {
    const INVALID: (i32, usize) = (REPLACEMENT, 1);

    let c0 = bytes[pos] as u32;
    if c0 < 0x80 {
        return (c0 as i32, 1);
    }
    if c0 < 0xC0 {
        return INVALID;
    }

    let Some(c1) = is_continuation(bytes.get(pos + 1)) else {
        return INVALID;
    };
    if c0 < 0xE0 {
        let r = (c0 & 0x1F) << 6 | c1;
        return if r <= 0x7F { INVALID } else { (r as i32, 2) };
    }

    let Some(c2) = is_continuation(bytes.get(pos + 2)) else {
        return INVALID;
    };
    if c0 < 0xF0 {
        let r = (c0 & 0x0F) << 12 | c1 << 6 | c2;
        if r <= 0x7FF || (0xD800..=0xDFFF).contains(&r) {
            return INVALID;
        }
        return (r as i32, 3);
    }

    let Some(c3) = is_continuation(bytes.get(pos + 3)) else {
        return INVALID;
    };
    if c0 < 0xF8 {
        let r = (c0 & 0x07) << 18 | c1 << 12 | c2 << 6 | c3;
        if r <= 0xFFFF || r as i64 > MAX_RUNE {
            return INVALID;
        }
        return (r as i32, 4);
    }
    INVALID
}

/// Encode a code point. Out-of-range values and surrogates encode as
/// [`REPLACEMENT`].
pub fn encode_rune(r: i64) -> EncodedRune {
    let r = if !(0..=MAX_RUNE).contains(&r) || (0xD800..=0xDFFF).contains(&r) {
        REPLACEMENT as u32
    } else {
        r as u32
    };
    let mut out = EncodedRune::new();
    if r <= 0x7F {
        out.push(r as u8);
    } else if r <= 0x7FF {
        out.extend([0xC0 | (r >> 6) as u8, 0x80 | (r & 0x3F) as u8]);
    } else if r <= 0xFFFF {
        out.extend([
            0xE0 | (r >> 12) as u8,
            0x80 | (r >> 6 & 0x3F) as u8,
            0x80 | (r & 0x3F) as u8,
        ]);
    } else {
        out.extend([
            0xF0 | (r >> 18) as u8,
            0x80 | (r >> 12 & 0x3F) as u8,
            0x80 | (r >> 6 & 0x3F) as u8,
            0x80 | (r & 0x3F) as u8,
        ]);
    }
    out
}

pub fn string_to_runes(bytes: &[u8]) -> Vec<i32> {
    let mut runes = Vec::with_capacity(bytes.len());
    let mut pos = 0;
    while pos < bytes.len() {
        let (rune, width) = decode_rune(bytes, pos);
        runes.push(rune);
        pos += width;
    }
    runes
}

pub fn runes_to_string(runes: impl IntoIterator<Item = i32>) -> Vec<u8> {
    let mut bytes = Vec::new();
    for rune in runes {
        bytes.extend(encode_rune(rune as i64));
    }
    bytes
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_each_width() {
        assert_eq!(encode_rune('A' as i64).as_slice(), b"A");
        assert_eq!(encode_rune('é' as i64).as_slice(), "é".as_bytes());
        assert_eq!(encode_rune('€' as i64).as_slice(), "€".as_bytes());
        assert_eq!(encode_rune('😀' as i64).as_slice(), "😀".as_bytes());
    }

    #[test]
    fn invalid_code_points_become_replacement() {
        let replacement = "\u{FFFD}".as_bytes();
        assert_eq!(encode_rune(-1).as_slice(), replacement);
        assert_eq!(encode_rune(0xD800).as_slice(), replacement);
        assert_eq!(encode_rune(0x110000).as_slice(), replacement);
    }

    #[test]
    fn malformed_input_decodes_byte_by_byte() {
        assert_eq!(decode_rune(b"\xC0\x80", 0), (REPLACEMENT, 1));
        assert_eq!(decode_rune(b"\xE2\x82", 0), (REPLACEMENT, 1));
        assert_eq!(decode_rune(b"\xED\xA0\x80", 0), (REPLACEMENT, 1));
        assert_eq!(string_to_runes(b"a\xFFb"), vec![97, REPLACEMENT, 98]);
    }

    #[test]
    fn valid_strings_round_trip() {
        for text in ["", "plain", "héllo wörld", "日本語", "emoji 😀 mix"] {
            let runes = string_to_runes(text.as_bytes());
            assert_eq!(runes.len(), text.chars().count());
            assert_eq!(runes_to_string(runes), text.as_bytes());
        }
    }
}
