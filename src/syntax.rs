//! Lexical pieces of Go source shared by the type-expression and literal
//! parsers: whitespace, identifiers, number, rune and string literals.

use winnow::combinator::{alt, delimited, opt, preceded};
use winnow::error::{ContextError, ErrMode};
use winnow::prelude::*;
use winnow::token::{any, one_of, take_while};

pub(crate) fn backtrack() -> ErrMode<ContextError> {
    ErrMode::Backtrack(ContextError::new())
}

/// Skip whitespace, newlines included.
pub(crate) fn ws(input: &mut &str) -> ModalResult<()> {
    take_while(0.., char::is_whitespace).void().parse_next(input)
}

/// Skip spaces and tabs. Newlines are significant inside struct and
/// interface bodies, where they separate declarations.
pub(crate) fn hspace(input: &mut &str) -> ModalResult<()> {
    take_while(0.., [' ', '\t', '\r']).void().parse_next(input)
}

/// A Go identifier: a letter or `_`, then letters, digits and `_`.
pub(crate) fn ident<'a>(input: &mut &'a str) -> ModalResult<&'a str> {
    (
        one_of(|c: char| c.is_alphabetic() || c == '_'),
        take_while(0.., |c: char| c.is_alphanumeric() || c == '_'),
    )
        .take()
        .parse_next(input)
}

/// The magnitude of an integer literal in any of Go's bases, with `_`
/// digit separators. Values beyond `u128` saturate.
pub(crate) fn int_lit(input: &mut &str) -> ModalResult<u128> {
    alt((
        preceded(alt(("0x", "0X")), digits(16)),
        preceded(alt(("0o", "0O")), digits(8)),
        preceded(alt(("0b", "0B")), digits(2)),
        preceded('0', digits(8)),
        decimal,
    ))
    .parse_next(input)
}

/// Decimal digits; a leading `0` is only a literal on its own.
fn decimal(input: &mut &str) -> ModalResult<u128> {
    let mut chars = input.chars();
    if chars.next() == Some('0') && chars.next().is_some_and(|c| c.is_ascii_digit() || c == '_') {
        return Err(backtrack());
    }
    digits(10).parse_next(input)
}

fn digits(radix: u32) -> impl FnMut(&mut &str) -> ModalResult<u128> {
    move |input: &mut &str| {
        let text = take_while(1.., |c: char| c.is_digit(radix) || c == '_').parse_next(input)?;
        if text.ends_with('_') || text.contains("__") {
            return Err(backtrack());
        }
        Ok(text
            .chars()
            .filter_map(|c| c.to_digit(radix))
            .fold(0u128, |acc, d| {
                acc.checked_mul(radix as u128)
                    .and_then(|acc| acc.checked_add(d as u128))
                    .unwrap_or(u128::MAX)
            }))
    }
}

fn dec_digits<'a>(input: &mut &'a str) -> ModalResult<&'a str> {
    take_while(1.., |c: char| c.is_ascii_digit() || c == '_').parse_next(input)
}

/// A decimal or hexadecimal floating-point literal. Integer literals are
/// accepted too, as Go accepts untyped integer constants for float types.
pub(crate) fn float_lit(input: &mut &str) -> ModalResult<f64> {
    alt((
        hex_float,
        preceded(alt(("0x", "0X")), digits(16)).map(|n| n as f64),
        preceded(alt(("0o", "0O")), digits(8)).map(|n| n as f64),
        preceded(alt(("0b", "0B")), digits(2)).map(|n| n as f64),
        decimal_float,
    ))
    .parse_next(input)
}

fn exponent<'a>(input: &mut &'a str) -> ModalResult<&'a str> {
    (one_of(['e', 'E']), opt(one_of(['+', '-'])), dec_digits)
        .take()
        .parse_next(input)
}

fn decimal_float(input: &mut &str) -> ModalResult<f64> {
    let text = alt((
        (dec_digits, opt(('.', opt(dec_digits))), opt(exponent)).void(),
        ('.', dec_digits, opt(exponent)).void(),
    ))
    .take()
    .parse_next(input)?;
    text.replace('_', "").parse().map_err(|_| backtrack())
}

/// `0x1.8p3`: a hexadecimal mantissa scaled by a power of two.
fn hex_float(input: &mut &str) -> ModalResult<f64> {
    let _ = alt(("0x", "0X")).parse_next(input)?;
    let whole = take_while(0.., |c: char| c.is_ascii_hexdigit() || c == '_').parse_next(input)?;
    let frac = opt(preceded('.', take_while(0.., |c: char| c.is_ascii_hexdigit() || c == '_')))
        .parse_next(input)?
        .unwrap_or("");
    let _ = one_of(['p', 'P']).parse_next(input)?;
    let sign = opt(one_of(['+', '-'])).parse_next(input)?;
    let exp: i32 = dec_digits
        .parse_to()
        .parse_next(input)?;
    if whole.is_empty() && frac.is_empty() {
        return Err(backtrack());
    }

    let mut mantissa = 0.0f64;
    let mut scale = 0i32;
    for c in whole.chars().filter_map(|c| c.to_digit(16)) {
        mantissa = mantissa * 16.0 + c as f64;
    }
    for c in frac.chars().filter_map(|c| c.to_digit(16)) {
        mantissa = mantissa * 16.0 + c as f64;
        scale -= 4;
    }
    let exp = if sign == Some('-') { -exp } else { exp };
    Ok(mantissa * 2f64.powi(exp.saturating_add(scale)))
}

/// One unit of a quoted literal: a raw byte from a `\x` or octal escape,
/// or a character.
pub(crate) enum Unit {
    Byte(u8),
    Char(char),
}

fn hex_escape(input: &mut &str, len: usize) -> ModalResult<u32> {
    take_while(len, |c: char| c.is_ascii_hexdigit())
        .try_map(|hex| u32::from_str_radix(hex, 16))
        .parse_next(input)
}

/// A backslash escape inside a literal delimited by `quote`.
fn escape(input: &mut &str, quote: char) -> ModalResult<Unit> {
    '\\'.parse_next(input)?;
    let c = any.parse_next(input)?;
    Ok(match c {
        'a' => Unit::Byte(0x07),
        'b' => Unit::Byte(0x08),
        'f' => Unit::Byte(0x0c),
        'n' => Unit::Byte(b'\n'),
        'r' => Unit::Byte(b'\r'),
        't' => Unit::Byte(b'\t'),
        'v' => Unit::Byte(0x0b),
        '\\' => Unit::Byte(b'\\'),
        _ if c == quote => Unit::Char(c),
        'x' => Unit::Byte(hex_escape(input, 2)? as u8),
        'u' => Unit::Char(char::from_u32(hex_escape(input, 4)?).ok_or_else(backtrack)?),
        'U' => Unit::Char(char::from_u32(hex_escape(input, 8)?).ok_or_else(backtrack)?),
        '0'..='7' => {
            let rest = take_while(2, |c: char| ('0'..='7').contains(&c)).parse_next(input)?;
            let n = u32::from_str_radix(&format!("{c}{rest}"), 8).map_err(|_| backtrack())?;
            Unit::Byte(u8::try_from(n).map_err(|_| backtrack())?)
        }
        _ => return Err(backtrack()),
    })
}

fn push_unit(out: &mut Vec<u8>, unit: Unit) {
    match unit {
        Unit::Byte(b) => out.push(b),
        Unit::Char(c) => {
            let mut buf = [0; 4];
            out.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
        }
    }
}

/// An interpreted string literal, `"..."`. Escapes may produce bytes that
/// are not valid UTF-8.
pub(crate) fn string_lit(input: &mut &str) -> ModalResult<Vec<u8>> {
    '"'.parse_next(input)?;
    let mut out = Vec::new();
    loop {
        if input.starts_with('\\') {
            let unit = escape(input, '"')?;
            push_unit(&mut out, unit);
            continue;
        }
        match any.parse_next(input)? {
            '"' => break,
            '\n' => return Err(backtrack()),
            c => push_unit(&mut out, Unit::Char(c)),
        }
    }
    Ok(out)
}

/// A raw string literal, `` `...` ``. Carriage returns are dropped.
pub(crate) fn raw_string_lit(input: &mut &str) -> ModalResult<String> {
    delimited('`', take_while(0.., |c: char| c != '`'), '`')
        .map(|s: &str| s.replace('\r', ""))
        .parse_next(input)
}

/// Either kind of string literal, as bytes.
pub(crate) fn any_string_lit(input: &mut &str) -> ModalResult<Vec<u8>> {
    alt((string_lit, raw_string_lit.map(String::into_bytes))).parse_next(input)
}

/// A rune literal such as `'a'`, `'\n'` or `'é'`, as its code point.
pub(crate) fn rune_lit(input: &mut &str) -> ModalResult<u32> {
    '\''.parse_next(input)?;
    let value = if input.starts_with('\\') {
        match escape(input, '\'')? {
            Unit::Byte(b) => b as u32,
            Unit::Char(c) => c as u32,
        }
    } else {
        match any.parse_next(input)? {
            '\'' | '\n' => return Err(backtrack()),
            c => c as u32,
        }
    };
    '\''.parse_next(input)?;
    Ok(value)
}
