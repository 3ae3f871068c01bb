//! Source literals for the `convert` command.

use derive_more::Display;
use gossamer_runtime::numeric::fround;
use gossamer_runtime::{Complex, GoStr, Kind, Type, Value, Word64};
use winnow::combinator::{alt, delimited, opt};
use winnow::error::ContextError;
use winnow::prelude::*;
use winnow::token::one_of;

use crate::syntax::{any_string_lit, float_lit, int_lit, rune_lit, ws};

#[derive(Clone, Debug, PartialEq, Eq, Display)]
pub enum LiteralError {
    #[display("cannot parse {text:?} as {ty}")]
    Malformed { text: String, ty: String },

    #[display("constant {text} overflows {ty}")]
    Overflow { text: String, ty: String },

    #[display("no literal syntax for values of type {_0}")]
    Unsupported(String),
}

impl std::error::Error for LiteralError {}

/// Parse `text` as a constant of type `ty`.
///
/// Integers accept every Go integer literal form and rune literals such as
/// `'é'`. Strings may be given bare, double-quoted or backquoted.
pub fn parse_literal(ty: Type, text: &str) -> Result<Value, LiteralError> {
    let text = text.trim();
    let malformed = || LiteralError::Malformed {
        text: text.to_string(),
        ty: ty.to_string(),
    };
    let overflow = || LiteralError::Overflow {
        text: text.to_string(),
        ty: ty.to_string(),
    };

    let kind = ty.kind();
    match kind {
        Kind::Bool => alt::<_, _, ContextError, _>(("true".value(true), "false".value(false)))
            .parse(text)
            .map(Value::Bool)
            .map_err(|_| malformed()),
        Kind::String => Ok(Value::Str(string_value(text).ok_or_else(malformed)?)),
        k if k.is_integer() => {
            let n = signed_int.parse(text).map_err(|_| malformed())?;
            let (min, max) = integer_range(kind, ty.size());
            if n < min || n > max {
                return Err(overflow());
            }
            Ok(match kind {
                Kind::Int64 | Kind::Uint64 => Value::Word64(Word64::from_bits(n as u64)),
                _ => Value::Number(n as f64),
            })
        }
        Kind::Float32 => Ok(Value::Number(fround(
            signed_float.parse(text).map_err(|_| malformed())?,
        ))),
        Kind::Float64 => Ok(Value::Number(signed_float.parse(text).map_err(|_| malformed())?)),
        Kind::Complex64 | Kind::Complex128 => {
            let c = complex.parse(text).map_err(|_| malformed())?;
            Ok(Value::Complex(if kind == Kind::Complex64 {
                c.narrowed()
            } else {
                c
            }))
        }
        _ => Err(LiteralError::Unsupported(ty.to_string())),
    }
}

fn integer_range(kind: Kind, size: u32) -> (i128, i128) {
    let bits = size * 8;
    if kind.is_signed() {
        (-(1i128 << (bits - 1)), (1i128 << (bits - 1)) - 1)
    } else {
        (0, (1i128 << bits) - 1)
    }
}

fn sign(input: &mut &str) -> ModalResult<bool> {
    Ok(opt(one_of(['+', '-'])).parse_next(input)? == Some('-'))
}

/// An optionally signed integer or rune literal. Magnitudes beyond `i128`
/// saturate, which still reports as overflow.
fn signed_int(input: &mut &str) -> ModalResult<i128> {
    let negative = sign(input)?;
    let magnitude = alt((int_lit, rune_lit.map(u128::from))).parse_next(input)?;
    let n = i128::try_from(magnitude).unwrap_or(i128::MAX);
    Ok(if negative { -n } else { n })
}

/// An optionally signed float, or one of `Inf`, `+Inf`, `-Inf` and `NaN`.
fn signed_float(input: &mut &str) -> ModalResult<f64> {
    if opt("NaN").parse_next(input)?.is_some() {
        return Ok(f64::NAN);
    }
    let negative = sign(input)?;
    let n = alt((float_lit, "Inf".value(f64::INFINITY))).parse_next(input)?;
    Ok(if negative { -n } else { n })
}

/// `re`, `imi`, `re+imi` or `re-imi`, optionally parenthesized.
fn complex(input: &mut &str) -> ModalResult<Complex> {
    alt((delimited(('(', ws), complex_parts, (ws, ')')), complex_parts)).parse_next(input)
}

fn complex_parts(input: &mut &str) -> ModalResult<Complex> {
    let first = signed_float(input)?;
    if opt('i').parse_next(input)?.is_some() {
        return Ok(Complex::new(0.0, first));
    }
    let imag = opt((ws, one_of(['+', '-']), ws, float_lit, 'i'))
        .parse_next(input)?
        .map(|(_, sign, _, n, _)| if sign == '-' { -n } else { n });
    Ok(Complex::new(first, imag.unwrap_or(0.0)))
}

/// A quoted literal is unquoted with Go's escapes; anything else is taken as
/// the string itself.
fn string_value(text: &str) -> Option<GoStr> {
    if !text.starts_with(['"', '`']) {
        return Some(GoStr::from(text));
    }
    any_string_lit.parse(text).ok().map(GoStr::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use gossamer_runtime::builtins;

    #[test]
    fn test_integers() {
        let b = builtins();
        assert_eq!(parse_literal(b.uint8, "0xff").unwrap().as_number(), Some(255.0));
        assert_eq!(parse_literal(b.uint16, "0b1_0000_0000").unwrap().as_number(), Some(256.0));
        assert_eq!(parse_literal(b.int32, "'é'").unwrap().as_number(), Some(233.0));
        assert_eq!(parse_literal(b.int32, r"'\n'").unwrap().as_number(), Some(10.0));
        assert_eq!(parse_literal(b.int8, "-128").unwrap().as_number(), Some(-128.0));
        assert_eq!(
            parse_literal(b.int64, "-1").unwrap().as_word64(),
            Some(Word64 { high: u32::MAX, low: u32::MAX })
        );
        assert_eq!(
            parse_literal(b.uint8, "256").unwrap_err().to_string(),
            "constant 256 overflows uint8"
        );
        assert!(matches!(
            parse_literal(b.int64, "999999999999999999999999999999999999999999"),
            Err(LiteralError::Overflow { .. })
        ));
        assert!(matches!(
            parse_literal(b.int, "1.5"),
            Err(LiteralError::Malformed { .. })
        ));
    }

    #[test]
    fn test_floats() {
        let b = builtins();
        assert_eq!(parse_literal(b.float64, "-0x1p-2").unwrap().as_number(), Some(-0.25));
        assert_eq!(parse_literal(b.float64, "1_000.5").unwrap().as_number(), Some(1000.5));
        assert_eq!(
            parse_literal(b.float64, "-Inf").unwrap().as_number(),
            Some(f64::NEG_INFINITY)
        );
        assert!(parse_literal(b.float64, "NaN").unwrap().as_number().unwrap().is_nan());
        assert!(parse_literal(b.float64, "1e").is_err());
    }

    #[test]
    fn test_complex_and_strings() {
        let b = builtins();
        let c = parse_literal(b.complex128, "(1.5e+2-2i)").unwrap();
        assert_eq!(c.as_complex(), Some(Complex::new(150.0, -2.0)));
        assert_eq!(
            parse_literal(b.complex128, "3i").unwrap().as_complex(),
            Some(Complex::new(0.0, 3.0))
        );
        assert_eq!(
            parse_literal(b.complex128, "2").unwrap().as_complex(),
            Some(Complex::new(2.0, 0.0))
        );

        let s = parse_literal(b.string, r#""a\x80\n""#).unwrap();
        assert_eq!(s.as_gostr().unwrap().as_bytes(), b"a\x80\n");
        assert_eq!(parse_literal(b.string, "`a\\n`").unwrap().as_str(), Some("a\\n"));
        assert_eq!(parse_literal(b.string, "héllo").unwrap().as_str(), Some("héllo"));
        assert!(parse_literal(b.string, r#""unterminated"#).is_err());

        let err = parse_literal(b.error, "x").unwrap_err();
        assert_eq!(err.to_string(), "no literal syntax for values of type error");
    }
}
