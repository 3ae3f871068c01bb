//! Fixed-width arithmetic on top of double-precision numbers.
//!
//! Narrow integers travel as `f64` and are truncated with ECMAScript-style
//! `ToInt32`/`ToUint32` after every operation. 64-bit integers travel as a
//! [`Word64`] pair of 32-bit halves.

use std::sync::atomic::{AtomicU64, Ordering};

use gossamer_core::Kind;

use crate::fault::{Fault, FaultResult};
use crate::value::{Complex, Word64};

const TWO_32: f64 = 4_294_967_296.0;

/// ECMAScript `ToInt32`: truncate toward zero, then wrap modulo 2^32.
pub fn to_int32(n: f64) -> i32 {
    if !n.is_finite() {
        return 0;
    }
    let wrapped = n.trunc() % TWO_32;
    (wrapped as i64) as i32
}

/// ECMAScript `ToUint32`.
pub fn to_uint32(n: f64) -> u32 {
    to_int32(n) as u32
}

/// Round to the nearest `float32`.
pub fn fround(n: f64) -> f64 {
    n as f32 as f64
}

/// 32-bit multiplication with wrap-around, on numbers.
pub fn imul(a: f64, b: f64) -> f64 {
    to_int32(a).wrapping_mul(to_int32(b)) as f64
}

/// Truncate `n` to the precision of the narrow numeric kind `kind`.
///
/// Wide, complex and non-numeric kinds leave `n` untouched.
pub fn truncate(n: f64, kind: Kind) -> f64 {
    match kind {
        Kind::Int8 => to_int32(n) as i8 as f64,
        Kind::Uint8 => to_uint32(n) as u8 as f64,
        Kind::Int16 => to_int32(n) as i16 as f64,
        Kind::Uint16 => to_uint32(n) as u16 as f64,
        Kind::Int | Kind::Int32 => to_int32(n) as f64,
        Kind::Uint | Kind::Uint32 | Kind::Uintptr => to_uint32(n) as f64,
        Kind::Float32 => fround(n),
        _ => n,
    }
}

impl Word64 {
    pub const ZERO: Word64 = Word64 { high: 0, low: 0 };

    /// Build a value from possibly unnormalized halves.
    ///
    /// `low` may exceed 32 bits or be negative; its overflow carries into
    /// `high`. Both halves are then wrapped to 32 bits.
    pub fn new(high: f64, low: f64) -> Self {
        let carry = (low.ceil() / TWO_32).floor();
        Word64 {
            high: to_uint32(high + carry),
            low: to_uint32(low),
        }
    }

    pub fn from_bits(bits: u64) -> Self {
        Word64 {
            high: (bits >> 32) as u32,
            low: bits as u32,
        }
    }

    pub fn bits(self) -> u64 {
        ((self.high as u64) << 32) | self.low as u64
    }

    pub fn from_i64(n: i64) -> Self {
        Self::from_bits(n as u64)
    }

    pub fn as_i64(self) -> i64 {
        self.bits() as i64
    }

    /// The high half read as a two's-complement number.
    pub fn signed_high(self) -> i32 {
        self.high as i32
    }

    /// Nearest double to this value.
    pub fn flatten(self, signed: bool) -> f64 {
        let high = if signed {
            self.signed_high() as f64
        } else {
            self.high as f64
        };
        high * TWO_32 + self.low as f64
    }

    pub fn wrapping_add(self, other: Word64) -> Word64 {
        Word64::from_bits(self.bits().wrapping_add(other.bits()))
    }

    pub fn wrapping_sub(self, other: Word64) -> Word64 {
        Word64::from_bits(self.bits().wrapping_sub(other.bits()))
    }

    pub fn wrapping_mul(self, other: Word64) -> Word64 {
        Word64::from_bits(self.bits().wrapping_mul(other.bits()))
    }

    pub fn shl(self, count: u32) -> Word64 {
        if count >= 64 {
            return Word64::ZERO;
        }
        Word64::from_bits(self.bits() << count)
    }

    /// Arithmetic right shift, used for `int64`.
    pub fn shr_signed(self, count: u32) -> Word64 {
        Word64::from_i64(self.as_i64() >> count.min(63))
    }

    /// Logical right shift, used for `uint64`.
    pub fn shr_unsigned(self, count: u32) -> Word64 {
        if count >= 64 {
            return Word64::ZERO;
        }
        Word64::from_bits(self.bits() >> count)
    }

    /// Quotient (or remainder) of two 64-bit integers.
    ///
    /// Signed division truncates toward zero and the remainder takes the sign
    /// of the dividend; `MIN / -1` wraps to `MIN`.
    pub fn div(self, other: Word64, signed: bool, remainder: bool) -> FaultResult<Word64> {
        if other.bits() == 0 {
            return Err(Fault::runtime("integer divide by zero"));
        }
        let bits = match (signed, remainder) {
            (true, false) => self.as_i64().wrapping_div(other.as_i64()) as u64,
            (true, true) => self.as_i64().wrapping_rem(other.as_i64()) as u64,
            (false, false) => self.bits() / other.bits(),
            (false, true) => self.bits() % other.bits(),
        };
        Ok(Word64::from_bits(bits))
    }
}

impl Complex {
    pub const ZERO: Complex = Complex { real: 0.0, imag: 0.0 };

    pub fn new(real: f64, imag: f64) -> Self {
        Complex { real, imag }
    }

    /// Both parts rounded to `float32`, as stored by `complex64`.
    pub fn narrowed(self) -> Self {
        Complex {
            real: fround(self.real),
            imag: fround(self.imag),
        }
    }

    pub fn add(self, other: Complex) -> Complex {
        Complex::new(self.real + other.real, self.imag + other.imag)
    }

    pub fn sub(self, other: Complex) -> Complex {
        Complex::new(self.real - other.real, self.imag - other.imag)
    }

    pub fn mul(self, other: Complex) -> Complex {
        Complex::new(
            self.real * other.real - self.imag * other.imag,
            self.real * other.imag + self.imag * other.real,
        )
    }

    fn is_infinite(self) -> bool {
        self.real.is_infinite() || self.imag.is_infinite()
    }

    fn is_nan(self) -> bool {
        self.real.is_nan() || self.imag.is_nan()
    }

    /// Complex division with the source language's infinity and NaN rules.
    pub fn div(self, d: Complex) -> Complex {
        let n_inf = self.is_infinite();
        let d_inf = d.is_infinite();
        let n_nan = !n_inf && self.is_nan();
        let d_nan = !d_inf && d.is_nan();
        if n_nan || d_nan {
            return Complex::new(f64::NAN, f64::NAN);
        }
        if n_inf && !d_inf {
            return Complex::new(f64::INFINITY, f64::INFINITY);
        }
        if !n_inf && d_inf {
            return Complex::ZERO;
        }
        if d.real == 0.0 && d.imag == 0.0 {
            if self.real == 0.0 && self.imag == 0.0 {
                return Complex::new(f64::NAN, f64::NAN);
            }
            return Complex::new(f64::INFINITY, f64::INFINITY);
        }
        if d.real.abs() <= d.imag.abs() {
            let ratio = d.real / d.imag;
            let denom = d.real * ratio + d.imag;
            return Complex::new(
                (self.real * ratio + self.imag) / denom,
                (self.imag * ratio - self.real) / denom,
            );
        }
        let ratio = d.imag / d.real;
        let denom = d.imag * ratio + d.real;
        Complex::new(
            (self.imag * ratio + self.real) / denom,
            (self.imag - self.real * ratio) / denom,
        )
    }
}

static NAN_KEYS: AtomicU64 = AtomicU64::new(0);

/// Render a number the way map keys and diagnostics expect: integral values
/// without a fraction, `-0` as `0`.
pub fn format_number(n: f64) -> String {
    if n == 0.0 {
        return "0".to_string();
    }
    if n.is_infinite() {
        return if n > 0.0 { "+Inf" } else { "-Inf" }.to_string();
    }
    format!("{n}")
}

/// Map key of a float. Every NaN gets a fresh key, so NaN keys never collide.
pub fn float_key(n: f64) -> String {
    if n.is_nan() {
        let id = NAN_KEYS.fetch_add(1, Ordering::Relaxed) + 1;
        return format!("NaN${id}");
    }
    format_number(n)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn int32_wraps_like_the_host() {
        assert_eq!(to_int32(2_147_483_648.0), -2_147_483_648);
        assert_eq!(to_int32(-1.9), -1);
        assert_eq!(to_int32(f64::NAN), 0);
        assert_eq!(to_uint32(-1.0), u32::MAX);
        assert_eq!(to_int32(1e20), 1_661_992_960);
    }

    #[test]
    fn truncation_per_kind() {
        assert_eq!(truncate(300.0, Kind::Uint8), 44.0);
        assert_eq!(truncate(200.0, Kind::Int8), -56.0);
        assert_eq!(truncate(-1.0, Kind::Uint16), 65535.0);
        assert_eq!(truncate(0.1, Kind::Float32), 0.1f32 as f64);
        assert_eq!(truncate(0.1, Kind::Float64), 0.1);
    }

    #[test]
    fn imul_wraps() {
        assert_eq!(imul(65536.0, 65536.0), 0.0);
        assert_eq!(imul(-3.0, 7.0), -21.0);
        assert_eq!(imul(2_147_483_647.0, 2.0), -2.0);
    }

    #[test]
    fn word64_normalizes_carry() {
        assert_eq!(Word64::new(0.0, -5.0), Word64::from_i64(-5));
        assert_eq!(Word64::new(0.0, 4_294_967_296.0 + 7.0), Word64 { high: 1, low: 7 });
        assert_eq!(Word64::new(-1.0, 0.0).as_i64(), -4_294_967_296);
        assert_eq!(Word64::new(0.0, -1.5), Word64::from_i64(-1));
    }

    #[test]
    fn add_then_sub_is_identity() {
        let samples = [
            Word64 { high: 0, low: 0 },
            Word64 { high: u32::MAX, low: u32::MAX },
            Word64 { high: 0x8000_0000, low: 1 },
            Word64 { high: 12, low: 0xFFFF_FFF0 },
        ];
        for &x in &samples {
            for &y in &samples {
                assert_eq!(x.wrapping_add(y).wrapping_sub(y), x);
            }
        }
    }

    #[test]
    fn shifts() {
        let x = Word64::from_i64(-8);
        assert_eq!(x.shr_signed(1).as_i64(), -4);
        assert_eq!(x.shr_signed(100).as_i64(), -1);
        assert_eq!(x.shr_unsigned(60).bits(), 0xF);
        assert_eq!(Word64::from_bits(1).shl(40).bits(), 1 << 40);
        assert_eq!(Word64::from_bits(1).shl(64), Word64::ZERO);
    }

    #[test]
    fn division() {
        let seven = Word64::from_i64(-7);
        let two = Word64::from_i64(2);
        assert_eq!(seven.div(two, true, false).unwrap().as_i64(), -3);
        assert_eq!(seven.div(two, true, true).unwrap().as_i64(), -1);
        assert_eq!(
            Word64::from_i64(i64::MIN)
                .div(Word64::from_i64(-1), true, false)
                .unwrap()
                .as_i64(),
            i64::MIN
        );
        let err = seven.div(Word64::ZERO, true, false).unwrap_err();
        assert_eq!(err.to_string(), "runtime error: integer divide by zero");
    }

    #[test]
    fn complex_division_rules() {
        let zero = Complex::ZERO;
        let one = Complex::new(1.0, 0.0);
        assert!(zero.div(zero).real.is_nan());
        assert_eq!(one.div(zero), Complex::new(f64::INFINITY, f64::INFINITY));
        assert_eq!(one.div(Complex::new(f64::INFINITY, 0.0)), Complex::ZERO);
        assert_eq!(
            Complex::new(4.0, 2.0).div(Complex::new(0.0, 2.0)),
            Complex::new(1.0, -2.0)
        );
    }

    #[test]
    fn nan_keys_are_unique() {
        assert_ne!(float_key(f64::NAN), float_key(f64::NAN));
        assert_eq!(float_key(-0.0), "0");
        assert_eq!(float_key(1.5), "1.5");
    }
}
