//! Value equality and map-key normalization.

use std::fmt;

use gossamer_core::Kind;

use crate::fault::{Fault, FaultResult};
use crate::numeric::{float_key, format_number};
use crate::types::Type;
use crate::value::Value;

/// A normalized map key. Two values of the same key type are equal map keys
/// iff their `MapKey`s are equal.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct MapKey(Vec<u8>);

impl MapKey {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for MapKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MapKey(\"{}\")", self.0.escape_ascii())
    }
}

/// `a == b` for two values of type `ty`.
///
/// Only interface comparisons can fault: both sides holding the same
/// uncomparable dynamic type.
pub fn equal(a: &Value, b: &Value, ty: Type) -> FaultResult<bool> {
    Ok(match (ty.kind(), a, b) {
        (Kind::Interface, a, b) => return interface_equal(a, b),
        (Kind::Array, Value::Array(x), Value::Array(y)) => {
            if x.len() != y.len() {
                return Ok(false);
            }
            let elem = ty.elem();
            for (l, r) in x.values().iter().zip(y.values().iter()) {
                if !equal(l, r, elem)? {
                    return Ok(false);
                }
            }
            true
        }
        (Kind::Struct, Value::Struct(x), Value::Struct(y)) => {
            for (index, field) in ty.fields().iter().enumerate() {
                if !equal(&x.field(index), &y.field(index), field.typ)? {
                    return Ok(false);
                }
            }
            true
        }
        (_, Value::Bool(x), Value::Bool(y)) => x == y,
        (_, Value::Number(x), Value::Number(y)) => x == y,
        (_, Value::Word64(x), Value::Word64(y)) => x == y,
        (_, Value::Complex(x), Value::Complex(y)) => x.real == y.real && x.imag == y.imag,
        (_, Value::Str(x), Value::Str(y)) => x == y,
        (_, Value::Pointer(x), Value::Pointer(y)) => x.ptr_eq(y),
        (_, Value::Chan(x), Value::Chan(y)) => x.ptr_eq(y),
        // Reference kinds only compare against nil.
        (_, Value::Slice(x), Value::Slice(y)) => x.ptr_eq(y),
        (_, Value::Map(x), Value::Map(y)) => x.ptr_eq(y),
        (_, Value::Func(x), Value::Func(y)) => x.ptr_eq(y),
        _ => false,
    })
}

/// `a == b` for two interface values.
pub fn interface_equal(a: &Value, b: &Value) -> FaultResult<bool> {
    let (x, y) = match (a, b) {
        (Value::Boxed(x), Value::Boxed(y)) => (x, y),
        (Value::Nil, Value::Nil) => return Ok(true),
        _ => return Ok(false),
    };
    if x.ty != y.ty {
        return Ok(false);
    }
    if !x.ty.comparable() {
        return Err(Fault::runtime(format!(
            "comparing uncomparable type {}",
            x.ty
        )));
    }
    equal(&x.val, &y.val, x.ty)
}

/// Map key for `value` of type `ty`.
pub fn key_for(ty: Type, value: &Value) -> FaultResult<MapKey> {
    let mut out = Vec::new();
    write_key(ty, value, &mut out)?;
    Ok(MapKey(out))
}

fn write_key(ty: Type, value: &Value, out: &mut Vec<u8>) -> FaultResult<()> {
    match (ty.kind(), value) {
        (Kind::String, Value::Str(s)) => {
            out.push(b'$');
            out.extend_from_slice(s.as_bytes());
        }
        (Kind::Float32 | Kind::Float64, Value::Number(n)) => {
            out.extend_from_slice(float_key(*n).as_bytes())
        }
        (_, Value::Number(n)) => out.extend_from_slice(format_number(*n).as_bytes()),
        (_, Value::Bool(b)) => out.extend_from_slice(if *b { b"true" } else { b"false" }),
        (Kind::Int64, Value::Word64(w)) => {
            out.extend_from_slice(format!("{}${}", w.signed_high(), w.low).as_bytes())
        }
        (_, Value::Word64(w)) => out.extend_from_slice(format!("{}${}", w.high, w.low).as_bytes()),
        (_, Value::Complex(c)) => out.extend_from_slice(
            format!("{}${}", format_number(c.real), format_number(c.imag)).as_bytes(),
        ),
        (Kind::Array, Value::Array(array)) => {
            let elem = ty.elem();
            for (index, element) in array.values().iter().enumerate() {
                if index > 0 {
                    out.push(b'$');
                }
                write_escaped(elem, element, out)?;
            }
        }
        (Kind::Struct, Value::Struct(s)) => {
            for (index, field) in ty.fields().iter().enumerate() {
                if index > 0 {
                    out.push(b'$');
                }
                write_escaped(field.typ, &s.field(index), out)?;
            }
        }
        (Kind::Interface, Value::Nil) => out.extend_from_slice(b"nil"),
        (Kind::Interface, Value::Boxed(typed)) => {
            out.extend_from_slice(typed.ty.string().as_bytes());
            out.push(b'$');
            write_key(typed.ty, &typed.val, out)?;
        }
        (_, Value::Pointer(p)) => match p.identity() {
            Some((addr, index)) => out.extend_from_slice(format!("{addr:x}:{index}").as_bytes()),
            None => out.extend_from_slice(b"nil"),
        },
        (_, Value::Chan(c)) => match c.identity() {
            Some(addr) => out.extend_from_slice(format!("{addr:x}").as_bytes()),
            None => out.extend_from_slice(b"nil"),
        },
        _ => {
            return Err(Fault::runtime(format!(
                "hash of unhashable type {ty}"
            )));
        }
    }
    Ok(())
}

fn write_escaped(ty: Type, value: &Value, out: &mut Vec<u8>) -> FaultResult<()> {
    let mut inner = Vec::new();
    write_key(ty, value, &mut inner)?;
    for byte in inner {
        if byte == b'\\' || byte == b'$' {
            out.push(b'\\');
        }
        out.push(byte);
    }
    Ok(())
}
