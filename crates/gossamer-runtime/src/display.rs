//! `%v`-style rendering of values, for panic messages and tooling.

use gossamer_core::Kind;

use crate::memory::Pointer;
use crate::types::Type;
use crate::value::Value;

/// Render `value` of type `ty` the way `fmt.Sprint` prints it.
pub fn render(ty: Type, value: &Value) -> String {
    let mut out = String::new();
    write_value(&mut out, ty, value);
    out
}

fn write_value(out: &mut String, ty: Type, value: &Value) {
    match value {
        Value::Nil => out.push_str("<nil>"),
        Value::Bool(b) => out.push_str(&format!("{b}")),
        Value::Number(n) if ty.kind().is_float() => {
            out.push_str(&format_float(*n, ty.kind() == Kind::Float32))
        }
        Value::Number(n) => out.push_str(&format!("{n}")),
        Value::Word64(w) if ty.kind() == Kind::Int64 => {
            out.push_str(&format!("{}", w.as_i64()))
        }
        Value::Word64(w) => out.push_str(&format!("{}", w.bits())),
        Value::Complex(c) => {
            let single = ty.kind() == Kind::Complex64;
            let imag = format_float(c.imag, single);
            let sign = if imag.starts_with(['-', '+']) { "" } else { "+" };
            out.push_str(&format!("({}{sign}{imag}i)", format_float(c.real, single)))
        }
        Value::Str(s) => out.push_str(&format!("{s}")),
        Value::Array(a) => write_list(out, ty.elem(), a.values()),
        Value::Slice(s) => write_list(out, ty.elem(), s.values()),
        Value::Struct(s) => {
            out.push('{');
            for (index, field) in ty.fields().iter().enumerate() {
                if index > 0 {
                    out.push(' ');
                }
                write_value(out, field.typ, &s.field(index));
            }
            out.push('}');
        }
        Value::Pointer(p) => write_pointer(out, ty, p),
        Value::Map(m) => {
            if m.is_nil() {
                out.push_str("map[]");
                return;
            }
            let key_ty = ty.key().unwrap_or(ty);
            out.push_str("map[");
            for (index, (k, v)) in m.entries().iter().enumerate() {
                if index > 0 {
                    out.push(' ');
                }
                write_value(out, key_ty, k);
                out.push(':');
                write_value(out, ty.elem(), v);
            }
            out.push(']');
        }
        Value::Chan(c) => match c.identity() {
            Some(addr) => out.push_str(&format!("{addr:#x}")),
            None => out.push_str("<nil>"),
        },
        Value::Func(f) if f.is_nil() => out.push_str("<nil>"),
        Value::Func(f) => out.push_str(&format!("{f:?}")),
        Value::Boxed(typed) => write_value(out, typed.ty, &typed.val),
    }
}

fn write_list(out: &mut String, elem: Type, values: Vec<Value>) {
    out.push('[');
    for (index, value) in values.iter().enumerate() {
        if index > 0 {
            out.push(' ');
        }
        write_value(out, elem, value);
    }
    out.push(']');
}

fn write_pointer(out: &mut String, ty: Type, p: &Pointer) {
    match p {
        Pointer::Nil(_) => out.push_str("<nil>"),
        Pointer::Struct(s) => {
            out.push('&');
            write_value(out, s.ty(), &Value::Struct(s.clone()));
        }
        Pointer::Array(a) => {
            out.push('&');
            write_list(out, ty.elem().elem(), a.values());
        }
        Pointer::Cell(_) => match p.identity() {
            Some((addr, index)) => out.push_str(&format!("{:#x}", addr + index)),
            None => out.push_str("<nil>"),
        },
    }
}

/// `%v` of a float: the shortest representation that round-trips at the
/// value's width, in exponent form when the decimal exponent is below -4 or
/// at least 21.
fn format_float(n: f64, single: bool) -> String {
    if n.is_nan() {
        return "NaN".to_string();
    }
    if n.is_infinite() {
        return if n > 0.0 { "+Inf" } else { "-Inf" }.to_string();
    }
    let scientific = if single {
        format!("{:e}", n as f32)
    } else {
        format!("{n:e}")
    };
    let Some((mantissa, exp)) = scientific.split_once('e') else {
        return scientific;
    };
    let exp: i32 = exp.parse().unwrap_or_default();
    if n == 0.0 || (-4..21).contains(&exp) {
        return if single {
            format!("{}", n as f32)
        } else {
            format!("{n}")
        };
    }
    let sign = if exp < 0 { '-' } else { '+' };
    format!("{mantissa}e{sign}{:02}", exp.abs())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::map::make_map;
    use crate::memory::Slice;
    use crate::types::{Field, builtins, map_type, ptr_type, slice_type, struct_type};
    use crate::value::{Complex, Typed, Word64};

    #[test]
    fn scalars() {
        let b = builtins();
        assert_eq!(render(b.int, &Value::from(-3)), "-3");
        assert_eq!(render(b.float64, &Value::from(1e21)), "1e+21");
        assert_eq!(render(b.float64, &Value::from(0.5)), "0.5");
        assert_eq!(render(b.float64, &Value::from(1.5e-7)), "1.5e-07");
        assert_eq!(render(b.float32, &Value::from(crate::numeric::fround(0.1))), "0.1");
        assert_eq!(render(b.int64, &Value::Word64(Word64::from_i64(-7))), "-7");
        assert_eq!(
            render(b.complex128, &Value::Complex(Complex::new(1.0, -2.0))),
            "(1-2i)"
        );
        assert_eq!(render(b.error, &Value::Nil), "<nil>");
    }

    #[test]
    fn aggregates() {
        let b = builtins();
        let point = struct_type("", vec![Field::new("X", b.int), Field::new("S", b.string)]);
        let p = point.zero();
        p.as_struct().unwrap().set_field(1, Value::from("hi"));
        assert_eq!(render(point, &p), "{0 hi}");

        let ptr = Value::Pointer(Pointer::Struct(p.as_struct().unwrap().clone()));
        assert_eq!(render(ptr_type(point), &ptr), "&{0 hi}");

        let ints = slice_type(b.int);
        let s = Slice::from_values(ints, vec![Value::from(1), Value::from(2)]).unwrap();
        assert_eq!(render(ints, &Value::Slice(s)), "[1 2]");

        let m_ty = map_type(b.string, b.bool);
        let m = make_map(m_ty);
        m.insert(Value::from("a"), Value::from(true)).unwrap();
        assert_eq!(render(m_ty, &Value::Map(m)), "map[a:true]");

        let boxed = Typed::new(b.string, Value::from("x")).boxed();
        assert_eq!(render(b.empty_interface, &boxed), "x");
    }
}
