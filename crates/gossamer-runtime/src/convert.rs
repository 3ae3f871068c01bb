//! The conversion matrix: `T(x)` for every legal pair of source and
//! destination kinds.

use std::rc::Rc;

use gossamer_core::Kind;

use crate::fault::{Fault, FaultResult};
use crate::memory::{Backing, Pointer, Slice};
use crate::numeric::{fround, to_int32, truncate};
use crate::runes::{encode_rune, runes_to_string, string_to_runes};
use crate::types::{Type, TypeDesc};
use crate::value::{Complex, GoStr, Typed, Value, Word64};

const TWO_32: f64 = 4_294_967_296.0;

impl TypeDesc {
    /// Convert `src` to this type.
    ///
    /// Struct and array results are always fresh copies. Slice, map, channel
    /// and function results share their referent with `src`.
    pub fn convert_from(&'static self, src: &Typed) -> FaultResult<Value> {
        let unsupported = || Fault::unsupported_conversion(src.ty, self);
        let from = src.ty.kind();
        let val = &src.val;

        match self.kind() {
            Kind::Int64 | Kind::Uint64 => Ok(Value::Word64(match from {
                Kind::Int64 | Kind::Uint64 => val.try_word64()?,
                _ if from.is_narrow_integer() || from.is_float() => {
                    Word64::new(0.0, val.try_number()?)
                }
                _ => return Err(unsupported()),
            })),

            kind if kind.is_narrow_integer() => Ok(Value::Number(match from {
                _ if from == kind => val.try_number()?,
                Kind::Int64 | Kind::Uint64 => {
                    let w = val.try_word64()?;
                    let n = if from.is_signed() && kind.is_signed() {
                        w.low as f64 + (w.signed_high() >> 31) as f64 * TWO_32
                    } else {
                        w.low as f64
                    };
                    truncate(n, kind)
                }
                _ if from.is_narrow_integer() || from.is_float() => {
                    truncate(val.try_number()?, kind)
                }
                _ => return Err(unsupported()),
            })),

            Kind::Float32 | Kind::Float64 => {
                let n = match from {
                    Kind::Int64 | Kind::Uint64 => val.try_word64()?.flatten(from.is_signed()),
                    _ if from.is_narrow_integer() || from.is_float() => val.try_number()?,
                    _ => return Err(unsupported()),
                };
                Ok(Value::Number(if self.kind() == Kind::Float32 {
                    fround(n)
                } else {
                    n
                }))
            }

            Kind::Complex64 | Kind::Complex128 => {
                if !matches!(from, Kind::Complex64 | Kind::Complex128) {
                    return Err(unsupported());
                }
                let c = val.try_complex()?;
                Ok(Value::Complex(if self.kind() == Kind::Complex64 {
                    c.narrowed()
                } else {
                    Complex::new(c.real, c.imag)
                }))
            }

            Kind::String => Ok(Value::Str(match from {
                Kind::String => val.try_gostr()?.clone(),
                Kind::Int64 => GoStr::from(encode_rune(val.try_word64()?.as_i64()).as_slice()),
                Kind::Uint64 => {
                    let bits = val.try_word64()?.bits().min(i64::MAX as u64);
                    GoStr::from(encode_rune(bits as i64).as_slice())
                }
                _ if from.is_narrow_integer() => {
                    GoStr::from(encode_rune(val.try_number()? as i64).as_slice())
                }
                Kind::Slice => slice_to_string(val.try_slice()?).ok_or_else(unsupported)?,
                _ => return Err(unsupported()),
            })),

            Kind::Bool if from == Kind::Bool => Ok(val.clone()),

            Kind::Interface => Ok(if from == Kind::Interface {
                val.clone()
            } else {
                src.clone().boxed()
            }),

            Kind::Slice => match from {
                Kind::Slice if same_underlying(src.ty, self) => {
                    Ok(Value::Slice(val.try_slice()?.retyped(self)))
                }
                Kind::String => {
                    let s = val.try_gostr()?;
                    let values: Vec<Value> = match self.elem().kind() {
                        Kind::Int32 => string_to_runes(s.as_bytes())
                            .into_iter()
                            .map(Value::from)
                            .collect(),
                        Kind::Uint8 => s.as_bytes().iter().map(|b| Value::Number(*b as f64)).collect(),
                        _ => return Err(unsupported()),
                    };
                    Ok(Value::Slice(Slice::from_values(self, values)?))
                }
                _ => Err(unsupported()),
            },

            Kind::Ptr => self.convert_pointer(src).and_then(|p| p.ok_or_else(unsupported)),

            Kind::Array | Kind::Struct if same_underlying(src.ty, self) => self.clone_value(val),

            Kind::Map | Kind::Chan | Kind::Func if same_underlying(src.ty, self) => Ok(val.clone()),

            Kind::UnsafePointer if src.ty == self => Ok(val.clone()),

            _ => Err(unsupported()),
        }
    }

    fn convert_pointer(&'static self, src: &Typed) -> FaultResult<Option<Value>> {
        let elem = self.elem();
        if src.ty == self {
            return Ok(Some(src.val.clone()));
        }
        if src.ty.kind() == Kind::Slice && elem.kind() == Kind::Array {
            let window = src.val.try_slice()?.array_window(elem.len())?;
            return Ok(Some(Value::Pointer(match window {
                Some(array) => Pointer::Array(array),
                None => Pointer::Nil(self),
            })));
        }
        if src.ty.kind() != Kind::Ptr || !same_underlying(src.ty.elem(), elem) {
            return Ok(None);
        }
        let converted = match src.val.try_pointer()? {
            Pointer::Nil(_) => Pointer::Nil(self),
            Pointer::Array(a) if elem.kind() == Kind::Array => Pointer::Array(a.clone()),
            Pointer::Struct(s) if elem.kind() == Kind::Struct => Pointer::Struct(s.proxy(elem)),
            Pointer::Cell(cell) => Pointer::Cell(Rc::new(cell.retyped(self))),
            _ => return Ok(None),
        };
        Ok(Some(Value::Pointer(converted)))
    }
}

/// Whether `a` and `b` share an underlying type, ignoring names and struct
/// tags. Composite types are interned, so element identity is type identity.
fn same_underlying(a: Type, b: Type) -> bool {
    if a == b {
        return true;
    }
    if a.kind() != b.kind() {
        return false;
    }
    match a.kind() {
        Kind::Struct => {
            let (fa, fb) = (a.fields(), b.fields());
            fa.len() == fb.len()
                && fa.iter().zip(fb).all(|(x, y)| {
                    x.name == y.name && x.embedded == y.embedded && x.typ == y.typ
                })
        }
        Kind::Array => a.len() == b.len() && a.elem() == b.elem(),
        Kind::Slice => a.elem() == b.elem(),
        Kind::Ptr => same_underlying(a.elem(), b.elem()),
        Kind::Map => a.key() == b.key() && a.elem() == b.elem(),
        Kind::Chan => a.chan_dir() == b.chan_dir() && a.elem() == b.elem(),
        Kind::Func => {
            a.params() == b.params()
                && a.results() == b.results()
                && a.is_variadic() == b.is_variadic()
        }
        _ => true,
    }
}

fn slice_to_string(slice: &Slice) -> Option<GoStr> {
    let values = slice.values();
    match slice.elem_kind() {
        Kind::Int32 => Some(GoStr::from(runes_to_string(
            values.iter().map(|v| v.as_number().map_or(0, to_int32)),
        ))),
        Kind::Uint8 => Some(GoStr::from(
            values
                .iter()
                .map(|v| v.as_number().unwrap_or(0.0) as u8)
                .collect::<Vec<u8>>(),
        )),
        _ => None,
    }
}

/// A fresh byte slice of type `ty` holding the bytes of `s`.
pub fn bytes_of(ty: Type, s: &GoStr) -> FaultResult<Slice> {
    let backing = Backing::new(ty.elem(), s.len());
    for (index, byte) in s.as_bytes().iter().enumerate() {
        backing.set(index, Value::Number(*byte as f64))?;
    }
    Ok(Slice::from_backing(ty, backing))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Field, array_type, builtins, ptr_type, slice_type, struct_type};

    fn conv(to: Type, from: Type, val: Value) -> FaultResult<Value> {
        to.convert_from(&Typed::new(from, val))
    }

    #[test]
    fn narrow_integer_truncation() {
        let b = builtins();
        assert_eq!(conv(b.int8, b.int, Value::from(200)).unwrap().as_number(), Some(-56.0));
        assert_eq!(conv(b.uint8, b.int, Value::from(-1)).unwrap().as_number(), Some(255.0));
        assert_eq!(conv(b.int32, b.float64, Value::from(-3.9)).unwrap().as_number(), Some(-3.0));
    }

    #[test]
    fn sixty_four_bit_conversions() {
        let b = builtins();
        let minus_one = conv(b.int64, b.int32, Value::from(-1)).unwrap();
        assert_eq!(minus_one.as_word64(), Some(Word64 { high: u32::MAX, low: u32::MAX }));

        let w = Value::Word64(Word64::from_i64(-5));
        assert_eq!(conv(b.int32, b.int64, w.clone()).unwrap().as_number(), Some(-5.0));
        assert_eq!(conv(b.uint32, b.int64, w.clone()).unwrap().as_number(), Some(4_294_967_291.0));
        assert_eq!(conv(b.float64, b.int64, w.clone()).unwrap().as_number(), Some(-5.0));
        assert_eq!(
            conv(b.uint64, b.int64, w).unwrap().as_word64(),
            Some(Word64::from_i64(-5))
        );
    }

    #[test]
    fn float32_destinations_round() {
        let b = builtins();
        let got = conv(b.float32, b.float64, Value::from(0.1)).unwrap();
        assert_eq!(got.as_number(), Some(0.1f32 as f64));
        let got = conv(b.float32, b.int, Value::from(16_777_217)).unwrap();
        assert_eq!(got.as_number(), Some(16_777_216.0));
    }

    #[test]
    fn strings_runes_and_bytes() {
        let b = builtins();
        assert_eq!(conv(b.string, b.int32, Value::from(0x4E16)).unwrap().as_str(), Some("世"));
        assert_eq!(conv(b.string, b.int, Value::from(0xD800)).unwrap().as_str(), Some("\u{FFFD}"));

        let runes_ty = slice_type(b.int32);
        let runes = conv(runes_ty, b.string, Value::from("héllo")).unwrap();
        assert_eq!(runes.as_slice().unwrap().len(), 5);
        let back = conv(b.string, runes_ty, runes).unwrap();
        assert_eq!(back.as_str(), Some("héllo"));

        let bytes_ty = slice_type(b.uint8);
        let raw = Value::Slice(bytes_of(bytes_ty, &GoStr::from(vec![0xff, 0x00, 0x41])).unwrap());
        let s = conv(b.string, bytes_ty, raw).unwrap();
        assert_eq!(s.as_gostr().unwrap().as_bytes(), &[0xff, 0x00, 0x41]);
    }

    #[test]
    fn slice_to_array_pointer_shares_memory() {
        let b = builtins();
        let ints = slice_type(b.int);
        let s = Slice::from_values(ints, (1..=4).map(Value::from).collect()).unwrap();
        let tail = s.subslice(1, None, None).unwrap();
        let arr_ptr = ptr_type(array_type(b.int, 2));

        let p = conv(arr_ptr, ints, Value::Slice(tail.clone())).unwrap();
        let Value::Pointer(Pointer::Array(arr)) = p else {
            panic!("expected an array pointer");
        };
        arr.set(0, Value::from(20)).unwrap();
        assert_eq!(s.get(1).unwrap().as_number(), Some(20.0));

        let err = conv(ptr_type(array_type(b.int, 8)), ints, Value::Slice(tail)).unwrap_err();
        assert_eq!(
            err.to_string(),
            "runtime error: cannot convert slice with length 3 to pointer to array with length 8"
        );
    }

    #[test]
    fn struct_conversion_copies_and_pointer_conversion_proxies() {
        let b = builtins();
        let fields = || vec![Field::new("X", b.int)];
        let a = struct_type("", fields());
        let named = TypeDesc::builder(Kind::Struct, "main.P").named().pkg("main").build();
        named.init_struct("main", fields()).unwrap();

        let v = a.zero();
        let copy = conv(named, a, v.clone()).unwrap();
        copy.as_struct().unwrap().set_field(0, Value::from(1));
        assert_eq!(v.as_struct().unwrap().field(0).as_number(), Some(0.0));

        let p = Pointer::Struct(v.as_struct().unwrap().clone());
        let q = conv(ptr_type(named), ptr_type(a), Value::Pointer(p.clone())).unwrap();
        let q = q.as_pointer().unwrap();
        q.store(copy).unwrap();
        assert_eq!(v.as_struct().unwrap().field(0).as_number(), Some(1.0));
        assert!(q.ptr_eq(&p));
    }

    #[test]
    fn mismatched_layouts_fault() {
        let b = builtins();
        let xy = struct_type("", vec![Field::new("X", b.int), Field::new("Y", b.int)]);
        let x = struct_type("", vec![Field::new("X", b.int)]);
        let renamed = struct_type("", vec![Field::new("Z", b.int)]);

        let err = conv(x, xy, xy.zero()).unwrap_err();
        assert_eq!(
            err.to_string(),
            "unsupported conversion from struct { X int; Y int } to struct { X int }"
        );
        assert!(conv(xy, x, x.zero()).is_err());
        assert!(conv(renamed, x, x.zero()).is_err());

        let (two, three) = (array_type(b.int, 2), array_type(b.int, 3));
        let err = conv(three, two, two.zero()).unwrap_err();
        assert_eq!(err.to_string(), "unsupported conversion from [2]int to [3]int");
        assert!(conv(array_type(b.int8, 2), two, two.zero()).is_err());

        let p = Pointer::Struct(x.zero().as_struct().unwrap().clone());
        let err = conv(ptr_type(xy), ptr_type(x), Value::Pointer(p)).unwrap_err();
        assert_eq!(
            err.to_string(),
            "unsupported conversion from *struct { X int } to *struct { X int; Y int }"
        );

        let ints = slice_type(b.int);
        let s = Slice::from_values(ints, vec![Value::from(1)]).unwrap();
        assert!(conv(slice_type(b.int8), ints, Value::Slice(s)).is_err());
    }

    #[test]
    fn illegal_pairs_fault() {
        let b = builtins();
        let err = conv(b.bool, b.int, Value::from(1)).unwrap_err();
        assert_eq!(err.to_string(), "unsupported conversion from int to bool");
        assert!(conv(b.unsafe_pointer, b.uintptr, Value::from(1)).is_err());
    }
}
