//! Runtime value representation.
//!
//! A [`Value`] is untyped: the descriptor that gives it meaning travels
//! separately, except behind an interface where the value is carried as a
//! [`Typed`] pair. Cloning a `Value` copies a reference for aggregates;
//! value-semantics copies go through [`crate::types::TypeDesc::clone_value`].

use std::fmt;
use std::rc::Rc;

use crate::chan::Chan;
use crate::fault::{Fault, FaultResult};
use crate::map::Map;
use crate::memory::{ArrayRef, Pointer, Slice, StructRef};
use crate::types::Type;

/// Immutable byte string.
#[derive(Clone, PartialEq, Eq, Hash, Default)]
pub struct GoStr(Rc<[u8]>);

impl GoStr {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn concat(&self, other: &GoStr) -> GoStr {
        let mut bytes = Vec::with_capacity(self.len() + other.len());
        bytes.extend_from_slice(&self.0);
        bytes.extend_from_slice(&other.0);
        GoStr::from(bytes)
    }

    /// The text, if it is valid UTF-8.
    pub fn to_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.0).ok()
    }
}

impl From<&str> for GoStr {
    fn from(text: &str) -> Self {
        GoStr(Rc::from(text.as_bytes()))
    }
}

impl From<String> for GoStr {
    fn from(text: String) -> Self {
        GoStr(Rc::from(text.into_bytes()))
    }
}

impl From<Vec<u8>> for GoStr {
    fn from(bytes: Vec<u8>) -> Self {
        GoStr(Rc::from(bytes))
    }
}

impl From<&[u8]> for GoStr {
    fn from(bytes: &[u8]) -> Self {
        GoStr(Rc::from(bytes))
    }
}

impl fmt::Debug for GoStr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{}\"", self.0.escape_ascii())
    }
}

impl fmt::Display for GoStr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&String::from_utf8_lossy(&self.0))
    }
}

/// A 64-bit integer as two unsigned 32-bit halves.
///
/// The same representation serves `int64` and `uint64`; signedness is a
/// property of the descriptor.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub struct Word64 {
    pub high: u32,
    pub low: u32,
}

#[derive(Clone, Copy, Debug, PartialEq, Default)]
pub struct Complex {
    pub real: f64,
    pub imag: f64,
}

pub type NativeFn = dyn Fn(&[Value]) -> FaultResult<Vec<Value>>;

/// A function value. The zero value faults when called.
#[derive(Clone, Default)]
pub struct Func(Option<Rc<NativeFn>>);

impl Func {
    pub fn new(f: impl Fn(&[Value]) -> FaultResult<Vec<Value>> + 'static) -> Self {
        Func(Some(Rc::new(f)))
    }

    pub fn nil() -> Self {
        Func(None)
    }

    pub fn is_nil(&self) -> bool {
        self.0.is_none()
    }

    pub fn call(&self, args: &[Value]) -> FaultResult<Vec<Value>> {
        match &self.0 {
            Some(f) => f(args),
            None => Err(Fault::nil_deref()),
        }
    }

    pub fn ptr_eq(&self, other: &Func) -> bool {
        match (&self.0, &other.0) {
            (Some(a), Some(b)) => Rc::ptr_eq(a, b),
            (None, None) => true,
            _ => false,
        }
    }
}

impl fmt::Debug for Func {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            Some(func) => write!(f, "func@{:p}", Rc::as_ptr(func) as *const ()),
            None => f.write_str("func(nil)"),
        }
    }
}

/// A value paired with its dynamic type, as stored behind an interface.
#[derive(Clone)]
pub struct Typed {
    pub ty: Type,
    pub val: Value,
}

impl Typed {
    pub fn new(ty: Type, val: Value) -> Self {
        Typed { ty, val }
    }

    /// Store this value in an interface slot.
    pub fn boxed(self) -> Value {
        Value::Boxed(Rc::new(self))
    }
}

impl fmt::Debug for Typed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({:?})", self.ty, self.val)
    }
}

#[derive(Clone)]
pub enum Value {
    /// The nil interface.
    Nil,
    Bool(bool),
    /// Narrow integers, floats and `unsafe.Pointer` addresses.
    Number(f64),
    Word64(Word64),
    Complex(Complex),
    Str(GoStr),
    Array(ArrayRef),
    Slice(Slice),
    Struct(StructRef),
    Pointer(Pointer),
    Map(Map),
    Chan(Chan),
    Func(Func),
    /// A non-nil interface value.
    Boxed(Rc<Typed>),
}

macro_rules! accessor {
    ($as_fn:ident, $try_fn:ident, $variant:ident, $ty:ty, $what:literal) => {
        pub fn $as_fn(&self) -> Option<&$ty> {
            match self {
                Value::$variant(v) => Some(v),
                _ => None,
            }
        }

        pub fn $try_fn(&self) -> FaultResult<&$ty> {
            self.$as_fn().ok_or_else(|| self.mismatch($what))
        }
    };
}

impl Value {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_word64(&self) -> Option<Word64> {
        match self {
            Value::Word64(w) => Some(*w),
            _ => None,
        }
    }

    pub fn as_complex(&self) -> Option<Complex> {
        match self {
            Value::Complex(c) => Some(*c),
            _ => None,
        }
    }

    pub fn try_bool(&self) -> FaultResult<bool> {
        self.as_bool().ok_or_else(|| self.mismatch("bool"))
    }

    pub fn try_number(&self) -> FaultResult<f64> {
        self.as_number().ok_or_else(|| self.mismatch("number"))
    }

    pub fn try_word64(&self) -> FaultResult<Word64> {
        self.as_word64().ok_or_else(|| self.mismatch("64-bit integer"))
    }

    pub fn try_complex(&self) -> FaultResult<Complex> {
        self.as_complex().ok_or_else(|| self.mismatch("complex"))
    }

    accessor!(as_gostr, try_gostr, Str, GoStr, "string");
    accessor!(as_array, try_array, Array, ArrayRef, "array");
    accessor!(as_slice, try_slice, Slice, Slice, "slice");
    accessor!(as_struct, try_struct, Struct, StructRef, "struct");
    accessor!(as_pointer, try_pointer, Pointer, Pointer, "pointer");
    accessor!(as_map, try_map, Map, Map, "map");
    accessor!(as_chan, try_chan, Chan, Chan, "channel");
    accessor!(as_func, try_func, Func, Func, "function");

    /// The string contents, if this is a string holding valid UTF-8.
    pub fn as_str(&self) -> Option<&str> {
        self.as_gostr().and_then(GoStr::to_str)
    }

    /// The dynamic value behind an interface slot; `None` for nil.
    pub fn as_boxed(&self) -> Option<&Typed> {
        match self {
            Value::Boxed(typed) => Some(typed),
            _ => None,
        }
    }

    pub fn is_nil_interface(&self) -> bool {
        matches!(self, Value::Nil)
    }

    fn variant_name(&self) -> &'static str {
        match self {
            Value::Nil => "nil",
            Value::Bool(_) => "bool",
            Value::Number(_) => "number",
            Value::Word64(_) => "64-bit integer",
            Value::Complex(_) => "complex",
            Value::Str(_) => "string",
            Value::Array(_) => "array",
            Value::Slice(_) => "slice",
            Value::Struct(_) => "struct",
            Value::Pointer(_) => "pointer",
            Value::Map(_) => "map",
            Value::Chan(_) => "channel",
            Value::Func(_) => "function",
            Value::Boxed(_) => "interface",
        }
    }

    /// A value of the wrong representation reached an operation. Only
    /// generated code that disagrees with its own descriptors gets here.
    fn mismatch(&self, expected: &str) -> Fault {
        Fault::runtime(format!(
            "value representation mismatch: expected {expected}, found {}",
            self.variant_name()
        ))
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Number(n as f64)
    }
}

impl From<Word64> for Value {
    fn from(w: Word64) -> Self {
        Value::Word64(w)
    }
}

impl From<Complex> for Value {
    fn from(c: Complex) -> Self {
        Value::Complex(c)
    }
}

impl From<&str> for Value {
    fn from(text: &str) -> Self {
        Value::Str(GoStr::from(text))
    }
}

impl From<GoStr> for Value {
    fn from(s: GoStr) -> Self {
        Value::Str(s)
    }
}

impl From<Func> for Value {
    fn from(f: Func) -> Self {
        Value::Func(f)
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil => f.write_str("nil"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Number(n) => write!(f, "{n}"),
            Value::Word64(w) => write!(f, "{:#x}", w.bits()),
            Value::Complex(c) => write!(f, "({}{:+}i)", c.real, c.imag),
            Value::Str(s) => write!(f, "{s:?}"),
            Value::Array(a) => f.debug_list().entries(a.values()).finish(),
            Value::Slice(s) => f.debug_list().entries(s.values()).finish(),
            Value::Struct(s) => f.debug_list().entries(s.values()).finish(),
            Value::Pointer(p) => write!(f, "{p:?}"),
            Value::Map(m) => write!(f, "{m:?}"),
            Value::Chan(c) => write!(f, "{c:?}"),
            Value::Func(func) => write!(f, "{func:?}"),
            Value::Boxed(typed) => write!(f, "{typed:?}"),
        }
    }
}
