//! Backing stores for arrays and slices.
//!
//! Numeric elements live in fixed-width vectors so that stores truncate to
//! the element width for free; everything else is a vector of [`Value`]s.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::{Rc, Weak};

use gossamer_core::Kind;

use super::pointer::CellPtr;
use crate::fault::FaultResult;
use crate::numeric::{to_int32, to_uint32};
use crate::types::Type;
use crate::value::Value;

pub(crate) enum Storage {
    I8(Vec<i8>),
    I16(Vec<i16>),
    I32(Vec<i32>),
    U8(Vec<u8>),
    U16(Vec<u16>),
    U32(Vec<u32>),
    F32(Vec<f32>),
    F64(Vec<f64>),
    Values(Vec<Value>),
}

macro_rules! each_native {
    ($storage:expr, $v:ident => $body:expr, $values:ident => $other:expr) => {
        match $storage {
            Storage::I8($v) => $body,
            Storage::I16($v) => $body,
            Storage::I32($v) => $body,
            Storage::U8($v) => $body,
            Storage::U16($v) => $body,
            Storage::U32($v) => $body,
            Storage::F32($v) => $body,
            Storage::F64($v) => $body,
            Storage::Values($values) => $other,
        }
    };
}

impl Storage {
    /// Zero-filled storage of `len` elements of type `elem`.
    pub(crate) fn zeroed(elem: Type, len: usize) -> Storage {
        match elem.kind() {
            Kind::Int8 => Storage::I8(vec![0; len]),
            Kind::Int16 => Storage::I16(vec![0; len]),
            Kind::Int | Kind::Int32 => Storage::I32(vec![0; len]),
            Kind::Uint8 => Storage::U8(vec![0; len]),
            Kind::Uint16 => Storage::U16(vec![0; len]),
            Kind::Uint | Kind::Uint32 | Kind::Uintptr => Storage::U32(vec![0; len]),
            Kind::Float32 => Storage::F32(vec![0.0; len]),
            Kind::Float64 => Storage::F64(vec![0.0; len]),
            _ => Storage::Values((0..len).map(|_| elem.zero()).collect()),
        }
    }

    pub(crate) fn len(&self) -> usize {
        each_native!(self, v => v.len(), values => values.len())
    }

    pub(crate) fn get(&self, index: usize) -> Value {
        match self {
            Storage::I8(v) => Value::Number(v[index] as f64),
            Storage::I16(v) => Value::Number(v[index] as f64),
            Storage::I32(v) => Value::Number(v[index] as f64),
            Storage::U8(v) => Value::Number(v[index] as f64),
            Storage::U16(v) => Value::Number(v[index] as f64),
            Storage::U32(v) => Value::Number(v[index] as f64),
            Storage::F32(v) => Value::Number(v[index] as f64),
            Storage::F64(v) => Value::Number(v[index]),
            Storage::Values(v) => v[index].clone(),
        }
    }

    pub(crate) fn set(&mut self, index: usize, value: Value) -> FaultResult<()> {
        if let Storage::Values(v) = self {
            v[index] = value;
            return Ok(());
        }
        let n = value.try_number()?;
        match self {
            Storage::I8(v) => v[index] = to_int32(n) as i8,
            Storage::I16(v) => v[index] = to_int32(n) as i16,
            Storage::I32(v) => v[index] = to_int32(n),
            Storage::U8(v) => v[index] = to_uint32(n) as u8,
            Storage::U16(v) => v[index] = to_uint32(n) as u16,
            Storage::U32(v) => v[index] = to_uint32(n),
            Storage::F32(v) => v[index] = n as f32,
            Storage::F64(v) => v[index] = n,
            Storage::Values(_) => unreachable!(),
        }
        Ok(())
    }

    /// `memmove` within one store.
    pub(crate) fn copy_within(&mut self, src: usize, dst: usize, n: usize) {
        each_native!(self, v => v.copy_within(src..src + n, dst), values => {
            let moved: Vec<Value> = values[src..src + n].to_vec();
            values[dst..dst + n].clone_from_slice(&moved);
        })
    }

    /// Copy `n` elements from another store of the same element kind.
    pub(crate) fn copy_from(
        &mut self,
        dst: usize,
        other: &Storage,
        src: usize,
        n: usize,
    ) -> FaultResult<()> {
        match (self, other) {
            (Storage::I8(d), Storage::I8(s)) => d[dst..dst + n].copy_from_slice(&s[src..src + n]),
            (Storage::I16(d), Storage::I16(s)) => d[dst..dst + n].copy_from_slice(&s[src..src + n]),
            (Storage::I32(d), Storage::I32(s)) => d[dst..dst + n].copy_from_slice(&s[src..src + n]),
            (Storage::U8(d), Storage::U8(s)) => d[dst..dst + n].copy_from_slice(&s[src..src + n]),
            (Storage::U16(d), Storage::U16(s)) => d[dst..dst + n].copy_from_slice(&s[src..src + n]),
            (Storage::U32(d), Storage::U32(s)) => d[dst..dst + n].copy_from_slice(&s[src..src + n]),
            (Storage::F32(d), Storage::F32(s)) => d[dst..dst + n].copy_from_slice(&s[src..src + n]),
            (Storage::F64(d), Storage::F64(s)) => d[dst..dst + n].copy_from_slice(&s[src..src + n]),
            (Storage::Values(d), Storage::Values(s)) => {
                d[dst..dst + n].clone_from_slice(&s[src..src + n])
            }
            (this, other) => {
                for i in 0..n {
                    this.set(dst + i, other.get(src + i))?;
                }
            }
        }
        Ok(())
    }
}

/// A shared backing array.
///
/// Slices and array values are windows onto a `Backing`; writes through one
/// window are visible through every window that covers the same index.
pub struct Backing {
    elem: Type,
    store: RefCell<Storage>,
    /// Cell pointers handed out for elements, by (index, pointer type id).
    ptrs: RefCell<HashMap<(usize, u32), Weak<CellPtr>>>,
}

impl Backing {
    pub fn new(elem: Type, len: usize) -> Rc<Backing> {
        Self::from_storage(elem, Storage::zeroed(elem, len))
    }

    pub(crate) fn from_storage(elem: Type, storage: Storage) -> Rc<Backing> {
        Rc::new(Backing {
            elem,
            store: RefCell::new(storage),
            ptrs: RefCell::new(HashMap::new()),
        })
    }

    /// A store holding exactly `values`, without copying aggregates.
    pub fn from_values(elem: Type, values: Vec<Value>) -> FaultResult<Rc<Backing>> {
        let storage = match Storage::zeroed(elem, 0) {
            Storage::Values(_) => Storage::Values(values),
            _ => {
                let mut storage = Storage::zeroed(elem, values.len());
                for (index, value) in values.into_iter().enumerate() {
                    storage.set(index, value)?;
                }
                storage
            }
        };
        Ok(Self::from_storage(elem, storage))
    }

    pub fn elem(&self) -> Type {
        self.elem
    }

    pub fn len(&self) -> usize {
        self.store.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Read an element. Aggregate elements are returned by reference.
    pub fn get(&self, index: usize) -> Value {
        self.store.borrow().get(index)
    }

    /// Overwrite an element slot.
    pub fn set(&self, index: usize, value: Value) -> FaultResult<()> {
        self.store.borrow_mut().set(index, value)
    }

    /// Assign with value semantics: aggregates are copied into the existing
    /// element so pointers to it observe the new contents.
    pub fn assign(&self, index: usize, value: &Value) -> FaultResult<()> {
        if matches!(self.elem.kind(), Kind::Array | Kind::Struct) {
            let slot = self.get(index);
            return self.elem.copy_into(&slot, value);
        }
        self.set(index, value.clone())
    }

    pub(crate) fn store(&self) -> &RefCell<Storage> {
        &self.store
    }

    pub(crate) fn cached_ptr(
        &self,
        index: usize,
        ptr_ty: Type,
        create: impl FnOnce() -> Rc<CellPtr>,
    ) -> Rc<CellPtr> {
        let key = (index, ptr_ty.id());
        let mut ptrs = self.ptrs.borrow_mut();
        if let Some(ptr) = ptrs.get(&key).and_then(Weak::upgrade) {
            return ptr;
        }
        let ptr = create();
        ptrs.insert(key, Rc::downgrade(&ptr));
        ptr
    }
}

/// Copy `n` elements between (possibly the same) backing stores.
///
/// Overlapping ranges of one store behave like `memmove`. Aggregate elements
/// are copied into the destination objects, iterating backwards when the
/// destination follows the source in the same store.
pub fn copy_elements(
    dst: &Rc<Backing>,
    dst_offset: usize,
    src: &Rc<Backing>,
    src_offset: usize,
    n: usize,
    elem: Type,
) -> FaultResult<()> {
    let same = Rc::ptr_eq(dst, src);
    if n == 0 || (same && dst_offset == src_offset) {
        return Ok(());
    }

    if matches!(elem.kind(), Kind::Array | Kind::Struct) {
        let pairs: Vec<(Value, Value)> = (0..n)
            .map(|i| (dst.get(dst_offset + i), src.get(src_offset + i)))
            .collect();
        if same && dst_offset > src_offset {
            for (d, s) in pairs.iter().rev() {
                elem.copy_into(d, s)?;
            }
        } else {
            for (d, s) in &pairs {
                elem.copy_into(d, s)?;
            }
        }
        return Ok(());
    }

    if same {
        dst.store.borrow_mut().copy_within(src_offset, dst_offset, n);
        return Ok(());
    }
    let source = src.store.borrow();
    dst.store.borrow_mut().copy_from(dst_offset, &source, src_offset, n)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::builtins;

    fn numbers(backing: &Backing) -> Vec<f64> {
        (0..backing.len())
            .map(|i| backing.get(i).as_number().unwrap())
            .collect()
    }

    #[test]
    fn narrow_stores_truncate() {
        let bytes = Backing::new(builtins().uint8, 2);
        bytes.set(0, Value::from(257)).unwrap();
        bytes.set(1, Value::from(-1)).unwrap();
        assert_eq!(numbers(&bytes), vec![1.0, 255.0]);

        let floats = Backing::new(builtins().float32, 1);
        floats.set(0, Value::from(0.1)).unwrap();
        assert_eq!(numbers(&floats), vec![0.1f32 as f64]);
    }

    #[test]
    fn rejects_non_numbers_in_numeric_stores() {
        let ints = Backing::new(builtins().int32, 1);
        assert!(ints.set(0, Value::from("x")).is_err());
    }

    #[test]
    fn overlapping_copy_is_a_memmove() {
        let b = builtins();
        let ints = Backing::from_values(b.int, (1..=5).map(Value::from).collect()).unwrap();
        copy_elements(&ints, 1, &ints, 0, 4, b.int).unwrap();
        assert_eq!(numbers(&ints), vec![1.0, 1.0, 2.0, 3.0, 4.0]);
        copy_elements(&ints, 0, &ints, 1, 4, b.int).unwrap();
        assert_eq!(numbers(&ints), vec![1.0, 2.0, 3.0, 4.0, 4.0]);
    }
}
