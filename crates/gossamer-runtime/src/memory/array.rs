use std::fmt;
use std::rc::Rc;

use gossamer_core::Kind;

use super::pointer::{CellPtr, Pointer, Target};
use super::storage::Backing;
use crate::fault::{Fault, FaultResult};
use crate::types::{Type, ptr_type};
use crate::value::Value;

/// An array value: a fixed-length window onto a backing store.
///
/// A fresh array owns its whole store. Arrays obtained by converting a slice
/// to an array pointer share the slice's store.
#[derive(Clone)]
pub struct ArrayRef {
    backing: Rc<Backing>,
    offset: usize,
    len: usize,
}

impl ArrayRef {
    pub fn zeroed(elem: Type, len: usize) -> Self {
        ArrayRef {
            backing: Backing::new(elem, len),
            offset: 0,
            len,
        }
    }

    pub fn from_values(elem: Type, values: Vec<Value>) -> FaultResult<Self> {
        let len = values.len();
        Ok(ArrayRef {
            backing: Backing::from_values(elem, values)?,
            offset: 0,
            len,
        })
    }

    pub(crate) fn window(backing: Rc<Backing>, offset: usize, len: usize) -> Self {
        ArrayRef {
            backing,
            offset,
            len,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn backing(&self) -> &Rc<Backing> {
        &self.backing
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    fn check(&self, index: usize) -> FaultResult<usize> {
        if index >= self.len {
            return Err(Fault::index_out_of_range(index as i64, self.len));
        }
        Ok(self.offset + index)
    }

    pub fn get(&self, index: usize) -> FaultResult<Value> {
        Ok(self.backing.get(self.check(index)?))
    }

    /// Element assignment with value semantics.
    pub fn set(&self, index: usize, value: Value) -> FaultResult<()> {
        self.backing.assign(self.check(index)?, &value)
    }

    pub fn values(&self) -> Vec<Value> {
        (0..self.len)
            .map(|i| self.backing.get(self.offset + i))
            .collect()
    }

    /// Same window of the same store.
    pub fn ptr_eq(&self, other: &ArrayRef) -> bool {
        Rc::ptr_eq(&self.backing, &other.backing) && self.offset == other.offset
    }

    /// `&a[index]`.
    pub fn index_ptr(&self, index: usize) -> FaultResult<Pointer> {
        let absolute = self.check(index)?;
        Ok(element_ptr(&self.backing, absolute))
    }
}

/// Pointer to an element of a backing store. Struct and array elements are
/// their own pointers; other elements get a cached cell pointer.
pub(crate) fn element_ptr(backing: &Rc<Backing>, index: usize) -> Pointer {
    let elem = backing.elem();
    match elem.kind() {
        Kind::Struct | Kind::Array => match backing.get(index) {
            Value::Struct(s) => Pointer::Struct(s),
            Value::Array(a) => Pointer::Array(a),
            _ => Pointer::Nil(ptr_type(elem)),
        },
        _ => {
            let ptr_ty = ptr_type(elem);
            let cell = backing.cached_ptr(index, ptr_ty, || {
                Rc::new(CellPtr::new(
                    ptr_ty,
                    Target::Element {
                        backing: backing.clone(),
                        index,
                    },
                ))
            });
            Pointer::Cell(cell)
        }
    }
}

impl fmt::Debug for ArrayRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.values()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Field, array_type, builtins, struct_type};

    #[test]
    fn index_bounds() {
        let arr = ArrayRef::zeroed(builtins().int, 3);
        assert_eq!(
            arr.get(3).unwrap_err().to_string(),
            "runtime error: index out of range [3] with length 3"
        );
    }

    #[test]
    fn element_pointers_are_cached() {
        let arr = ArrayRef::zeroed(builtins().int, 3);
        let p = arr.index_ptr(1).unwrap();
        let q = arr.index_ptr(1).unwrap();
        assert!(p.ptr_eq(&q));
        p.store(Value::from(9)).unwrap();
        assert!(matches!(arr.get(1).unwrap(), Value::Number(n) if n == 9.0));
        assert!(matches!(q.load().unwrap(), Value::Number(n) if n == 9.0));
    }

    #[test]
    fn struct_elements_are_their_own_pointers() {
        let b = builtins();
        let point = struct_type("", vec![Field::new("X", b.int)]);
        let arr = array_type(point, 2).zero();
        let arr = arr.as_array().unwrap();
        let p = arr.index_ptr(0).unwrap();
        let Pointer::Struct(s) = &p else {
            panic!("expected a struct pointer");
        };
        s.set_field(0, Value::from(3));
        let first = arr.get(0).unwrap();
        assert!(matches!(first.as_struct().unwrap().field(0), Value::Number(n) if n == 3.0));
    }
}
