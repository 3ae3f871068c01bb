use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use gossamer_core::Kind;

use super::array::ArrayRef;
use super::storage::Backing;
use super::structs::{FieldStorage, StructRef};
use crate::fault::{Fault, FaultResult};
use crate::types::Type;
use crate::value::Value;

/// A pointer value.
///
/// There are no addresses on the host. A pointer to a struct is the struct
/// object itself, a pointer to an array is a window onto its store, and
/// everything else is a handle bound to one storage cell.
#[derive(Clone)]
pub enum Pointer {
    /// The nil pointer of a pointer type.
    Nil(Type),
    Struct(StructRef),
    Array(ArrayRef),
    Cell(Rc<CellPtr>),
}

/// A handle onto a single storage cell.
pub struct CellPtr {
    ty: Type,
    target: Target,
}

#[derive(Clone)]
pub(crate) enum Target {
    /// A standalone variable.
    Var(Rc<RefCell<Value>>),
    Element { backing: Rc<Backing>, index: usize },
    Field { fields: Rc<FieldStorage>, index: usize },
}

impl Target {
    fn same_cell(&self, other: &Target) -> bool {
        match (self, other) {
            (Target::Var(a), Target::Var(b)) => Rc::ptr_eq(a, b),
            (
                Target::Element { backing: a, index: i },
                Target::Element { backing: b, index: j },
            ) => Rc::ptr_eq(a, b) && i == j,
            (
                Target::Field { fields: a, index: i },
                Target::Field { fields: b, index: j },
            ) => Rc::ptr_eq(a, b) && i == j,
            _ => false,
        }
    }

    /// Address-like identity, stable while the cell is alive.
    fn identity(&self) -> (usize, usize) {
        match self {
            Target::Var(var) => (Rc::as_ptr(var) as *const () as usize, 0),
            Target::Element { backing, index } => (Rc::as_ptr(backing) as *const () as usize, *index),
            Target::Field { fields, index } => (Rc::as_ptr(fields) as *const () as usize, *index),
        }
    }
}

impl CellPtr {
    pub(crate) fn new(ty: Type, target: Target) -> Self {
        CellPtr { ty, target }
    }

    pub fn ty(&self) -> Type {
        self.ty
    }

    pub fn get(&self) -> Value {
        match &self.target {
            Target::Var(var) => var.borrow().clone(),
            Target::Element { backing, index } => backing.get(*index),
            Target::Field { fields, index } => fields.get(*index),
        }
    }

    pub fn set(&self, value: Value) -> FaultResult<()> {
        match &self.target {
            Target::Var(var) => {
                *var.borrow_mut() = value;
                Ok(())
            }
            Target::Element { backing, index } => backing.set(*index, value),
            Target::Field { fields, index } => {
                fields.set(*index, value);
                Ok(())
            }
        }
    }

    /// The same cell seen through another pointer type.
    pub(crate) fn retyped(&self, ty: Type) -> CellPtr {
        CellPtr {
            ty,
            target: self.target.clone(),
        }
    }
}

impl Pointer {
    pub fn nil(ty: Type) -> Self {
        Pointer::Nil(ty)
    }

    /// A pointer to a fresh variable holding `initial` (`new(T)`, `&x`).
    ///
    /// Struct and array values are their own storage, so the pointer aliases
    /// them directly.
    pub fn new_var(ptr_ty: Type, initial: Value) -> Self {
        match (ptr_ty.elem().kind(), initial) {
            (Kind::Struct, Value::Struct(s)) => Pointer::Struct(s),
            (Kind::Array, Value::Array(a)) => Pointer::Array(a),
            (_, initial) => Pointer::Cell(Rc::new(CellPtr::new(
                ptr_ty,
                Target::Var(Rc::new(RefCell::new(initial))),
            ))),
        }
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, Pointer::Nil(_))
    }

    /// `*p`. Struct and array targets are returned by reference.
    pub fn load(&self) -> FaultResult<Value> {
        match self {
            Pointer::Nil(_) => Err(Fault::nil_deref()),
            Pointer::Struct(s) => Ok(Value::Struct(s.clone())),
            Pointer::Array(a) => Ok(Value::Array(a.clone())),
            Pointer::Cell(cell) => Ok(cell.get()),
        }
    }

    /// `*p = value`, copying aggregates into the pointee.
    pub fn store(&self, value: Value) -> FaultResult<()> {
        match self {
            Pointer::Nil(_) => Err(Fault::nil_deref()),
            Pointer::Struct(s) => s.ty().copy_into(&Value::Struct(s.clone()), &value),
            Pointer::Array(a) => {
                let src = value.try_array()?;
                super::copy_elements(
                    a.backing(),
                    a.offset(),
                    src.backing(),
                    src.offset(),
                    a.len().min(src.len()),
                    a.backing().elem(),
                )
            }
            Pointer::Cell(cell) => cell.set(value),
        }
    }

    /// Pointer equality: both nil, or both refer to the same storage.
    pub fn ptr_eq(&self, other: &Pointer) -> bool {
        match (self, other) {
            (Pointer::Nil(_), Pointer::Nil(_)) => true,
            (Pointer::Struct(a), Pointer::Struct(b)) => a.same_storage(b),
            (Pointer::Array(a), Pointer::Array(b)) => a.ptr_eq(b),
            (Pointer::Cell(a), Pointer::Cell(b)) => a.target.same_cell(&b.target),
            _ => false,
        }
    }

    /// Identity used for map keys; `None` for nil.
    pub(crate) fn identity(&self) -> Option<(usize, usize)> {
        match self {
            Pointer::Nil(_) => None,
            Pointer::Struct(s) => Some((s.storage_addr(), 0)),
            Pointer::Array(a) => Some((Rc::as_ptr(a.backing()) as *const () as usize, a.offset())),
            Pointer::Cell(cell) => Some(cell.target.identity()),
        }
    }
}

impl fmt::Debug for Pointer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.identity() {
            None => f.write_str("nil"),
            Some((addr, index)) => write!(f, "&{addr:#x}+{index}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{builtins, ptr_type};

    #[test]
    fn nil_pointers_fault() {
        let p = Pointer::nil(ptr_type(builtins().int));
        assert_eq!(
            p.load().unwrap_err().to_string(),
            "runtime error: invalid memory address or nil pointer dereference"
        );
        assert!(p.store(Value::from(1)).is_err());
    }

    #[test]
    fn variable_pointers_share_the_cell() {
        let p = Pointer::new_var(ptr_type(builtins().string), Value::from("a"));
        let q = p.clone();
        q.store(Value::from("b")).unwrap();
        assert_eq!(p.load().unwrap().as_str(), Some("b"));
        assert!(p.ptr_eq(&q));
        let other = Pointer::new_var(ptr_type(builtins().string), Value::from("b"));
        assert!(!p.ptr_eq(&other));
    }
}
