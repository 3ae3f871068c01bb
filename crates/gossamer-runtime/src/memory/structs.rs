use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::{Rc, Weak};

use gossamer_core::Kind;

use super::pointer::{CellPtr, Pointer, Target};
use crate::types::{Type, ptr_type};
use crate::value::Value;

/// Field values of a struct object, shared by the object and every proxy
/// created for it.
pub struct FieldStorage {
    values: RefCell<Vec<Value>>,
    /// Proxy objects by target struct type id.
    proxies: RefCell<HashMap<u32, Weak<StructObj>>>,
    /// Cell pointers handed out for fields, by (index, pointer type id).
    ptrs: RefCell<HashMap<(usize, u32), Weak<CellPtr>>>,
}

impl FieldStorage {
    pub(crate) fn get(&self, index: usize) -> Value {
        self.values.borrow()[index].clone()
    }

    pub(crate) fn set(&self, index: usize, value: Value) {
        self.values.borrow_mut()[index] = value;
    }
}

pub struct StructObj {
    ty: Type,
    storage: Rc<FieldStorage>,
}

/// A struct value. Pointer identity is object identity: `&s` is `s` itself.
#[derive(Clone)]
pub struct StructRef(Rc<StructObj>);

impl StructRef {
    /// A struct of type `ty` with every field zeroed.
    pub fn zero(ty: Type) -> Self {
        let values = ty.fields().iter().map(|f| f.typ.zero()).collect();
        Self::new(ty, values)
    }

    /// A struct holding exactly `values`, in field order.
    pub fn new(ty: Type, values: Vec<Value>) -> Self {
        StructRef(Rc::new(StructObj {
            ty,
            storage: Rc::new(FieldStorage {
                values: RefCell::new(values),
                proxies: RefCell::new(HashMap::new()),
                ptrs: RefCell::new(HashMap::new()),
            }),
        }))
    }

    pub fn ty(&self) -> Type {
        self.0.ty
    }

    pub fn field(&self, index: usize) -> Value {
        self.0.storage.get(index)
    }

    pub fn field_by_name(&self, name: &str) -> Option<Value> {
        self.ty().field_index(name).map(|index| self.field(index))
    }

    /// Raw field store; aggregates are stored by reference.
    pub fn set_field(&self, index: usize, value: Value) {
        self.0.storage.set(index, value)
    }

    /// Field assignment with value semantics.
    pub fn assign_field(&self, index: usize, value: &Value) -> crate::fault::FaultResult<()> {
        let typ = self.ty().fields()[index].typ;
        match typ.kind() {
            Kind::Array | Kind::Struct => typ.copy_into(&self.field(index), value),
            _ => {
                self.set_field(index, value.clone());
                Ok(())
            }
        }
    }

    pub fn values(&self) -> Vec<Value> {
        self.0.storage.values.borrow().clone()
    }

    /// Both refer to the same field storage, possibly through different
    /// proxy types.
    pub fn same_storage(&self, other: &StructRef) -> bool {
        Rc::ptr_eq(&self.0.storage, &other.0.storage)
    }

    /// Same object, including the proxy type.
    pub fn ptr_eq(&self, other: &StructRef) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub(crate) fn storage_addr(&self) -> usize {
        Rc::as_ptr(&self.0.storage) as *const () as usize
    }

    /// `&s.field`. Struct and array fields are their own pointers.
    pub fn field_ptr(&self, index: usize) -> Pointer {
        let typ = self.ty().fields()[index].typ;
        match (typ.kind(), self.field(index)) {
            (Kind::Struct, Value::Struct(s)) => Pointer::Struct(s),
            (Kind::Array, Value::Array(a)) => Pointer::Array(a),
            _ => {
                let ptr_ty = ptr_type(typ);
                let key = (index, ptr_ty.id());
                let storage = &self.0.storage;
                let mut ptrs = storage.ptrs.borrow_mut();
                if let Some(ptr) = ptrs.get(&key).and_then(Weak::upgrade) {
                    return Pointer::Cell(ptr);
                }
                let ptr = Rc::new(CellPtr::new(
                    ptr_ty,
                    Target::Field {
                        fields: storage.clone(),
                        index,
                    },
                ));
                ptrs.insert(key, Rc::downgrade(&ptr));
                Pointer::Cell(ptr)
            }
        }
    }

    /// View this struct's fields through the layout-compatible struct type
    /// `ty`. Repeated requests for the same type return the same proxy.
    pub fn proxy(&self, ty: Type) -> StructRef {
        if ty == self.ty() {
            return self.clone();
        }
        let storage = &self.0.storage;
        let mut proxies = storage.proxies.borrow_mut();
        if let Some(proxy) = proxies.get(&ty.id()).and_then(Weak::upgrade) {
            return StructRef(proxy);
        }
        proxies
            .entry(self.ty().id())
            .or_insert_with(|| Rc::downgrade(&self.0));
        let proxy = Rc::new(StructObj {
            ty,
            storage: storage.clone(),
        });
        proxies.insert(ty.id(), Rc::downgrade(&proxy));
        tracing::trace!(from = %self.ty(), to = %ty, "created struct proxy");
        StructRef(proxy)
    }
}

impl fmt::Debug for StructRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ", self.ty())?;
        f.debug_list().entries(self.values()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Field, TypeDesc, builtins, struct_type};

    fn named_point(name: &str) -> Type {
        let ty = TypeDesc::builder(Kind::Struct, name).named().pkg("main").build();
        ty.init_struct(
            "main",
            vec![Field::new("X", builtins().int), Field::new("Y", builtins().int)],
        )
        .unwrap();
        ty
    }

    #[test]
    fn proxies_share_fields_and_are_cached() {
        let a = named_point("main.A");
        let b = named_point("main.B");
        let s = StructRef::zero(a);
        let p = s.proxy(b);
        assert_eq!(p.ty(), b);
        assert!(p.ptr_eq(&s.proxy(b)));
        assert!(p.same_storage(&s));

        p.set_field(1, Value::from(4));
        assert!(matches!(s.field(1), Value::Number(n) if n == 4.0));
        assert!(s.proxy(a).ptr_eq(&s));
        assert!(p.proxy(a).same_storage(&s));
    }

    #[test]
    fn field_pointers_alias_the_field() {
        let point = struct_type("", vec![Field::new("X", builtins().int)]);
        let s = StructRef::zero(point);
        let p = s.field_ptr(0);
        assert!(p.ptr_eq(&s.field_ptr(0)));
        p.store(Value::from(11)).unwrap();
        assert!(matches!(s.field_by_name("X"), Some(Value::Number(n)) if n == 11.0));
    }
}
