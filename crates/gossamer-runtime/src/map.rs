//! Map values.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;

use crate::equality::{MapKey, key_for};
use crate::fault::{Fault, FaultResult};
use crate::types::Type;
use crate::value::Value;

type Entries = IndexMap<MapKey, (Value, Value)>;

/// A map value: a reference to insertion-ordered entries keyed by the
/// normalized key of each Go key. The nil map has no entries table.
#[derive(Clone)]
pub struct Map {
    ty: Type,
    entries: Option<Rc<RefCell<Entries>>>,
}

/// `make(map[K]V)`.
pub fn make_map(ty: Type) -> Map {
    Map {
        ty,
        entries: Some(Rc::new(RefCell::new(IndexMap::new()))),
    }
}

impl Map {
    pub fn nil(ty: Type) -> Self {
        Map { ty, entries: None }
    }

    pub fn ty(&self) -> Type {
        self.ty
    }

    pub fn is_nil(&self) -> bool {
        self.entries.is_none()
    }

    pub fn len(&self) -> usize {
        self.entries.as_ref().map_or(0, |e| e.borrow().len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn ptr_eq(&self, other: &Map) -> bool {
        match (&self.entries, &other.entries) {
            (Some(a), Some(b)) => Rc::ptr_eq(a, b),
            (None, None) => true,
            _ => false,
        }
    }

    fn key(&self, key: &Value) -> FaultResult<MapKey> {
        key_for(self.ty.key().unwrap_or(self.ty), key)
    }

    /// `v, ok := m[key]`. A missing key yields the element zero value.
    pub fn get(&self, key: &Value) -> FaultResult<(Value, bool)> {
        let elem = self.ty.elem();
        let normalized = self.key(key)?;
        let found = self
            .entries
            .as_ref()
            .and_then(|e| e.borrow().get(&normalized).map(|(_, v)| v.clone()));
        match found {
            Some(value) => Ok((elem.clone_value(&value)?, true)),
            None => Ok((elem.zero(), false)),
        }
    }

    /// `m[key] = value`.
    pub fn insert(&self, key: Value, value: Value) -> FaultResult<()> {
        let normalized = self.key(&key)?;
        let Some(entries) = &self.entries else {
            return Err(Fault::panic_str("assignment to entry in nil map"));
        };
        let key_ty = self.ty.key().unwrap_or(self.ty);
        let key = key_ty.clone_value(&key)?;
        let value = self.ty.elem().clone_value(&value)?;
        entries.borrow_mut().insert(normalized, (key, value));
        Ok(())
    }

    /// `delete(m, key)`; a no-op on the nil map.
    pub fn remove(&self, key: &Value) -> FaultResult<()> {
        let normalized = self.key(key)?;
        if let Some(entries) = &self.entries {
            entries.borrow_mut().shift_remove(&normalized);
        }
        Ok(())
    }

    /// Snapshot of the entries in insertion order.
    pub fn entries(&self) -> Vec<(Value, Value)> {
        match &self.entries {
            Some(entries) => entries.borrow().values().cloned().collect(),
            None => Vec::new(),
        }
    }
}

impl fmt::Debug for Map {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_nil() {
            return write!(f, "{}(nil)", self.ty);
        }
        f.debug_map().entries(self.entries()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{builtins, map_type};

    #[test]
    fn insert_get_remove() {
        let b = builtins();
        let m = make_map(map_type(b.string, b.int));
        m.insert(Value::from("a"), Value::from(1)).unwrap();
        m.insert(Value::from("b"), Value::from(2)).unwrap();
        m.insert(Value::from("a"), Value::from(3)).unwrap();
        assert_eq!(m.len(), 2);

        let (v, ok) = m.get(&Value::from("a")).unwrap();
        assert!(ok);
        assert_eq!(v.as_number(), Some(3.0));

        m.remove(&Value::from("a")).unwrap();
        let (v, ok) = m.get(&Value::from("a")).unwrap();
        assert!(!ok);
        assert_eq!(v.as_number(), Some(0.0));

        let keys: Vec<_> = m.entries().into_iter().map(|(k, _)| k.as_str().map(str::to_owned)).collect();
        assert_eq!(keys, vec![Some("b".to_string())]);
    }

    #[test]
    fn nil_map_reads_but_rejects_writes() {
        let b = builtins();
        let m = Map::nil(map_type(b.int, b.bool));
        assert_eq!(m.len(), 0);
        assert!(!m.get(&Value::from(1)).unwrap().1);
        assert!(m.remove(&Value::from(1)).is_ok());
        let err = m.insert(Value::from(1), Value::from(true)).unwrap_err();
        assert_eq!(err.message(), "assignment to entry in nil map");
    }
}
