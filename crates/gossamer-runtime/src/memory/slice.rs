use std::fmt;
use std::rc::Rc;

use gossamer_core::{Kind, RuntimeConfig};

use super::array::{ArrayRef, element_ptr};
use super::pointer::Pointer;
use super::storage::{Backing, copy_elements};
use crate::fault::{Fault, FaultResult};
use crate::types::{Type, ptr_type};
use crate::value::{GoStr, Value};

/// Below this capacity, growth doubles; above it, growth is by a quarter.
const GROWTH_THRESHOLD: usize = 1024;

/// A slice: a view of `len` elements, with room for `cap`, starting at
/// `offset` in a shared backing store.
///
/// The nil slice has no store at all.
#[derive(Clone)]
pub struct Slice {
    ty: Type,
    backing: Option<Rc<Backing>>,
    offset: usize,
    len: usize,
    cap: usize,
}

/// `make([]T, len, cap)`.
pub fn make_slice(ty: Type, len: i64, cap: Option<i64>) -> FaultResult<Slice> {
    let max = RuntimeConfig::current().max_index;
    let cap = cap.unwrap_or(len);
    if len < 0 || len > max {
        return Err(Fault::runtime("makeslice: len out of range"));
    }
    if cap < 0 || cap < len || cap > max {
        return Err(Fault::runtime("makeslice: cap out of range"));
    }
    let backing = Backing::new(ty.elem(), cap as usize);
    Ok(Slice {
        ty,
        backing: Some(backing),
        offset: 0,
        len: len as usize,
        cap: cap as usize,
    })
}

/// `copy(dst, src)`. Returns the number of elements copied.
pub fn copy_slice(dst: &Slice, src: &Slice) -> FaultResult<usize> {
    let n = dst.len.min(src.len);
    if let (Some(d), Some(s)) = (&dst.backing, &src.backing) {
        copy_elements(d, dst.offset, s, src.offset, n, dst.ty.elem())?;
    }
    Ok(n)
}

/// `copy(dst, src)` with a string source.
pub fn copy_string(dst: &Slice, src: &GoStr) -> FaultResult<usize> {
    let n = dst.len.min(src.len());
    if let Some(backing) = &dst.backing {
        for (i, byte) in src.as_bytes()[..n].iter().enumerate() {
            backing.set(dst.offset + i, Value::Number(*byte as f64))?;
        }
    }
    Ok(n)
}

/// `s[low:high]` on a string.
pub fn substring(s: &GoStr, low: usize, high: usize) -> FaultResult<GoStr> {
    if high < low || high > s.len() {
        return Err(Fault::slice_bounds());
    }
    Ok(GoStr::from(&s.as_bytes()[low..high]))
}

impl Slice {
    pub fn nil(ty: Type) -> Self {
        Slice {
            ty,
            backing: None,
            offset: 0,
            len: 0,
            cap: 0,
        }
    }

    /// A slice over a fresh store holding exactly `values`.
    pub fn from_values(ty: Type, values: Vec<Value>) -> FaultResult<Self> {
        Ok(Self::from_backing(ty, Backing::from_values(ty.elem(), values)?))
    }

    pub(crate) fn from_backing(ty: Type, backing: Rc<Backing>) -> Self {
        let len = backing.len();
        Slice {
            ty,
            backing: Some(backing),
            offset: 0,
            len,
            cap: len,
        }
    }

    pub fn ty(&self) -> Type {
        self.ty
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn cap(&self) -> usize {
        self.cap
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn is_nil(&self) -> bool {
        self.backing.is_none()
    }

    pub fn backing(&self) -> Option<&Rc<Backing>> {
        self.backing.as_ref()
    }

    /// Same store and window start; what slice identity means on the host.
    pub fn ptr_eq(&self, other: &Slice) -> bool {
        match (&self.backing, &other.backing) {
            (Some(a), Some(b)) => Rc::ptr_eq(a, b) && self.offset == other.offset,
            (None, None) => true,
            _ => false,
        }
    }

    fn slot(&self, index: usize) -> FaultResult<(&Rc<Backing>, usize)> {
        match &self.backing {
            Some(backing) if index < self.len => Ok((backing, self.offset + index)),
            _ => Err(Fault::index_out_of_range(index as i64, self.len)),
        }
    }

    pub fn get(&self, index: usize) -> FaultResult<Value> {
        let (backing, slot) = self.slot(index)?;
        Ok(backing.get(slot))
    }

    /// `s[index] = value`, with value semantics for aggregates.
    pub fn set(&self, index: usize, value: Value) -> FaultResult<()> {
        let (backing, slot) = self.slot(index)?;
        backing.assign(slot, &value)
    }

    pub fn values(&self) -> Vec<Value> {
        match &self.backing {
            Some(backing) => (0..self.len)
                .map(|i| backing.get(self.offset + i))
                .collect(),
            None => Vec::new(),
        }
    }

    /// The same window seen as another slice type.
    pub fn retyped(&self, ty: Type) -> Slice {
        Slice {
            ty,
            ..self.clone()
        }
    }

    /// `s[low:high:max]`; `high` defaults to the length and `max` to the
    /// capacity. The result shares the store.
    pub fn subslice(&self, low: usize, high: Option<usize>, max: Option<usize>) -> FaultResult<Slice> {
        let high = high.unwrap_or(self.len);
        let max = max.unwrap_or(self.cap);
        if high < low || max < high || max > self.cap {
            return Err(Fault::slice_bounds());
        }
        if self.is_nil() {
            return Ok(self.clone());
        }
        Ok(Slice {
            ty: self.ty,
            backing: self.backing.clone(),
            offset: self.offset + low,
            len: high - low,
            cap: max - low,
        })
    }

    /// `append(s, elems...)`.
    pub fn append(&self, elems: Vec<Value>) -> FaultResult<Slice> {
        if elems.is_empty() {
            return Ok(self.clone());
        }
        let n = elems.len();
        let source = Backing::from_values(self.ty.elem(), elems)?;
        self.append_from(&source, 0, n)
    }

    /// `append(s, other...)`.
    pub fn append_slice(&self, other: &Slice) -> FaultResult<Slice> {
        match &other.backing {
            Some(source) => self.append_from(source, other.offset, other.len),
            None => Ok(self.clone()),
        }
    }

    /// `append(s, str...)` for byte slices.
    pub fn append_string(&self, s: &GoStr) -> FaultResult<Slice> {
        let bytes: Vec<Value> = s.as_bytes().iter().map(|b| Value::Number(*b as f64)).collect();
        self.append(bytes)
    }

    fn append_from(&self, source: &Rc<Backing>, offset: usize, n: usize) -> FaultResult<Slice> {
        if n == 0 {
            return Ok(self.clone());
        }
        let elem = self.ty.elem();
        let new_len = self.len + n;

        let (backing, new_offset, new_cap) = match &self.backing {
            Some(backing) if new_len <= self.cap => (backing.clone(), self.offset, self.cap),
            current => {
                let grown = if self.cap < GROWTH_THRESHOLD {
                    self.cap * 2
                } else {
                    self.cap * 5 / 4
                };
                let new_cap = new_len.max(grown);
                let fresh = Backing::new(elem, new_cap);
                if let Some(old) = current {
                    copy_elements(&fresh, 0, old, self.offset, self.len, elem)?;
                }
                tracing::trace!(ty = %self.ty, old_cap = self.cap, new_cap, "grew slice");
                (fresh, 0, new_cap)
            }
        };

        copy_elements(&backing, new_offset + self.len, source, offset, n, elem)?;
        Ok(Slice {
            ty: self.ty,
            backing: Some(backing),
            offset: new_offset,
            len: new_len,
            cap: new_cap,
        })
    }

    /// `&s[index]`.
    pub fn index_ptr(&self, index: usize) -> FaultResult<Pointer> {
        let (backing, slot) = self.slot(index)?;
        Ok(element_ptr(backing, slot))
    }

    /// `unsafe.SliceData(s)`: nil for the nil slice, otherwise a pointer to
    /// the first element of the window, even when it is empty.
    pub fn data(&self) -> Pointer {
        match &self.backing {
            Some(backing) if self.offset < backing.len() => element_ptr(backing, self.offset),
            _ => Pointer::Nil(ptr_type(self.ty.elem())),
        }
    }

    /// The first `len` elements as an array sharing this slice's store, for
    /// slice-to-array-pointer conversion.
    pub(crate) fn array_window(&self, len: usize) -> FaultResult<Option<ArrayRef>> {
        if self.len < len {
            return Err(Fault::runtime(format!(
                "cannot convert slice with length {} to pointer to array with length {}",
                self.len, len
            )));
        }
        Ok(self
            .backing
            .as_ref()
            .map(|backing| ArrayRef::window(backing.clone(), self.offset, len)))
    }

    /// Whether elements are stored as raw bytes, for string conversions.
    pub(crate) fn elem_kind(&self) -> Kind {
        self.ty.elem().kind()
    }
}

impl fmt::Debug for Slice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_nil() {
            return write!(f, "{}(nil)", self.ty);
        }
        f.debug_list().entries(self.values()).finish()
    }
}
