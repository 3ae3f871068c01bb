//! Type descriptors.
//!
//! Every type of a compiled program is described by one [`TypeDesc`]. Named
//! types are created by [`TypeDesc::builder`] (or [`define_type`] for raw
//! kind codes) and initialized in a second step, because composite types may
//! refer to themselves. Unnamed composite types come from the interning
//! constructors in [`registry`] and are physically unique per structure, so
//! descriptor identity can stand in for structural equality everywhere.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, OnceLock};

use dashmap::DashMap;
use gossamer_core::{ConstructionError, ConstructionResult, Kind, RuntimeConfig};

use crate::chan::Chan;
use crate::fault::{Fault, FaultResult};
use crate::map::Map;
use crate::memory::{ArrayRef, Pointer, Slice, StructRef, copy_elements};
use crate::methods::MethodSetEntry;
use crate::numeric::{imul, to_uint32, truncate};
use crate::value::{Complex, Func, GoStr, Value, Word64};

pub mod registry;

pub use registry::{
    Builtins, array_type, builtins, chan_type, func_type, interface_type, map_type, ptr_type,
    slice_type, struct_type,
};

/// An interned, immortal type descriptor.
pub type Type = &'static TypeDesc;

static NEXT_TYPE_ID: AtomicU32 = AtomicU32::new(0);

// ============================================================================
// Shapes
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ChanDir {
    Both,
    Send,
    Recv,
}

impl ChanDir {
    pub(crate) fn slot(self) -> usize {
        match self {
            ChanDir::Both => 0,
            ChanDir::Send => 1,
            ChanDir::Recv => 2,
        }
    }
}

/// Kind-specific part of a composite descriptor, attached once.
#[derive(Debug)]
pub enum Shape {
    Array {
        elem: Type,
        len: usize,
    },
    Chan {
        elem: Type,
        dir: ChanDir,
    },
    Func {
        params: Vec<Type>,
        results: Vec<Type>,
        variadic: bool,
    },
    Interface {
        methods: Vec<Method>,
    },
    Map {
        key: Type,
        elem: Type,
    },
    Ptr {
        elem: Type,
    },
    Slice {
        elem: Type,
    },
    Struct {
        pkg_path: String,
        fields: Vec<Field>,
    },
}

impl Shape {
    fn kind(&self) -> Kind {
        match self {
            Shape::Array { .. } => Kind::Array,
            Shape::Chan { .. } => Kind::Chan,
            Shape::Func { .. } => Kind::Func,
            Shape::Interface { .. } => Kind::Interface,
            Shape::Map { .. } => Kind::Map,
            Shape::Ptr { .. } => Kind::Ptr,
            Shape::Slice { .. } => Kind::Slice,
            Shape::Struct { .. } => Kind::Struct,
        }
    }

    fn comparable(&self) -> bool {
        match self {
            Shape::Array { elem, .. } => elem.comparable(),
            Shape::Func { .. } | Shape::Map { .. } | Shape::Slice { .. } => false,
            Shape::Struct { fields, .. } => fields.iter().all(|f| f.typ.comparable()),
            Shape::Chan { .. } | Shape::Interface { .. } | Shape::Ptr { .. } => true,
        }
    }
}

#[derive(Clone, Debug)]
pub struct Field {
    pub name: String,
    /// Storage key of the field in struct objects.
    pub prop: String,
    pub typ: Type,
    pub embedded: bool,
    pub exported: bool,
    pub tag: String,
}

impl Field {
    pub fn new(name: impl Into<String>, typ: Type) -> Self {
        let name = name.into();
        Field {
            prop: name.clone(),
            exported: is_exported(&name),
            name,
            typ,
            embedded: false,
            tag: String::new(),
        }
    }

    /// An embedded field. `name` is the embedded type's name.
    pub fn embedded(name: impl Into<String>, typ: Type) -> Self {
        Field {
            embedded: true,
            ..Field::new(name, typ)
        }
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = tag.into();
        self
    }
}

/// Implementation of a method. The receiver is the value itself for value
/// receivers and a [`Value::Pointer`] for pointer receivers.
pub type MethodImpl = Arc<dyn Fn(&Value, &[Value]) -> FaultResult<Vec<Value>> + Send + Sync>;

#[derive(Clone)]
pub struct Method {
    pub name: String,
    /// Package path for unexported names; empty for exported ones.
    pub pkg: String,
    pub prop: String,
    /// Signature, without the receiver.
    pub typ: Type,
    imp: Option<MethodImpl>,
}

impl Method {
    pub fn new(name: impl Into<String>, typ: Type) -> Self {
        let name = name.into();
        Method {
            prop: name.clone(),
            name,
            pkg: String::new(),
            typ,
            imp: None,
        }
    }

    pub fn unexported(name: impl Into<String>, pkg: impl Into<String>, typ: Type) -> Self {
        Method {
            pkg: pkg.into(),
            ..Method::new(name, typ)
        }
    }

    pub fn with_impl(
        mut self,
        imp: impl Fn(&Value, &[Value]) -> FaultResult<Vec<Value>> + Send + Sync + 'static,
    ) -> Self {
        self.imp = Some(Arc::new(imp));
        self
    }

    pub fn has_impl(&self) -> bool {
        self.imp.is_some()
    }

    pub(crate) fn imp(&self) -> Option<&MethodImpl> {
        self.imp.as_ref()
    }

    /// Same name, package and signature: what interface satisfaction checks.
    pub fn matches(&self, other: &Method) -> bool {
        self.name == other.name && self.pkg == other.pkg && self.typ == other.typ
    }
}

impl fmt::Debug for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.pkg.is_empty() {
            write!(f, "{}.", self.pkg)?;
        }
        write!(f, "{}{}", self.name, signature_suffix(self.typ))
    }
}

/// A signature without its leading `func`.
pub(crate) fn signature_suffix(typ: Type) -> &'static str {
    typ.string().strip_prefix("func").unwrap_or(typ.string())
}

/// Whether an identifier is exported: it starts with an upper-case letter.
pub fn is_exported(name: &str) -> bool {
    name.chars().next().is_some_and(char::is_uppercase)
}

// ============================================================================
// Descriptor
// ============================================================================

pub struct TypeDesc {
    id: u32,
    kind: Kind,
    size: u32,
    string: String,
    named: bool,
    pkg: String,
    exported: bool,
    comparable: AtomicBool,
    shape: OnceLock<Shape>,
    methods: OnceLock<Vec<Method>>,
    pub(crate) method_set: OnceLock<Vec<MethodSetEntry>>,
    pub(crate) ptr: OnceLock<Type>,
    pub(crate) slice: OnceLock<Type>,
    pub(crate) chans: [OnceLock<Type>; 3],
    /// Interface satisfaction by source type name: `None` when satisfied,
    /// otherwise the first missing method.
    pub(crate) satisfaction: DashMap<String, Option<String>>,
}

/// Builder for a descriptor shell.
pub struct TypeBuilder {
    kind: Kind,
    string: String,
    size: Option<u32>,
    named: bool,
    pkg: String,
    exported: bool,
    shape: Option<Shape>,
}

impl TypeBuilder {
    pub fn size(mut self, size: u32) -> Self {
        self.size = Some(size);
        self
    }

    pub fn named(mut self) -> Self {
        self.named = true;
        self
    }

    pub fn pkg(mut self, pkg: impl Into<String>) -> Self {
        self.pkg = pkg.into();
        self
    }

    pub fn exported(mut self, exported: bool) -> Self {
        self.exported = exported;
        self
    }

    /// Attach the shape at construction. Only for descriptors that cannot be
    /// self-referential.
    pub(crate) fn shape(mut self, shape: Shape) -> Self {
        self.shape = Some(shape);
        self
    }

    pub fn build(self) -> Type {
        let word = RuntimeConfig::current().word_size;
        let size = self.size.unwrap_or_else(|| default_size(self.kind, word));
        let desc: Type = Box::leak(Box::new(TypeDesc {
            id: NEXT_TYPE_ID.fetch_add(1, Ordering::Relaxed),
            kind: self.kind,
            size,
            string: self.string,
            named: self.named,
            pkg: self.pkg,
            exported: self.exported,
            comparable: AtomicBool::new(true),
            shape: OnceLock::new(),
            methods: OnceLock::new(),
            method_set: OnceLock::new(),
            ptr: OnceLock::new(),
            slice: OnceLock::new(),
            chans: [OnceLock::new(), OnceLock::new(), OnceLock::new()],
            satisfaction: DashMap::new(),
        }));

        // Struct and array descriptors own their pointer type from the start.
        if matches!(self.kind, Kind::Struct | Kind::Array) {
            let (pkg, exported) = match self.kind {
                Kind::Struct => (desc.pkg.clone(), desc.exported),
                _ => (String::new(), false),
            };
            let ptr = TypeDesc::builder(Kind::Ptr, format!("*{}", desc.string))
                .pkg(pkg)
                .exported(exported)
                .shape(Shape::Ptr { elem: desc })
                .build();
            let _ = desc.ptr.set(ptr);
        }

        if let Some(shape) = self.shape {
            desc.attach(shape);
        }
        tracing::trace!(id = desc.id, kind = %desc.kind, string = %desc.string, "defined type");
        desc
    }
}

fn default_size(kind: Kind, word: u32) -> u32 {
    match kind {
        Kind::Bool | Kind::Int8 | Kind::Uint8 => 1,
        Kind::Int16 | Kind::Uint16 => 2,
        Kind::Int32 | Kind::Uint32 | Kind::Float32 => 4,
        Kind::Int64 | Kind::Uint64 | Kind::Float64 | Kind::Complex64 => 8,
        Kind::Complex128 => 16,
        Kind::Int
        | Kind::Uint
        | Kind::Uintptr
        | Kind::UnsafePointer
        | Kind::Chan
        | Kind::Func
        | Kind::Map
        | Kind::Ptr => word,
        Kind::String | Kind::Interface => 2 * word,
        Kind::Slice => 3 * word,
        Kind::Array | Kind::Struct => 0,
    }
}

/// Define a descriptor from a raw kind code, as emitted by the front end.
pub fn define_type(
    size: u32,
    kind: u8,
    string: &str,
    named: bool,
    pkg: &str,
    exported: bool,
) -> ConstructionResult<Type> {
    let kind = Kind::from_code(kind)?;
    let mut builder = TypeDesc::builder(kind, string)
        .size(size)
        .pkg(pkg)
        .exported(exported);
    if named {
        builder = builder.named();
    }
    Ok(builder.build())
}

impl TypeDesc {
    pub fn builder(kind: Kind, string: impl Into<String>) -> TypeBuilder {
        TypeBuilder {
            kind,
            string: string.into(),
            size: None,
            named: false,
            pkg: String::new(),
            exported: false,
            shape: None,
        }
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn kind(&self) -> Kind {
        self.kind
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    pub fn string(&self) -> &str {
        &self.string
    }

    pub fn is_named(&self) -> bool {
        self.named
    }

    pub fn pkg(&self) -> &str {
        &self.pkg
    }

    pub fn is_exported(&self) -> bool {
        self.exported
    }

    pub fn comparable(&self) -> bool {
        self.comparable.load(Ordering::Relaxed)
    }

    pub fn is_initialized(&self) -> bool {
        !self.kind.is_composite() || self.shape.get().is_some()
    }

    // ------------------------------------------------------------------
    // Two-phase initialization
    // ------------------------------------------------------------------

    fn attach(&self, shape: Shape) {
        self.comparable.store(shape.comparable(), Ordering::Relaxed);
        let _ = self.shape.set(shape);
    }

    fn init(&self, shape: Shape) -> ConstructionResult<()> {
        if shape.kind() != self.kind {
            return Err(ConstructionError::kind_mismatch(
                &self.string,
                shape.kind(),
                self.kind,
            ));
        }
        if self.shape.get().is_some() {
            return Err(ConstructionError::AlreadyInitialized(self.string.clone()));
        }
        self.attach(shape);
        tracing::trace!(id = self.id, string = %self.string, "initialized type");
        Ok(())
    }

    pub fn init_array(&self, elem: Type, len: usize) -> ConstructionResult<()> {
        self.init(Shape::Array { elem, len })
    }

    pub fn init_chan(&self, elem: Type, dir: ChanDir) -> ConstructionResult<()> {
        self.init(Shape::Chan { elem, dir })
    }

    pub fn init_func(
        &self,
        params: Vec<Type>,
        results: Vec<Type>,
        variadic: bool,
    ) -> ConstructionResult<()> {
        if variadic && params.last().is_none_or(|p| p.kind != Kind::Slice) {
            return Err(ConstructionError::invalid_shape(format!(
                "variadic function {} must end in a slice parameter",
                self.string
            )));
        }
        self.init(Shape::Func {
            params,
            results,
            variadic,
        })
    }

    pub fn init_interface(&self, mut methods: Vec<Method>) -> ConstructionResult<()> {
        methods.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.pkg.cmp(&b.pkg)));
        self.init(Shape::Interface { methods })
    }

    pub fn init_map(&self, key: Type, elem: Type) -> ConstructionResult<()> {
        if key.is_initialized() && !key.comparable() {
            return Err(ConstructionError::invalid_shape(format!(
                "invalid map key type {key}"
            )));
        }
        self.init(Shape::Map { key, elem })
    }

    pub fn init_ptr(&self, elem: Type) -> ConstructionResult<()> {
        self.init(Shape::Ptr { elem })
    }

    pub fn init_slice(&self, elem: Type) -> ConstructionResult<()> {
        self.init(Shape::Slice { elem })
    }

    pub fn init_struct(&self, pkg_path: impl Into<String>, fields: Vec<Field>) -> ConstructionResult<()> {
        self.init(Shape::Struct {
            pkg_path: pkg_path.into(),
            fields,
        })
    }

    /// Attach the methods declared on this type.
    pub fn set_methods(&self, methods: Vec<Method>) -> ConstructionResult<()> {
        if self.kind == Kind::Interface {
            return Err(ConstructionError::invalid_shape(format!(
                "interface {} declares methods through init_interface",
                self.string
            )));
        }
        self.methods
            .set(methods)
            .map_err(|_| ConstructionError::AlreadyInitialized(format!("methods of {}", self.string)))?;
        if self.method_set.get().is_some() {
            tracing::warn!(string = %self.string, "methods declared after the method set was computed");
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Shape accessors
    // ------------------------------------------------------------------

    pub fn shape(&self) -> Option<&Shape> {
        self.shape.get()
    }

    /// # Panics
    ///
    /// If this composite descriptor was never initialized.
    fn initialized_shape(&self) -> &Shape {
        match self.shape.get() {
            Some(shape) => shape,
            None => panic!("{}", ConstructionError::NotInitialized(self.string.clone())),
        }
    }

    /// Element type of an array, channel, map, pointer or slice type.
    ///
    /// # Panics
    ///
    /// For other kinds, or before initialization.
    pub fn elem(&self) -> Type {
        match self.initialized_shape() {
            Shape::Array { elem, .. }
            | Shape::Chan { elem, .. }
            | Shape::Map { elem, .. }
            | Shape::Ptr { elem }
            | Shape::Slice { elem } => elem,
            _ => panic!("type {} has no element type", self.string),
        }
    }

    /// Length of an array type; zero for everything else.
    pub fn len(&self) -> usize {
        match self.shape.get() {
            Some(Shape::Array { len, .. }) => *len,
            _ => 0,
        }
    }

    pub fn key(&self) -> Option<Type> {
        match self.shape.get() {
            Some(Shape::Map { key, .. }) => Some(*key),
            _ => None,
        }
    }

    pub fn chan_dir(&self) -> Option<ChanDir> {
        match self.shape.get() {
            Some(Shape::Chan { dir, .. }) => Some(*dir),
            _ => None,
        }
    }

    pub fn fields(&self) -> &[Field] {
        match self.shape.get() {
            Some(Shape::Struct { fields, .. }) => fields,
            _ => &[],
        }
    }

    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.fields().iter().position(|f| f.name == name)
    }

    pub fn params(&self) -> &[Type] {
        match self.shape.get() {
            Some(Shape::Func { params, .. }) => params,
            _ => &[],
        }
    }

    pub fn results(&self) -> &[Type] {
        match self.shape.get() {
            Some(Shape::Func { results, .. }) => results,
            _ => &[],
        }
    }

    pub fn is_variadic(&self) -> bool {
        matches!(self.shape.get(), Some(Shape::Func { variadic: true, .. }))
    }

    /// Declared methods; for interfaces, the required methods.
    pub fn methods(&self) -> &[Method] {
        match self.shape.get() {
            Some(Shape::Interface { methods }) => methods,
            _ => self.methods.get().map(Vec::as_slice).unwrap_or(&[]),
        }
    }

    // ------------------------------------------------------------------
    // Values
    // ------------------------------------------------------------------

    /// The zero value. Arrays and structs are freshly allocated each time.
    pub fn zero(&'static self) -> Value {
        match self.kind {
            Kind::Bool => Value::Bool(false),
            Kind::Int
            | Kind::Int8
            | Kind::Int16
            | Kind::Int32
            | Kind::Uint
            | Kind::Uint8
            | Kind::Uint16
            | Kind::Uint32
            | Kind::Uintptr
            | Kind::UnsafePointer
            | Kind::Float32
            | Kind::Float64 => Value::Number(0.0),
            Kind::String => Value::Str(GoStr::default()),
            Kind::Int64 | Kind::Uint64 => Value::Word64(Word64::ZERO),
            Kind::Complex64 | Kind::Complex128 => Value::Complex(Complex::ZERO),
            Kind::Map => Value::Map(Map::nil(self)),
            Kind::Ptr => Value::Pointer(Pointer::Nil(self)),
            Kind::Slice => Value::Slice(Slice::nil(self)),
            Kind::Chan => Value::Chan(Chan::nil()),
            Kind::Func => Value::Func(Func::nil()),
            Kind::Interface => Value::Nil,
            Kind::Array => Value::Array(ArrayRef::zeroed(self.elem(), self.len())),
            Kind::Struct => Value::Struct(StructRef::zero(self)),
        }
    }

    /// Copy the contents of the aggregate `src` into the aggregate `dst`.
    ///
    /// Nested arrays and structs are copied recursively; every other field is
    /// copied by reference.
    pub fn copy_into(&self, dst: &Value, src: &Value) -> FaultResult<()> {
        match self.kind {
            Kind::Array => {
                let (dst, src) = (dst.try_array()?, src.try_array()?);
                copy_elements(
                    dst.backing(),
                    dst.offset(),
                    src.backing(),
                    src.offset(),
                    src.len().min(dst.len()),
                    self.elem(),
                )
            }
            Kind::Struct => {
                let (dst, src) = (dst.try_struct()?, src.try_struct()?);
                let count = self.fields().len();
                if src.ty().fields().len() != count || dst.ty().fields().len() != count {
                    return Err(Fault::runtime(format!(
                        "copy between structs of different layouts {} and {}",
                        src.ty(),
                        dst.ty()
                    )));
                }
                for (index, field) in self.fields().iter().enumerate() {
                    match field.typ.kind {
                        Kind::Array | Kind::Struct => {
                            field.typ.copy_into(&dst.field(index), &src.field(index))?
                        }
                        _ => dst.set_field(index, src.field(index)),
                    }
                }
                Ok(())
            }
            _ => Err(Fault::runtime(format!(
                "copy of non-aggregate type {}",
                self.string
            ))),
        }
    }

    /// A value-semantics copy: fresh storage for arrays and structs, the same
    /// value for everything else.
    pub fn clone_value(&'static self, value: &Value) -> FaultResult<Value> {
        match self.kind {
            Kind::Array | Kind::Struct => {
                let copy = self.zero();
                self.copy_into(&copy, value)?;
                Ok(copy)
            }
            _ => Ok(value.clone()),
        }
    }

    /// Whether values of this kind travel bare and are boxed only behind an
    /// interface.
    pub fn is_wrapped(&self) -> bool {
        match self.kind {
            Kind::Ptr => matches!(self.shape.get(), Some(Shape::Ptr { elem }) if elem.kind == Kind::Array),
            kind => kind.is_wrapped(),
        }
    }

    // ------------------------------------------------------------------
    // Arithmetic
    // ------------------------------------------------------------------

    fn undefined_operator(&self, op: char) -> Fault {
        Fault::runtime(format!("operator {op} not defined on {}", self.string))
    }

    pub fn add(&self, x: &Value, y: &Value) -> FaultResult<Value> {
        match self.kind {
            kind if kind.is_narrow_integer() || kind.is_float() => Ok(Value::Number(truncate(
                x.try_number()? + y.try_number()?,
                kind,
            ))),
            Kind::Int64 | Kind::Uint64 => Ok(x.try_word64()?.wrapping_add(y.try_word64()?).into()),
            Kind::Complex64 => Ok(x.try_complex()?.add(y.try_complex()?).narrowed().into()),
            Kind::Complex128 => Ok(x.try_complex()?.add(y.try_complex()?).into()),
            Kind::String => Ok(x.try_gostr()?.concat(y.try_gostr()?).into()),
            _ => Err(self.undefined_operator('+')),
        }
    }

    pub fn sub(&self, x: &Value, y: &Value) -> FaultResult<Value> {
        match self.kind {
            kind if kind.is_narrow_integer() || kind.is_float() => Ok(Value::Number(truncate(
                x.try_number()? - y.try_number()?,
                kind,
            ))),
            Kind::Int64 | Kind::Uint64 => Ok(x.try_word64()?.wrapping_sub(y.try_word64()?).into()),
            Kind::Complex64 => Ok(x.try_complex()?.sub(y.try_complex()?).narrowed().into()),
            Kind::Complex128 => Ok(x.try_complex()?.sub(y.try_complex()?).into()),
            _ => Err(self.undefined_operator('-')),
        }
    }

    pub fn mul(&self, x: &Value, y: &Value) -> FaultResult<Value> {
        match self.kind {
            // 32-bit products exceed the exact range of a double.
            Kind::Int | Kind::Int32 => Ok(Value::Number(imul(x.try_number()?, y.try_number()?))),
            Kind::Uint | Kind::Uint32 | Kind::Uintptr => Ok(Value::Number(
                to_uint32(imul(x.try_number()?, y.try_number()?)) as f64,
            )),
            kind if kind.is_narrow_integer() || kind.is_float() => Ok(Value::Number(truncate(
                x.try_number()? * y.try_number()?,
                kind,
            ))),
            Kind::Int64 | Kind::Uint64 => Ok(x.try_word64()?.wrapping_mul(y.try_word64()?).into()),
            Kind::Complex64 => Ok(x.try_complex()?.mul(y.try_complex()?).narrowed().into()),
            Kind::Complex128 => Ok(x.try_complex()?.mul(y.try_complex()?).into()),
            _ => Err(self.undefined_operator('*')),
        }
    }
}

impl PartialEq for TypeDesc {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self, other)
    }
}

impl Eq for TypeDesc {}

impl Hash for TypeDesc {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Display for TypeDesc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.string)
    }
}

impl fmt::Debug for TypeDesc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.string, self.id)
    }
}
