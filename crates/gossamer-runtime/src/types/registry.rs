//! Process-wide interning tables for composite types and the primitive
//! descriptors.
//!
//! Tables are append-only. Primitive descriptors are built on first use of
//! [`builtins`] (forced early by [`crate::init`]); composite descriptors are
//! built lazily by the constructors below.

use std::sync::LazyLock;

use dashmap::DashMap;
use gossamer_core::Kind;

use super::{ChanDir, Field, Method, Shape, Type, TypeDesc, signature_suffix};

struct Tables {
    arrays: DashMap<String, Type>,
    funcs: DashMap<String, Type>,
    interfaces: DashMap<String, Type>,
    maps: DashMap<String, Type>,
    structs: DashMap<String, Type>,
}

static TABLES: LazyLock<Tables> = LazyLock::new(|| Tables {
    arrays: DashMap::new(),
    funcs: DashMap::new(),
    interfaces: DashMap::new(),
    maps: DashMap::new(),
    structs: DashMap::new(),
});

fn intern(table: &DashMap<String, Type>, key: String, create: impl FnOnce() -> Type) -> Type {
    if let Some(hit) = table.get(&key) {
        return *hit;
    }
    let ty = *table.entry(key).or_insert_with(|| {
        let ty = create();
        tracing::debug!(id = ty.id(), string = %ty.string(), "interned type");
        ty
    });
    ty
}

fn join<T>(items: &[T], sep: &str, f: impl Fn(&T) -> String) -> String {
    items.iter().map(f).collect::<Vec<_>>().join(sep)
}

pub fn array_type(elem: Type, len: usize) -> Type {
    let key = format!("{}${}", elem.id(), len);
    intern(&TABLES.arrays, key, || {
        TypeDesc::builder(Kind::Array, format!("[{len}]{elem}"))
            .size(u32::try_from(len).map_or(u32::MAX, |len| elem.size().saturating_mul(len)))
            .shape(Shape::Array { elem, len })
            .build()
    })
}

pub fn chan_type(elem: Type, dir: ChanDir) -> Type {
    *elem.chans[dir.slot()].get_or_init(|| {
        let mut string = match dir {
            ChanDir::Both => "chan ".to_string(),
            ChanDir::Send => "chan<- ".to_string(),
            ChanDir::Recv => "<-chan ".to_string(),
        };
        if dir == ChanDir::Both && elem.string().starts_with('<') {
            string.push_str(&format!("({elem})"));
        } else {
            string.push_str(elem.string());
        }
        TypeDesc::builder(Kind::Chan, string)
            .shape(Shape::Chan { elem, dir })
            .build()
    })
}

pub fn func_type(params: &[Type], results: &[Type], variadic: bool) -> Type {
    let key = format!(
        "{}${}${}",
        join(params, ",", |p| p.id().to_string()),
        join(results, ",", |r| r.id().to_string()),
        variadic
    );
    intern(&TABLES.funcs, key, || {
        let mut param_strings: Vec<String> = params.iter().map(|p| p.to_string()).collect();
        if variadic && let Some(last) = param_strings.last_mut() {
            *last = format!("...{}", last.strip_prefix("[]").unwrap_or(last));
        }
        let mut string = format!("func({})", param_strings.join(", "));
        match results {
            [] => {}
            [single] => string.push_str(&format!(" {single}")),
            many => string.push_str(&format!(" ({})", join(many, ", ", |r| r.to_string()))),
        }
        TypeDesc::builder(Kind::Func, string)
            .shape(Shape::Func {
                params: params.to_vec(),
                results: results.to_vec(),
                variadic,
            })
            .build()
    })
}

/// Method lists are canonicalized by sorting on name, then package.
pub fn interface_type(mut methods: Vec<Method>) -> Type {
    methods.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.pkg.cmp(&b.pkg)));
    let key = join(&methods, "$", |m| format!("{},{},{}", m.pkg, m.name, m.typ.id()));
    intern(&TABLES.interfaces, key, || {
        let string = if methods.is_empty() {
            "interface {}".to_string()
        } else {
            let parts = join(&methods, "; ", |m| {
                let qualifier = if m.pkg.is_empty() {
                    String::new()
                } else {
                    format!("{}.", m.pkg)
                };
                format!("{qualifier}{}{}", m.name, signature_suffix(m.typ))
            });
            format!("interface {{ {parts} }}")
        };
        TypeDesc::builder(Kind::Interface, string)
            .shape(Shape::Interface { methods })
            .build()
    })
}

pub fn map_type(key: Type, elem: Type) -> Type {
    let table_key = format!("{}${}", key.id(), elem.id());
    intern(&TABLES.maps, table_key, || {
        TypeDesc::builder(Kind::Map, format!("map[{key}]{elem}"))
            .shape(Shape::Map { key, elem })
            .build()
    })
}

pub fn ptr_type(elem: Type) -> Type {
    *elem.ptr.get_or_init(|| {
        TypeDesc::builder(Kind::Ptr, format!("*{elem}"))
            .exported(elem.is_exported())
            .shape(Shape::Ptr { elem })
            .build()
    })
}

pub fn slice_type(elem: Type) -> Type {
    *elem.slice.get_or_init(|| {
        TypeDesc::builder(Kind::Slice, format!("[]{elem}"))
            .shape(Shape::Slice { elem })
            .build()
    })
}

fn quote_tag(tag: &str) -> String {
    format!("\"{}\"", tag.replace('\\', "\\\\").replace('"', "\\\""))
}

/// Unexported field names belong to `pkg_path`, so it is part of the key.
pub fn struct_type(pkg_path: &str, fields: Vec<Field>) -> Type {
    let key = format!(
        "{pkg_path};{}",
        join(&fields, "$", |f| format!(
            "{},{},{},{}",
            f.name,
            f.typ.id(),
            f.tag,
            f.embedded
        ))
    );
    intern(&TABLES.structs, key, || {
        let string = if fields.is_empty() {
            "struct {}".to_string()
        } else {
            let parts = join(&fields, "; ", |f| {
                let mut part = f.typ.to_string();
                if !f.tag.is_empty() {
                    part.push(' ');
                    part.push_str(&quote_tag(&f.tag));
                }
                if f.embedded {
                    part
                } else {
                    format!("{} {part}", f.name)
                }
            });
            format!("struct {{ {parts} }}")
        };
        let size = fields.iter().map(|f| f.typ.size()).sum();
        TypeDesc::builder(Kind::Struct, string)
            .size(size)
            .shape(Shape::Struct {
                pkg_path: pkg_path.to_string(),
                fields,
            })
            .build()
    })
}

// ============================================================================
// Primitive descriptors
// ============================================================================

pub struct Builtins {
    pub bool: Type,
    pub int: Type,
    pub int8: Type,
    pub int16: Type,
    pub int32: Type,
    pub int64: Type,
    pub uint: Type,
    pub uint8: Type,
    pub uint16: Type,
    pub uint32: Type,
    pub uint64: Type,
    pub uintptr: Type,
    pub float32: Type,
    pub float64: Type,
    pub complex64: Type,
    pub complex128: Type,
    pub string: Type,
    pub unsafe_pointer: Type,
    /// `interface {}`
    pub empty_interface: Type,
    /// The predeclared `error` interface.
    pub error: Type,
}

impl Builtins {
    fn new() -> Self {
        let primitive = |kind: Kind| TypeDesc::builder(kind, kind.to_string()).named().build();
        let string = primitive(Kind::String);
        let error = TypeDesc::builder(Kind::Interface, "error")
            .named()
            .shape(Shape::Interface {
                methods: vec![Method::new("Error", func_type(&[], &[string], false))],
            })
            .build();
        Builtins {
            bool: primitive(Kind::Bool),
            int: primitive(Kind::Int),
            int8: primitive(Kind::Int8),
            int16: primitive(Kind::Int16),
            int32: primitive(Kind::Int32),
            int64: primitive(Kind::Int64),
            uint: primitive(Kind::Uint),
            uint8: primitive(Kind::Uint8),
            uint16: primitive(Kind::Uint16),
            uint32: primitive(Kind::Uint32),
            uint64: primitive(Kind::Uint64),
            uintptr: primitive(Kind::Uintptr),
            float32: primitive(Kind::Float32),
            float64: primitive(Kind::Float64),
            complex64: primitive(Kind::Complex64),
            complex128: primitive(Kind::Complex128),
            string,
            unsafe_pointer: TypeDesc::builder(Kind::UnsafePointer, "unsafe.Pointer")
                .named()
                .pkg("unsafe")
                .build(),
            empty_interface: interface_type(Vec::new()),
            error,
        }
    }

    /// Look up a predeclared type by name, including the `byte`, `rune` and
    /// `any` aliases.
    pub fn lookup(&self, name: &str) -> Option<Type> {
        let ty = match name {
            "bool" => self.bool,
            "int" => self.int,
            "int8" => self.int8,
            "int16" => self.int16,
            "int32" | "rune" => self.int32,
            "int64" => self.int64,
            "uint" => self.uint,
            "uint8" | "byte" => self.uint8,
            "uint16" => self.uint16,
            "uint32" => self.uint32,
            "uint64" => self.uint64,
            "uintptr" => self.uintptr,
            "float32" => self.float32,
            "float64" => self.float64,
            "complex64" => self.complex64,
            "complex128" => self.complex128,
            "string" => self.string,
            "unsafe.Pointer" => self.unsafe_pointer,
            "any" => self.empty_interface,
            "error" => self.error,
            _ => return None,
        };
        Some(ty)
    }
}

static BUILTINS: LazyLock<Builtins> = LazyLock::new(Builtins::new);

pub fn builtins() -> &'static Builtins {
    &BUILTINS
}
