//! Method sets, interface satisfaction, type assertions and dynamic dispatch.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap, HashSet};

use gossamer_core::Kind;

use crate::fault::{Fault, FaultResult, TypeAssertionError};
use crate::memory::{Pointer, StructRef};
use crate::types::{Method, Type, ptr_type};
use crate::value::{Func, Typed, Value};

/// One method of a type's method set.
#[derive(Clone, Debug)]
pub struct MethodSetEntry {
    pub method: Method,
    /// Embedded field indices leading from the receiver to `owner`.
    pub path: Vec<usize>,
    /// The type declaring the method; an interface for methods promoted from
    /// an embedded interface field.
    pub owner: Type,
    /// Declared on `*owner`.
    pub on_pointer: bool,
}

struct Pending {
    typ: Type,
    indirect: bool,
    path: Vec<usize>,
}

/// The method set of `ty`, sorted by name and computed once per descriptor.
///
/// Methods are collected level by level through embedded fields; the
/// shallowest declaration of a name wins. Methods declared on `*T` join the
/// set only when `T` is reached through a pointer.
pub fn method_set(ty: Type) -> &'static [MethodSetEntry] {
    ty.method_set.get_or_init(|| compute_method_set(ty))
}

fn compute_method_set(ty: Type) -> Vec<MethodSetEntry> {
    let is_ptr = ty.kind() == Kind::Ptr;
    if is_ptr && ty.elem().kind() == Kind::Interface {
        return Vec::new();
    }

    let mut base: BTreeMap<String, MethodSetEntry> = BTreeMap::new();
    let mut seen = HashSet::new();
    let mut current = vec![Pending {
        typ: if is_ptr { ty.elem() } else { ty },
        indirect: is_ptr,
        path: Vec::new(),
    }];

    while !current.is_empty() {
        let mut next = Vec::new();
        let mut level = Vec::new();

        for pending in current {
            if !seen.insert(pending.typ.id()) {
                continue;
            }
            let typ = pending.typ;
            let entry = |method: &Method, on_pointer: bool| MethodSetEntry {
                method: method.clone(),
                path: pending.path.clone(),
                owner: typ,
                on_pointer,
            };

            if typ.is_named() && typ.kind() != Kind::Interface {
                level.extend(typ.methods().iter().map(|m| entry(m, false)));
                if pending.indirect {
                    level.extend(ptr_type(typ).methods().iter().map(|m| entry(m, true)));
                }
            }

            match typ.kind() {
                Kind::Struct => {
                    for (index, field) in typ.fields().iter().enumerate() {
                        if !field.embedded {
                            continue;
                        }
                        let field_is_ptr = field.typ.kind() == Kind::Ptr;
                        let mut path = pending.path.clone();
                        path.push(index);
                        next.push(Pending {
                            typ: if field_is_ptr { field.typ.elem() } else { field.typ },
                            indirect: pending.indirect || field_is_ptr,
                            path,
                        });
                    }
                }
                Kind::Interface => {
                    level.extend(typ.methods().iter().map(|m| entry(m, false)));
                }
                _ => {}
            }
        }

        for entry in level {
            base.entry(entry.method.name.clone()).or_insert(entry);
        }
        current = next;
    }

    tracing::debug!(ty = %ty, methods = base.len(), "computed method set");
    base.into_values().collect()
}

/// The first method of `iface` missing from the method set of `concrete`,
/// or `None` when `concrete` implements `iface`.
///
/// Results are cached on the interface descriptor by source type name.
pub fn missing_method(concrete: Type, iface: Type) -> Option<String> {
    if let Some(cached) = iface.satisfaction.get(concrete.string()) {
        return cached.clone();
    }
    let set = method_set(concrete);
    let missing = iface
        .methods()
        .iter()
        .find(|required| !set.iter().any(|entry| entry.method.matches(required)))
        .map(|m| m.name.clone());
    tracing::debug!(
        concrete = %concrete,
        iface = %iface,
        missing = ?missing,
        "cached interface satisfaction"
    );
    iface
        .satisfaction
        .insert(concrete.string().to_string(), missing.clone());
    missing
}

pub fn implements(concrete: Type, iface: Type) -> bool {
    missing_method(concrete, iface).is_none()
}

fn check_assertion(value: &Value, target: Type) -> Result<Value, TypeAssertionError> {
    let failure = |concrete: Option<&str>, missing: Option<String>| TypeAssertionError {
        interface: None,
        concrete: concrete.map(str::to_string),
        asserted: target.string().to_string(),
        missing_method: missing.unwrap_or_default(),
    };
    let Some(typed) = value.as_boxed() else {
        return Err(failure(None, None));
    };
    if target.kind() != Kind::Interface {
        return if typed.ty == target {
            Ok(typed.val.clone())
        } else {
            Err(failure(Some(typed.ty.string()), None))
        };
    }
    match missing_method(typed.ty, target) {
        None => Ok(value.clone()),
        Some(missing) => Err(failure(Some(typed.ty.string()), Some(missing))),
    }
}

/// `value.(T)`: the unboxed value for a concrete `target`, the interface
/// value itself for an interface `target`.
pub fn assert_type(value: &Value, target: Type) -> FaultResult<Value> {
    check_assertion(value, target).map_err(Fault::from)
}

/// `v, ok := value.(T)`; `(zero, false)` on failure.
pub fn try_assert_type(value: &Value, target: Type) -> (Value, bool) {
    match check_assertion(value, target) {
        Ok(v) => (v, true),
        Err(_) => (target.zero(), false),
    }
}

/// Call method `name` on an interface value.
pub fn invoke_method(recv: &Value, name: &str, args: &[Value]) -> FaultResult<Vec<Value>> {
    match recv.as_boxed() {
        Some(typed) => call_method(typed.ty, &typed.val, name, args),
        None => Err(Fault::nil_deref()),
    }
}

/// Call method `name` on `recv` of static type `ty`, following promotion
/// through embedded fields and taking the address of addressable receivers
/// for pointer methods.
pub fn call_method(ty: Type, recv: &Value, name: &str, args: &[Value]) -> FaultResult<Vec<Value>> {
    let entry = find_method(ty, name)
        .ok_or_else(|| Fault::runtime(format!("{ty} has no method {name}")))?;

    let mut cur_ty = ty;
    let mut cur = recv.clone();
    let mut place: Option<(StructRef, usize)> = None;
    for &index in &entry.path {
        let s = struct_behind(&cur)?;
        let struct_ty = if cur_ty.kind() == Kind::Ptr { cur_ty.elem() } else { cur_ty };
        cur_ty = struct_ty.fields()[index].typ;
        cur = s.field(index);
        place = Some((s, index));
    }

    let owner = entry.owner;
    if owner.kind() == Kind::Interface {
        return invoke_method(&cur, name, args);
    }
    let imp = entry.method.imp().ok_or_else(|| {
        Fault::runtime(format!("method {owner}.{name} has no implementation"))
    })?;

    let receiver = if entry.on_pointer {
        match (cur_ty.kind(), cur) {
            (Kind::Ptr, ptr) => ptr,
            (_, Value::Struct(s)) => Value::Pointer(Pointer::Struct(s)),
            (_, Value::Array(a)) => Value::Pointer(Pointer::Array(a)),
            (_, value) => Value::Pointer(match place {
                Some((s, index)) => s.field_ptr(index),
                None => Pointer::new_var(ptr_type(owner), value),
            }),
        }
    } else if cur_ty.kind() == Kind::Ptr {
        owner.clone_value(&cur.try_pointer()?.load()?)?
    } else {
        owner.clone_value(&cur)?
    };
    imp(&receiver, args)
}

fn find_method(ty: Type, name: &str) -> Option<&'static MethodSetEntry> {
    method_set(ty).iter().find(|entry| entry.method.name == name)
}

/// `recv.name` as a function value.
///
/// The receiver is evaluated now: value receivers are copied and a nil
/// pointer is dereferenced at binding time, while pointer methods keep the
/// pointer. Struct and array receivers are addressable, so pointer methods
/// bind to their address.
pub fn method_value(recv: &Typed, name: &str) -> FaultResult<Func> {
    if recv.ty.kind() == Kind::Interface {
        return match recv.val.as_boxed() {
            Some(inner) => method_value(inner, name),
            None => Err(Fault::nil_deref()),
        };
    }
    let (ty, bound) = match find_method(recv.ty, name) {
        Some(entry) if recv.ty.kind() == Kind::Ptr && !entry.on_pointer => {
            let elem = recv.ty.elem();
            (elem, elem.clone_value(&recv.val.try_pointer()?.load()?)?)
        }
        Some(_) => (recv.ty, recv.ty.clone_value(&recv.val)?),
        None => {
            let addressed = match &recv.val {
                Value::Struct(s) => Some(Pointer::Struct(s.clone())),
                Value::Array(a) => Some(Pointer::Array(a.clone())),
                _ => None,
            };
            let ptr = ptr_type(recv.ty);
            match addressed {
                Some(p) if find_method(ptr, name).is_some() => (ptr, Value::Pointer(p)),
                _ => return Err(Fault::runtime(format!("{} has no method {name}", recv.ty))),
            }
        }
    };
    tracing::trace!(ty = %ty, method = name, "bound method value");
    let name = name.to_string();
    Ok(Func::new(move |args| call_method(ty, &bound, &name, args)))
}

thread_local! {
    static METHOD_EXPRS: RefCell<HashMap<(u32, String), Func>> = RefCell::new(HashMap::new());
}

/// `T.name` as a function whose first argument is the receiver.
///
/// For an interface `T` the call dispatches on the dynamic type of that
/// argument. One function is made per type and method.
pub fn method_expr(ty: Type, name: &str) -> FaultResult<Func> {
    if find_method(ty, name).is_none() {
        return Err(Fault::runtime(format!("{ty} has no method {name}")));
    }
    let key = (ty.id(), name.to_string());
    if let Some(func) = METHOD_EXPRS.with(|cache| cache.borrow().get(&key).cloned()) {
        return Ok(func);
    }
    let method = name.to_string();
    let func = Func::new(move |args| {
        let Some((recv, rest)) = args.split_first() else {
            return Err(Fault::runtime(format!(
                "method expression {ty}.{method} called without a receiver"
            )));
        };
        call_method(ty, recv, &method, rest)
    });
    METHOD_EXPRS.with(|cache| cache.borrow_mut().insert(key, func.clone()));
    Ok(func)
}

fn struct_behind(value: &Value) -> FaultResult<StructRef> {
    match value {
        Value::Struct(s) | Value::Pointer(Pointer::Struct(s)) => Ok(s.clone()),
        Value::Pointer(Pointer::Nil(_)) => Err(Fault::nil_deref()),
        Value::Pointer(p) => Ok(p.load()?.try_struct()?.clone()),
        other => Ok(other.try_struct()?.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Field, TypeDesc, builtins, func_type, interface_type, struct_type};

    fn getter() -> Type {
        func_type(&[], &[builtins().int], false)
    }

    /// `type Counter struct { N int }` with `Get()` on the value and `Inc()`
    /// on the pointer.
    fn counter() -> Type {
        let b = builtins();
        let ty = TypeDesc::builder(Kind::Struct, "main.Counter").named().pkg("main").build();
        ty.init_struct("main", vec![Field::new("N", b.int)]).unwrap();
        ty.set_methods(vec![Method::new("Get", getter()).with_impl(|recv, _| {
            Ok(vec![recv.as_struct().unwrap().field(0)])
        })])
        .unwrap();
        ptr_type(ty)
            .set_methods(vec![Method::new("Inc", func_type(&[], &[], false)).with_impl(
                |recv, _| {
                    let Value::Pointer(Pointer::Struct(s)) = recv else {
                        panic!("expected a struct pointer receiver");
                    };
                    let n = s.field(0).as_number().unwrap();
                    s.set_field(0, Value::from(n + 1.0));
                    Ok(vec![])
                },
            )])
            .unwrap();
        ty
    }

    #[test]
    fn struct_without_methods_misses_foo() {
        let b = builtins();
        let plain = struct_type("", vec![Field::new("X", b.int)]);
        let fooer = interface_type(vec![Method::new("Foo", func_type(&[], &[], false))]);
        assert!(!implements(plain, fooer));
        assert_eq!(missing_method(plain, fooer).as_deref(), Some("Foo"));

        let boxed = Typed::new(plain, plain.zero()).boxed();
        let err = assert_type(&boxed, fooer).unwrap_err();
        assert_eq!(
            err.to_string(),
            "interface conversion: struct { X int } is not interface { Foo() }: missing method Foo"
        );
        let (zero, ok) = try_assert_type(&boxed, fooer);
        assert!(!ok);
        assert!(zero.is_nil_interface());
    }

    #[test]
    fn pointer_methods_need_an_addressable_path() {
        let counter = counter();
        let names = |ty| method_set(ty).iter().map(|e| e.method.name.clone()).collect::<Vec<_>>();
        assert_eq!(names(counter), vec!["Get"]);
        assert_eq!(names(ptr_type(counter)), vec!["Get", "Inc"]);
    }

    #[test]
    fn promoted_methods_dispatch_through_embedded_fields() {
        let counter = counter();
        let outer = struct_type("", vec![Field::embedded("Counter", ptr_type(counter))]);
        let inner = counter.zero();
        let value = outer.zero();
        value
            .as_struct()
            .unwrap()
            .set_field(0, Value::Pointer(Pointer::new_var(ptr_type(counter), inner.clone())));

        call_method(outer, &value, "Inc", &[]).unwrap();
        call_method(outer, &value, "Inc", &[]).unwrap();
        let got = call_method(outer, &value, "Get", &[]).unwrap();
        assert_eq!(got[0].as_number(), Some(2.0));
        assert_eq!(inner.as_struct().unwrap().field(0).as_number(), Some(2.0));
    }

    #[test]
    fn method_values_copy_value_receivers() {
        let counter = counter();
        let c = counter.zero();
        let get = method_value(&Typed::new(counter, c.clone()), "Get").unwrap();
        c.as_struct().unwrap().set_field(0, Value::from(5));
        assert_eq!(get.call(&[]).unwrap()[0].as_number(), Some(0.0));

        // Through a pointer the value method still copies at binding time.
        let p = Value::Pointer(Pointer::Struct(c.as_struct().unwrap().clone()));
        let get = method_value(&Typed::new(ptr_type(counter), p), "Get").unwrap();
        c.as_struct().unwrap().set_field(0, Value::from(6));
        assert_eq!(get.call(&[]).unwrap()[0].as_number(), Some(5.0));
    }

    #[test]
    fn method_values_keep_pointer_receivers() {
        let counter = counter();
        let c = counter.zero();
        let p = Value::Pointer(Pointer::Struct(c.as_struct().unwrap().clone()));
        let inc = method_value(&Typed::new(ptr_type(counter), p), "Inc").unwrap();
        inc.call(&[]).unwrap();
        inc.call(&[]).unwrap();
        assert_eq!(c.as_struct().unwrap().field(0).as_number(), Some(2.0));

        // An addressable struct binds its address for pointer methods.
        let inc = method_value(&Typed::new(counter, c.clone()), "Inc").unwrap();
        inc.call(&[]).unwrap();
        assert_eq!(c.as_struct().unwrap().field(0).as_number(), Some(3.0));

        let nil = Value::Pointer(Pointer::Nil(ptr_type(counter)));
        let err = method_value(&Typed::new(ptr_type(counter), nil), "Get").unwrap_err();
        assert_eq!(
            err.to_string(),
            "runtime error: invalid memory address or nil pointer dereference"
        );
    }

    #[test]
    fn method_values_on_interfaces() {
        let counter = counter();
        let getter_iface = interface_type(vec![Method::new("Get", getter())]);
        let err = method_value(&Typed::new(getter_iface, Value::Nil), "Get").unwrap_err();
        assert_eq!(
            err.to_string(),
            "runtime error: invalid memory address or nil pointer dereference"
        );

        let c = counter.zero();
        c.as_struct().unwrap().set_field(0, Value::from(4));
        let boxed = Typed::new(counter, c).boxed();
        let get = method_value(&Typed::new(getter_iface, boxed), "Get").unwrap();
        assert_eq!(get.call(&[]).unwrap()[0].as_number(), Some(4.0));
    }

    #[test]
    fn method_expressions_take_the_receiver_first() {
        let counter = counter();
        let getter_iface = interface_type(vec![Method::new("Get", getter())]);
        let c = counter.zero();
        c.as_struct().unwrap().set_field(0, Value::from(7));

        let get = method_expr(getter_iface, "Get").unwrap();
        let boxed = Typed::new(counter, c.clone()).boxed();
        assert_eq!(get.call(&[boxed]).unwrap()[0].as_number(), Some(7.0));
        assert!(get.ptr_eq(&method_expr(getter_iface, "Get").unwrap()));
        assert!(get.call(&[Value::Nil]).is_err());
        assert!(get.call(&[]).is_err());

        let inc = method_expr(ptr_type(counter), "Inc").unwrap();
        let p = Value::Pointer(Pointer::Struct(c.as_struct().unwrap().clone()));
        inc.call(&[p]).unwrap();
        assert_eq!(c.as_struct().unwrap().field(0).as_number(), Some(8.0));

        let err = method_expr(counter, "Inc").unwrap_err();
        assert_eq!(err.to_string(), "runtime error: main.Counter has no method Inc");
    }

    #[test]
    fn asserting_concrete_types_unboxes() {
        let b = builtins();
        let boxed = Typed::new(b.string, Value::from("hi")).boxed();
        assert_eq!(assert_type(&boxed, b.string).unwrap().as_str(), Some("hi"));
        let err = assert_type(&boxed, b.int).unwrap_err();
        assert_eq!(err.to_string(), "interface conversion: interface is string, not int");
        let err = assert_type(&Value::Nil, b.int).unwrap_err();
        assert_eq!(err.to_string(), "interface conversion: interface is nil, not int");
    }

    #[test]
    fn calling_through_the_nil_interface_faults() {
        let err = invoke_method(&Value::Nil, "Error", &[]).unwrap_err();
        assert_eq!(
            err.to_string(),
            "runtime error: invalid memory address or nil pointer dereference"
        );
    }
}
