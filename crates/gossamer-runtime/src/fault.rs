//! Recoverable runtime faults.
//!
//! A [`Fault`] is the propagating error of the runtime: bounds violations,
//! failed conversions, failed type assertions, channel protocol errors and
//! explicit `panic(v)` calls. Faults travel as the `Err` side of every
//! fallible operation and can be intercepted by a deferred call through
//! [`crate::frame::Frame::recover`].

use std::fmt;

use derive_more::{Display, From};

use crate::types::Type;
use crate::value::{Typed, Value};

/// A fault raised by the runtime itself, rendered with a `runtime error: `
/// prefix.
#[derive(Clone, Debug, Display, PartialEq, Eq)]
#[display("runtime error: {_0}")]
pub struct RuntimeError(String);

impl RuntimeError {
    pub fn text(&self) -> &str {
        &self.0
    }
}

/// Failure of the unchecked form of a type assertion.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TypeAssertionError {
    /// Static interface type of the asserted operand, when known.
    pub interface: Option<String>,
    /// Dynamic type of the operand, or `None` for the nil interface.
    pub concrete: Option<String>,
    pub asserted: String,
    /// First method of `asserted` missing from the concrete method set.
    pub missing_method: String,
}

impl fmt::Display for TypeAssertionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inter = self.interface.as_deref().unwrap_or("interface");
        let Some(concrete) = &self.concrete else {
            return write!(
                f,
                "interface conversion: {inter} is nil, not {}",
                self.asserted
            );
        };
        if self.missing_method.is_empty() {
            write!(
                f,
                "interface conversion: {inter} is {concrete}, not {}",
                self.asserted
            )?;
            if *concrete == self.asserted {
                f.write_str(" (types from different scopes)")?;
            }
            return Ok(());
        }
        write!(
            f,
            "interface conversion: {concrete} is not {}: missing method {}",
            self.asserted, self.missing_method
        )
    }
}

/// An illegal `(source kind, destination kind)` conversion request.
#[derive(Clone, Debug, Display, PartialEq, Eq)]
#[display("unsupported conversion from {from} to {to}")]
pub struct ConversionError {
    pub from: String,
    pub to: String,
}

#[derive(Clone, Debug, Display, From)]
pub enum Fault {
    Runtime(RuntimeError),
    TypeAssertion(TypeAssertionError),
    Conversion(ConversionError),
    /// A value passed to `panic`.
    #[display("panic with value of type {}", _0.ty)]
    #[from(skip)]
    Value(Typed),
}

pub type FaultResult<T> = Result<T, Fault>;

impl Fault {
    pub fn runtime(msg: impl Into<String>) -> Self {
        Fault::Runtime(RuntimeError(msg.into()))
    }

    pub fn nil_deref() -> Self {
        Fault::runtime("invalid memory address or nil pointer dereference")
    }

    pub fn slice_bounds() -> Self {
        Fault::runtime("slice bounds out of range")
    }

    pub fn index_out_of_range(index: i64, len: usize) -> Self {
        Fault::runtime(format!("index out of range [{index}] with length {len}"))
    }

    pub fn unsupported_conversion(from: Type, to: Type) -> Self {
        Fault::Conversion(ConversionError {
            from: from.string().to_string(),
            to: to.string().to_string(),
        })
    }

    pub fn panic_value(value: Typed) -> Self {
        Fault::Value(value)
    }

    /// A `panic` with a plain string payload.
    pub fn panic_str(text: &str) -> Self {
        Fault::Value(Typed::new(
            crate::types::builtins().string,
            Value::from(text),
        ))
    }

    /// The text printed when this fault escapes the outermost frame.
    ///
    /// String panics print their text; values whose method set has `Error`
    /// or `String` print what that method returns.
    pub fn message(&self) -> String {
        match self {
            Fault::Value(typed) => panic_message(typed),
            other => other.to_string(),
        }
    }
}

fn panic_message(typed: &Typed) -> String {
    if typed.ty.kind() == gossamer_core::Kind::String
        && let Some(text) = typed.val.as_str()
    {
        return text.to_string();
    }
    let boxed = typed.clone().boxed();
    for name in ["Error", "String"] {
        let has_method = crate::methods::method_set(typed.ty)
            .iter()
            .any(|entry| entry.method.name == name && entry.method.has_impl());
        if !has_method {
            continue;
        }
        if let Ok(results) = crate::methods::invoke_method(&boxed, name, &[])
            && let Some(text) = results.first().and_then(Value::as_str)
        {
            return text.to_string();
        }
    }
    format!(
        "({}) {}",
        typed.ty,
        crate::display::render(typed.ty, &typed.val)
    )
}

impl std::error::Error for Fault {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn runtime_errors_are_prefixed() {
        assert_eq!(
            Fault::slice_bounds().to_string(),
            "runtime error: slice bounds out of range"
        );
        assert_eq!(
            Fault::index_out_of_range(5, 3).message(),
            "runtime error: index out of range [5] with length 3"
        );
    }

    #[test]
    fn type_assertion_messages() {
        let nil = TypeAssertionError {
            interface: None,
            concrete: None,
            asserted: "int".to_string(),
            missing_method: String::new(),
        };
        assert_eq!(nil.to_string(), "interface conversion: interface is nil, not int");

        let wrong = TypeAssertionError {
            interface: Some("interface {}".to_string()),
            concrete: Some("string".to_string()),
            ..nil.clone()
        };
        assert_eq!(
            wrong.to_string(),
            "interface conversion: interface {} is string, not int"
        );

        let missing = TypeAssertionError {
            concrete: Some("struct { X int }".to_string()),
            asserted: "interface { Foo() }".to_string(),
            missing_method: "Foo".to_string(),
            ..nil
        };
        assert_eq!(
            missing.to_string(),
            "interface conversion: struct { X int } is not interface { Foo() }: missing method Foo"
        );
    }

    #[test]
    fn string_panics_print_their_text() {
        assert_eq!(Fault::panic_str("boom").message(), "boom");
        assert_eq!(
            Fault::panic_str("boom").to_string(),
            "panic with value of type string"
        );
    }

    #[test]
    fn wrapped_errors_display_as_themselves() {
        let fault = Fault::from(ConversionError {
            from: "int".to_string(),
            to: "bool".to_string(),
        });
        assert_eq!(fault.to_string(), "unsupported conversion from int to bool");
        assert!(matches!(fault, Fault::Conversion(_)));
    }
}
