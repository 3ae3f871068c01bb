//! Human-readable summaries of type descriptors.

use std::fmt;

use gossamer_runtime::display::render;
use gossamer_runtime::methods::missing_method;
use gossamer_runtime::{Kind, Type, method_set};

use crate::Error;

/// One entry of a method set, as printed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MethodLine {
    pub name: String,
    pub signature: String,
    /// Declared on the pointer type and reachable only through it.
    pub on_pointer: bool,
    /// Field indices leading to the embedded type that declares the method.
    pub path: Vec<usize>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Description {
    pub string: String,
    pub kind: Kind,
    pub size: u32,
    pub comparable: bool,
    pub zero: String,
    pub methods: Vec<MethodLine>,
}

pub fn describe(ty: Type) -> Description {
    let methods = method_set(ty)
        .iter()
        .map(|entry| MethodLine {
            name: entry.method.name.clone(),
            signature: entry
                .method
                .typ
                .string()
                .strip_prefix("func")
                .unwrap_or(entry.method.typ.string())
                .to_string(),
            on_pointer: entry.on_pointer,
            path: entry.path.clone(),
        })
        .collect();
    Description {
        string: ty.string().to_string(),
        kind: ty.kind(),
        size: ty.size(),
        comparable: ty.comparable(),
        zero: render(ty, &ty.zero()),
        methods,
    }
}

impl Description {
    pub fn to_json(&self) -> serde_json::Value {
        let methods: Vec<_> = self
            .methods
            .iter()
            .map(|m| {
                serde_json::json!({
                    "name": m.name,
                    "signature": m.signature,
                    "on_pointer": m.on_pointer,
                    "path": m.path,
                })
            })
            .collect();
        serde_json::json!({
            "type": self.string,
            "kind": self.kind.to_string(),
            "size": self.size,
            "comparable": self.comparable,
            "zero": self.zero,
            "methods": methods,
        })
    }
}

impl fmt::Display for Description {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "type:       {}", self.string)?;
        writeln!(f, "kind:       {}", self.kind)?;
        writeln!(f, "size:       {}", self.size)?;
        writeln!(f, "comparable: {}", self.comparable)?;
        writeln!(f, "zero:       {}", self.zero)?;
        if self.methods.is_empty() {
            return writeln!(f, "methods:    none");
        }
        writeln!(f, "methods:")?;
        for m in &self.methods {
            write!(f, "  {}{}", m.name, m.signature)?;
            if m.on_pointer {
                f.write_str(" [pointer receiver]")?;
            }
            if !m.path.is_empty() {
                let path: Vec<_> = m.path.iter().map(usize::to_string).collect();
                write!(f, " [promoted via field {}]", path.join("."))?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

/// The first method of `iface` that `ty` lacks, or `None` when `ty`
/// implements it.
pub fn satisfaction(ty: Type, iface: Type) -> Result<Option<String>, Error> {
    if iface.kind() != Kind::Interface {
        return Err(Error::NotInterface(iface.to_string()));
    }
    Ok(missing_method(ty, iface))
}

/// [`satisfaction`] in the compiler's words.
pub fn satisfaction_report(ty: Type, iface: Type) -> Result<String, Error> {
    Ok(match satisfaction(ty, iface)? {
        None => format!("{ty} implements {iface}"),
        Some(method) => format!("{ty} does not implement {iface} (missing method {method})"),
    })
}
