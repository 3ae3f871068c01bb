//! Inspection tooling for the gossamer runtime: type-expression parsing,
//! descriptor summaries and conversions of literal values.

pub mod describe;
pub mod literal;
mod syntax;
pub mod typeexpr;

use derive_more::{Display, From};
use gossamer_core::ConfigError;
use gossamer_runtime::display::render;
use gossamer_runtime::methods::missing_method;
use gossamer_runtime::{Fault, Kind, Type, Typed};

pub use describe::{Description, describe, satisfaction, satisfaction_report};
pub use literal::{LiteralError, parse_literal};
pub use typeexpr::{ParseError, parse_type};

#[derive(Debug, Display, From)]
pub enum Error {
    Parse(ParseError),
    Literal(LiteralError),
    #[display("panic: {}", _0.message())]
    Fault(Fault),
    Config(ConfigError),
    #[display("{path}: {source}")]
    #[from(skip)]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[display("{_0} is not an interface type")]
    #[from(skip)]
    NotInterface(String),
    #[display("cannot convert {ty} to {iface}: missing method {method}")]
    #[from(skip)]
    MissingMethod {
        ty: String,
        iface: String,
        method: String,
    },
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Parse(e) => Some(e),
            Error::Literal(e) => Some(e),
            Error::Fault(e) => Some(e),
            Error::Config(e) => Some(e),
            Error::Io { source, .. } => Some(source),
            Error::NotInterface(_) | Error::MissingMethod { .. } => None,
        }
    }
}

/// Convert the literal `text` of type `from` to `to` and render the result
/// the way `fmt.Println` would.
///
/// An interface destination must be implemented by `from`.
pub fn convert(from: Type, to: Type, text: &str) -> Result<String, Error> {
    if to.kind() == Kind::Interface
        && from.kind() != Kind::Interface
        && let Some(method) = missing_method(from, to)
    {
        return Err(Error::MissingMethod {
            ty: from.to_string(),
            iface: to.to_string(),
            method,
        });
    }
    let value = parse_literal(from, text)?;
    let converted = to.convert_from(&Typed::new(from, value))?;
    tracing::debug!(%from, %to, %text, "converted literal");
    Ok(render(to, &converted))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(from: &str, to: &str, text: &str) -> Result<String, Error> {
        convert(parse_type(from)?, parse_type(to)?, text)
    }

    #[test]
    fn test_convert_narrows_and_decodes() {
        assert_eq!(run("int", "int8", "300").unwrap(), "44");
        assert_eq!(run("int64", "uint32", "-1").unwrap(), "4294967295");
        assert_eq!(run("string", "[]byte", "hé").unwrap(), "[104 195 169]");
        assert_eq!(run("string", "[]rune", "hé").unwrap(), "[104 233]");
        assert_eq!(run("int32", "string", "0x4e16").unwrap(), "世");
        assert_eq!(run("float64", "float32", "16777217").unwrap(), "16777216");
    }

    #[test]
    fn test_convert_reports_illegal_pairs() {
        let err = run("bool", "int", "true").unwrap_err();
        assert_eq!(err.to_string(), "panic: unsupported conversion from bool to int");
        let err = run("map[string]int", "int", "x").unwrap_err();
        assert!(matches!(err, Error::Literal(LiteralError::Unsupported(_))));
    }

    #[test]
    fn test_convert_checks_interface_destinations() {
        assert_eq!(run("int", "interface{}", "3").unwrap(), "3");
        let err = run("int", "interface{ String() string }", "3").unwrap_err();
        assert_eq!(
            err.to_string(),
            "cannot convert int to interface { String() string }: missing method String"
        );
    }
}
