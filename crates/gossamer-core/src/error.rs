//! Construction errors.
//!
//! These describe malformed descriptor requests. They indicate a bug in the
//! code generator that drives the runtime, are never converted into a
//! recoverable fault, and should terminate the unit of execution.

use derive_more::Display;

use crate::kind::Kind;

pub type ConstructionResult<T> = Result<T, ConstructionError>;

#[derive(Clone, Debug, Display, PartialEq, Eq)]
pub enum ConstructionError {
    #[display("invalid kind: {_0}")]
    InvalidKind(u8),

    #[display("type {_0} is already initialized")]
    AlreadyInitialized(String),

    #[display("type {_0} is used before it was initialized")]
    NotInitialized(String),

    #[display("type {name}: expected a {expected} descriptor, found {found}")]
    KindMismatch {
        name: String,
        expected: Kind,
        found: Kind,
    },

    #[display("invalid type shape: {_0}")]
    InvalidShape(String),
}

impl ConstructionError {
    pub fn kind_mismatch(name: impl Into<String>, expected: Kind, found: Kind) -> Self {
        ConstructionError::KindMismatch {
            name: name.into(),
            expected,
            found,
        }
    }

    pub fn invalid_shape(msg: impl std::fmt::Display) -> Self {
        ConstructionError::InvalidShape(msg.to_string())
    }
}

impl std::error::Error for ConstructionError {}
