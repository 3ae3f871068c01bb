//! Kind tags for runtime type descriptors.

use derive_more::Display;

use crate::error::ConstructionError;

/// The fundamental shape tag of a type descriptor.
///
/// The numeric codes are part of the front-end contract: generated code
/// refers to kinds by code, so they must never be renumbered.
#[repr(u8)]
#[derive(Clone, Copy, Debug, Display, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Kind {
    #[display("bool")]
    Bool = 1,
    #[display("int")]
    Int = 2,
    #[display("int8")]
    Int8 = 3,
    #[display("int16")]
    Int16 = 4,
    #[display("int32")]
    Int32 = 5,
    #[display("int64")]
    Int64 = 6,
    #[display("uint")]
    Uint = 7,
    #[display("uint8")]
    Uint8 = 8,
    #[display("uint16")]
    Uint16 = 9,
    #[display("uint32")]
    Uint32 = 10,
    #[display("uint64")]
    Uint64 = 11,
    #[display("uintptr")]
    Uintptr = 12,
    #[display("float32")]
    Float32 = 13,
    #[display("float64")]
    Float64 = 14,
    #[display("complex64")]
    Complex64 = 15,
    #[display("complex128")]
    Complex128 = 16,
    #[display("array")]
    Array = 17,
    #[display("chan")]
    Chan = 18,
    #[display("func")]
    Func = 19,
    #[display("interface")]
    Interface = 20,
    #[display("map")]
    Map = 21,
    #[display("ptr")]
    Ptr = 22,
    #[display("slice")]
    Slice = 23,
    #[display("string")]
    String = 24,
    #[display("struct")]
    Struct = 25,
    #[display("unsafe.Pointer")]
    UnsafePointer = 26,
}

impl Kind {
    /// Every kind, in code order.
    pub const ALL: [Kind; 26] = [
        Kind::Bool,
        Kind::Int,
        Kind::Int8,
        Kind::Int16,
        Kind::Int32,
        Kind::Int64,
        Kind::Uint,
        Kind::Uint8,
        Kind::Uint16,
        Kind::Uint32,
        Kind::Uint64,
        Kind::Uintptr,
        Kind::Float32,
        Kind::Float64,
        Kind::Complex64,
        Kind::Complex128,
        Kind::Array,
        Kind::Chan,
        Kind::Func,
        Kind::Interface,
        Kind::Map,
        Kind::Ptr,
        Kind::Slice,
        Kind::String,
        Kind::Struct,
        Kind::UnsafePointer,
    ];

    /// Decode a kind from its front-end code.
    ///
    /// An unknown code is a construction error: it can only come from a
    /// code generator bug.
    pub fn from_code(code: u8) -> Result<Kind, ConstructionError> {
        Kind::ALL
            .iter()
            .copied()
            .find(|k| k.code() == code)
            .ok_or(ConstructionError::InvalidKind(code))
    }

    pub fn code(self) -> u8 {
        self as u8
    }

    /// Signed integer kinds. Used to decide sign extension in conversions.
    pub fn is_signed(self) -> bool {
        matches!(
            self,
            Kind::Int | Kind::Int8 | Kind::Int16 | Kind::Int32 | Kind::Int64
        )
    }

    /// Integer kinds of 32 bits or less, carried as host numbers.
    pub fn is_narrow_integer(self) -> bool {
        matches!(
            self,
            Kind::Int
                | Kind::Int8
                | Kind::Int16
                | Kind::Int32
                | Kind::Uint
                | Kind::Uint8
                | Kind::Uint16
                | Kind::Uint32
                | Kind::Uintptr
        )
    }

    /// 64-bit integer kinds, carried as (high, low) halves.
    pub fn is_wide_integer(self) -> bool {
        matches!(self, Kind::Int64 | Kind::Uint64)
    }

    pub fn is_integer(self) -> bool {
        self.is_narrow_integer() || self.is_wide_integer()
    }

    pub fn is_float(self) -> bool {
        matches!(self, Kind::Float32 | Kind::Float64)
    }

    pub fn is_complex(self) -> bool {
        matches!(self, Kind::Complex64 | Kind::Complex128)
    }

    pub fn is_numeric(self) -> bool {
        self.is_integer() || self.is_float() || self.is_complex()
    }

    /// Kinds whose descriptors are built in two phases (shell, then `init`).
    pub fn is_composite(self) -> bool {
        matches!(
            self,
            Kind::Array
                | Kind::Chan
                | Kind::Func
                | Kind::Interface
                | Kind::Map
                | Kind::Ptr
                | Kind::Slice
                | Kind::Struct
        )
    }

    /// Kinds carried bare through computation and boxed only behind an
    /// interface. The rest always travel in an envelope that knows its type.
    pub fn is_wrapped(self) -> bool {
        !matches!(
            self,
            Kind::Int64
                | Kind::Uint64
                | Kind::Complex64
                | Kind::Complex128
                | Kind::Chan
                | Kind::Func
                | Kind::Interface
                | Kind::Map
                | Kind::Ptr
                | Kind::Slice
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_round_trip() {
        for kind in Kind::ALL {
            assert_eq!(Kind::from_code(kind.code()).unwrap(), kind);
        }
    }

    #[test]
    fn unknown_code_is_a_construction_error() {
        assert_eq!(
            Kind::from_code(0).unwrap_err(),
            ConstructionError::InvalidKind(0)
        );
        assert_eq!(
            Kind::from_code(27).unwrap_err().to_string(),
            "invalid kind: 27"
        );
    }

    #[test]
    fn classification() {
        assert!(Kind::Int8.is_signed());
        assert!(!Kind::Uint8.is_signed());
        assert!(Kind::Uintptr.is_narrow_integer());
        assert!(Kind::Uint64.is_wide_integer());
        assert!(Kind::Complex64.is_numeric());
        assert!(!Kind::String.is_numeric());
        assert!(Kind::Struct.is_composite());
        assert!(!Kind::Slice.is_wrapped());
        assert!(Kind::Struct.is_wrapped());
    }
}
