//! Slice, array, struct and pointer memory model.
//!
//! Arrays and slices are windows onto a shared [`Backing`] store; struct
//! objects share their field storage with every proxy view created for them;
//! pointers are either the pointee object itself (structs, arrays) or a
//! cached handle onto one storage cell.

mod array;
mod pointer;
mod slice;
mod storage;
mod structs;

pub use array::ArrayRef;
pub use pointer::{CellPtr, Pointer};
pub use slice::{Slice, copy_slice, copy_string, make_slice, substring};
pub use storage::{Backing, copy_elements};
pub use structs::{FieldStorage, StructRef};
