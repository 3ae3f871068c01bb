//! Runtime substrate for compiled gossamer programs.
//!
//! The runtime gives every source-level type an interned descriptor and
//! defines how values of each kind are represented, copied, compared,
//! converted and dispatched through. On top of that sit channels, whose
//! blocking operations are futures, and a call stack of frames carrying
//! deferred cleanups and fault recovery.

pub mod chan;
pub mod convert;
pub mod display;
pub mod equality;
pub mod fault;
pub mod frame;
pub mod map;
pub mod memory;
pub mod methods;
pub mod numeric;
pub mod runes;
pub mod types;
pub mod value;

pub use chan::{Chan, SelectCase, Selected, make_chan, select};
pub use equality::{MapKey, equal, interface_equal, key_for};
pub use fault::{Fault, FaultResult};
pub use frame::{CallStack, Frame, Outcome, Recovered};
pub use map::{Map, make_map};
pub use memory::{ArrayRef, Pointer, Slice, StructRef, make_slice};
pub use methods::{
    assert_type, call_method, implements, invoke_method, method_expr, method_set, method_value,
    try_assert_type,
};
pub use types::{Type, TypeDesc, builtins};
pub use value::{Complex, Func, GoStr, Typed, Value, Word64};

pub use gossamer_core::{ConstructionError, Kind, RuntimeConfig};

/// Install `config` and build the primitive descriptors.
///
/// Returns `false` when a configuration was already in effect, in which case
/// `config` is ignored.
pub fn init(config: RuntimeConfig) -> bool {
    let installed = config.install();
    let b = builtins();
    tracing::debug!(
        word_size = RuntimeConfig::current().word_size,
        int_size = b.int.size(),
        "runtime initialized"
    );
    installed
}
