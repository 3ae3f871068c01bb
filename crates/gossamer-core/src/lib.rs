//! Shared vocabulary of the gossamer runtime: kind tags, construction
//! errors and runtime configuration.

pub mod config;
pub mod error;
pub mod kind;

pub use config::{ConfigError, RuntimeConfig};
pub use error::{ConstructionError, ConstructionResult};
pub use kind::Kind;
