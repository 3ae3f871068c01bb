//! Runtime configuration.
//!
//! The configuration is process-wide and installed once, before the first
//! descriptor is built. Runtimes that never call [`RuntimeConfig::install`]
//! run with [`RuntimeConfig::default`].

use std::sync::OnceLock;

use derive_more::Display;
use serde::{Deserialize, Serialize};

/// Largest index the host can address in a backing store.
pub const DEFAULT_MAX_INDEX: i64 = 2_147_483_647;

/// Byte size of `int`, `uint`, `uintptr` and reference kinds on the host.
pub const DEFAULT_WORD_SIZE: u32 = 4;

const ENV_MAX_INDEX: &str = "GOSSAMER_MAX_INDEX";
const ENV_WORD_SIZE: &str = "GOSSAMER_WORD_SIZE";

static INSTALLED: OnceLock<RuntimeConfig> = OnceLock::new();

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RuntimeConfig {
    /// Upper bound for slice lengths, capacities and channel buffers.
    pub max_index: i64,
    /// Size in bytes reported for word-sized kinds.
    pub word_size: u32,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            max_index: DEFAULT_MAX_INDEX,
            word_size: DEFAULT_WORD_SIZE,
        }
    }
}

#[derive(Debug, Display)]
pub enum ConfigError {
    #[display("invalid configuration document: {_0}")]
    Json(serde_json::Error),

    #[display("invalid value {value:?} for {var}")]
    InvalidVar { var: &'static str, value: String },

    #[display("word size must be 4 or 8, got {_0}")]
    WordSize(u32),
}

impl From<serde_json::Error> for ConfigError {
    fn from(error: serde_json::Error) -> Self {
        ConfigError::Json(error)
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Json(e) => Some(e),
            _ => None,
        }
    }
}

impl RuntimeConfig {
    /// Parse a JSON document. Missing fields keep their defaults.
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let config: RuntimeConfig = serde_json::from_str(text)?;
        config.validate()
    }

    /// Defaults overlaid with `GOSSAMER_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Defaults overlaid with whatever `lookup` returns for each variable.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = RuntimeConfig::default();
        if let Some(value) = lookup(ENV_MAX_INDEX) {
            config.max_index = value.trim().parse().map_err(|_| ConfigError::InvalidVar {
                var: ENV_MAX_INDEX,
                value: value.clone(),
            })?;
        }
        if let Some(value) = lookup(ENV_WORD_SIZE) {
            config.word_size = value.trim().parse().map_err(|_| ConfigError::InvalidVar {
                var: ENV_WORD_SIZE,
                value: value.clone(),
            })?;
        }
        config.validate()
    }

    fn validate(self) -> Result<Self, ConfigError> {
        if !matches!(self.word_size, 4 | 8) {
            return Err(ConfigError::WordSize(self.word_size));
        }
        if self.max_index < 0 {
            return Err(ConfigError::InvalidVar {
                var: ENV_MAX_INDEX,
                value: self.max_index.to_string(),
            });
        }
        Ok(self)
    }

    /// Install this configuration for the whole process.
    ///
    /// Returns `false` if a configuration was already installed (or already
    /// observed through [`RuntimeConfig::current`]); the earlier one stays.
    pub fn install(self) -> bool {
        let mut installed = false;
        INSTALLED.get_or_init(|| {
            installed = true;
            self
        });
        if !installed {
            tracing::warn!("runtime configuration already installed; ignoring new one");
        }
        installed
    }

    /// The process-wide configuration.
    pub fn current() -> &'static RuntimeConfig {
        INSTALLED.get_or_init(RuntimeConfig::default)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_keeps_defaults_for_missing_fields() {
        let config = RuntimeConfig::from_json(r#"{ "max_index": 1024 }"#).unwrap();
        assert_eq!(config.max_index, 1024);
        assert_eq!(config.word_size, DEFAULT_WORD_SIZE);
    }

    #[test]
    fn json_rejects_unknown_fields() {
        let err = RuntimeConfig::from_json(r#"{ "max_len": 3 }"#).unwrap_err();
        assert!(matches!(err, ConfigError::Json(_)));
    }

    #[test]
    fn lookup_overlays_defaults() {
        let config = RuntimeConfig::from_lookup(|var| match var {
            "GOSSAMER_WORD_SIZE" => Some("8".to_string()),
            _ => None,
        })
        .unwrap();
        assert_eq!(config.word_size, 8);
        assert_eq!(config.max_index, DEFAULT_MAX_INDEX);
    }

    #[test]
    fn lookup_reports_bad_values() {
        let err = RuntimeConfig::from_lookup(|var| {
            (var == "GOSSAMER_MAX_INDEX").then(|| "lots".to_string())
        })
        .unwrap_err();
        assert_eq!(
            err.to_string(),
            "invalid value \"lots\" for GOSSAMER_MAX_INDEX"
        );
    }

    #[test]
    fn word_size_is_validated() {
        let err = RuntimeConfig::from_json(r#"{ "word_size": 2 }"#).unwrap_err();
        assert_eq!(err.to_string(), "word size must be 4 or 8, got 2");
    }
}
