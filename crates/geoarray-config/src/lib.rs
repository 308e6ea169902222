//! Module: geoarray-config
//! Responsibility: the TOML configuration file model and its validation.
//! Does not own: runtime connection settings (the facade converts a loaded
//! `Config` into them).
//! Boundary: a `Config` that loads without error is safe to hand to a
//! connection as-is.

#[cfg(test)]
mod tests;

use serde::{Deserialize, Serialize};
use std::{fs, path::Path};
use thiserror::Error as ThisError;

/// Batch size used when a section leaves it unset.
pub const DEFAULT_BATCH_SIZE: usize = 500_000;

///
/// ConfigError
///

#[derive(Debug, ThisError)]
pub enum ConfigError {
    #[error("invalid configuration: {0}")]
    Invalid(String),

    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to read configuration file '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

///
/// Config
///

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub engine: EngineConfig,
    pub write: WriteConfig,
    pub read: ReadConfig,
}

impl Config {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;

        Ok(config)
    }

    /// Read, parse and validate a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;

        Self::from_toml_str(&text)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.write.batch_size == 0 {
            return Err(ConfigError::Invalid(
                "write.batch_size must be greater than zero".to_string(),
            ));
        }
        if self.read.batch_size == 0 {
            return Err(ConfigError::Invalid(
                "read.batch_size must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }
}

///
/// EngineConfig
///

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Highest OR pushdown level to use; never raises what the engine offers.
    pub or_pushdown: OrPushdownLevel,
}

///
/// OrPushdownLevel
///

#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum OrPushdownLevel {
    #[default]
    Full,
    SameField,
    Unsupported,
}

///
/// WriteConfig
///

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct WriteConfig {
    pub batch_size: usize,
    pub not_null_policy: NotNullPolicy,
}

impl Default for WriteConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            not_null_policy: NotNullPolicy::default(),
        }
    }
}

///
/// NotNullPolicy
///

#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum NotNullPolicy {
    #[default]
    WarnDefault,
    Reject,
}

///
/// ReadConfig
///

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReadConfig {
    pub batch_size: usize,
}

impl Default for ReadConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}
