//! Per-connection runtime settings.
//!
//! Core consumes a plain value; file formats live in `geoarray-config`.

use crate::{
    DEFAULT_BATCH_SIZE,
    db::engine::{EngineCapabilities, OrPushdown},
};
use derive_more::Display;
use serde::{Deserialize, Serialize};

///
/// NotNullPolicy
///
/// What a write does with a non-nullable field left unset.
///

#[derive(Clone, Copy, Debug, Default, Deserialize, Display, Eq, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum NotNullPolicy {
    /// Store the type's zero value and log a warning.
    #[default]
    #[serde(rename = "warn-default")]
    #[display("warn-default")]
    WarnAndDefault,

    /// Fail the write.
    #[display("reject")]
    Reject,
}

///
/// ConnectionConfig
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ConnectionConfig {
    /// Upper bound on OR pushdown; the engine's own level still applies.
    pub or_pushdown: OrPushdown,
    pub write_batch_size: usize,
    pub read_batch_size: usize,
    pub not_null_policy: NotNullPolicy,
}

impl ConnectionConfig {
    /// Capabilities a connection actually uses. Configuration can only
    /// lower the OR level an engine reports.
    #[must_use]
    pub fn effective_capabilities(&self, engine: EngineCapabilities) -> EngineCapabilities {
        EngineCapabilities {
            or_pushdown: engine.or_pushdown.min(self.or_pushdown),
            value_sets: engine.value_sets,
        }
    }

    #[must_use]
    pub const fn with_or_pushdown(mut self, level: OrPushdown) -> Self {
        self.or_pushdown = level;
        self
    }

    #[must_use]
    pub const fn with_not_null_policy(mut self, policy: NotNullPolicy) -> Self {
        self.not_null_policy = policy;
        self
    }

    #[must_use]
    pub const fn with_batch_sizes(mut self, write: usize, read: usize) -> Self {
        self.write_batch_size = write;
        self.read_batch_size = read;
        self
    }
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            or_pushdown: OrPushdown::Full,
            write_batch_size: DEFAULT_BATCH_SIZE,
            read_batch_size: DEFAULT_BATCH_SIZE,
            not_null_policy: NotNullPolicy::WarnAndDefault,
        }
    }
}
