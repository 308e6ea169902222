//! ## Crate layout
//! - `core`: runtime layers, schema mapping, filter pushdown, catalog and
//!   the array engine capability.
//! - `config`: the TOML configuration file model.
//! - `error`: the public error type with a stable kind + origin taxonomy.
//!
//! The `prelude` module carries what application code needs to open a
//! dataset and read or write features.

pub use geoarray_config as config;
pub use geoarray_core as core;

pub mod error;

#[cfg(test)]
mod tests;

use geoarray_config::{Config, NotNullPolicy as ConfigNotNullPolicy, OrPushdownLevel};
use geoarray_core::{
    config::{ConnectionConfig, NotNullPolicy},
    db::engine::OrPushdown,
};

// re-exports
pub use error::{Error, ErrorKind, ErrorOrigin};

//
// Consts
//

/// Workspace version re-export for downstream tooling/tests.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

///
/// Configuration bridge
///

/// Connection settings described by a loaded configuration file.
#[must_use]
pub const fn connection_config(config: &Config) -> ConnectionConfig {
    let or_pushdown = match config.engine.or_pushdown {
        OrPushdownLevel::Full => OrPushdown::Full,
        OrPushdownLevel::SameField => OrPushdown::SameField,
        OrPushdownLevel::Unsupported => OrPushdown::Unsupported,
    };
    let not_null_policy = match config.write.not_null_policy {
        ConfigNotNullPolicy::WarnDefault => NotNullPolicy::WarnAndDefault,
        ConfigNotNullPolicy::Reject => NotNullPolicy::Reject,
    };

    ConnectionConfig {
        or_pushdown,
        write_batch_size: config.write.batch_size,
        read_batch_size: config.read.batch_size,
        not_null_policy,
    }
}

/// Parse a TOML document straight into connection settings.
pub fn connection_config_from_toml(text: &str) -> Result<ConnectionConfig, Error> {
    let config = Config::from_toml_str(text)?;

    Ok(connection_config(&config))
}

///
/// Prelude
///

pub mod prelude {
    pub use crate::{Error, ErrorKind, connection_config};
    pub use geoarray_core::{
        config::ConnectionConfig,
        db::{Catalog, EngineRegistry, engine::MemoryEngine},
        prelude::*,
    };
}
