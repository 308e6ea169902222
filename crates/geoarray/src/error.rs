use derive_more::Display;
use geoarray_config::ConfigError;
use geoarray_core::error::{
    Error as CoreError, ErrorClass as CoreErrorClass, ErrorOrigin as CoreErrorOrigin,
};
use serde::{Deserialize, Serialize};
use thiserror::Error as ThisError;

///
/// Error
/// Public error type with a stable kind + origin taxonomy.
///

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize, ThisError)]
#[error("{message}")]
pub struct Error {
    pub kind: ErrorKind,
    pub origin: ErrorOrigin,
    pub message: String,
}

impl Error {
    pub fn new(kind: ErrorKind, origin: ErrorOrigin, message: impl Into<String>) -> Self {
        Self {
            kind,
            origin,
            message: message.into(),
        }
    }
}

impl From<CoreError> for Error {
    fn from(err: CoreError) -> Self {
        Self::new(err.class().into(), err.origin().into(), err.to_string())
    }
}

impl From<ConfigError> for Error {
    fn from(err: ConfigError) -> Self {
        Self::new(ErrorKind::Config, ErrorOrigin::Config, err.to_string())
    }
}

///
/// ErrorKind
/// Public error taxonomy for callers.
///

#[derive(Clone, Copy, Debug, Deserialize, Display, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Layer schema could not be built or does not match the stored one.
    Schema,

    /// Fields can no longer change once features were written.
    SchemaFrozen,

    /// A feature was rejected.
    Validation,

    UnknownField,
    FilterSyntax,

    /// Write attempted through a read-only connection.
    Access,

    CreateLayer,
    NotFound,
    Unsupported,

    /// Configuration file could not be loaded.
    Config,

    /// The caller cannot remediate this.
    Internal,
}

impl From<CoreErrorClass> for ErrorKind {
    fn from(class: CoreErrorClass) -> Self {
        match class {
            CoreErrorClass::Schema => Self::Schema,
            CoreErrorClass::SchemaFrozen => Self::SchemaFrozen,
            CoreErrorClass::Validation => Self::Validation,
            CoreErrorClass::UnknownField => Self::UnknownField,
            CoreErrorClass::FilterSyntax => Self::FilterSyntax,
            CoreErrorClass::Access => Self::Access,
            CoreErrorClass::CreateLayer => Self::CreateLayer,
            CoreErrorClass::NotFound => Self::NotFound,
            CoreErrorClass::Unsupported => Self::Unsupported,
            CoreErrorClass::Internal => Self::Internal,
        }
    }
}

///
/// ErrorOrigin
///

#[derive(Clone, Copy, Debug, Deserialize, Display, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorOrigin {
    Schema,
    Filter,
    Write,
    Catalog,
    Engine,
    Config,
}

impl From<CoreErrorOrigin> for ErrorOrigin {
    fn from(origin: CoreErrorOrigin) -> Self {
        match origin {
            CoreErrorOrigin::Schema => Self::Schema,
            CoreErrorOrigin::Filter => Self::Filter,
            CoreErrorOrigin::Write => Self::Write,
            CoreErrorOrigin::Catalog => Self::Catalog,
            CoreErrorOrigin::Engine => Self::Engine,
            CoreErrorOrigin::Config => Self::Config,
        }
    }
}
