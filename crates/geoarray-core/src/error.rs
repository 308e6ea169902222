use crate::{
    db::{
        catalog::CatalogError, codec::CodecError, engine::EngineError, filter::FilterError,
        layer::WriteError, registry::RegistryError, schema::SchemaError,
    },
    model::feature::FeatureError,
};
use std::fmt;
use thiserror::Error as ThisError;

///
/// Error
///
/// Every failure a layer, dataset or catalog call can report. The wrapped
/// component error is kept intact; `class` and `origin` give the stable
/// classification.
///

#[derive(Debug, ThisError)]
pub enum Error {
    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Filter(#[from] FilterError),

    #[error(transparent)]
    Write(#[from] WriteError),

    #[error(transparent)]
    Feature(#[from] FeatureError),

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error(transparent)]
    Codec(#[from] CodecError),
}

impl Error {
    #[must_use]
    pub const fn class(&self) -> ErrorClass {
        match self {
            Self::Schema(SchemaError::Frozen { .. }) => ErrorClass::SchemaFrozen,
            Self::Schema(SchemaError::UnknownField(_))
            | Self::Filter(FilterError::UnknownField(_)) => ErrorClass::UnknownField,
            Self::Schema(_) => ErrorClass::Schema,
            Self::Filter(_) => ErrorClass::FilterSyntax,
            Self::Write(WriteError::ReadOnly) => ErrorClass::Access,
            Self::Write(_) | Self::Feature(_) => ErrorClass::Validation,
            Self::Catalog(CatalogError::NotFound { .. })
            | Self::Registry(RegistryError::UnknownScheme { .. })
            | Self::Engine(EngineError::NotFound { .. }) => ErrorClass::NotFound,
            Self::Catalog(_) => ErrorClass::CreateLayer,
            Self::Engine(EngineError::Unsupported(_)) => ErrorClass::Unsupported,
            Self::Registry(_) | Self::Engine(_) | Self::Codec(_) => ErrorClass::Internal,
        }
    }

    #[must_use]
    pub const fn origin(&self) -> ErrorOrigin {
        match self {
            Self::Schema(_) => ErrorOrigin::Schema,
            Self::Filter(_) => ErrorOrigin::Filter,
            Self::Write(_) | Self::Feature(_) => ErrorOrigin::Write,
            Self::Catalog(_) | Self::Registry(_) => ErrorOrigin::Catalog,
            Self::Engine(_) | Self::Codec(_) => ErrorOrigin::Engine,
        }
    }
}

///
/// ErrorClass
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorClass {
    Schema,
    SchemaFrozen,
    Validation,
    UnknownField,
    FilterSyntax,
    Access,
    CreateLayer,
    NotFound,
    Unsupported,
    Internal,
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Schema => "schema",
            Self::SchemaFrozen => "schema_frozen",
            Self::Validation => "validation",
            Self::UnknownField => "unknown_field",
            Self::FilterSyntax => "filter_syntax",
            Self::Access => "access",
            Self::CreateLayer => "create_layer",
            Self::NotFound => "not_found",
            Self::Unsupported => "unsupported",
            Self::Internal => "internal",
        };
        write!(f, "{label}")
    }
}

///
/// ErrorOrigin
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorOrigin {
    Schema,
    Filter,
    Write,
    Catalog,
    Engine,
    Config,
}

impl fmt::Display for ErrorOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Schema => "schema",
            Self::Filter => "filter",
            Self::Write => "write",
            Self::Catalog => "catalog",
            Self::Engine => "engine",
            Self::Config => "config",
        };
        write!(f, "{label}")
    }
}
