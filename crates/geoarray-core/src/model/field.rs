use derive_more::Display;
use serde::{Deserialize, Serialize};

///
/// ScalarKind
/// Logical scalar type of a field or of a list field's elements.
///

#[derive(Clone, Copy, Debug, Deserialize, Display, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScalarKind {
    String,
    Integer,
    Integer64,
    Real,
    Binary,
    Date,
    Time,
    DateTime,
}

///
/// FieldKind
///

#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    Scalar(ScalarKind),
    List(ScalarKind),
}

impl FieldKind {
    pub const STRING: Self = Self::Scalar(ScalarKind::String);
    pub const INTEGER: Self = Self::Scalar(ScalarKind::Integer);
    pub const INTEGER64: Self = Self::Scalar(ScalarKind::Integer64);
    pub const REAL: Self = Self::Scalar(ScalarKind::Real);
    pub const BINARY: Self = Self::Scalar(ScalarKind::Binary);
    pub const DATE: Self = Self::Scalar(ScalarKind::Date);
    pub const TIME: Self = Self::Scalar(ScalarKind::Time);
    pub const DATETIME: Self = Self::Scalar(ScalarKind::DateTime);

    #[must_use]
    pub const fn scalar(self) -> ScalarKind {
        match self {
            Self::Scalar(kind) | Self::List(kind) => kind,
        }
    }

    #[must_use]
    pub const fn is_list(self) -> bool {
        matches!(self, Self::List(_))
    }
}

impl std::fmt::Display for FieldKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Scalar(kind) => write!(f, "{kind}"),
            Self::List(kind) => write!(f, "{kind}List"),
        }
    }
}

///
/// FieldSubtype
/// Storage refinement of a logical type.
///

#[derive(
    Clone, Copy, Debug, Default, Deserialize, Display, Eq, Hash, PartialEq, Serialize,
)]
#[serde(rename_all = "snake_case")]
pub enum FieldSubtype {
    #[default]
    None,
    Int16,
    Boolean,
    Float32,
}

impl FieldSubtype {
    /// Whether this subtype may refine the given scalar kind.
    #[must_use]
    pub const fn applies_to(self, kind: ScalarKind) -> bool {
        match self {
            Self::None => true,
            Self::Int16 | Self::Boolean => matches!(kind, ScalarKind::Integer),
            Self::Float32 => matches!(kind, ScalarKind::Real),
        }
    }
}

///
/// FieldSpec
///

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct FieldSpec {
    pub name: String,
    pub kind: FieldKind,
    #[serde(default)]
    pub subtype: FieldSubtype,
    #[serde(default = "default_nullable")]
    pub nullable: bool,
}

const fn default_nullable() -> bool {
    true
}

impl FieldSpec {
    #[must_use]
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
            subtype: FieldSubtype::None,
            nullable: true,
        }
    }

    #[must_use]
    pub const fn with_subtype(mut self, subtype: FieldSubtype) -> Self {
        self.subtype = subtype;
        self
    }

    #[must_use]
    pub const fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }
}
