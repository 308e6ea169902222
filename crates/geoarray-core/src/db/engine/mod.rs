//! Module: engine
//! Responsibility: the sparse-array storage capability consumed by layers.
//! Does not own: vector semantics, schema mapping, filter translation.
//! Boundary: layers and the catalog talk to storage only through `ArrayEngine`.

mod condition;
mod memory;

#[cfg(test)]
mod tests;

use derive_more::Display;
use serde::{Deserialize, Serialize};
use std::{cmp::Ordering, collections::BTreeMap};
use thiserror::Error as ThisError;

// re-exports
pub use memory::MemoryEngine;

///
/// EngineError
///

#[derive(Clone, Debug, PartialEq, ThisError)]
pub enum EngineError {
    #[error("no object at '{uri}'")]
    NotFound { uri: String },

    #[error("an object already exists at '{uri}'")]
    AlreadyExists { uri: String },

    #[error("'{uri}' is not a group")]
    NotAGroup { uri: String },

    #[error("'{uri}' is not an array")]
    NotAnArray { uri: String },

    #[error("fragment rejected by '{uri}': {message}")]
    SchemaMismatch { uri: String, message: String },

    #[error("coordinate {value} outside the domain of dimension '{dimension}'")]
    OutOfDomain { dimension: String, value: String },

    #[error("unknown dimension or attribute '{name}'")]
    UnknownName { name: String },

    #[error("condition on '{name}' is ill-typed: {message}")]
    ConditionType { name: String, message: String },

    #[error("unsupported by engine: {0}")]
    Unsupported(String),

    #[error("engine state lock poisoned")]
    Poisoned,
}

///
/// Datatype
/// Physical cell type.
///

#[derive(Clone, Copy, Debug, Deserialize, Display, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Datatype {
    #[display("INT16")]
    Int16,
    #[display("INT32")]
    Int32,
    #[display("INT64")]
    Int64,
    #[display("UINT8")]
    Uint8,
    #[display("FLOAT32")]
    Float32,
    #[display("FLOAT64")]
    Float64,
    #[display("STRING_UTF8")]
    StringUtf8,
    #[display("BLOB")]
    Blob,
    #[display("DATETIME_DAY")]
    DatetimeDay,
    #[display("DATETIME_MS")]
    DatetimeMs,
    #[display("TIME_MS")]
    TimeMs,
}

///
/// CellValNum
///

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CellValNum {
    Single,
    Var,
}

///
/// Scalar
/// One physical value; the variant always matches a `Datatype`.
///

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub enum Scalar {
    Int16(i16),
    Int32(i32),
    Int64(i64),
    Uint8(u8),
    Float32(f32),
    Float64(f64),
    Text(String),
    Blob(Vec<u8>),
    DateDay(i64),
    DateTimeMs(i64),
    TimeMs(i64),
}

impl Scalar {
    #[must_use]
    pub const fn datatype(&self) -> Datatype {
        match self {
            Self::Int16(_) => Datatype::Int16,
            Self::Int32(_) => Datatype::Int32,
            Self::Int64(_) => Datatype::Int64,
            Self::Uint8(_) => Datatype::Uint8,
            Self::Float32(_) => Datatype::Float32,
            Self::Float64(_) => Datatype::Float64,
            Self::Text(_) => Datatype::StringUtf8,
            Self::Blob(_) => Datatype::Blob,
            Self::DateDay(_) => Datatype::DatetimeDay,
            Self::DateTimeMs(_) => Datatype::DatetimeMs,
            Self::TimeMs(_) => Datatype::TimeMs,
        }
    }

    /// Order two scalars of the same datatype. `None` across datatypes or
    /// when a float operand is NaN.
    #[must_use]
    pub fn compare(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Self::Int16(a), Self::Int16(b)) => Some(a.cmp(b)),
            (Self::Int32(a), Self::Int32(b)) => Some(a.cmp(b)),
            (Self::Int64(a), Self::Int64(b))
            | (Self::DateDay(a), Self::DateDay(b))
            | (Self::DateTimeMs(a), Self::DateTimeMs(b))
            | (Self::TimeMs(a), Self::TimeMs(b)) => Some(a.cmp(b)),
            (Self::Uint8(a), Self::Uint8(b)) => Some(a.cmp(b)),
            (Self::Float32(a), Self::Float32(b)) => a.partial_cmp(b),
            (Self::Float64(a), Self::Float64(b)) => a.partial_cmp(b),
            (Self::Text(a), Self::Text(b)) => Some(a.cmp(b)),
            (Self::Blob(a), Self::Blob(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float64(v) => Some(*v),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int64(v) => Some(*v),
            _ => None,
        }
    }
}

impl std::fmt::Display for Scalar {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Int16(v) => write!(f, "{v}"),
            Self::Int32(v) => write!(f, "{v}"),
            Self::Int64(v) | Self::DateDay(v) | Self::DateTimeMs(v) | Self::TimeMs(v) => {
                write!(f, "{v}")
            }
            Self::Uint8(v) => write!(f, "{v}"),
            Self::Float32(v) => write!(f, "{v}"),
            Self::Float64(v) => write!(f, "{v}"),
            Self::Text(v) => write!(f, "'{v}'"),
            Self::Blob(v) => write!(f, "<{} bytes>", v.len()),
        }
    }
}

///
/// Cell
/// Non-null attribute cell: one scalar, or a variable-length run.
///

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub enum Cell {
    Scalar(Scalar),
    List(Vec<Scalar>),
}

///
/// Domain
///

#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Domain {
    Float64 { lower: f64, upper: f64 },
    Int64 { lower: i64, upper: i64 },
}

impl Domain {
    #[must_use]
    pub fn contains(&self, value: &Scalar) -> bool {
        match (self, value) {
            (Self::Float64 { lower, upper }, Scalar::Float64(v)) => *lower <= *v && *v <= *upper,
            (Self::Int64 { lower, upper }, Scalar::Int64(v)) => *lower <= *v && *v <= *upper,
            _ => false,
        }
    }

    #[must_use]
    pub const fn datatype(&self) -> Datatype {
        match self {
            Self::Float64 { .. } => Datatype::Float64,
            Self::Int64 { .. } => Datatype::Int64,
        }
    }
}

///
/// DimensionSpec
///

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct DimensionSpec {
    pub name: String,
    pub domain: Domain,
}

///
/// AttributeSpec
///

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct AttributeSpec {
    pub name: String,
    pub datatype: Datatype,
    pub cell_val_num: CellValNum,
    pub nullable: bool,
    pub filters: Vec<String>,
}

///
/// ArraySchema
///

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct ArraySchema {
    pub dimensions: Vec<DimensionSpec>,
    pub attributes: Vec<AttributeSpec>,
    pub coords_filters: Vec<String>,
}

impl ArraySchema {
    #[must_use]
    pub fn dimension_index(&self, name: &str) -> Option<usize> {
        self.dimensions.iter().position(|d| d.name == name)
    }

    #[must_use]
    pub fn attribute_index(&self, name: &str) -> Option<usize> {
        self.attributes.iter().position(|a| a.name == name)
    }
}

///
/// FragmentRow
/// One row to append; `None` cells are nulls.
///

#[derive(Clone, Debug, PartialEq)]
pub struct FragmentRow {
    pub coords: Vec<Scalar>,
    pub cells: Vec<Option<Cell>>,
}

///
/// Fragment
/// Unit of append. Committed fragments are immutable.
///

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Fragment {
    pub rows: Vec<FragmentRow>,
}

impl Fragment {
    #[must_use]
    pub const fn len(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

///
/// ConditionOp
///

#[derive(Clone, Copy, Debug, Display, Eq, PartialEq)]
pub enum ConditionOp {
    #[display("=")]
    Eq,
    #[display("<>")]
    Ne,
    #[display("<")]
    Lt,
    #[display("<=")]
    Le,
    #[display(">")]
    Gt,
    #[display(">=")]
    Ge,
}

impl ConditionOp {
    #[must_use]
    pub fn accepts(self, ordering: Ordering) -> bool {
        match self {
            Self::Eq => ordering == Ordering::Equal,
            Self::Ne => ordering != Ordering::Equal,
            Self::Lt => ordering == Ordering::Less,
            Self::Le => ordering != Ordering::Greater,
            Self::Gt => ordering == Ordering::Greater,
            Self::Ge => ordering != Ordering::Less,
        }
    }
}

///
/// QueryCondition
///
/// Native value predicate over attributes or dimensions. A null cell never
/// satisfies `Compare` or `InSet`; only `Null` observes nullness.
///

#[derive(Clone, Debug, PartialEq)]
pub enum QueryCondition {
    Compare {
        name: String,
        op: ConditionOp,
        value: Scalar,
    },
    Null {
        name: String,
        is_null: bool,
    },
    InSet {
        name: String,
        values: Vec<Scalar>,
    },
    And(Vec<Self>),
    Or(Vec<Self>),
}

impl QueryCondition {
    /// Conjoin two conditions, flattening nested conjunctions.
    #[must_use]
    pub fn and(self, other: Self) -> Self {
        let mut children = Vec::new();
        for cond in [self, other] {
            match cond {
                Self::And(inner) => children.extend(inner),
                cond => children.push(cond),
            }
        }

        Self::And(children)
    }

    /// The single field every leaf references, if there is exactly one.
    #[must_use]
    pub fn single_field(&self) -> Option<&str> {
        match self {
            Self::Compare { name, .. } | Self::Null { name, .. } | Self::InSet { name, .. } => {
                Some(name)
            }
            Self::And(children) | Self::Or(children) => {
                let mut names = children.iter().map(Self::single_field);
                let first = names.next()??;
                names.all(|n| n == Some(first)).then_some(first)
            }
        }
    }
}

impl std::fmt::Display for QueryCondition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Compare { name, op, value } => write!(f, "{name} {op} {value}"),
            Self::Null { name, is_null } => {
                write!(f, "{name} IS {}NULL", if *is_null { "" } else { "NOT " })
            }
            Self::InSet { name, values } => {
                write!(f, "{name} IN (")?;
                for (i, v) in values.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{v}")?;
                }
                f.write_str(")")
            }
            Self::And(children) | Self::Or(children) => {
                let sep = if matches!(self, Self::And(_)) {
                    " AND "
                } else {
                    " OR "
                };
                f.write_str("(")?;
                for (i, child) in children.iter().enumerate() {
                    if i > 0 {
                        f.write_str(sep)?;
                    }
                    write!(f, "{child}")?;
                }
                f.write_str(")")
            }
        }
    }
}

///
/// DimensionRange
/// Closed interval on one dimension.
///

#[derive(Clone, Debug, PartialEq)]
pub struct DimensionRange {
    pub dimension: String,
    pub lower: Scalar,
    pub upper: Scalar,
}

///
/// ArrayQuery
///

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ArrayQuery {
    pub ranges: Vec<DimensionRange>,
    pub condition: Option<QueryCondition>,
    /// Skip rows whose ordinal is below this value.
    pub min_ordinal: u64,
    pub limit: Option<usize>,
}

///
/// ResultRow
/// `ordinal` is the row's zero-based position in commit order.
///

#[derive(Clone, Debug, PartialEq)]
pub struct ResultRow {
    pub ordinal: u64,
    pub coords: Vec<Scalar>,
    pub cells: Vec<Option<Cell>>,
}

///
/// MetadataValue
///

#[derive(Clone, Debug, PartialEq)]
pub enum MetadataValue {
    Int64(i64),
    Float64(f64),
    Ascii(String),
    Utf8(String),
}

impl MetadataValue {
    #[must_use]
    pub const fn type_label(&self) -> &'static str {
        match self {
            Self::Int64(_) => "INT64",
            Self::Float64(_) => "FLOAT64",
            Self::Ascii(_) => "STRING_ASCII",
            Self::Utf8(_) => "STRING_UTF8",
        }
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Ascii(s) | Self::Utf8(s) => Some(s),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int64(v) => Some(*v),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float64(v) => Some(*v),
            _ => None,
        }
    }
}

///
/// ObjectType
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ObjectType {
    Array,
    Group,
}

///
/// GroupMember
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct GroupMember {
    pub uri: String,
    pub name: String,
}

///
/// OrPushdown
///
/// How much disjunction the engine evaluates natively. Ordered so that the
/// effective level of a connection is the minimum of engine and config.
///

#[derive(
    Clone, Copy, Debug, Default, Deserialize, Display, Eq, Ord, PartialEq, PartialOrd, Serialize,
)]
#[serde(rename_all = "kebab-case")]
pub enum OrPushdown {
    #[display("unsupported")]
    Unsupported,
    #[display("same-field")]
    SameField,
    #[default]
    #[display("full")]
    Full,
}

///
/// EngineCapabilities
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct EngineCapabilities {
    pub or_pushdown: OrPushdown,
    pub value_sets: bool,
}

impl Default for EngineCapabilities {
    fn default() -> Self {
        Self {
            or_pushdown: OrPushdown::Full,
            value_sets: true,
        }
    }
}

///
/// ArrayEngine
///
/// Storage capability: typed dimensions, range queries, attribute value
/// queries, fragment append, and consistent read views. Every call is
/// synchronous and atomic.
///

pub trait ArrayEngine: Send + Sync {
    fn capabilities(&self) -> EngineCapabilities;

    fn object_type(&self, uri: &str) -> Option<ObjectType>;

    fn create_group(&self, uri: &str) -> Result<(), EngineError>;

    /// Register `member_uri` under `group` as `name`; members keep
    /// registration order.
    fn add_group_member(&self, group: &str, member_uri: &str, name: &str)
    -> Result<(), EngineError>;

    fn group_members(&self, uri: &str) -> Result<Vec<GroupMember>, EngineError>;

    fn create_array(&self, uri: &str, schema: ArraySchema) -> Result<(), EngineError>;

    fn array_schema(&self, uri: &str) -> Result<ArraySchema, EngineError>;

    fn put_metadata(&self, uri: &str, key: &str, value: MetadataValue) -> Result<(), EngineError>;

    fn metadata(&self, uri: &str) -> Result<BTreeMap<String, MetadataValue>, EngineError>;

    fn append_fragment(&self, uri: &str, fragment: Fragment) -> Result<(), EngineError>;

    /// Rows matching `query`, in ordinal order.
    fn query(&self, uri: &str, query: &ArrayQuery) -> Result<Vec<ResultRow>, EngineError>;

    fn fragment_count(&self, uri: &str) -> Result<usize, EngineError>;
}
