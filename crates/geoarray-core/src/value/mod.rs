mod temporal;


use std::fmt;
use time::{Date, OffsetDateTime, Time};

// re-exports
pub use temporal::{
    date_from_epoch_days, date_to_epoch_days, datetime_from_epoch_millis,
    datetime_to_epoch_millis, parse_date, parse_datetime, parse_time, time_from_millis,
    time_to_millis,
};

///
/// Value
///
/// One typed field value. Nullness is tracked by `FieldSlot`, never here:
/// a `Value` is always a present, non-null datum.
///
/// Integer fields with a 16-bit or boolean subtype still carry `Int32`;
/// float32 fields still carry `Real`. Narrowing happens at storage time.
///

#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Text(String),
    Int32(i32),
    Int64(i64),
    Real(f64),
    Binary(Vec<u8>),
    Date(Date),
    Time(Time),
    DateTime(OffsetDateTime),
    List(Vec<Self>),
}

impl Value {
    /// Short type label used in error messages.
    #[must_use]
    pub const fn type_label(&self) -> &'static str {
        match self {
            Self::Text(_) => "string",
            Self::Int32(_) => "integer",
            Self::Int64(_) => "integer64",
            Self::Real(_) => "real",
            Self::Binary(_) => "binary",
            Self::Date(_) => "date",
            Self::Time(_) => "time",
            Self::DateTime(_) => "datetime",
            Self::List(_) => "list",
        }
    }

    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int32(v) => Some(i64::from(*v)),
            Self::Int64(v) => Some(*v),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Real(v) => Some(*v),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(v) => Some(v),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_list(&self) -> Option<&[Self]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Self::Int32(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Int64(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Real(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Int32(i32::from(value))
    }
}

impl From<Vec<u8>> for Value {
    fn from(value: Vec<u8>) -> Self {
        Self::Binary(value)
    }
}

impl From<Date> for Value {
    fn from(value: Date) -> Self {
        Self::Date(value)
    }
}

impl From<Time> for Value {
    fn from(value: Time) -> Self {
        Self::Time(value)
    }
}

impl From<OffsetDateTime> for Value {
    fn from(value: OffsetDateTime) -> Self {
        Self::DateTime(value)
    }
}

impl From<Vec<i32>> for Value {
    fn from(values: Vec<i32>) -> Self {
        Self::List(values.into_iter().map(Self::Int32).collect())
    }
}

impl From<Vec<i64>> for Value {
    fn from(values: Vec<i64>) -> Self {
        Self::List(values.into_iter().map(Self::Int64).collect())
    }
}

impl From<Vec<f64>> for Value {
    fn from(values: Vec<f64>) -> Self {
        Self::List(values.into_iter().map(Self::Real).collect())
    }
}

impl From<Vec<bool>> for Value {
    fn from(values: Vec<bool>) -> Self {
        Self::List(values.into_iter().map(Self::from).collect())
    }
}

impl From<Vec<&str>> for Value {
    fn from(values: Vec<&str>) -> Self {
        Self::List(values.into_iter().map(Self::from).collect())
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(v) => f.write_str(v),
            Self::Int32(v) => write!(f, "{v}"),
            Self::Int64(v) => write!(f, "{v}"),
            Self::Real(v) => write!(f, "{v}"),
            Self::Binary(bytes) => {
                for byte in bytes {
                    write!(f, "{byte:02X}")?;
                }
                Ok(())
            }
            Self::Date(v) => f.write_str(&temporal::format_date(*v)),
            Self::Time(v) => f.write_str(&temporal::format_time(*v)),
            Self::DateTime(v) => f.write_str(&temporal::format_datetime(*v)),
            Self::List(items) => {
                write!(f, "({})", items.len())?;
                f.write_str(":")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{item}")?;
                }
                Ok(())
            }
        }
    }
}

///
/// FieldSlot
///
/// Per-field state on a feature. `Unset` and `Null` are distinct: an unset
/// slot on a non-nullable field is subject to the not-null policy, while an
/// explicit null is only legal on nullable fields.
///

#[derive(Clone, Debug, Default, PartialEq)]
pub enum FieldSlot {
    #[default]
    Unset,
    Null,
    Value(Value),
}

impl FieldSlot {
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    #[must_use]
    pub const fn is_set(&self) -> bool {
        !matches!(self, Self::Unset)
    }

    #[must_use]
    pub const fn value(&self) -> Option<&Value> {
        match self {
            Self::Value(value) => Some(value),
            Self::Unset | Self::Null => None,
        }
    }
}

impl From<Value> for FieldSlot {
    fn from(value: Value) -> Self {
        Self::Value(value)
    }
}

impl From<Option<Value>> for FieldSlot {
    fn from(value: Option<Value>) -> Self {
        value.map_or(Self::Null, Self::Value)
    }
}

/// Parse a hex string (as used for binary literals) into bytes.
#[must_use]
pub fn parse_hex(text: &str) -> Option<Vec<u8>> {
    let text = text.trim();
    if text.len() % 2 != 0 {
        return None;
    }

    (0..text.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(text.get(i..i + 2)?, 16).ok())
        .collect()
}
