//! Field <-> attribute storage mapping.

use crate::{
    db::engine::{AttributeSpec, Cell, CellValNum, Datatype, Scalar},
    model::field::{FieldKind, FieldSpec, FieldSubtype, ScalarKind},
    value::{
        Value, date_from_epoch_days, date_to_epoch_days, datetime_from_epoch_millis,
        datetime_to_epoch_millis, time_from_millis, time_to_millis,
    },
};

/// Physical datatype of a (scalar or list element) field.
#[must_use]
pub const fn datatype_for(kind: ScalarKind, subtype: FieldSubtype) -> Datatype {
    match (kind, subtype) {
        (ScalarKind::String, _) => Datatype::StringUtf8,
        (ScalarKind::Integer, FieldSubtype::Int16) => Datatype::Int16,
        (ScalarKind::Integer, FieldSubtype::Boolean) => Datatype::Uint8,
        (ScalarKind::Integer, _) => Datatype::Int32,
        (ScalarKind::Integer64, _) => Datatype::Int64,
        (ScalarKind::Real, FieldSubtype::Float32) => Datatype::Float32,
        (ScalarKind::Real, _) => Datatype::Float64,
        (ScalarKind::Binary, _) => Datatype::Blob,
        (ScalarKind::Date, _) => Datatype::DatetimeDay,
        (ScalarKind::Time, _) => Datatype::TimeMs,
        (ScalarKind::DateTime, _) => Datatype::DatetimeMs,
    }
}

pub(crate) fn attribute_spec(field: &FieldSpec, filters: &[String]) -> AttributeSpec {
    let var = field.kind.is_list()
        || matches!(field.kind.scalar(), ScalarKind::String | ScalarKind::Binary);

    AttributeSpec {
        name: field.name.clone(),
        datatype: datatype_for(field.kind.scalar(), field.subtype),
        cell_val_num: if var {
            CellValNum::Var
        } else {
            CellValNum::Single
        },
        nullable: field.nullable,
        filters: filters.to_vec(),
    }
}

/// Reverse mapping used when a stored array carries no field list.
pub(crate) fn infer_field(attr: &AttributeSpec) -> FieldSpec {
    let (scalar, subtype) = match attr.datatype {
        Datatype::StringUtf8 => (ScalarKind::String, FieldSubtype::None),
        Datatype::Int16 => (ScalarKind::Integer, FieldSubtype::Int16),
        Datatype::Uint8 => (ScalarKind::Integer, FieldSubtype::Boolean),
        Datatype::Int32 => (ScalarKind::Integer, FieldSubtype::None),
        Datatype::Int64 => (ScalarKind::Integer64, FieldSubtype::None),
        Datatype::Float32 => (ScalarKind::Real, FieldSubtype::Float32),
        Datatype::Float64 => (ScalarKind::Real, FieldSubtype::None),
        Datatype::Blob => (ScalarKind::Binary, FieldSubtype::None),
        Datatype::DatetimeDay => (ScalarKind::Date, FieldSubtype::None),
        Datatype::TimeMs => (ScalarKind::Time, FieldSubtype::None),
        Datatype::DatetimeMs => (ScalarKind::DateTime, FieldSubtype::None),
    };

    let list = attr.cell_val_num == CellValNum::Var
        && !matches!(scalar, ScalarKind::String | ScalarKind::Binary);
    let kind = if list {
        FieldKind::List(scalar)
    } else {
        FieldKind::Scalar(scalar)
    };

    let mut spec = FieldSpec::new(attr.name.clone(), kind).with_subtype(subtype);
    spec.nullable = attr.nullable;

    spec
}

/// Encode a checked value into its cell. `None` on a shape mismatch.
pub(crate) fn encode(field: &FieldSpec, value: &Value) -> Option<Cell> {
    let datatype = datatype_for(field.kind.scalar(), field.subtype);

    match (field.kind, value) {
        (FieldKind::List(_), Value::List(items)) => items
            .iter()
            .map(|item| encode_scalar(datatype, item))
            .collect::<Option<Vec<_>>>()
            .map(Cell::List),
        (FieldKind::Scalar(_), Value::List(_)) | (FieldKind::List(_), _) => None,
        (FieldKind::Scalar(_), value) => encode_scalar(datatype, value).map(Cell::Scalar),
    }
}

#[expect(clippy::cast_possible_truncation)]
fn encode_scalar(datatype: Datatype, value: &Value) -> Option<Scalar> {
    Some(match (datatype, value) {
        (Datatype::StringUtf8, Value::Text(v)) => Scalar::Text(v.clone()),
        (Datatype::Int16, Value::Int32(v)) => Scalar::Int16(i16::try_from(*v).ok()?),
        (Datatype::Uint8, Value::Int32(v)) => Scalar::Uint8(u8::try_from(*v).ok()?),
        (Datatype::Int32, Value::Int32(v)) => Scalar::Int32(*v),
        (Datatype::Int64, Value::Int64(v)) => Scalar::Int64(*v),
        (Datatype::Float32, Value::Real(v)) => Scalar::Float32(*v as f32),
        (Datatype::Float64, Value::Real(v)) => Scalar::Float64(*v),
        (Datatype::Blob, Value::Binary(v)) => Scalar::Blob(v.clone()),
        (Datatype::DatetimeDay, Value::Date(v)) => Scalar::DateDay(date_to_epoch_days(*v)),
        (Datatype::TimeMs, Value::Time(v)) => Scalar::TimeMs(time_to_millis(*v)),
        (Datatype::DatetimeMs, Value::DateTime(v)) => {
            Scalar::DateTimeMs(datetime_to_epoch_millis(*v))
        }
        _ => return None,
    })
}

/// Decode a stored cell back into the field's value.
pub(crate) fn decode(field: &FieldSpec, cell: &Cell) -> Option<Value> {
    match (field.kind, cell) {
        (FieldKind::List(_), Cell::List(items)) => items
            .iter()
            .map(decode_scalar)
            .collect::<Option<Vec<_>>>()
            .map(Value::List),
        (FieldKind::Scalar(_), Cell::Scalar(scalar)) => decode_scalar(scalar),
        _ => None,
    }
}

fn decode_scalar(scalar: &Scalar) -> Option<Value> {
    Some(match scalar {
        Scalar::Text(v) => Value::Text(v.clone()),
        Scalar::Int16(v) => Value::Int32(i32::from(*v)),
        Scalar::Uint8(v) => Value::Int32(i32::from(*v)),
        Scalar::Int32(v) => Value::Int32(*v),
        Scalar::Int64(v) => Value::Int64(*v),
        Scalar::Float32(v) => Value::Real(f64::from(*v)),
        Scalar::Float64(v) => Value::Real(*v),
        Scalar::Blob(v) => Value::Binary(v.clone()),
        Scalar::DateDay(v) => Value::Date(date_from_epoch_days(*v)?),
        Scalar::TimeMs(v) => Value::Time(time_from_millis(*v)?),
        Scalar::DateTimeMs(v) => Value::DateTime(datetime_from_epoch_millis(*v)?),
    })
}

/// Zero value stored for a non-nullable field left unset.
pub(crate) fn default_cell(field: &FieldSpec) -> Cell {
    if field.kind.is_list() {
        return Cell::List(Vec::new());
    }

    Cell::Scalar(match datatype_for(field.kind.scalar(), field.subtype) {
        Datatype::StringUtf8 => Scalar::Text(String::new()),
        Datatype::Int16 => Scalar::Int16(0),
        Datatype::Uint8 => Scalar::Uint8(0),
        Datatype::Int32 => Scalar::Int32(0),
        Datatype::Int64 => Scalar::Int64(0),
        Datatype::Float32 => Scalar::Float32(0.0),
        Datatype::Float64 => Scalar::Float64(0.0),
        Datatype::Blob => Scalar::Blob(Vec::new()),
        Datatype::DatetimeDay => Scalar::DateDay(0),
        Datatype::TimeMs => Scalar::TimeMs(0),
        Datatype::DatetimeMs => Scalar::DateTimeMs(0),
    })
}
