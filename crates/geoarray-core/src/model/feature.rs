use crate::{
    model::{
        field::{FieldKind, FieldSpec, FieldSubtype, ScalarKind},
        geometry::{Geometry, GeometryType},
    },
    value::{FieldSlot, Value},
};
use std::sync::Arc;
use thiserror::Error as ThisError;

///
/// FeatureError
///

#[derive(Clone, Debug, PartialEq, ThisError)]
pub enum FeatureError {
    #[error("unknown field '{0}'")]
    UnknownField(String),

    #[error("field '{field}' expects {expected}, got {found}")]
    TypeMismatch {
        field: String,
        expected: String,
        found: &'static str,
    },

    #[error("value {value} out of range for field '{field}' ({subtype})")]
    OutOfRange {
        field: String,
        subtype: FieldSubtype,
        value: String,
    },

    #[error("field '{0}' is not nullable")]
    NotNullable(String),
}

///
/// FeatureDefn
/// Snapshot of a layer's field list and geometry type.
///

#[derive(Clone, Debug, PartialEq)]
pub struct FeatureDefn {
    pub fields: Vec<FieldSpec>,
    pub geometry_type: GeometryType,
}

impl FeatureDefn {
    #[must_use]
    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }
}

///
/// Feature
///
/// In-memory feature. Slots are positional over the definition it was
/// created from; values are checked against their field when set.
///

#[derive(Clone, Debug, PartialEq)]
pub struct Feature {
    defn: Arc<FeatureDefn>,
    fid: Option<i64>,
    slots: Vec<FieldSlot>,
    geometry: Option<Geometry>,
}

impl Feature {
    #[must_use]
    pub fn new(defn: Arc<FeatureDefn>) -> Self {
        let slots = vec![FieldSlot::Unset; defn.fields.len()];

        Self {
            defn,
            fid: None,
            slots,
            geometry: None,
        }
    }

    #[must_use]
    pub fn defn(&self) -> &FeatureDefn {
        &self.defn
    }

    #[must_use]
    pub const fn fid(&self) -> Option<i64> {
        self.fid
    }

    pub const fn set_fid(&mut self, fid: Option<i64>) {
        self.fid = fid;
    }

    #[must_use]
    pub const fn geometry(&self) -> Option<&Geometry> {
        self.geometry.as_ref()
    }

    pub fn set_geometry(&mut self, geometry: Option<Geometry>) {
        self.geometry = geometry;
    }

    #[must_use]
    pub fn slots(&self) -> &[FieldSlot] {
        &self.slots
    }

    /// Slot by field name; `None` when the field does not exist.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&FieldSlot> {
        self.defn.field_index(name).map(|i| &self.slots[i])
    }

    /// Present value by field name.
    #[must_use]
    pub fn value(&self, name: &str) -> Option<&Value> {
        self.get(name).and_then(FieldSlot::value)
    }

    pub fn set(&mut self, name: &str, value: impl Into<Value>) -> Result<(), FeatureError> {
        let index = self.index_of(name)?;
        self.set_by_index(index, value)
    }

    pub fn set_by_index(
        &mut self,
        index: usize,
        value: impl Into<Value>,
    ) -> Result<(), FeatureError> {
        let spec = self
            .defn
            .fields
            .get(index)
            .ok_or_else(|| FeatureError::UnknownField(format!("#{index}")))?;
        let value = check_value(spec, value.into())?;
        self.slots[index] = FieldSlot::Value(value);

        Ok(())
    }

    /// Mark a field explicitly null. Rejected on non-nullable fields.
    pub fn set_null(&mut self, name: &str) -> Result<(), FeatureError> {
        let index = self.index_of(name)?;
        if !self.defn.fields[index].nullable {
            return Err(FeatureError::NotNullable(name.to_string()));
        }
        self.slots[index] = FieldSlot::Null;

        Ok(())
    }

    pub fn unset(&mut self, name: &str) -> Result<(), FeatureError> {
        let index = self.index_of(name)?;
        self.slots[index] = FieldSlot::Unset;

        Ok(())
    }

    pub(crate) fn from_parts(
        defn: Arc<FeatureDefn>,
        fid: i64,
        slots: Vec<FieldSlot>,
        geometry: Option<Geometry>,
    ) -> Self {
        Self {
            defn,
            fid: Some(fid),
            slots,
            geometry,
        }
    }

    fn index_of(&self, name: &str) -> Result<usize, FeatureError> {
        self.defn
            .field_index(name)
            .ok_or_else(|| FeatureError::UnknownField(name.to_string()))
    }
}

/// Check a value against its field and widen it to the field's carrier
/// variant (integers widen to `Int64`/`Real` where the field asks for it).
pub(crate) fn check_value(spec: &FieldSpec, value: Value) -> Result<Value, FeatureError> {
    match spec.kind {
        FieldKind::Scalar(kind) => check_scalar(spec, kind, value),
        FieldKind::List(kind) => match value {
            Value::List(items) => items
                .into_iter()
                .map(|item| check_scalar(spec, kind, item))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::List),
            other => Err(mismatch(spec, &other)),
        },
    }
}

fn check_scalar(spec: &FieldSpec, kind: ScalarKind, value: Value) -> Result<Value, FeatureError> {
    let value = match (kind, value) {
        (ScalarKind::String, v @ Value::Text(_))
        | (ScalarKind::Integer, v @ Value::Int32(_))
        | (ScalarKind::Integer64, v @ Value::Int64(_))
        | (ScalarKind::Real, v @ Value::Real(_))
        | (ScalarKind::Binary, v @ Value::Binary(_))
        | (ScalarKind::Date, v @ Value::Date(_))
        | (ScalarKind::Time, v @ Value::Time(_))
        | (ScalarKind::DateTime, v @ Value::DateTime(_)) => v,

        (ScalarKind::Integer, Value::Int64(v)) => {
            Value::Int32(i32::try_from(v).map_err(|_| out_of_range(spec, v))?)
        }
        (ScalarKind::Integer64, Value::Int32(v)) => Value::Int64(i64::from(v)),
        (ScalarKind::Real, Value::Int32(v)) => Value::Real(f64::from(v)),
        #[expect(clippy::cast_precision_loss)]
        (ScalarKind::Real, Value::Int64(v)) => Value::Real(v as f64),

        (_, other) => return Err(mismatch(spec, &other)),
    };

    if let Value::Int32(v) = value {
        let legal = match spec.subtype {
            FieldSubtype::Int16 => i16::try_from(v).is_ok(),
            FieldSubtype::Boolean => v == 0 || v == 1,
            FieldSubtype::None | FieldSubtype::Float32 => true,
        };
        if !legal {
            return Err(out_of_range(spec, v));
        }
    }

    Ok(value)
}

fn mismatch(spec: &FieldSpec, value: &Value) -> FeatureError {
    FeatureError::TypeMismatch {
        field: spec.name.clone(),
        expected: spec.kind.to_string(),
        found: value.type_label(),
    }
}

fn out_of_range(spec: &FieldSpec, value: impl ToString) -> FeatureError {
    FeatureError::OutOfRange {
        field: spec.name.clone(),
        subtype: spec.subtype,
        value: value.to_string(),
    }
}
