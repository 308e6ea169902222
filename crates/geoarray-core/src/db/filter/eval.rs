use crate::{
    db::{
        filter::{
            ast::{CompareOp, Literal, Operand},
            normalize::Predicate,
        },
        schema::{BindingTarget, FieldBinding, LayerSchema},
    },
    model::{feature::Feature, field::FieldSubtype},
    value::{
        FieldSlot, Value, datetime_to_epoch_millis, parse_date, parse_datetime, parse_hex,
        parse_time, time_to_millis,
    },
};
use std::cmp::Ordering;

///
/// Row
/// Anything a predicate can be evaluated against.
///

pub trait Row {
    fn fid(&self) -> Option<i64>;

    fn slot(&self, index: usize) -> Option<&FieldSlot>;
}

impl Row for Feature {
    fn fid(&self) -> Option<i64> {
        Self::fid(self)
    }

    fn slot(&self, index: usize) -> Option<&FieldSlot> {
        self.slots().get(index)
    }
}

/// Evaluate `predicate` under three-valued logic. `None` is unknown, which
/// a filter treats as not matching.
pub fn evaluate(predicate: &Predicate, schema: &LayerSchema, row: &impl Row) -> Option<bool> {
    match predicate {
        Predicate::And(children) => {
            let mut unknown = false;
            for child in children {
                match evaluate(child, schema, row) {
                    Some(false) => return Some(false),
                    None => unknown = true,
                    Some(true) => {}
                }
            }
            (!unknown).then_some(true)
        }
        Predicate::Or(children) => {
            let mut unknown = false;
            for child in children {
                match evaluate(child, schema, row) {
                    Some(true) => return Some(true),
                    None => unknown = true,
                    Some(false) => {}
                }
            }
            (!unknown).then_some(false)
        }
        Predicate::IsNull { field, negated } => {
            let binding = schema.bind_field(field).ok()?;
            let is_null = field_value(&binding, row).is_none();
            Some(is_null != *negated)
        }
        Predicate::Compare { left, op, right } => compare(schema, row, left, *op, right),
    }
}

/// Whether a row passes: only a definite `true` does.
pub fn matches(predicate: &Predicate, schema: &LayerSchema, row: &impl Row) -> bool {
    evaluate(predicate, schema, row) == Some(true)
}

fn field_value(binding: &FieldBinding, row: &impl Row) -> Option<Value> {
    match &binding.target {
        BindingTarget::FidDimension { .. } => row.fid().map(Value::Int64),
        BindingTarget::Attribute { index, .. } => row.slot(*index)?.value().cloned(),
    }
}

fn compare(
    schema: &LayerSchema,
    row: &impl Row,
    left: &Operand,
    op: CompareOp,
    right: &Operand,
) -> Option<bool> {
    match (left, right) {
        (Operand::Field(name), Operand::Literal(lit)) => {
            let binding = schema.bind_field(name).ok()?;
            match field_value(&binding, row)? {
                Value::List(items) => Some(items.iter().any(|item| {
                    value_vs_literal(&binding, item, lit).is_some_and(|o| op.accepts(o))
                })),
                value => value_vs_literal(&binding, &value, lit).map(|o| op.accepts(o)),
            }
        }
        (Operand::Literal(lit), Operand::Field(_)) => {
            compare(schema, row, right, op.flip(), &Operand::Literal(lit.clone()))
        }
        (Operand::Field(a), Operand::Field(b)) => {
            let a = field_value(&schema.bind_field(a).ok()?, row)?;
            let b = field_value(&schema.bind_field(b).ok()?, row)?;
            value_vs_value(&a, &b).map(|o| op.accepts(o))
        }
        (Operand::Literal(a), Operand::Literal(b)) => {
            literal_vs_literal(a, b).map(|o| op.accepts(o))
        }
    }
}

// Float32 fields compare against the literal rounded to f32, matching
// what a pushed-down condition sees.
#[expect(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
fn value_vs_literal(binding: &FieldBinding, value: &Value, lit: &Literal) -> Option<Ordering> {
    match (value, lit) {
        (Value::Int32(v), Literal::Integer(l)) => Some(i64::from(*v).cmp(l)),
        (Value::Int64(v), Literal::Integer(l)) => Some(v.cmp(l)),
        (Value::Int32(v), Literal::Real(l)) => f64::from(*v).partial_cmp(l),
        (Value::Int64(v), Literal::Real(l)) => (*v as f64).partial_cmp(l),
        (Value::Real(v), lit) => {
            let l = lit.as_f64()?;
            if binding.subtype == FieldSubtype::Float32 {
                v.partial_cmp(&f64::from(l as f32))
            } else {
                v.partial_cmp(&l)
            }
        }
        (Value::Text(v), Literal::Text(l)) => Some(v.as_str().cmp(l.as_str())),
        (Value::Date(v), Literal::Text(l)) => Some(v.cmp(&parse_date(l)?)),
        (Value::DateTime(v), Literal::Text(l)) => Some(
            datetime_to_epoch_millis(*v).cmp(&datetime_to_epoch_millis(parse_datetime(l)?)),
        ),
        (Value::Time(v), Literal::Text(l)) => {
            Some(time_to_millis(*v).cmp(&time_to_millis(parse_time(l)?)))
        }
        (Value::Binary(v), Literal::Text(l)) => Some(v.as_slice().cmp(parse_hex(l)?.as_slice())),
        _ => None,
    }
}

#[expect(clippy::cast_precision_loss)]
fn value_vs_value(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Int32(x), Value::Int32(y)) => Some(x.cmp(y)),
        (Value::Int32(x), Value::Int64(y)) => Some(i64::from(*x).cmp(y)),
        (Value::Int64(x), Value::Int32(y)) => Some(x.cmp(&i64::from(*y))),
        (Value::Int64(x), Value::Int64(y)) => Some(x.cmp(y)),
        (Value::Real(x), Value::Real(y)) => x.partial_cmp(y),
        (Value::Real(x), Value::Int32(y)) => x.partial_cmp(&f64::from(*y)),
        (Value::Int32(x), Value::Real(y)) => f64::from(*x).partial_cmp(y),
        (Value::Real(x), Value::Int64(y)) => x.partial_cmp(&(*y as f64)),
        (Value::Int64(x), Value::Real(y)) => (*x as f64).partial_cmp(y),
        (Value::Text(x), Value::Text(y)) => Some(x.cmp(y)),
        (Value::Binary(x), Value::Binary(y)) => Some(x.cmp(y)),
        (Value::Date(x), Value::Date(y)) => Some(x.cmp(y)),
        (Value::Time(x), Value::Time(y)) => Some(x.cmp(y)),
        (Value::DateTime(x), Value::DateTime(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

pub(super) fn literal_vs_literal(a: &Literal, b: &Literal) -> Option<Ordering> {
    match (a, b) {
        (Literal::Integer(x), Literal::Integer(y)) => Some(x.cmp(y)),
        (Literal::Text(x), Literal::Text(y)) => Some(x.cmp(y)),
        (Literal::Text(_), _) | (_, Literal::Text(_)) => None,
        (x, y) => x.as_f64()?.partial_cmp(&y.as_f64()?),
    }
}
