//! Module: filter::coerce
//! Responsibility: type-check one field/literal comparison and lower it to a
//! native condition, a static truth value, or local-only evaluation.
//! Does not own: boolean structure (see `translate`).
//! Boundary: literal rounding here must agree with `eval`, otherwise pushed
//! and locally evaluated filters select different rows.

use crate::{
    db::{
        engine::{ConditionOp, Datatype, QueryCondition, Scalar},
        filter::{
            FilterError,
            ast::{CompareOp, Literal},
        },
        schema::FieldBinding,
    },
    model::field::{FieldSubtype, ScalarKind},
    value::{
        date_to_epoch_days, datetime_to_epoch_millis, parse_date, parse_datetime, parse_hex,
        parse_time,
    },
};
use num_traits::ToPrimitive;

///
/// Lowered
/// Outcome of lowering a single comparison.
///

#[derive(Clone, Debug, PartialEq)]
pub(super) enum Lowered {
    Native(QueryCondition),
    Always(bool),
    Local,
}

pub(super) const fn condition_op(op: CompareOp) -> ConditionOp {
    match op {
        CompareOp::Eq => ConditionOp::Eq,
        CompareOp::Ne => ConditionOp::Ne,
        CompareOp::Lt => ConditionOp::Lt,
        CompareOp::Le => ConditionOp::Le,
        CompareOp::Gt => ConditionOp::Gt,
        CompareOp::Ge => ConditionOp::Ge,
    }
}

/// Lower `field OP literal`. Type errors surface here so that every
/// comparison is checked whether or not it is later pushed down.
pub(super) fn lower_compare(
    binding: &FieldBinding,
    op: CompareOp,
    literal: &Literal,
) -> Result<Lowered, FilterError> {
    let name = binding.target.name();
    check_literal(name, binding.kind.scalar(), literal)?;

    if binding.kind.is_list() {
        return Ok(Lowered::Local);
    }

    let lowered = match (binding.datatype, literal) {
        (
            Datatype::Int16 | Datatype::Uint8 | Datatype::Int32 | Datatype::Int64,
            Literal::Integer(_) | Literal::Real(_),
        ) => lower_integer(binding, op, literal),
        (Datatype::Float64, _) => match literal.as_f64() {
            Some(v) if v.is_nan() => Lowered::Always(false),
            Some(v) => native(name, op, Scalar::Float64(v)),
            None => Lowered::Local,
        },
        (Datatype::Float32, _) => literal
            .as_f64()
            .map_or(Lowered::Local, |v| lower_float32(name, op, v)),
        (Datatype::StringUtf8, Literal::Text(text)) => native(name, op, Scalar::Text(text.clone())),
        (Datatype::DatetimeDay, Literal::Text(text)) => {
            parse_date(text).map_or(Lowered::Local, |d| {
                native(name, op, Scalar::DateDay(date_to_epoch_days(d)))
            })
        }
        (Datatype::DatetimeMs, Literal::Text(text)) => {
            parse_datetime(text).map_or(Lowered::Local, |dt| {
                native(name, op, Scalar::DateTimeMs(datetime_to_epoch_millis(dt)))
            })
        }
        _ => Lowered::Local,
    };

    Ok(finish(binding, lowered))
}

/// Reject literals that can never be compared with a field of `kind`.
pub(super) fn check_literal(
    field: &str,
    kind: ScalarKind,
    literal: &Literal,
) -> Result<(), FilterError> {
    let numeric_field = matches!(
        kind,
        ScalarKind::Integer | ScalarKind::Integer64 | ScalarKind::Real
    );

    let Literal::Text(text) = literal else {
        return if numeric_field {
            Ok(())
        } else {
            Err(mismatch(field, kind, literal))
        };
    };
    if numeric_field {
        return Err(mismatch(field, kind, literal));
    }

    let (valid, expected) = match kind {
        ScalarKind::Date => (parse_date(text).is_some(), "date"),
        ScalarKind::DateTime => (parse_datetime(text).is_some(), "date-time"),
        ScalarKind::Time => (parse_time(text).is_some(), "time of day"),
        ScalarKind::Binary => (parse_hex(text).is_some(), "hexadecimal bytes"),
        _ => (true, ""),
    };

    if valid {
        Ok(())
    } else {
        Err(FilterError::InvalidLiteral {
            field: field.to_string(),
            literal: text.clone(),
            expected,
        })
    }
}

fn mismatch(field: &str, kind: ScalarKind, literal: &Literal) -> FilterError {
    FilterError::TypeMismatch {
        field: field.to_string(),
        kind: kind.to_string(),
        literal: literal.to_string(),
    }
}

// A comparison every stored value satisfies still excludes nulls.
fn finish(binding: &FieldBinding, lowered: Lowered) -> Lowered {
    match lowered {
        Lowered::Always(true) if binding.nullable => Lowered::Native(QueryCondition::Null {
            name: binding.target.name().to_string(),
            is_null: false,
        }),
        other => other,
    }
}

fn native(name: &str, op: CompareOp, value: Scalar) -> Lowered {
    Lowered::Native(QueryCondition::Compare {
        name: name.to_string(),
        op: condition_op(op),
        value,
    })
}

// Booleans are stored as 0 or 1 whatever the storage width.
const fn integer_domain(datatype: Datatype, subtype: FieldSubtype) -> (i128, i128) {
    if matches!(subtype, FieldSubtype::Boolean) {
        return (0, 1);
    }

    match datatype {
        Datatype::Int16 => (i16::MIN as i128, i16::MAX as i128),
        Datatype::Uint8 => (u8::MIN as i128, u8::MAX as i128),
        Datatype::Int32 => (i32::MIN as i128, i32::MAX as i128),
        _ => (i64::MIN as i128, i64::MAX as i128),
    }
}

fn integer_scalar(datatype: Datatype, value: i128) -> Option<Scalar> {
    Some(match datatype {
        Datatype::Int16 => Scalar::Int16(i16::try_from(value).ok()?),
        Datatype::Uint8 => Scalar::Uint8(u8::try_from(value).ok()?),
        Datatype::Int32 => Scalar::Int32(i32::try_from(value).ok()?),
        _ => Scalar::Int64(i64::try_from(value).ok()?),
    })
}

// Saturates out-of-range and infinite values so the clamps below apply.
fn saturating_i128(value: f64) -> i128 {
    value.to_i128().unwrap_or(if value > 0.0 {
        i128::MAX
    } else {
        i128::MIN
    })
}

/// Integer comparisons against a possibly fractional literal. `f < 2.5`
/// becomes `f < 3`, `f <= 2.5` becomes `f <= 2`, and a bound outside the
/// storage width folds to a constant.
fn lower_integer(binding: &FieldBinding, op: CompareOp, literal: &Literal) -> Lowered {
    let name = binding.target.name();
    let datatype = binding.datatype;
    let (lo, hi) = integer_domain(datatype, binding.subtype);

    let (floor, ceil) = match literal {
        Literal::Integer(v) => (i128::from(*v), i128::from(*v)),
        Literal::Real(v) if v.is_nan() => return Lowered::Always(false),
        Literal::Real(v) => (saturating_i128(v.floor()), saturating_i128(v.ceil())),
        Literal::Text(_) => return Lowered::Local,
    };
    let exact = floor == ceil;

    let (bound, folded) = match op {
        CompareOp::Eq => (floor, (!exact || floor < lo || floor > hi).then_some(false)),
        CompareOp::Ne => (floor, (!exact || floor < lo || floor > hi).then_some(true)),
        CompareOp::Lt => (ceil, fold(ceil <= lo, ceil > hi)),
        CompareOp::Le => (floor, fold(floor < lo, floor >= hi)),
        CompareOp::Gt => (floor, fold(floor >= hi, floor < lo)),
        CompareOp::Ge => (ceil, fold(ceil > hi, ceil <= lo)),
    };

    if let Some(truth) = folded {
        return Lowered::Always(truth);
    }

    integer_scalar(datatype, bound).map_or(Lowered::Local, |value| native(name, op, value))
}

const fn fold(never: bool, always: bool) -> Option<bool> {
    if never {
        Some(false)
    } else if always {
        Some(true)
    } else {
        None
    }
}

/// Single-precision comparisons: literals beyond the finite `f32` range fold
/// to constants, the rest are rounded to the nearest `f32`.
#[expect(clippy::cast_possible_truncation)]
fn lower_float32(name: &str, op: CompareOp, value: f64) -> Lowered {
    if value.is_nan() {
        return Lowered::Always(false);
    }

    let max = f64::from(f32::MAX);
    let above = value > max;
    let below = value < -max;

    if above || below {
        return Lowered::Always(match op {
            CompareOp::Eq => false,
            CompareOp::Ne => true,
            CompareOp::Lt | CompareOp::Le => above,
            CompareOp::Gt | CompareOp::Ge => below,
        });
    }

    native(name, op, Scalar::Float32(value as f32))
}
