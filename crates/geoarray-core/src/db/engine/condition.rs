use super::{
    ArraySchema, Cell, CellValNum, Datatype, EngineCapabilities, EngineError, OrPushdown,
    QueryCondition, Scalar,
};

///
/// Operand
/// Where a condition leaf reads its value from.
///

#[derive(Clone, Copy)]
enum Operand {
    Dimension(usize),
    Attribute(usize),
}

/// Reject conditions the engine cannot evaluate natively.
pub(super) fn validate(
    schema: &ArraySchema,
    capabilities: EngineCapabilities,
    condition: &QueryCondition,
) -> Result<(), EngineError> {
    match condition {
        QueryCondition::Compare { name, value, .. } => {
            let datatype = comparable_datatype(schema, name)?;
            check_value_type(name, datatype, value)
        }
        QueryCondition::InSet { name, values } => {
            if !capabilities.value_sets {
                return Err(EngineError::Unsupported("value-set conditions".into()));
            }
            let datatype = comparable_datatype(schema, name)?;
            values
                .iter()
                .try_for_each(|v| check_value_type(name, datatype, v))
        }
        QueryCondition::Null { name, .. } => resolve(schema, name).map(|_| ()),
        QueryCondition::And(children) => children
            .iter()
            .try_for_each(|c| validate(schema, capabilities, c)),
        QueryCondition::Or(children) => {
            match capabilities.or_pushdown {
                OrPushdown::Unsupported => {
                    return Err(EngineError::Unsupported("disjunctive conditions".into()));
                }
                OrPushdown::SameField if condition.single_field().is_none() => {
                    return Err(EngineError::Unsupported(
                        "disjunction across different fields".into(),
                    ));
                }
                OrPushdown::SameField | OrPushdown::Full => {}
            }
            children
                .iter()
                .try_for_each(|c| validate(schema, capabilities, c))
        }
    }
}

fn resolve(schema: &ArraySchema, name: &str) -> Result<Operand, EngineError> {
    schema
        .dimension_index(name)
        .map(Operand::Dimension)
        .or_else(|| schema.attribute_index(name).map(Operand::Attribute))
        .ok_or_else(|| EngineError::UnknownName {
            name: name.to_string(),
        })
}

fn comparable_datatype(schema: &ArraySchema, name: &str) -> Result<Datatype, EngineError> {
    match resolve(schema, name)? {
        Operand::Dimension(i) => Ok(schema.dimensions[i].domain.datatype()),
        Operand::Attribute(i) => {
            let attr = &schema.attributes[i];
            if attr.cell_val_num == CellValNum::Var && attr.datatype != Datatype::StringUtf8 {
                return Err(EngineError::ConditionType {
                    name: name.to_string(),
                    message: "variable-length cells are not comparable".into(),
                });
            }
            if matches!(attr.datatype, Datatype::TimeMs | Datatype::Blob) {
                return Err(EngineError::Unsupported(format!(
                    "comparisons on {} attributes",
                    attr.datatype
                )));
            }

            Ok(attr.datatype)
        }
    }
}

fn check_value_type(name: &str, datatype: Datatype, value: &Scalar) -> Result<(), EngineError> {
    if value.datatype() == datatype {
        Ok(())
    } else {
        Err(EngineError::ConditionType {
            name: name.to_string(),
            message: format!("expected {datatype}, got {}", value.datatype()),
        })
    }
}

/// Evaluate a validated condition against one stored row.
///
/// Three-valued: `None` is SQL unknown, which a caller treats as no match.
pub(super) fn evaluate(
    schema: &ArraySchema,
    condition: &QueryCondition,
    coords: &[Scalar],
    cells: &[Option<Cell>],
) -> Option<bool> {
    let read = |name: &str| -> Option<Option<&Scalar>> {
        match resolve(schema, name).ok()? {
            Operand::Dimension(i) => Some(coords.get(i)),
            Operand::Attribute(i) => Some(match cells.get(i)? {
                Some(Cell::Scalar(s)) => Some(s),
                Some(Cell::List(_)) | None => None,
            }),
        }
    };

    match condition {
        QueryCondition::Compare { name, op, value } => {
            let stored = read(name)??;
            Some(op.accepts(stored.compare(value)?))
        }
        QueryCondition::InSet { name, values } => {
            let stored = read(name)??;
            Some(
                values
                    .iter()
                    .any(|v| stored.compare(v) == Some(std::cmp::Ordering::Equal)),
            )
        }
        QueryCondition::Null { name, is_null } => {
            let null = match resolve(schema, name).ok()? {
                Operand::Dimension(_) => false,
                Operand::Attribute(i) => cells.get(i).is_none_or(Option::is_none),
            };
            Some(null == *is_null)
        }
        QueryCondition::And(children) => {
            let mut result = Some(true);
            for child in children {
                match evaluate(schema, child, coords, cells) {
                    Some(false) => return Some(false),
                    None => result = None,
                    Some(true) => {}
                }
            }
            result
        }
        QueryCondition::Or(children) => {
            let mut result = Some(false);
            for child in children {
                match evaluate(schema, child, coords, cells) {
                    Some(true) => return Some(true),
                    None => result = None,
                    Some(false) => {}
                }
            }
            result
        }
    }
}
