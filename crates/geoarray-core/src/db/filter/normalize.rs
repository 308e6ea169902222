use crate::db::filter::ast::{self, CompareOp, Expr, Literal, Operand};
use std::fmt;

///
/// Predicate
///
/// Negation-normal form of an [`Expr`]: no `NOT`, no `IN`, nested
/// conjunctions and disjunctions flattened, and a field/literal comparison
/// always written field first.
///

#[derive(Clone, Debug, PartialEq)]
pub enum Predicate {
    Compare {
        left: Operand,
        op: CompareOp,
        right: Operand,
    },
    IsNull {
        field: String,
        negated: bool,
    },
    And(Vec<Self>),
    Or(Vec<Self>),
}

impl Predicate {
    /// `(field, op, literal)` when this is a field-versus-literal comparison.
    #[must_use]
    pub fn as_field_compare(&self) -> Option<(&str, CompareOp, &Literal)> {
        match self {
            Self::Compare {
                left: Operand::Field(field),
                op,
                right: Operand::Literal(lit),
            } => Some((field.as_str(), *op, lit)),
            _ => None,
        }
    }

    pub(crate) fn and(children: Vec<Self>) -> Self {
        join(children, true)
    }

    pub(crate) fn or(children: Vec<Self>) -> Self {
        join(children, false)
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Compare { left, op, right } => write!(f, "{left} {op} {right}"),
            Self::IsNull { field, negated } => {
                ast::write_identifier(f, field)?;
                f.write_str(if *negated { " IS NOT NULL" } else { " IS NULL" })
            }
            Self::And(children) | Self::Or(children) => {
                let sep = if matches!(self, Self::And(_)) {
                    " AND "
                } else {
                    " OR "
                };
                f.write_str("(")?;
                ast::write_joined(f, children, sep)?;
                f.write_str(")")
            }
        }
    }
}

/// Rewrite an expression into negation-normal form.
#[must_use]
pub fn normalize(expr: &Expr) -> Predicate {
    rewrite(expr, false)
}

fn rewrite(expr: &Expr, negated: bool) -> Predicate {
    match expr {
        Expr::Compare { left, op, right } => {
            let op = if negated { op.negate() } else { *op };
            orient(left.clone(), op, right.clone())
        }
        Expr::IsNull {
            field,
            negated: not_null,
        } => Predicate::IsNull {
            field: field.clone(),
            negated: *not_null != negated,
        },
        Expr::In {
            field,
            values,
            negated: not_in,
        } => {
            // x NOT IN (a, b) is x <> a AND x <> b under three-valued logic
            let excluded = *not_in != negated;
            let op = if excluded { CompareOp::Ne } else { CompareOp::Eq };
            let leaves = values
                .iter()
                .map(|v| Predicate::Compare {
                    left: Operand::Field(field.clone()),
                    op,
                    right: Operand::Literal(v.clone()),
                })
                .collect();

            join(leaves, excluded)
        }
        Expr::And(children) => {
            let parts = children.iter().map(|c| rewrite(c, negated)).collect();
            join(parts, !negated)
        }
        Expr::Or(children) => {
            let parts = children.iter().map(|c| rewrite(c, negated)).collect();
            join(parts, negated)
        }
        Expr::Not(inner) => rewrite(inner, !negated),
    }
}

fn orient(left: Operand, op: CompareOp, right: Operand) -> Predicate {
    match (left, right) {
        (left @ Operand::Literal(_), right @ Operand::Field(_)) => Predicate::Compare {
            left: right,
            op: op.flip(),
            right: left,
        },
        (left, right) => Predicate::Compare { left, op, right },
    }
}

fn join(children: Vec<Predicate>, conjunction: bool) -> Predicate {
    let mut flat = Vec::with_capacity(children.len());
    for child in children {
        match child {
            Predicate::And(inner) if conjunction => flat.extend(inner),
            Predicate::Or(inner) if !conjunction => flat.extend(inner),
            other => flat.push(other),
        }
    }

    if flat.len() == 1 {
        return flat.remove(0);
    }

    if conjunction {
        Predicate::And(flat)
    } else {
        Predicate::Or(flat)
    }
}
