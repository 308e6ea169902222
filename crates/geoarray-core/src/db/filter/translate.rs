//! Module: filter::translate
//! Responsibility: split a normalized predicate into the part the engine
//! evaluates natively and the residual evaluated per feature.
//! Does not own: literal coercion (see `coerce`) or local evaluation.
//! Boundary: native condition AND residual must select exactly the rows the
//! whole predicate selects.

use crate::db::{
    engine::{ConditionOp, EngineCapabilities, OrPushdown, QueryCondition, Scalar},
    filter::{
        FilterError,
        ast::{Expr, Operand},
        coerce::{self, Lowered},
        normalize::{Predicate, normalize},
        parse::parse,
    },
    schema::{FieldBinding, LayerSchema},
};
use derive_more::Display;
use std::fmt;

///
/// Translation
/// How much of a filter the engine evaluates.
///

#[derive(Clone, Copy, Debug, Display, Eq, PartialEq)]
pub enum Translation {
    #[display("WHOLE")]
    Whole,
    #[display("PARTIAL")]
    Partial,
    #[display("NONE")]
    None,
}

///
/// NativeFilter
///

#[derive(Clone, Debug, PartialEq)]
pub enum NativeFilter {
    /// Nothing to push; every row is a candidate.
    Unfiltered,
    /// Statically empty; the engine need not be queried.
    Empty,
    Condition(QueryCondition),
}

impl NativeFilter {
    #[must_use]
    pub const fn condition(&self) -> Option<&QueryCondition> {
        match self {
            Self::Condition(c) => Some(c),
            _ => None,
        }
    }
}

impl fmt::Display for NativeFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unfiltered => f.write_str("<all rows>"),
            Self::Empty => f.write_str("<no rows>"),
            Self::Condition(c) => write!(f, "{c}"),
        }
    }
}

///
/// TranslationOutcome
///

#[derive(Clone, Debug, PartialEq)]
pub struct TranslationOutcome {
    pub translation: Translation,
    pub native: NativeFilter,
    /// Evaluated per candidate row after the native query; `None` for WHOLE.
    pub residual: Option<Predicate>,
    pub predicate: Predicate,
}

///
/// FilterTranslator
///
/// Lowers filters against one layer schema under the effective engine
/// capabilities. A conjunction pushes every pushable child; a disjunction
/// is pushed only when every child is, and only as far as the OR level
/// allows.
///

pub struct FilterTranslator<'a> {
    schema: &'a LayerSchema,
    capabilities: EngineCapabilities,
}

impl<'a> FilterTranslator<'a> {
    #[must_use]
    pub const fn new(schema: &'a LayerSchema, capabilities: EngineCapabilities) -> Self {
        Self {
            schema,
            capabilities,
        }
    }

    /// Parse and translate filter text.
    pub fn translate_text(&self, text: &str) -> Result<TranslationOutcome, FilterError> {
        self.translate(&parse(text)?)
    }

    pub fn translate(&self, expr: &Expr) -> Result<TranslationOutcome, FilterError> {
        let predicate = normalize(expr);
        self.check(&predicate)?;

        let part = self.lower(&predicate)?;

        Ok(classify(predicate, part))
    }

    fn bind(&self, name: &str) -> Result<FieldBinding, FilterError> {
        self.schema
            .bind_field(name)
            .map_err(|_| FilterError::UnknownField(name.to_string()))
    }

    // Every name and literal is checked up front, including leaves inside
    // disjunctions that are never lowered.
    fn check(&self, predicate: &Predicate) -> Result<(), FilterError> {
        match predicate {
            Predicate::And(children) | Predicate::Or(children) => {
                children.iter().try_for_each(|c| self.check(c))
            }
            Predicate::IsNull { field, .. } => self.bind(field).map(|_| ()),
            Predicate::Compare { left, right, .. } => match (left, right) {
                (Operand::Field(field), Operand::Literal(lit))
                | (Operand::Literal(lit), Operand::Field(field)) => {
                    let binding = self.bind(field)?;
                    coerce::check_literal(binding.target.name(), binding.kind.scalar(), lit)
                }
                (Operand::Field(a), Operand::Field(b)) => {
                    let (x, y) = (self.bind(a)?, self.bind(b)?);
                    if comparable(&x, &y) {
                        Ok(())
                    } else {
                        Err(FilterError::Incomparable {
                            left: format!("{a} ({})", x.kind),
                            right: format!("{b} ({})", y.kind),
                        })
                    }
                }
                (Operand::Literal(a), Operand::Literal(b)) => {
                    if a.is_numeric() == b.is_numeric() {
                        Ok(())
                    } else {
                        Err(FilterError::Incomparable {
                            left: a.to_string(),
                            right: b.to_string(),
                        })
                    }
                }
            },
        }
    }

    fn lower(&self, predicate: &Predicate) -> Result<Part, FilterError> {
        match predicate {
            Predicate::Compare { .. } => {
                let Some((field, op, lit)) = predicate.as_field_compare() else {
                    return Ok(Part::local(predicate.clone()));
                };
                let binding = self.bind(field)?;

                Ok(match coerce::lower_compare(&binding, op, lit)? {
                    Lowered::Native(cond) => Part::pushed(Pushed::Condition(cond)),
                    Lowered::Always(truth) => Part::pushed(Pushed::Always(truth)),
                    Lowered::Local => Part::local(predicate.clone()),
                })
            }
            Predicate::IsNull { field, negated } => {
                let binding = self.bind(field)?;
                if !binding.nullable {
                    return Ok(Part::pushed(Pushed::Always(*negated)));
                }

                Ok(Part::pushed(Pushed::Condition(QueryCondition::Null {
                    name: binding.target.name().to_string(),
                    is_null: !negated,
                })))
            }
            Predicate::And(children) => self.lower_and(children),
            Predicate::Or(children) => self.lower_or(predicate, children),
        }
    }

    fn lower_and(&self, children: &[Predicate]) -> Result<Part, FilterError> {
        let mut conditions = Vec::new();
        let mut residuals = Vec::new();
        let mut saw_true = false;

        for child in children {
            let part = self.lower(child)?;
            match part.pushed {
                Some(Pushed::Always(false)) => return Ok(Part::pushed(Pushed::Always(false))),
                Some(Pushed::Always(true)) => saw_true = true,
                Some(Pushed::Condition(cond)) => conditions.push(cond),
                None => {}
            }
            residuals.extend(part.residual);
        }

        let pushed = match conditions.len() {
            0 => saw_true.then_some(Pushed::Always(true)),
            1 => conditions.pop().map(Pushed::Condition),
            _ => Some(Pushed::Condition(QueryCondition::And(conditions))),
        };
        let residual = (!residuals.is_empty()).then(|| Predicate::and(residuals));

        Ok(Part { pushed, residual })
    }

    fn lower_or(&self, whole: &Predicate, children: &[Predicate]) -> Result<Part, FilterError> {
        if self.capabilities.or_pushdown == OrPushdown::Unsupported {
            return Ok(Part::local(whole.clone()));
        }

        let mut conditions = Vec::new();
        for child in children {
            let part = self.lower(child)?;
            if part.residual.is_some() {
                return Ok(Part::local(whole.clone()));
            }
            match part.pushed {
                Some(Pushed::Always(true)) => return Ok(Part::pushed(Pushed::Always(true))),
                Some(Pushed::Always(false)) => {}
                Some(Pushed::Condition(cond)) => conditions.push(cond),
                None => return Ok(Part::local(whole.clone())),
            }
        }

        if conditions.len() <= 1 {
            return Ok(Part::pushed(
                conditions
                    .pop()
                    .map_or(Pushed::Always(false), Pushed::Condition),
            ));
        }

        let merged = match self.capabilities.or_pushdown {
            OrPushdown::Full => Some(QueryCondition::Or(conditions)),
            _ => self.same_field(conditions),
        };

        Ok(merged.map_or_else(
            || Part::local(whole.clone()),
            |cond| Part::pushed(Pushed::Condition(cond)),
        ))
    }

    // A disjunction over one field stays native: equalities collapse into a
    // value set, anything else becomes a same-field range union.
    fn same_field(&self, conditions: Vec<QueryCondition>) -> Option<QueryCondition> {
        let union = QueryCondition::Or(conditions);
        let name = union.single_field()?.to_string();
        let QueryCondition::Or(conditions) = union else {
            return None;
        };

        if self.capabilities.value_sets
            && let Some(values) = equality_values(&conditions)
        {
            return Some(QueryCondition::InSet { name, values });
        }

        Some(QueryCondition::Or(conditions))
    }
}

// Members of a disjunction made only of equalities and value sets.
fn equality_values(conditions: &[QueryCondition]) -> Option<Vec<Scalar>> {
    let mut values = Vec::new();
    for cond in conditions {
        match cond {
            QueryCondition::Compare {
                op: ConditionOp::Eq,
                value,
                ..
            } => values.push(value.clone()),
            QueryCondition::InSet {
                values: members, ..
            } => values.extend(members.iter().cloned()),
            _ => return None,
        }
    }

    Some(values)
}

/// Translate filter text against `schema` with the given capabilities.
pub fn translate(
    schema: &LayerSchema,
    capabilities: EngineCapabilities,
    text: &str,
) -> Result<TranslationOutcome, FilterError> {
    FilterTranslator::new(schema, capabilities).translate_text(text)
}

fn comparable(a: &FieldBinding, b: &FieldBinding) -> bool {
    use crate::model::field::ScalarKind::{self, Integer, Integer64, Real};

    if a.kind.is_list() || b.kind.is_list() {
        return false;
    }
    let numeric = |k: ScalarKind| matches!(k, Integer | Integer64 | Real);
    let (x, y) = (a.kind.scalar(), b.kind.scalar());

    x == y || (numeric(x) && numeric(y))
}

fn classify(predicate: Predicate, part: Part) -> TranslationOutcome {
    let (translation, native, residual) = match (part.pushed, part.residual) {
        (Some(Pushed::Always(false)), _) => (Translation::Whole, NativeFilter::Empty, None),
        (Some(Pushed::Always(true)), None) => (Translation::Whole, NativeFilter::Unfiltered, None),
        (Some(Pushed::Condition(cond)), None) => {
            (Translation::Whole, NativeFilter::Condition(cond), None)
        }
        (Some(Pushed::Condition(cond)), Some(residual)) => (
            Translation::Partial,
            NativeFilter::Condition(cond),
            Some(residual),
        ),
        (Some(Pushed::Always(true)) | None, _) => (
            Translation::None,
            NativeFilter::Unfiltered,
            Some(predicate.clone()),
        ),
    };

    TranslationOutcome {
        translation,
        native,
        residual,
        predicate,
    }
}

///
/// Pushed
///

#[derive(Clone, Debug)]
enum Pushed {
    Always(bool),
    Condition(QueryCondition),
}

///
/// Part
/// Pushed portion and residual of one subtree; their conjunction is
/// equivalent to the subtree.
///

#[derive(Clone, Debug)]
struct Part {
    pushed: Option<Pushed>,
    residual: Option<Predicate>,
}

impl Part {
    const fn pushed(pushed: Pushed) -> Self {
        Self {
            pushed: Some(pushed),
            residual: None,
        }
    }

    const fn local(predicate: Predicate) -> Self {
        Self {
            pushed: None,
            residual: Some(predicate),
        }
    }
}
