//! Module: filter
//! Responsibility: attribute filter language, its normal form, pushdown
//! translation and per-feature evaluation.
//! Does not own: spatial filtering (dimension ranges are built by the layer).
//! Boundary: translation never changes which features a filter selects.

pub mod ast;
mod coerce;
mod eval;
mod normalize;
mod parse;
mod translate;

#[cfg(test)]
mod tests;

use thiserror::Error as ThisError;

// re-exports
pub use ast::{CompareOp, Expr, Literal, Operand};
pub use eval::{Row, evaluate, matches};
pub use normalize::{Predicate, normalize};
pub use parse::parse;
pub use translate::{FilterTranslator, NativeFilter, Translation, TranslationOutcome, translate};

///
/// FilterError
///

#[derive(Clone, Debug, Eq, PartialEq, ThisError)]
pub enum FilterError {
    #[error("syntax error at offset {position}: {message}")]
    Syntax { position: usize, message: String },

    #[error("unknown field '{0}'")]
    UnknownField(String),

    #[error("cannot compare field '{field}' of type {kind} with {literal}")]
    TypeMismatch {
        field: String,
        kind: String,
        literal: String,
    },

    #[error("cannot compare {left} with {right}")]
    Incomparable { left: String, right: String },

    #[error("invalid {expected} literal '{literal}' for field '{field}'")]
    InvalidLiteral {
        field: String,
        literal: String,
        expected: &'static str,
    },
}
