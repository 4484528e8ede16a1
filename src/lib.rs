//! Tsexpr: a bidirectional translator for time-series aggregation query
//! expressions.
//!
//! The crate converts a textual, nested-function-call query language (used to
//! express metric selection, tag filtering, grouping, downsampling, rate
//! conversion, value filtering and merge/aggregation) into a structured,
//! JSON-serializable representation of the same pipeline, and compiles that
//! representation back into the exact canonical text the query engine
//! expects.
//!
//! # Architecture
//! - Data model (`Expression`, `Query`, tag filters, operation order tags)
//! - Expression parsing (text -> structured query)
//! - Compilation (structured query -> canonical text)
//! - Semantic validation (character sets, vocabularies, order consistency)
//! - Relative-time resolution (duration token -> absolute start)
//!
//! ```
//! use tsexpr::{compile_expression, ExpressionParser};
//!
//! let text = "merge(sum,query(sys.cpu,{host=web01},1h-ago))";
//! let (expr, relative) = ExpressionParser::parse(text).unwrap();
//! assert_eq!(expr.metric, "sys.cpu");
//! assert_eq!(compile_expression(&expr, &relative), text);
//! ```

mod compiler;
mod expr;
mod parser;
mod scanner;
mod time;
mod types;
mod validate;
mod vocab;

pub use compiler::*;
pub use expr::*;
pub use parser::*;
pub use scanner::*;
pub use time::*;
pub use types::*;
pub use vocab::*;

use thiserror::Error;

/// Unified error type for tsexpr operations.
///
/// Every error is a normal, locally recoverable result value reported on the
/// first violation found; parsing and validation never accumulate failures.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TsexprError {
    /// A function was called with the wrong number of parameters.
    #[error("{function} expects {expected} parameters but found {actual}: {params:?}")]
    Arity {
        function: &'static str,
        expected: usize,
        actual: usize,
        params: Vec<String>,
    },

    /// An operation keyword appeared twice across the expression.
    #[error("found more than one '{0}' function")]
    DuplicateOperation(types::Operation),

    /// The leading identifier is not a known function.
    #[error("unknown function {0}")]
    UnknownFunction(String),

    /// A `{...}` map literal is malformed.
    #[error("{0}")]
    MapFormat(&'static str),

    /// `groupBy` was not followed by a `|` and a sub-expression.
    #[error("{0}")]
    GroupBySyntax(&'static str),

    /// A metric, tag key or filter value contains characters outside the
    /// set allowed for its context.
    #[error("invalid characters in field {field}: {value}")]
    FieldCharset {
        field: &'static str,
        value: String,
    },

    /// A name is not part of its enumerated vocabulary.
    #[error("invalid {what}: {value}")]
    EnumMembership {
        what: &'static str,
        value: String,
    },

    /// A duration token has a malformed shape or magnitude.
    #[error("invalid duration '{token}': {reason}")]
    DurationSyntax {
        token: String,
        reason: &'static str,
    },

    /// A duration token ends in an unrecognized unit.
    #[error("unknown time unit: {0}")]
    UnknownTimeUnit(String),

    /// A downsample specification does not split into
    /// interval-aggregator[-filler].
    #[error("invalid downsample format: {0}")]
    DownsampleFormat(String),

    /// Counter max must be non-negative when present.
    #[error("counter max needs to be a positive integer")]
    RateCounterMax,

    /// A boolean or integer parameter failed to parse.
    #[error("invalid {what}: {value}")]
    NumberSyntax {
        what: &'static str,
        value: String,
    },

    /// The order array disagrees with the configured features.
    #[error("{0}")]
    OrderConsistency(String),

    /// A filter-value predicate is malformed or has a non-numeric operand.
    #[error("invalid filter value {0}")]
    PredicateSyntax(String),

    /// The expression list is empty.
    #[error("at least one query should be present")]
    EmptyQuery,

    /// Expression nesting exceeded the parser's depth cap.
    #[error("expression nesting deeper than {0} levels")]
    NestingTooDeep(usize),
}
