//! Core value types shared by the parser, compiler and validator.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Tag filter kinds understood by the query engine.
///
/// The legacy case-insensitive spellings (`iliteral_or`, `not_iliteral_or`,
/// `iwildcard`) are accepted on deserialization and normalized to the
/// canonical kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[non_exhaustive]
pub enum FilterKind {
    #[serde(rename = "literal_or", alias = "iliteral_or")]
    LiteralOr,
    #[serde(rename = "not_literal_or", alias = "not_iliteral_or")]
    NotLiteralOr,
    #[serde(rename = "wildcard", alias = "iwildcard")]
    Wildcard,
    #[serde(rename = "regexp")]
    Regexp,
}

impl FilterKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FilterKind::LiteralOr => "literal_or",
            FilterKind::NotLiteralOr => "not_literal_or",
            FilterKind::Wildcard => "wildcard",
            FilterKind::Regexp => "regexp",
        }
    }
}

impl fmt::Display for FilterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Operation tags recorded in an expression's order list.
///
/// The order list captures the textual nesting of an expression so the
/// compiler can reproduce it exactly; `query` and `groupBy` are structurally
/// implied and stripped from the final list by the parser.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[non_exhaustive]
pub enum Operation {
    #[serde(rename = "query")]
    Query,
    #[serde(rename = "aggregation")]
    Aggregation,
    #[serde(rename = "downsample")]
    Downsample,
    #[serde(rename = "rate")]
    Rate,
    #[serde(rename = "filterValue")]
    FilterValue,
    #[serde(rename = "groupBy")]
    GroupBy,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Query => "query",
            Operation::Aggregation => "aggregation",
            Operation::Downsample => "downsample",
            Operation::Rate => "rate",
            Operation::FilterValue => "filterValue",
            Operation::GroupBy => "groupBy",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Rate conversion options: counter handling for monotonically increasing
/// series. An absent counter max means the counter is unbounded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateOptions {
    #[serde(default)]
    pub counter: bool,
    #[serde(rename = "counterMax", default, skip_serializing_if = "Option::is_none")]
    pub counter_max: Option<i64>,
    #[serde(rename = "resetValue", default)]
    pub reset_value: i64,
}
