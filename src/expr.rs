//! Structured query data model: the validated, JSON-serializable
//! representation of expression pipelines.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::types::{FilterKind, Operation, RateOptions};

/// A single tag predicate, optionally also acting as a grouping key.
///
/// Filters contributed by a `query(...)` tag map restrict which series are
/// selected (`group_by` false); filters contributed by a `groupBy({...})`
/// clause additionally partition the result series (`group_by` true).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagFilter {
    #[serde(rename = "type")]
    pub kind: FilterKind,
    pub tagk: String,
    pub filter: String,
    #[serde(rename = "groupBy", default)]
    pub group_by: bool,
}

/// One aggregation pipeline (metric + filters + transforms) within a query.
///
/// The `order` list records the sequence of textual operation wrapping,
/// innermost-first, needed to reproduce the expression's exact nesting when
/// compiling back to text. `tags` is a legacy placeholder kept for wire
/// compatibility; `filters` carries the tag predicates.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Expression {
    pub aggregator: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub downsample: Option<String>,
    pub metric: String,
    pub tags: HashMap<String, String>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub rate: bool,
    #[serde(rename = "rateOptions", skip_serializing_if = "Option::is_none")]
    pub rate_options: Option<RateOptions>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub order: Vec<Operation>,
    #[serde(rename = "filterValue", skip_serializing_if = "Option::is_none")]
    pub filter_value: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub filters: Vec<TagFilter>,
}

/// The top-level request: a time range (relative token or absolute
/// start/end) plus one or more expressions. The display flags pass through
/// unvalidated beyond their type.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Query {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub relative: Option<String>,
    pub queries: Vec<Expression>,
    #[serde(rename = "showTSUIDs")]
    pub show_tsuids: bool,
    #[serde(rename = "msResolution")]
    pub ms_resolution: bool,
    #[serde(rename = "estimateSize")]
    pub estimate_size: bool,
}
