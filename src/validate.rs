//! Semantic validation of structured queries, independent of parsing.
//!
//! Runs over queries built by the parser or reconstructed from external
//! data (e.g. deserialized from a saved configuration), failing fast on the
//! first violation found.

use std::sync::LazyLock;

use regex::Regex;

use crate::expr::{Expression, Query, TagFilter};
use crate::time::strip_ago;
use crate::types::{FilterKind, Operation};
use crate::vocab::{AGGREGATORS, DOWNSAMPLERS, DOWNSAMPLE_FILLERS};
use crate::TsexprError;

static VALID_FIELD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9A-Za-z\-._%&#;\\/]+$").expect("static pattern"));
static VALID_FIELD_WILDCARD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9A-Za-z\-._%&#;\\/*]+$").expect("static pattern"));
static VALID_FIELD_LITERAL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9A-Za-z\-._%&#;\\/|]+$").expect("static pattern"));

impl Query {
    /// Validates the query and normalizes it: synthesizes the canonical
    /// order array when none was supplied and persists whitespace-stripped
    /// filter-value predicates. The compiler relies on both.
    pub fn validate(&mut self) -> Result<(), TsexprError> {
        if let Some(relative) = &self.relative {
            if !relative.is_empty() {
                check_duration(strip_ago(relative))?;
            }
        }
        if self.queries.is_empty() {
            return Err(TsexprError::EmptyQuery);
        }
        for expr in &mut self.queries {
            validate_expression(expr)?;
        }
        Ok(())
    }
}

fn validate_expression(expr: &mut Expression) -> Result<(), TsexprError> {
    check_field("metric", &expr.metric)?;
    check_membership("aggregator", &expr.aggregator, AGGREGATORS)?;

    if let Some(downsample) = &expr.downsample {
        let parts: Vec<&str> = downsample.split('-').collect();
        if parts.len() < 2 {
            return Err(TsexprError::DownsampleFormat(downsample.clone()));
        }
        check_duration(parts[0])?;
        check_membership("downsample aggregator", parts[1], DOWNSAMPLERS)?;
        if parts.len() > 2 {
            check_membership("downsample filler", parts[2], DOWNSAMPLE_FILLERS)?;
        }
    }

    if expr.rate {
        if let Some(options) = &expr.rate_options {
            if matches!(options.counter_max, Some(max) if max < 0) {
                return Err(TsexprError::RateCounterMax);
            }
        }
    }

    // Whitespace is insignificant in the predicate only; metrics and tag
    // keys are checked as-is.
    if let Some(predicate) = &expr.filter_value {
        let stripped: String = predicate.chars().filter(|ch| !ch.is_whitespace()).collect();
        check_predicate(&stripped)?;
        expr.filter_value = Some(stripped);
    }

    check_order(expr)?;

    for filter in &expr.filters {
        check_filter(filter)?;
    }
    Ok(())
}

fn check_predicate(predicate: &str) -> Result<(), TsexprError> {
    if predicate.len() < 2 {
        return Err(TsexprError::PredicateSyntax(predicate.to_string()));
    }
    let operand = [">=", "<=", "==", "!="]
        .iter()
        .find_map(|op| predicate.strip_prefix(op))
        .or_else(|| predicate.strip_prefix('>'))
        .or_else(|| predicate.strip_prefix('<'));
    let Some(operand) = operand else {
        return Err(TsexprError::PredicateSyntax(predicate.to_string()));
    };
    if operand.parse::<f64>().is_err() {
        return Err(TsexprError::PredicateSyntax(predicate.to_string()));
    }
    Ok(())
}

/// Checks the order array against the configured features, or synthesizes
/// the canonical order when none was supplied. Exactly one `aggregation`
/// entry must always be present; `filterValue`, `downsample` and `rate`
/// entries must appear if and only if the feature is configured, each at
/// most once; anything left unmatched is an error.
fn check_order(expr: &mut Expression) -> Result<(), TsexprError> {
    if expr.order.is_empty() {
        let mut order = Vec::new();
        if expr.filter_value.is_some() {
            order.push(Operation::FilterValue);
        }
        if expr.downsample.is_some() {
            order.push(Operation::Downsample);
        }
        order.push(Operation::Aggregation);
        if expr.rate {
            order.push(Operation::Rate);
        }
        expr.order = order;
        return Ok(());
    }

    let mut scratch = expr.order.clone();
    consume(&mut scratch, Operation::Aggregation, true)?;
    consume(&mut scratch, Operation::FilterValue, expr.filter_value.is_some())?;
    consume(&mut scratch, Operation::Downsample, expr.downsample.is_some())?;
    consume(&mut scratch, Operation::Rate, expr.rate)?;
    if !scratch.is_empty() {
        let names: Vec<&str> = scratch.iter().map(|op| op.as_str()).collect();
        return Err(TsexprError::OrderConsistency(format!(
            "invalid operations in order array {names:?}"
        )));
    }
    Ok(())
}

/// Consumes `op` from the scratch list: exactly one occurrence when the
/// feature is configured, none otherwise. Occurrences for unconfigured
/// features stay behind for the leftover check.
fn consume(
    scratch: &mut Vec<Operation>,
    op: Operation,
    configured: bool,
) -> Result<(), TsexprError> {
    let occur = scratch.iter().filter(|entry| **entry == op).count();
    if configured && occur == 0 {
        return Err(TsexprError::OrderConsistency(format!(
            "{op} configured but no {op} found in order array"
        )));
    }
    if occur > 1 {
        return Err(TsexprError::OrderConsistency(format!(
            "more than one {op} found in order array"
        )));
    }
    if configured {
        scratch.retain(|entry| *entry != op);
    }
    Ok(())
}

fn check_filter(filter: &TagFilter) -> Result<(), TsexprError> {
    check_field("tagk", &filter.tagk)?;
    let matched = match filter.kind {
        FilterKind::Wildcard => VALID_FIELD_WILDCARD.is_match(&filter.filter),
        FilterKind::LiteralOr | FilterKind::NotLiteralOr => {
            VALID_FIELD_LITERAL.is_match(&filter.filter)
        }
        FilterKind::Regexp => true,
    };
    if !matched {
        return Err(TsexprError::FieldCharset {
            field: "filter",
            value: filter.filter.clone(),
        });
    }
    Ok(())
}

fn check_field(name: &'static str, value: &str) -> Result<(), TsexprError> {
    if !VALID_FIELD.is_match(value) {
        return Err(TsexprError::FieldCharset {
            field: name,
            value: value.to_string(),
        });
    }
    Ok(())
}

fn check_membership(
    what: &'static str,
    value: &str,
    allowed: &[&str],
) -> Result<(), TsexprError> {
    if !allowed.contains(&value) {
        return Err(TsexprError::EnumMembership {
            what,
            value: value.to_string(),
        });
    }
    Ok(())
}

/// Checks the duration grammar shared by relative-time and
/// downsample-interval validation: an integer magnitude >= 1 followed by
/// one of `ms`, `s`, `m`, `h`, `d`, `w`, `n`, `y`.
pub(crate) fn check_duration(token: &str) -> Result<(), TsexprError> {
    if token.len() < 2 {
        return Err(TsexprError::DurationSyntax {
            token: token.to_string(),
            reason: "invalid time interval",
        });
    }
    let head = if let Some(head) = token.strip_suffix("ms") {
        head
    } else {
        let mut chars = token.chars();
        match chars.next_back() {
            Some('s' | 'm' | 'h' | 'd' | 'w' | 'n' | 'y') => chars.as_str(),
            _ => {
                return Err(TsexprError::DurationSyntax {
                    token: token.to_string(),
                    reason: "invalid unit",
                })
            }
        }
    };
    let magnitude: i64 = head.parse().map_err(|_| TsexprError::DurationSyntax {
        token: token.to_string(),
        reason: "invalid magnitude",
    })?;
    if magnitude < 1 {
        return Err(TsexprError::DurationSyntax {
            token: token.to_string(),
            reason: "interval needs to be bigger than 0",
        });
    }
    Ok(())
}
