//! Compiler (writer): re-serializes a structured query into the canonical
//! nested-call expression text. The inverse of the parser.

use std::collections::HashMap;

use tracing::trace;

use crate::expr::{Expression, Query, TagFilter};
use crate::types::{FilterKind, Operation, RateOptions};

/// Compiles every expression of `query` back to canonical text, one string
/// per expression. Pure: identical inputs always yield byte-identical
/// output.
pub fn compile_query(query: &Query) -> Vec<String> {
    let relative = query.relative.as_deref().unwrap_or_default();
    let texts: Vec<String> = query
        .queries
        .iter()
        .map(|expr| compile_expression(expr, relative))
        .collect();
    trace!(expressions = texts.len(), "compiled query");
    texts
}

/// Compiles a single expression: builds the innermost `query(...)` call,
/// wraps it with each recorded operation in order, then prefixes any
/// `groupBy({...})|` clause built from the group-by filters.
pub fn compile_expression(expr: &Expression, relative: &str) -> String {
    let mut text = write_query(&expr.metric, relative, &expr.filters);
    for op in &expr.order {
        text = match op {
            Operation::Aggregation => write_merge(text, &expr.aggregator),
            Operation::Downsample => write_downsample(text, expr.downsample.as_deref()),
            Operation::Rate => write_rate(text, expr.rate, expr.rate_options.unwrap_or_default()),
            Operation::FilterValue => write_filter(text, expr.filter_value.as_deref()),
            Operation::Query | Operation::GroupBy => text,
        };
    }
    write_group(text, &expr.filters)
}

fn render(kind: FilterKind, value: &str) -> String {
    match kind {
        FilterKind::Wildcard => value.to_string(),
        FilterKind::Regexp => format!("regexp({value})"),
        FilterKind::LiteralOr => format!("or({value})"),
        FilterKind::NotLiteralOr => format!("notor({value})"),
    }
}

/// Groups rendered filters by tag key. Wildcard and regexp renderings
/// accumulate as sibling assignments; a later literal_or/not_literal_or for
/// an already-seen key replaces the key's collected values (last literal
/// group wins, mirroring the parser's one-filter-per-literal-group textual
/// form). Keys and the values within a key come out sorted
/// lexicographically.
fn join_filters(filters: &[TagFilter], group_by: bool) -> Vec<(String, Vec<String>)> {
    let mut keys: Vec<String> = Vec::new();
    let mut joined: HashMap<String, Vec<String>> = HashMap::new();
    for filter in filters.iter().filter(|f| f.group_by == group_by) {
        let rendered = render(filter.kind, &filter.filter);
        match joined.get_mut(&filter.tagk) {
            None => {
                joined.insert(filter.tagk.clone(), vec![rendered]);
                keys.push(filter.tagk.clone());
            }
            Some(values) => match filter.kind {
                FilterKind::Wildcard | FilterKind::Regexp => values.push(rendered),
                FilterKind::LiteralOr | FilterKind::NotLiteralOr => *values = vec![rendered],
            },
        }
    }
    keys.sort();
    keys.into_iter()
        .map(|key| {
            let mut values = joined.remove(&key).unwrap_or_default();
            values.sort();
            (key, values)
        })
        .collect()
}

fn write_tag_map(entries: &[(String, Vec<String>)]) -> String {
    let mut parts = Vec::new();
    for (key, values) in entries {
        for value in values {
            parts.push(format!("{key}={value}"));
        }
    }
    format!("{{{}}}", parts.join(","))
}

fn write_query(metric: &str, relative: &str, filters: &[TagFilter]) -> String {
    let entries = join_filters(filters, false);
    let tags = if entries.is_empty() {
        "null".to_string()
    } else {
        write_tag_map(&entries)
    };
    format!("query({metric},{tags},{relative})")
}

fn write_merge(inner: String, operator: &str) -> String {
    format!("merge({operator},{inner})")
}

fn write_downsample(inner: String, downsample: Option<&str>) -> String {
    let Some(ds) = downsample else {
        return inner;
    };
    let mut parts: Vec<&str> = ds.split('-').collect();
    if parts.len() < 2 {
        return inner;
    }
    if parts.len() == 2 {
        parts.push("none");
    }
    format!("downsample({},{},{},{})", parts[0], parts[1], parts[2], inner)
}

fn write_rate(inner: String, rate: bool, options: RateOptions) -> String {
    if !rate {
        return inner;
    }
    let counter_max = match options.counter_max {
        Some(max) => max.to_string(),
        None => "null".to_string(),
    };
    format!(
        "rate({},{},{},{})",
        options.counter, counter_max, options.reset_value, inner
    )
}

fn write_filter(inner: String, predicate: Option<&str>) -> String {
    match predicate {
        Some(predicate) if !predicate.is_empty() => format!("filter({predicate},{inner})"),
        _ => inner,
    }
}

fn write_group(inner: String, filters: &[TagFilter]) -> String {
    let entries = join_filters(filters, true);
    if entries.is_empty() {
        return inner;
    }
    format!("groupBy({})|{}", write_tag_map(&entries), inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::ExpressionParser;

    fn filter(kind: FilterKind, tagk: &str, value: &str, group_by: bool) -> TagFilter {
        TagFilter {
            kind,
            tagk: tagk.to_string(),
            filter: value.to_string(),
            group_by,
        }
    }

    #[test]
    fn test_write_query_without_filters() {
        let expr = Expression {
            aggregator: "sum".to_string(),
            metric: "sys.cpu".to_string(),
            order: vec![Operation::Aggregation],
            ..Default::default()
        };
        assert_eq!(
            compile_expression(&expr, "1h-ago"),
            "merge(sum,query(sys.cpu,null,1h-ago))"
        );
    }

    #[test]
    fn test_write_sorts_keys_and_values() {
        let expr = Expression {
            aggregator: "sum".to_string(),
            metric: "m".to_string(),
            order: vec![Operation::Aggregation],
            filters: vec![
                filter(FilterKind::Wildcard, "zone", "b*", false),
                filter(FilterKind::Wildcard, "host", "web02", false),
                filter(FilterKind::Wildcard, "zone", "a*", false),
            ],
            ..Default::default()
        };
        assert_eq!(
            compile_expression(&expr, "1h"),
            "merge(sum,query(m,{host=web02,zone=a*,zone=b*},1h))"
        );
    }

    #[test]
    fn test_write_renders_filter_kinds() {
        let expr = Expression {
            aggregator: "avg".to_string(),
            metric: "m".to_string(),
            order: vec![Operation::Aggregation],
            filters: vec![
                filter(FilterKind::Regexp, "a", "web[0-9]+", false),
                filter(FilterKind::LiteralOr, "b", "x|y", false),
                filter(FilterKind::NotLiteralOr, "c", "z", false),
                filter(FilterKind::Wildcard, "d", "web*", false),
            ],
            ..Default::default()
        };
        assert_eq!(
            compile_expression(&expr, "1h"),
            "merge(avg,query(m,{a=regexp(web[0-9]+),b=or(x|y),c=notor(z),d=web*},1h))"
        );
    }

    #[test]
    fn test_write_last_literal_group_wins() {
        // A later literal_or for the same key replaces, not appends.
        let expr = Expression {
            aggregator: "sum".to_string(),
            metric: "m".to_string(),
            order: vec![Operation::Aggregation],
            filters: vec![
                filter(FilterKind::LiteralOr, "host", "a|b", false),
                filter(FilterKind::LiteralOr, "host", "c|d", false),
            ],
            ..Default::default()
        };
        assert_eq!(
            compile_expression(&expr, "1h"),
            "merge(sum,query(m,{host=or(c|d)},1h))"
        );
    }

    #[test]
    fn test_write_literal_group_replaces_earlier_siblings() {
        let expr = Expression {
            aggregator: "sum".to_string(),
            metric: "m".to_string(),
            order: vec![Operation::Aggregation],
            filters: vec![
                filter(FilterKind::Wildcard, "host", "web*", false),
                filter(FilterKind::NotLiteralOr, "host", "web03", false),
            ],
            ..Default::default()
        };
        assert_eq!(
            compile_expression(&expr, "1h"),
            "merge(sum,query(m,{host=notor(web03)},1h))"
        );
    }

    #[test]
    fn test_write_downsample_defaults_filler() {
        let expr = Expression {
            aggregator: "sum".to_string(),
            metric: "m".to_string(),
            downsample: Some("1m-avg".to_string()),
            order: vec![Operation::Downsample, Operation::Aggregation],
            ..Default::default()
        };
        assert_eq!(
            compile_expression(&expr, "1h"),
            "merge(sum,downsample(1m,avg,none,query(m,null,1h)))"
        );
    }

    #[test]
    fn test_write_rate_unbounded_counter() {
        let expr = Expression {
            aggregator: "sum".to_string(),
            metric: "m".to_string(),
            rate: true,
            rate_options: Some(RateOptions {
                counter: true,
                counter_max: None,
                reset_value: 1,
            }),
            order: vec![Operation::Aggregation, Operation::Rate],
            ..Default::default()
        };
        assert_eq!(
            compile_expression(&expr, "1h"),
            "rate(true,null,1,merge(sum,query(m,null,1h)))"
        );
    }

    #[test]
    fn test_write_skips_unset_operations() {
        // Order entries for unset features are ignored, as is a rate entry
        // with the flag cleared.
        let expr = Expression {
            aggregator: "sum".to_string(),
            metric: "m".to_string(),
            order: vec![
                Operation::FilterValue,
                Operation::Downsample,
                Operation::Aggregation,
                Operation::Rate,
            ],
            ..Default::default()
        };
        assert_eq!(compile_expression(&expr, "1h"), "merge(sum,query(m,null,1h))");
    }

    #[test]
    fn test_write_group_by_prefix() {
        let expr = Expression {
            aggregator: "sum".to_string(),
            metric: "sys.cpu".to_string(),
            order: vec![Operation::Aggregation],
            filters: vec![
                filter(FilterKind::Wildcard, "host", "web*", true),
                filter(FilterKind::Wildcard, "dc", "lax", false),
            ],
            ..Default::default()
        };
        assert_eq!(
            compile_expression(&expr, "1h-ago"),
            "groupBy({host=web*})|merge(sum,query(sys.cpu,{dc=lax},1h-ago))"
        );
    }

    #[test]
    fn test_compile_query_spans_expressions() {
        let query = Query {
            relative: Some("1h-ago".to_string()),
            queries: vec![
                Expression {
                    aggregator: "sum".to_string(),
                    metric: "sys.cpu".to_string(),
                    order: vec![Operation::Aggregation],
                    ..Default::default()
                },
                Expression {
                    aggregator: "avg".to_string(),
                    metric: "sys.mem".to_string(),
                    order: vec![Operation::Aggregation],
                    ..Default::default()
                },
            ],
            ..Default::default()
        };
        assert_eq!(
            compile_query(&query),
            vec![
                "merge(sum,query(sys.cpu,null,1h-ago))",
                "merge(avg,query(sys.mem,null,1h-ago))",
            ]
        );
    }

    #[test]
    fn test_round_trip_is_canonical() {
        let text = "groupBy({host=wildcard(web*)})|filter(>5,rate(true,null,0,downsample(1m,avg,none,merge(sum,query(sys.cpu,{dc=or(lax|pdx)},1h-ago)))))";
        let (expr, relative) = ExpressionParser::parse(text).unwrap();
        let compiled = compile_expression(&expr, &relative);
        // The wildcard wrapper is unwrapped in canonical form.
        assert_eq!(
            compiled,
            "groupBy({host=web*})|filter(>5,rate(true,null,0,downsample(1m,avg,none,merge(sum,query(sys.cpu,{dc=or(lax|pdx)},1h-ago)))))"
        );
        // Canonical form is a fixed point of parse -> compile.
        let (again, relative_again) = ExpressionParser::parse(&compiled).unwrap();
        assert_eq!(compile_expression(&again, &relative_again), compiled);
    }
}
