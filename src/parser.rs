//! Grammar dispatcher: recursive-descent parsing of expression text into a
//! structured [`Expression`].

use std::collections::HashSet;

use tracing::trace;

use crate::expr::{Expression, TagFilter};
use crate::scanner::{parse_map, split_params, Scanner};
use crate::types::{FilterKind, Operation, RateOptions};
use crate::TsexprError;

/// Maximum nesting depth accepted by the parser. Expression text is
/// caller-controlled, so recursion is capped instead of being bounded only
/// by the stack.
pub const MAX_NESTING: usize = 64;

/// Classifies a raw tag-value token into its filter kind and bare value.
///
/// Wrapping syntax (`regexp(...)`, `wildcard(...)`, `or(...)`, `notor(...)`)
/// selects the kind; a bare token is an implicit wildcard. The same
/// resolution applies to `query` and `groupBy` tag maps.
pub fn resolve_filter_token(raw: &str) -> (FilterKind, &str) {
    const WRAPPERS: [(&str, FilterKind); 4] = [
        ("regexp(", FilterKind::Regexp),
        ("wildcard(", FilterKind::Wildcard),
        ("or(", FilterKind::LiteralOr),
        ("notor(", FilterKind::NotLiteralOr),
    ];
    for (prefix, kind) in WRAPPERS {
        if raw.starts_with(prefix) && raw.ends_with(')') {
            return (kind, &raw[prefix.len()..raw.len() - 1]);
        }
    }
    (FilterKind::Wildcard, raw)
}

/// Recursive-descent parser for the expression grammar.
///
/// Whitespace is insignificant and stripped up front. The parser owns the
/// expression being built and hands it to exactly one production per
/// recursion level, recording the textual nesting in an append-only
/// operation log with a separate set for duplicate detection.
#[derive(Debug, Default)]
pub struct ExpressionParser {
    log: Vec<Operation>,
    seen: HashSet<Operation>,
    relative: Option<String>,
}

impl ExpressionParser {
    /// Parses `input` into an [`Expression`] plus the relative-time token
    /// consumed by the innermost `query(...)` (empty when none was present).
    ///
    /// The returned order list reads innermost-first, with the structurally
    /// implied `query` and `groupBy` tags already stripped.
    pub fn parse(input: &str) -> Result<(Expression, String), TsexprError> {
        let text: String = input.chars().filter(|ch| !ch.is_whitespace()).collect();
        trace!(len = text.len(), "parsing expression");
        let mut parser = ExpressionParser::default();
        let mut expr = Expression::default();
        parser.parse_node(&text, &mut expr, 0)?;
        expr.order = parser
            .log
            .iter()
            .rev()
            .filter(|op| !matches!(op, Operation::Query | Operation::GroupBy))
            .copied()
            .collect();
        Ok((expr, parser.relative.unwrap_or_default()))
    }

    fn parse_node(
        &mut self,
        exp: &str,
        out: &mut Expression,
        depth: usize,
    ) -> Result<(), TsexprError> {
        if depth >= MAX_NESTING {
            return Err(TsexprError::NestingTooDeep(MAX_NESTING));
        }
        let name = match exp.find('(') {
            Some(idx) => &exp[..idx],
            None => exp,
        };
        let rest = match name {
            "query" => self.parse_query(exp, out)?,
            "merge" => self.parse_merge(exp, out)?,
            "downsample" => self.parse_downsample(exp, out)?,
            "groupBy" => self.parse_group(exp, out)?,
            "rate" => self.parse_rate(exp, out)?,
            "filter" => self.parse_filter(exp, out)?,
            _ => return Err(TsexprError::UnknownFunction(name.to_string())),
        };
        if !rest.is_empty() {
            self.parse_node(&rest, out, depth + 1)?;
        }
        Ok(())
    }

    /// Records an operation in the log, rejecting duplicates.
    fn record(&mut self, op: Operation) -> Result<(), TsexprError> {
        if !self.seen.insert(op) {
            return Err(TsexprError::DuplicateOperation(op));
        }
        self.log.push(op);
        Ok(())
    }

    fn parse_query(&mut self, exp: &str, out: &mut Expression) -> Result<String, TsexprError> {
        let mut params = split_params(args_text(exp, "query"));
        if params.len() != 3 {
            return Err(TsexprError::Arity {
                function: "query",
                expected: 3,
                actual: params.len(),
                params,
            });
        }
        let tags = if params[1] == "null" {
            Vec::new()
        } else {
            parse_map(&params[1])?
        };
        out.metric = std::mem::take(&mut params[0]);
        for (tagk, values) in tags {
            for raw in values {
                let (kind, value) = resolve_filter_token(&raw);
                out.filters.push(TagFilter {
                    kind,
                    tagk: tagk.clone(),
                    filter: value.to_string(),
                    group_by: false,
                });
            }
        }
        self.record(Operation::Query)?;
        self.relative = Some(std::mem::take(&mut params[2]));
        // `query` is the terminal production; nothing remains to parse.
        Ok(String::new())
    }

    fn parse_merge(&mut self, exp: &str, out: &mut Expression) -> Result<String, TsexprError> {
        let mut params = split_params(args_text(exp, "merge"));
        if params.len() != 2 {
            return Err(TsexprError::Arity {
                function: "merge",
                expected: 2,
                actual: params.len(),
                params,
            });
        }
        out.aggregator = std::mem::take(&mut params[0]);
        self.record(Operation::Aggregation)?;
        Ok(std::mem::take(&mut params[1]))
    }

    fn parse_downsample(&mut self, exp: &str, out: &mut Expression) -> Result<String, TsexprError> {
        let mut params = split_params(args_text(exp, "downsample"));
        if params.len() != 4 {
            return Err(TsexprError::Arity {
                function: "downsample",
                expected: 4,
                actual: params.len(),
                params,
            });
        }
        out.downsample = Some(format!("{}-{}-{}", params[0], params[1], params[2]));
        self.record(Operation::Downsample)?;
        Ok(std::mem::take(&mut params[3]))
    }

    fn parse_rate(&mut self, exp: &str, out: &mut Expression) -> Result<String, TsexprError> {
        let mut params = split_params(args_text(exp, "rate"));
        if params.len() != 4 {
            return Err(TsexprError::Arity {
                function: "rate",
                expected: 4,
                actual: params.len(),
                params,
            });
        }
        let counter: bool = params[0].parse().map_err(|_| TsexprError::NumberSyntax {
            what: "rate counter flag",
            value: params[0].clone(),
        })?;
        let counter_max = if params[1] == "null" {
            None
        } else {
            Some(
                params[1]
                    .parse::<i64>()
                    .map_err(|_| TsexprError::NumberSyntax {
                        what: "rate counter max",
                        value: params[1].clone(),
                    })?,
            )
        };
        let reset_value: i64 = params[2].parse().map_err(|_| TsexprError::NumberSyntax {
            what: "rate reset value",
            value: params[2].clone(),
        })?;
        out.rate = true;
        out.rate_options = Some(RateOptions {
            counter,
            counter_max,
            reset_value,
        });
        self.record(Operation::Rate)?;
        Ok(std::mem::take(&mut params[3]))
    }

    fn parse_filter(&mut self, exp: &str, out: &mut Expression) -> Result<String, TsexprError> {
        let mut params = split_params(args_text(exp, "filter"));
        if params.len() != 2 {
            return Err(TsexprError::Arity {
                function: "filter",
                expected: 2,
                actual: params.len(),
                params,
            });
        }
        // The comparator predicate is stored raw and validated later.
        out.filter_value = Some(std::mem::take(&mut params[0]));
        self.record(Operation::FilterValue)?;
        Ok(std::mem::take(&mut params[1]))
    }

    fn parse_group(&mut self, exp: &str, out: &mut Expression) -> Result<String, TsexprError> {
        // Split `groupBy({...})` from the `|`-joined trailing sub-expression
        // before touching the map argument.
        let mut scanner = Scanner::new(exp);
        while let Some(ch) = scanner.peek() {
            if ch == '(' {
                break;
            }
            scanner.advance();
        }
        let (own, rest) = if scanner.at_end() {
            (exp, String::new())
        } else {
            match scanner.skip_balanced('(', ')') {
                None => (exp, String::new()),
                Some(_) => {
                    let after = scanner.position();
                    if after == exp.len() {
                        return Err(TsexprError::GroupBySyntax("groupBy cannot be used by itself"));
                    }
                    if !exp[after..].starts_with('|') {
                        return Err(TsexprError::GroupBySyntax(
                            "groupBy should be followed by a |",
                        ));
                    }
                    if after + 1 == exp.len() {
                        return Err(TsexprError::GroupBySyntax(
                            "groupBy should be followed by a | and a query expression",
                        ));
                    }
                    (&exp[..after], exp[after + 1..].to_string())
                }
            }
        };
        let params = split_params(args_text(own, "groupBy"));
        if params.len() != 1 {
            return Err(TsexprError::Arity {
                function: "groupBy",
                expected: 1,
                actual: params.len(),
                params,
            });
        }
        let tags = parse_map(&params[0])?;
        for (tagk, values) in tags {
            for raw in values {
                let (kind, value) = resolve_filter_token(&raw);
                out.filters.push(TagFilter {
                    kind,
                    tagk: tagk.clone(),
                    filter: value.to_string(),
                    group_by: true,
                });
            }
        }
        self.record(Operation::GroupBy)?;
        Ok(rest)
    }
}

/// Returns the argument text of `exp` beginning immediately after the
/// opening paren that follows `name`, or empty when nothing follows.
fn args_text<'a>(exp: &'a str, name: &str) -> &'a str {
    exp.get(name.len() + 1..).unwrap_or("")
}
