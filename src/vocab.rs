//! Static vocabularies: the enumerated names the validator accepts and the
//! filter metadata catalog exposed for client-side documentation.

use serde::Serialize;

use crate::types::FilterKind;

/// Implemented aggregation functions.
pub const AGGREGATORS: &[&str] = &["avg", "count", "min", "max", "sum"];

/// Canonical tag-filter kind names.
pub const FILTER_KINDS: &[&str] = &["literal_or", "not_literal_or", "wildcard", "regexp"];

/// Implemented downsampling aggregators.
pub const DOWNSAMPLERS: &[&str] = &["avg", "count", "min", "max", "sum"];

/// Downsample fill policies.
pub const DOWNSAMPLE_FILLERS: &[&str] = &["none", "nan", "null", "zero"];

/// Human-readable description and usage examples for a filter kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FilterInfo {
    pub examples: &'static str,
    pub description: &'static str,
}

/// Returns the filter metadata catalog, one entry per kind.
pub fn filter_catalog() -> &'static [(FilterKind, FilterInfo)] {
    &[
        (
            FilterKind::LiteralOr,
            FilterInfo {
                examples: "host=or(web01), host=or(web01|web02|web03)",
                description: "Accepts one or more exact values and matches if the series \
                    contains any of them. Multiple values can be included and must be \
                    separated by the | (pipe) character.",
            },
        ),
        (
            FilterKind::NotLiteralOr,
            FilterInfo {
                examples: "host=notor(web01), host=notor(web01|web02|web03)",
                description: "Accepts one or more exact values and matches if the series \
                    does NOT contain any of them. Multiple values can be included and must \
                    be separated by the | (pipe) character.",
            },
        ),
        (
            FilterKind::Wildcard,
            FilterInfo {
                examples: "host=wildcard(web*), host=wildcard(web*.tsdb.net)",
                description: "Performs pre, post and in-fix glob matching of values. The \
                    wildcard character is the * (asterisk); multiple wildcards can be used \
                    and a wildcard by itself matches any value for the tag key.",
            },
        ),
        (
            FilterKind::Regexp,
            FilterInfo {
                examples: "host=regexp(.*)",
                description: "Matches values against a full POSIX-compliant regular \
                    expression. If the pattern is not a valid regular expression the query \
                    is rejected by the engine.",
            },
        ),
    ]
}
