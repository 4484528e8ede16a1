//! Relative-time resolution: duration tokens resolved against an end
//! instant.

use chrono::{DateTime, Days, Duration, Months, Utc};

use crate::TsexprError;

/// Strips one trailing `-ago` marker so grammar-level tokens (`1h-ago`)
/// resolve like bare durations (`1h`).
pub(crate) fn strip_ago(token: &str) -> &str {
    token.strip_suffix("-ago").unwrap_or(token)
}

/// Resolves a duration token against `end`, yielding the absolute start.
///
/// `ms`, `s`, `m` and `h` subtract fixed-length durations. `d`, `w`, `n`
/// (months) and `y` subtract calendar units so month and year arithmetic
/// respects variable month lengths; a subtraction landing on a nonexistent
/// day clamps to the last day of the target month.
pub fn relative_start(end: DateTime<Utc>, token: &str) -> Result<DateTime<Utc>, TsexprError> {
    let token = strip_ago(token);
    if token.len() < 2 {
        return Err(TsexprError::DurationSyntax {
            token: token.to_string(),
            reason: "invalid time interval",
        });
    }
    if let Some(head) = token.strip_suffix("ms") {
        let magnitude = parse_magnitude(token, head)?;
        return checked_sub(end, Duration::try_milliseconds(magnitude), token);
    }
    let mut chars = token.chars();
    let unit = chars.next_back();
    let head = chars.as_str();
    match unit {
        Some('s') => {
            let magnitude = parse_magnitude(token, head)?;
            checked_sub(end, Duration::try_seconds(magnitude), token)
        }
        Some('m') => {
            let magnitude = parse_magnitude(token, head)?;
            checked_sub(end, Duration::try_minutes(magnitude), token)
        }
        Some('h') => {
            let magnitude = parse_magnitude(token, head)?;
            checked_sub(end, Duration::try_hours(magnitude), token)
        }
        Some('d') => shift_days(end, parse_magnitude(token, head)?, 1, token),
        Some('w') => shift_days(end, parse_magnitude(token, head)?, 7, token),
        Some('n') => shift_months(end, parse_magnitude(token, head)?, 1, token),
        Some('y') => shift_months(end, parse_magnitude(token, head)?, 12, token),
        unit => Err(TsexprError::UnknownTimeUnit(
            unit.map(String::from).unwrap_or_default(),
        )),
    }
}

fn parse_magnitude(token: &str, digits: &str) -> Result<i64, TsexprError> {
    digits.parse().map_err(|_| TsexprError::DurationSyntax {
        token: token.to_string(),
        reason: "invalid magnitude",
    })
}

fn checked_sub(
    end: DateTime<Utc>,
    duration: Option<Duration>,
    token: &str,
) -> Result<DateTime<Utc>, TsexprError> {
    duration
        .and_then(|d| end.checked_sub_signed(d))
        .ok_or_else(|| TsexprError::DurationSyntax {
            token: token.to_string(),
            reason: "out of range",
        })
}

fn shift_days(
    end: DateTime<Utc>,
    magnitude: i64,
    scale: i64,
    token: &str,
) -> Result<DateTime<Utc>, TsexprError> {
    let out_of_range = || TsexprError::DurationSyntax {
        token: token.to_string(),
        reason: "out of range",
    };
    let total = magnitude.checked_mul(scale).ok_or_else(out_of_range)?;
    let days = Days::new(total.unsigned_abs());
    let shifted = if total >= 0 {
        end.checked_sub_days(days)
    } else {
        end.checked_add_days(days)
    };
    shifted.ok_or_else(out_of_range)
}

fn shift_months(
    end: DateTime<Utc>,
    magnitude: i64,
    scale: i64,
    token: &str,
) -> Result<DateTime<Utc>, TsexprError> {
    let out_of_range = || TsexprError::DurationSyntax {
        token: token.to_string(),
        reason: "out of range",
    };
    let total = magnitude.checked_mul(scale).ok_or_else(out_of_range)?;
    let months = u32::try_from(total.unsigned_abs()).map_err(|_| out_of_range())?;
    let shifted = if total >= 0 {
        end.checked_sub_months(Months::new(months))
    } else {
        end.checked_add_months(Months::new(months))
    };
    shifted.ok_or_else(out_of_range)
}
