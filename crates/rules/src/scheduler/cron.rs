//! Cron normalization, parsing, and due-check helpers.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use cron::Schedule;

use crate::error::{Result, RulesError};

/// Normalize a 5-field cron expression to 6-field by prepending "0 " for
/// seconds.
///
/// The `cron` crate requires 6 fields: `sec min hour day-of-month month
/// day-of-week`. Stored schedules may use standard 5-field cron.
pub(crate) fn normalize_cron(expression: &str) -> String {
    let trimmed = expression.trim();
    let field_count = trimmed.split_whitespace().count();
    if field_count == 5 {
        format!("0 {}", trimmed)
    } else {
        // Already 6-field or non-standard; pass through as-is.
        trimmed.to_string()
    }
}

/// Normalize and parse an expression, keeping the original text in the
/// error for diagnostics.
pub(crate) fn parse_schedule(expression: &str) -> Result<(String, Schedule)> {
    let normalized = normalize_cron(expression);
    let schedule = Schedule::from_str(&normalized).map_err(|e| RulesError::InvalidCron {
        expression: expression.to_string(),
        source: e,
    })?;
    Ok((normalized, schedule))
}

/// Check if a cron schedule is due at `now`.
///
/// A job is due if its most recent scheduled tick falls between `last_fired`
/// (exclusive) and `now` (inclusive). If `last_fired` is `None`, any tick in
/// the preceding day counts.
pub(crate) fn is_cron_due(
    schedule: &Schedule,
    now: DateTime<Utc>,
    last_fired: Option<DateTime<Utc>>,
) -> bool {
    let check_from = last_fired.unwrap_or(now - chrono::Duration::days(1));

    if let Some(next) = schedule.after(&check_from).next() {
        next <= now
    } else {
        false
    }
}
