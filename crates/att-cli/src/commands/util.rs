//! Shared utilities for CLI commands.

use std::sync::LazyLock;

use anyhow::Context;
use chrono::{DateTime, Duration, FixedOffset, NaiveDate, NaiveTime, TimeZone, Utc};
use regex::Regex;

/// Pre-compiled regex for relative time parsing.
static RELATIVE_TIME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+)\s+(minute|hour)s?\s+ago$").unwrap());

/// Relative times reach back at most one day; older events need an explicit timestamp.
const MAX_RELATIVE_MINUTES: i64 = 24 * 60;

/// Parse an event time as RFC 3339, local `HH:MM`, or relative time.
///
/// Supports:
/// - RFC 3339: "2026-01-15T10:30:00Z"
/// - Local wall-clock time on `now`'s local day: "09:05"
/// - Relative: "2 hours ago", "30 minutes ago"
///
/// `None` means `now`.
pub fn parse_at(
    input: Option<&str>,
    offset: FixedOffset,
    now: DateTime<Utc>,
) -> anyhow::Result<DateTime<Utc>> {
    let Some(s) = input.map(str::trim) else {
        return Ok(now);
    };

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }

    if let Ok(time) = NaiveTime::parse_from_str(s, "%H:%M") {
        let local_day = now.with_timezone(&offset).date_naive();
        return offset
            .from_local_datetime(&local_day.and_time(time))
            .single()
            .map(|dt| dt.with_timezone(&Utc))
            .with_context(|| format!("{s} is not a valid local time"));
    }

    let Some(caps) = RELATIVE_TIME_RE.captures(s) else {
        anyhow::bail!(
            "Invalid time: {s}. Use RFC 3339 (e.g., 2026-01-15T09:00:00Z), HH:MM, or relative (e.g., '10 minutes ago')"
        );
    };

    let n: i64 = caps[1]
        .parse()
        .context("failed to parse number in relative time")?;

    let minutes_per_unit = match &caps[2] {
        "minute" => 1,
        "hour" => 60,
        unit => anyhow::bail!("Unknown time unit: {unit}"),
    };

    if n > MAX_RELATIVE_MINUTES / minutes_per_unit {
        anyhow::bail!("Relative time value too large: {n} {}", &caps[2]);
    }

    Ok(now - Duration::minutes(n * minutes_per_unit))
}

/// Parse a calendar day as `YYYY-MM-DD`, `today` or `yesterday`.
///
/// `None` means today in the configured offset.
pub fn parse_date(
    input: Option<&str>,
    offset: FixedOffset,
    now: DateTime<Utc>,
) -> anyhow::Result<NaiveDate> {
    let today = now.with_timezone(&offset).date_naive();
    match input.map(str::trim) {
        None | Some("today") => Ok(today),
        Some("yesterday") => today
            .pred_opt()
            .context("no calendar day before today"),
        Some(s) => NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .with_context(|| format!("Invalid date: {s}. Use YYYY-MM-DD, today or yesterday")),
    }
}

/// Formats a timestamp as local wall-clock time.
pub fn local_time(timestamp: DateTime<Utc>, offset: FixedOffset) -> String {
    timestamp.with_timezone(&offset).format("%H:%M").to_string()
}
