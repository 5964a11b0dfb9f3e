//! Summary command for showing stored daily summaries.

use std::io::Write;

use anyhow::{Context, Result};
use att_core::{DailySummary, DayKey, EmployeeId, TenantId};
use att_db::{Database, StoredSummary};
use chrono::{DateTime, FixedOffset, NaiveDate, Utc};

use super::util::local_time;

pub fn run<W: Write>(
    writer: &mut W,
    db: &Database,
    tenant: &TenantId,
    employee: Option<&EmployeeId>,
    date: NaiveDate,
    offset: FixedOffset,
    json: bool,
) -> Result<()> {
    match employee {
        Some(employee) => {
            let key = DayKey::new(tenant.clone(), employee.clone(), date);
            let stored = db
                .summary(&key)
                .with_context(|| format!("failed to load summary for {key}"))?;
            if json {
                writeln!(writer, "{}", serde_json::to_string_pretty(&stored)?)?;
                return Ok(());
            }
            match stored {
                Some(stored) => write_summary(writer, &stored.key, &stored.summary, offset)?,
                None => writeln!(
                    writer,
                    "No summary for {employee} on {date}. Run `att recompute` to compute one."
                )?,
            }
        }
        None => {
            let stored = db
                .summaries_for_date(tenant, date)
                .with_context(|| format!("failed to load summaries for {date}"))?;
            if json {
                writeln!(writer, "{}", serde_json::to_string_pretty(&stored)?)?;
                return Ok(());
            }
            write_summary_table(writer, date, &stored, offset)?;
        }
    }
    Ok(())
}

/// Writes one summary in the multi-line form shared by `summary`, `record` and `recompute`.
pub(crate) fn write_summary<W: Write>(
    writer: &mut W,
    key: &DayKey,
    summary: &DailySummary,
    offset: FixedOffset,
) -> Result<()> {
    writeln!(
        writer,
        "Summary for {} on {}: {}",
        key.employee, key.date, summary.status
    )?;
    writeln!(writer, "  Check-in:  {}", clock(summary.checkin_time, offset))?;
    writeln!(writer, "  Check-out: {}", clock(summary.checkout_time, offset))?;
    writeln!(writer, "  Work:      {}", hours(summary.work_hours))?;
    writeln!(writer, "  Break:     {}", hours(summary.break_hours))?;
    Ok(())
}

fn write_summary_table<W: Write>(
    writer: &mut W,
    date: NaiveDate,
    stored: &[StoredSummary],
    offset: FixedOffset,
) -> Result<()> {
    if stored.is_empty() {
        writeln!(writer, "No summaries for {date}.")?;
        return Ok(());
    }

    writeln!(writer, "Summaries for {date}:")?;
    let width = stored
        .iter()
        .map(|row| row.key.employee.as_str().len())
        .max()
        .unwrap_or_default();
    for row in stored {
        let summary = &row.summary;
        writeln!(
            writer,
            "- {:<width$}  {:<7}  in {}  out {}  work {}  break {}",
            row.key.employee.as_str(),
            summary.status.as_str(),
            clock(summary.checkin_time, offset),
            clock(summary.checkout_time, offset),
            hours(summary.work_hours),
            hours(summary.break_hours),
        )?;
    }
    Ok(())
}

fn clock(timestamp: Option<DateTime<Utc>>, offset: FixedOffset) -> String {
    timestamp.map_or_else(|| "--:--".to_string(), |ts| local_time(ts, offset))
}

pub(crate) fn hours(value: f64) -> String {
    format!("{value:.2}h")
}
