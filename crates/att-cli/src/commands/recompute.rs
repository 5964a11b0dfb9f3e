//! Recompute daily summaries from the event log.
//!
//! Summaries are refreshed automatically on checkout. This command covers
//! days that never closed and policy changes.

use std::io::Write;

use anyhow::{Context, Result};
use att_core::{AttendancePolicy, DayKey, EmployeeId, TenantId};
use att_db::Database;
use chrono::NaiveDate;

use super::summary::{hours, write_summary};

/// Recomputes one employee's summary, or every employee with events that day.
pub fn run<W: Write>(
    writer: &mut W,
    db: &mut Database,
    tenant: &TenantId,
    employee: Option<&EmployeeId>,
    date: NaiveDate,
    policy: &AttendancePolicy,
) -> Result<()> {
    if let Some(employee) = employee {
        let key = DayKey::new(tenant.clone(), employee.clone(), date);
        let summary = db
            .recompute_summary(&key, policy)
            .with_context(|| format!("failed to recompute summary for {key}"))?;
        write_summary(writer, &key, &summary, policy.utc_offset)?;
        return Ok(());
    }

    let summaries = db
        .recompute_date(tenant, date, policy)
        .with_context(|| format!("failed to recompute summaries for {date}"))?;

    if summaries.is_empty() {
        writeln!(writer, "No events on {date}.")?;
        return Ok(());
    }

    writeln!(
        writer,
        "Recomputed {} summary(ies) for {date}:",
        summaries.len()
    )?;
    for (employee, summary) in &summaries {
        writeln!(
            writer,
            "- {employee}: {} ({} worked)",
            summary.status,
            hours(summary.work_hours)
        )?;
    }
    Ok(())
}
