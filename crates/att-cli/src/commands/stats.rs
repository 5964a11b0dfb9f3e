//! Stats command for a tenant's daily attendance numbers.

use std::io::Write;

use anyhow::{Context, Result};
use att_core::TenantId;
use att_db::Database;
use chrono::NaiveDate;

use super::summary::hours;

/// Prints statistics computed from the stored summaries for `date`.
pub fn run<W: Write>(
    writer: &mut W,
    db: &Database,
    tenant: &TenantId,
    date: NaiveDate,
    json: bool,
) -> Result<()> {
    let stats = db
        .attendance_stats(tenant, date)
        .with_context(|| format!("failed to compute statistics for {date}"))?;

    if json {
        writeln!(writer, "{}", serde_json::to_string_pretty(&stats)?)?;
        return Ok(());
    }

    writeln!(writer, "Attendance for {tenant} on {date}")?;
    if stats.total_employees == 0 {
        writeln!(writer, "No summaries recorded.")?;
        return Ok(());
    }
    writeln!(writer, "Employees:  {}", stats.total_employees)?;
    writeln!(writer, "Present:    {} ({} late)", stats.present, stats.late)?;
    writeln!(writer, "Absent:     {}", stats.absent)?;
    writeln!(writer, "Rate:       {:.1}%", stats.attendance_rate)?;
    writeln!(writer, "Avg work:   {}", hours(stats.avg_work_hours))?;
    Ok(())
}
