//! Record command for submitting attendance events.

use std::io::Write;

use anyhow::Result;
use att_core::{AttendancePolicy, TenantId};
use att_db::{Database, NewEvent};

use super::summary::write_summary;
use super::util::local_time;

/// Validates and stores one event, then prints it.
///
/// A rejected event is returned as an error carrying the rejection reason, so
/// the binary exits non-zero without anything being written.
pub fn run<W: Write>(
    writer: &mut W,
    db: &mut Database,
    tenant: &TenantId,
    event: NewEvent,
    policy: &AttendancePolicy,
    json: bool,
) -> Result<()> {
    let recorded = db.record_event(tenant, event, policy).map_err(|err| {
        if err.is_rejection() {
            anyhow::Error::new(err)
        } else {
            anyhow::Error::new(err).context("failed to record event")
        }
    })?;

    if json {
        writeln!(writer, "{}", serde_json::to_string(&recorded)?)?;
        return Ok(());
    }

    writeln!(
        writer,
        "Recorded {} for {} at {} ({})",
        recorded.event.kind,
        recorded.key.employee,
        local_time(recorded.event.timestamp, policy.utc_offset),
        recorded.key.date,
    )?;
    if let Some(summary) = &recorded.summary {
        write_summary(writer, &recorded.key, summary, policy.utc_offset)?;
    }
    Ok(())
}
