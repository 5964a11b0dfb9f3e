//! Status command for showing where an employee's day stands.

use std::io::Write;

use anyhow::{Context, Result};
use att_core::{DayKey, DayPhase};
use att_db::Database;
use chrono::FixedOffset;

use super::util::local_time;

pub fn run<W: Write>(
    writer: &mut W,
    db: &Database,
    key: &DayKey,
    offset: FixedOffset,
) -> Result<()> {
    let log = db
        .day_log(key)
        .with_context(|| format!("failed to load events for {key}"))?;
    let phase = log.phase();

    writeln!(writer, "{} on {}: {}", key.employee, key.date, phase.as_str())?;
    writeln!(writer, "Events: {}", log.events().len())?;
    if let Some(last) = log.last() {
        writeln!(
            writer,
            "Last: {} at {}",
            last.kind,
            local_time(last.timestamp, offset)
        )?;
    }

    let next = match phase {
        DayPhase::NotStarted => "checkin",
        DayPhase::CheckedIn => "break_start, checkout",
        DayPhase::OnBreak => "break_end, checkout",
        DayPhase::CheckedOut => "none",
    };
    writeln!(writer, "Allowed next: {next}")?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use att_core::{AttendanceEventType, AttendancePolicy, EmployeeId, TenantId};
    use att_db::NewEvent;
    use chrono::{NaiveDate, NaiveTime, TimeDelta, TimeZone, Utc};
    use insta::assert_snapshot;

    fn policy() -> AttendancePolicy {
        AttendancePolicy::new(
            NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            TimeDelta::minutes(15),
            FixedOffset::east_opt(3600).unwrap(),
        )
    }

    fn key() -> DayKey {
        DayKey::new(
            TenantId::new("acme").unwrap(),
            EmployeeId::new("emp-1").unwrap(),
            NaiveDate::from_ymd_opt(2025, 1, 15).unwrap(),
        )
    }

    fn render(db: &Database) -> String {
        let mut output = Vec::new();
        run(&mut output, db, &key(), policy().utc_offset).unwrap();
        String::from_utf8(output).unwrap()
    }

    #[test]
    fn status_before_checkin() {
        let db = Database::open_in_memory().unwrap();
        assert_snapshot!(render(&db), @r"
        emp-1 on 2025-01-15: not started
        Events: 0
        Allowed next: checkin
        ");
    }

    #[test]
    fn status_on_break() {
        let mut db = Database::open_in_memory().unwrap();
        for (kind, hour) in [
            (AttendanceEventType::CheckIn, 8),
            (AttendanceEventType::BreakStart, 11),
        ] {
            let at = Utc.with_ymd_and_hms(2025, 1, 15, hour, 0, 0).unwrap();
            db.record_event(
                &key().tenant,
                NewEvent::new(key().employee, kind, at),
                &policy(),
            )
            .unwrap();
        }

        assert_snapshot!(render(&db), @r"
        emp-1 on 2025-01-15: on break
        Events: 2
        Last: break_start at 12:00
        Allowed next: break_end, checkout
        ");
    }
}
