//! Daily summary aggregation.
//!
//! # Algorithm Summary
//!
//! 1. Take the check-in and check-out timestamps from the day's events
//! 2. Pair each break start with the next break end and sum complete pairs
//! 3. Work time is the check-in to check-out span minus break time
//! 4. Status compares the local check-in time against the policy's start plus grace
//!
//! A summary is always recomputed from the full event list, never patched.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, FixedOffset, NaiveTime, TimeDelta, Utc};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::event::{AttendanceRecord, is_chronological};
use crate::event_type::AttendanceEventType;
use crate::types::ValidationError;

/// Attendance classification for one day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttendanceStatus {
    Present,
    Absent,
    Late,
    /// Reserved. [`aggregate`] never produces it.
    EarlyLeave,
    /// Reserved. [`aggregate`] never produces it.
    Partial,
}

impl AttendanceStatus {
    /// String representation for database storage.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Present => "present",
            Self::Absent => "absent",
            Self::Late => "late",
            Self::EarlyLeave => "early_leave",
            Self::Partial => "partial",
        }
    }

    /// Whether the employee showed up at all.
    pub const fn is_attending(&self) -> bool {
        matches!(self, Self::Present | Self::Late)
    }
}

impl fmt::Display for AttendanceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for AttendanceStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "present" => Ok(Self::Present),
            "absent" => Ok(Self::Absent),
            "late" => Ok(Self::Late),
            "early_leave" => Ok(Self::EarlyLeave),
            "partial" => Ok(Self::Partial),
            _ => Err(ValidationError::InvalidStatus {
                value: s.to_string(),
            }),
        }
    }
}

/// Rules the aggregator applies. Supplied by configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttendancePolicy {
    /// Local time-of-day the working day is expected to start.
    pub expected_start: NaiveTime,
    /// Grace period after `expected_start` before a check-in counts as late.
    pub late_threshold: TimeDelta,
    /// Offset used to read local times and calendar days.
    pub utc_offset: FixedOffset,
}

impl AttendancePolicy {
    pub const fn new(
        expected_start: NaiveTime,
        late_threshold: TimeDelta,
        utc_offset: FixedOffset,
    ) -> Self {
        Self {
            expected_start,
            late_threshold,
            utc_offset,
        }
    }

    /// Returns true if `checkin` falls strictly after the start plus grace on its local day.
    ///
    /// A grace period reaching past the representable calendar makes nothing late.
    pub fn is_late(&self, checkin: DateTime<Utc>) -> bool {
        let local = checkin.with_timezone(&self.utc_offset).naive_local();
        local
            .date()
            .and_time(self.expected_start)
            .checked_add_signed(self.late_threshold)
            .is_some_and(|deadline| local > deadline)
    }
}

/// Derived attendance record for one day key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailySummary {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checkin_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checkout_time: Option<DateTime<Utc>>,
    pub work_hours: f64,
    pub break_hours: f64,
    /// Reserved. Always zero.
    pub overtime_hours: f64,
    pub status: AttendanceStatus,
}

impl DailySummary {
    /// The summary of a day without events.
    pub const fn absent() -> Self {
        Self {
            checkin_time: None,
            checkout_time: None,
            work_hours: 0.0,
            break_hours: 0.0,
            overtime_hours: 0.0,
            status: AttendanceStatus::Absent,
        }
    }
}

/// Computes the summary for one day's accepted events.
///
/// Events must be sorted ascending. An open break (start without end)
/// contributes no break time.
pub fn aggregate<E: AttendanceRecord>(events: &[E], policy: &AttendancePolicy) -> DailySummary {
    debug_assert!(is_chronological(events), "events must be sorted by timestamp");

    let mut checkin_time = None;
    let mut checkout_time = None;
    let mut break_total = TimeDelta::zero();
    let mut open_break: Option<DateTime<Utc>> = None;

    for event in events {
        let ts = event.timestamp();
        match event.kind() {
            AttendanceEventType::CheckIn => checkin_time = Some(ts),
            AttendanceEventType::CheckOut => checkout_time = Some(ts),
            AttendanceEventType::BreakStart => open_break = Some(ts),
            AttendanceEventType::BreakEnd => {
                if let Some(start) = open_break.take() {
                    break_total += ts - start;
                }
            }
        }
    }

    let break_hours = hours(break_total);
    let work_hours = match (checkin_time, checkout_time) {
        (Some(start), Some(end)) => hours(end - start) - break_hours,
        _ => 0.0,
    };

    let status = match checkin_time {
        None => AttendanceStatus::Absent,
        Some(ts) if policy.is_late(ts) => AttendanceStatus::Late,
        Some(_) => AttendanceStatus::Present,
    };

    DailySummary {
        checkin_time,
        checkout_time,
        work_hours,
        break_hours,
        overtime_hours: 0.0,
        status,
    }
}

/// Aggregates many independent days in parallel, preserving input order.
pub fn aggregate_days<K, E>(
    days: &[(K, Vec<E>)],
    policy: &AttendancePolicy,
) -> Vec<(K, DailySummary)>
where
    K: Clone + Send + Sync,
    E: AttendanceRecord + Sync,
{
    days.par_iter()
        .map(|(key, events)| (key.clone(), aggregate(events, policy)))
        .collect()
}

#[expect(
    clippy::cast_precision_loss,
    reason = "millisecond spans within a day are far below f64 precision limits"
)]
fn hours(span: TimeDelta) -> f64 {
    span.num_milliseconds() as f64 / 3_600_000.0
}
