//! Attendance statistics across employees for one day.

use serde::{Deserialize, Serialize};

use crate::summary::{AttendanceStatus, DailySummary};

/// Headline numbers for a tenant's day.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AttendanceStats {
    pub total_employees: usize,
    /// Present or late.
    pub present: usize,
    pub absent: usize,
    pub late: usize,
    pub avg_work_hours: f64,
    /// Percentage of employees present or late.
    pub attendance_rate: f64,
}

impl AttendanceStats {
    /// Computes statistics over one summary per employee.
    #[expect(
        clippy::cast_precision_loss,
        reason = "employee counts are far below f64 precision limits"
    )]
    pub fn from_summaries<'a, I>(summaries: I) -> Self
    where
        I: IntoIterator<Item = &'a DailySummary>,
    {
        let mut stats = Self::default();
        let mut work_total = 0.0;

        for summary in summaries {
            stats.total_employees += 1;
            work_total += summary.work_hours;
            if summary.status.is_attending() {
                stats.present += 1;
            }
            match summary.status {
                AttendanceStatus::Absent => stats.absent += 1,
                AttendanceStatus::Late => stats.late += 1,
                _ => {}
            }
        }

        if stats.total_employees > 0 {
            let total = stats.total_employees as f64;
            stats.avg_work_hours = work_total / total;
            stats.attendance_rate = stats.present as f64 / total * 100.0;
        }
        stats
    }
}
