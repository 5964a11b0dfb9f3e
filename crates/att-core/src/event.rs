//! Attendance events and their ordering.

use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::event_type::AttendanceEventType;
use crate::types::{EmployeeId, EventId, ValidationError};

/// One accepted work-presence fact. Immutable once stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttendanceEvent {
    /// Unique identifier for this event.
    pub id: EventId,
    /// The employee who performed the action.
    pub employee_id: EmployeeId,
    /// Calendar day the event belongs to, derived from `timestamp`.
    pub date: NaiveDate,
    /// The action performed.
    #[serde(rename = "type")]
    pub kind: AttendanceEventType,
    /// When the action happened.
    pub timestamp: DateTime<Utc>,
    /// Where the action happened, if reported. Not validated here.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,
    /// Free-form remark from the employee.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl AttendanceEvent {
    /// Creates an event, deriving its calendar day from `timestamp` in `offset`.
    pub fn new(
        id: EventId,
        employee_id: EmployeeId,
        kind: AttendanceEventType,
        timestamp: DateTime<Utc>,
        offset: FixedOffset,
    ) -> Self {
        Self {
            id,
            employee_id,
            date: calendar_day(timestamp, offset),
            kind,
            timestamp,
            location: None,
            notes: None,
        }
    }

    #[must_use]
    pub fn with_location(mut self, location: Location) -> Self {
        self.location = Some(location);
        self
    }

    #[must_use]
    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }
}

/// Reported position of an attendance action.
///
/// Radius and geofence checks happen before events reach this crate, so the
/// fields are carried verbatim.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Location {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
}

impl Location {
    pub const fn is_empty(&self) -> bool {
        self.label.is_none() && self.latitude.is_none() && self.longitude.is_none()
    }
}

/// An event the validator and aggregator can reason about.
///
/// This trait lets the state machine run over stored events, in-memory logs,
/// and test fixtures alike.
pub trait AttendanceRecord {
    /// Returns the event's action.
    fn kind(&self) -> AttendanceEventType;

    /// Returns the event's timestamp.
    fn timestamp(&self) -> DateTime<Utc>;
}

impl AttendanceRecord for AttendanceEvent {
    fn kind(&self) -> AttendanceEventType {
        self.kind
    }

    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

impl<T: AttendanceRecord> AttendanceRecord for &T {
    fn kind(&self) -> AttendanceEventType {
        (**self).kind()
    }

    fn timestamp(&self) -> DateTime<Utc> {
        (**self).timestamp()
    }
}

/// Returns the calendar day of `timestamp` as seen in `offset`.
pub fn calendar_day(timestamp: DateTime<Utc>, offset: FixedOffset) -> NaiveDate {
    timestamp.with_timezone(&offset).date_naive()
}

/// Builds a fixed UTC offset from a minute count (e.g. `-300` for UTC-5).
pub fn utc_offset(minutes: i32) -> Result<FixedOffset, ValidationError> {
    minutes
        .checked_mul(60)
        .and_then(FixedOffset::east_opt)
        .ok_or(ValidationError::InvalidUtcOffset { minutes })
}

/// Sorts events ascending by timestamp.
///
/// The sort is stable, so events sharing a timestamp keep their submission order.
pub fn sort_chronologically<E: AttendanceRecord>(events: &mut [E]) {
    events.sort_by_key(|event| event.timestamp());
}

/// Returns true if timestamps never decrease along `events`.
pub fn is_chronological<E: AttendanceRecord>(events: &[E]) -> bool {
    events
        .windows(2)
        .all(|pair| pair[0].timestamp() <= pair[1].timestamp())
}
