//! Append-only event log for one day key.

use chrono::{DateTime, NaiveDate, Utc};
use thiserror::Error;

use crate::event::{AttendanceEvent, sort_chronologically};
use crate::summary::{AttendancePolicy, DailySummary, aggregate};
use crate::validator::{DayPhase, DayState, SequenceError};

/// Why an event could not be appended to a [`DayLog`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AppendError {
    /// The event is not a legal continuation of the day.
    #[error(transparent)]
    Rejected(#[from] SequenceError),

    /// The event's timestamp precedes the last accepted event.
    #[error("event at {candidate} precedes the last accepted event at {last}")]
    OutOfOrder {
        last: DateTime<Utc>,
        candidate: DateTime<Utc>,
    },

    /// The event belongs to a different calendar day.
    #[error("event dated {found} does not belong to {expected}")]
    WrongDay { expected: NaiveDate, found: NaiveDate },
}

/// Accepted events for one employee and day, in authoritative order.
///
/// Events are only ever appended. The day's phase and summary are views
/// computed from the list.
#[derive(Debug, Clone, PartialEq)]
pub struct DayLog {
    date: NaiveDate,
    events: Vec<AttendanceEvent>,
}

impl DayLog {
    pub const fn new(date: NaiveDate) -> Self {
        Self {
            date,
            events: Vec::new(),
        }
    }

    /// Wraps previously accepted events, sorting them by timestamp.
    ///
    /// `events` must be in submission order so that ties keep it.
    pub fn from_accepted(date: NaiveDate, mut events: Vec<AttendanceEvent>) -> Self {
        sort_chronologically(&mut events);
        Self { date, events }
    }

    pub const fn date(&self) -> NaiveDate {
        self.date
    }

    pub fn events(&self) -> &[AttendanceEvent] {
        &self.events
    }

    pub fn last(&self) -> Option<&AttendanceEvent> {
        self.events.last()
    }

    pub fn state(&self) -> DayState {
        DayState::derive(&self.events)
    }

    pub fn phase(&self) -> DayPhase {
        self.state().phase()
    }

    /// Checks `event` against the log without appending it.
    pub fn check(&self, event: &AttendanceEvent) -> Result<(), AppendError> {
        if event.date != self.date {
            return Err(AppendError::WrongDay {
                expected: self.date,
                found: event.date,
            });
        }
        if let Some(last) = self.events.last() {
            if event.timestamp < last.timestamp {
                return Err(AppendError::OutOfOrder {
                    last: last.timestamp,
                    candidate: event.timestamp,
                });
            }
        }
        self.state().check(event.kind)?;
        Ok(())
    }

    /// Validates and appends `event`.
    pub fn try_append(&mut self, event: AttendanceEvent) -> Result<&AttendanceEvent, AppendError> {
        self.check(&event)?;
        self.events.push(event);
        Ok(&self.events[self.events.len() - 1])
    }

    pub fn summarize(&self, policy: &AttendancePolicy) -> DailySummary {
        aggregate(&self.events, policy)
    }
}
