//! Event sequence validation.
//!
//! Decides whether a candidate event is a legal continuation of the events
//! already accepted for one employee and day.
//!
//! # State Machine
//!
//! ```text
//! NotStarted --checkin--> CheckedIn --break_start--> OnBreak
//!                             ^                         |
//!                             +-------break_end---------+
//! CheckedIn | OnBreak --checkout--> CheckedOut (terminal)
//! ```
//!
//! The state is never stored. [`DayState::derive`] folds over the accepted
//! events every time, so the decision can be replayed from the event log alone.

use serde::Serialize;
use thiserror::Error;

use crate::event::AttendanceRecord;
use crate::event_type::AttendanceEventType;

/// Why a candidate event was rejected.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SequenceError {
    #[error("first action of the day must be check-in")]
    FirstActionMustBeCheckIn,

    #[error("already checked in today")]
    AlreadyCheckedIn,

    #[error("must check in first")]
    MustCheckInFirst,

    #[error("already checked out today")]
    AlreadyCheckedOut,

    #[error("already on break")]
    AlreadyOnBreak,

    #[error("not on break")]
    NotOnBreak,
}

/// Where a worker's day currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DayPhase {
    NotStarted,
    CheckedIn,
    OnBreak,
    CheckedOut,
}

impl DayPhase {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::NotStarted => "not started",
            Self::CheckedIn => "checked in",
            Self::OnBreak => "on break",
            Self::CheckedOut => "checked out",
        }
    }
}

/// Facts about a day's accepted events that the transition table needs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DayState {
    event_count: usize,
    checked_in: bool,
    checked_out: bool,
    on_break: bool,
}

impl DayState {
    /// Folds over the day's accepted events.
    pub fn derive<E: AttendanceRecord>(events: &[E]) -> Self {
        events.iter().fold(Self::default(), |state, event| {
            let kind = event.kind();
            Self {
                event_count: state.event_count + 1,
                checked_in: state.checked_in || kind == AttendanceEventType::CheckIn,
                checked_out: state.checked_out || kind == AttendanceEventType::CheckOut,
                on_break: kind == AttendanceEventType::BreakStart,
            }
        })
    }

    pub const fn phase(&self) -> DayPhase {
        if self.checked_out {
            DayPhase::CheckedOut
        } else if self.on_break {
            DayPhase::OnBreak
        } else if self.checked_in {
            DayPhase::CheckedIn
        } else {
            DayPhase::NotStarted
        }
    }

    /// Applies the transition table to `candidate`.
    pub const fn check(&self, candidate: AttendanceEventType) -> Result<(), SequenceError> {
        if self.event_count == 0 {
            return match candidate {
                AttendanceEventType::CheckIn => Ok(()),
                _ => Err(SequenceError::FirstActionMustBeCheckIn),
            };
        }

        match candidate {
            AttendanceEventType::CheckIn => {
                if self.checked_in {
                    return Err(SequenceError::AlreadyCheckedIn);
                }
            }
            AttendanceEventType::CheckOut => {
                if !self.checked_in {
                    return Err(SequenceError::MustCheckInFirst);
                }
                if self.checked_out {
                    return Err(SequenceError::AlreadyCheckedOut);
                }
            }
            AttendanceEventType::BreakStart => {
                if self.on_break {
                    return Err(SequenceError::AlreadyOnBreak);
                }
                if self.checked_out {
                    return Err(SequenceError::AlreadyCheckedOut);
                }
                if !self.checked_in {
                    return Err(SequenceError::MustCheckInFirst);
                }
            }
            AttendanceEventType::BreakEnd => {
                if !self.on_break {
                    return Err(SequenceError::NotOnBreak);
                }
            }
        }
        Ok(())
    }
}

/// Decides whether `candidate` may follow `today`.
///
/// `today` must hold the employee's previously accepted events for the day in
/// ascending order. The candidate's timestamp is assumed not to precede the
/// last accepted event.
pub fn validate<E: AttendanceRecord>(
    today: &[E],
    candidate: AttendanceEventType,
) -> Result<(), SequenceError> {
    DayState::derive(today).check(candidate)
}
