//! Core domain logic for attendance tracking.
//!
//! This crate contains the fundamental types and logic for:
//! - Validation: deciding whether an event may follow a day's accepted events
//! - Aggregation: deriving a daily summary (hours, status) from those events
//! - Statistics: per-day headline numbers across employees
//!
//! Everything here is pure. Persistence, tenant scoping and serialization of
//! writes belong to the storage crate.

mod day_log;
pub mod event;
pub mod event_type;
mod stats;
pub mod summary;
pub mod types;
pub mod validator;

pub use day_log::{AppendError, DayLog};
pub use event::{AttendanceEvent, AttendanceRecord, Location, calendar_day, utc_offset};
pub use event_type::AttendanceEventType;
pub use stats::AttendanceStats;
pub use summary::{AttendancePolicy, AttendanceStatus, DailySummary, aggregate, aggregate_days};
pub use types::{DayKey, EmployeeId, EventId, TenantId, ValidationError};
pub use validator::{DayPhase, DayState, SequenceError, validate};
