//! Attendance event type enum as the single source of truth for type strings.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::types::ValidationError;

/// A work-presence action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttendanceEventType {
    CheckIn,
    CheckOut,
    BreakStart,
    BreakEnd,
}

impl AttendanceEventType {
    /// All variants in day order.
    pub const ALL: [Self; 4] = [Self::CheckIn, Self::BreakStart, Self::BreakEnd, Self::CheckOut];

    /// String representation for database storage.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::CheckIn => "checkin",
            Self::CheckOut => "checkout",
            Self::BreakStart => "break_start",
            Self::BreakEnd => "break_end",
        }
    }
}

impl fmt::Display for AttendanceEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for AttendanceEventType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "checkin" | "check_in" => Ok(Self::CheckIn),
            "checkout" | "check_out" => Ok(Self::CheckOut),
            "break_start" => Ok(Self::BreakStart),
            "break_end" => Ok(Self::BreakEnd),
            _ => Err(ValidationError::InvalidEventType {
                value: s.to_string(),
            }),
        }
    }
}

impl Serialize for AttendanceEventType {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for AttendanceEventType {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
