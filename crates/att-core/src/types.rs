//! Core type definitions with validation.

use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Validation errors for core types.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// The provided value was empty.
    #[error("{field} cannot be empty")]
    Empty { field: &'static str },

    /// Unrecognized attendance event type string.
    #[error("invalid attendance event type: {value}")]
    InvalidEventType { value: String },

    /// Unrecognized attendance status string.
    #[error("invalid attendance status: {value}")]
    InvalidStatus { value: String },

    /// UTC offset outside the representable range.
    #[error("invalid UTC offset: {minutes} minutes")]
    InvalidUtcOffset { minutes: i32 },
}

/// Generates a validated string ID newtype with common trait implementations.
macro_rules! define_string_id {
    (
        $(#[$meta:meta])*
        $name:ident, $field_name:literal
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            /// Creates a new ID after validation.
            pub fn new(id: impl Into<String>) -> Result<Self, ValidationError> {
                let id = id.into();
                if id.is_empty() {
                    return Err(ValidationError::Empty { field: $field_name });
                }
                Ok(Self(id))
            }

            /// Returns the ID as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl TryFrom<String> for $name {
            type Error = ValidationError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                Self::new(value)
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

define_string_id!(
    /// A validated attendance event identifier.
    ///
    /// Event IDs must be non-empty strings. Uniqueness is enforced by the store.
    EventId, "event ID"
);

define_string_id!(
    /// A validated employee identifier.
    EmployeeId, "employee ID"
);

define_string_id!(
    /// A validated tenant identifier.
    ///
    /// Every event and summary is scoped to exactly one tenant.
    TenantId, "tenant ID"
);

/// The scope of both validation ordering and summary identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DayKey {
    pub tenant: TenantId,
    pub employee: EmployeeId,
    pub date: NaiveDate,
}

impl DayKey {
    pub const fn new(tenant: TenantId, employee: EmployeeId, date: NaiveDate) -> Self {
        Self {
            tenant,
            employee,
            date,
        }
    }
}

impl fmt::Display for DayKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.tenant, self.employee, self.date)
    }
}
