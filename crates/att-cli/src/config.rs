//! Configuration loading and management.

use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use att_core::{AttendancePolicy, TenantId, utc_offset};
use chrono::{NaiveTime, TimeDelta};
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};

/// A grace period longer than a day would make every check-in on time.
const MAX_LATE_THRESHOLD_MINUTES: i64 = 24 * 60;

/// Application configuration.
#[derive(Clone, Serialize, Deserialize)]
pub struct Config {
    /// Path to the database file.
    pub database_path: PathBuf,

    /// Tenant used when `--tenant` is not given.
    pub tenant_id: String,

    /// Attendance rules applied when deriving summaries.
    pub policy: PolicyConfig,
}

/// Attendance rules as written in the config file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyConfig {
    /// Local start of the working day, `HH:MM`.
    pub expected_start_time: String,

    /// Minutes after the start before a check-in counts as late.
    pub late_threshold_minutes: i64,

    /// Offset from UTC, in minutes, used for local times and calendar days.
    pub utc_offset_minutes: i32,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            expected_start_time: "09:00".to_string(),
            late_threshold_minutes: 15,
            utc_offset_minutes: 0,
        }
    }
}

impl PolicyConfig {
    /// Converts the configured values into the policy the aggregator applies.
    pub fn to_policy(&self) -> Result<AttendancePolicy> {
        let expected_start = NaiveTime::parse_from_str(&self.expected_start_time, "%H:%M")
            .with_context(|| {
                format!(
                    "invalid policy.expected_start_time {:?}, expected HH:MM",
                    self.expected_start_time
                )
            })?;
        if !(0..=MAX_LATE_THRESHOLD_MINUTES).contains(&self.late_threshold_minutes) {
            anyhow::bail!(
                "policy.late_threshold_minutes must be between 0 and {MAX_LATE_THRESHOLD_MINUTES}, got {}",
                self.late_threshold_minutes
            );
        }
        let late_threshold = TimeDelta::minutes(self.late_threshold_minutes);
        let offset = utc_offset(self.utc_offset_minutes)?;
        Ok(AttendancePolicy::new(expected_start, late_threshold, offset))
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("database_path", &self.database_path)
            .field("tenant_id", &self.tenant_id)
            .field("policy", &self.policy)
            .finish()
    }
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = dirs_data_path().unwrap_or_else(|| PathBuf::from("."));
        Self {
            database_path: data_dir.join("att.db"),
            tenant_id: "default".to_string(),
            policy: PolicyConfig::default(),
        }
    }
}

impl Config {
    /// Loads configuration, optionally from a specific file.
    #[expect(
        clippy::result_large_err,
        reason = "figment::Error is large but only returned at startup"
    )]
    pub fn load_from(config_path: Option<&Path>) -> Result<Self, figment::Error> {
        Self::figment(config_path).extract()
    }

    fn figment(config_path: Option<&Path>) -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        // Load from default config location
        if let Some(config_dir) = dirs_config_path() {
            figment = figment.merge(Toml::file(config_dir.join("config.toml")));
        }

        // Load from specified config file
        if let Some(path) = config_path {
            figment = figment.merge(Toml::file(path));
        }

        // ATT_POLICY__LATE_THRESHOLD_MINUTES sets policy.late_threshold_minutes
        figment.merge(Env::prefixed("ATT_").split("__"))
    }

    /// The configured tenant, validated.
    pub fn tenant(&self) -> Result<TenantId> {
        TenantId::new(self.tenant_id.as_str()).context("invalid tenant_id")
    }
}

/// Returns the platform-specific config directory for att.
fn dirs_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("att"))
}

/// Returns the platform-specific data directory for att.
///
/// On Linux: `~/.local/share/att`
pub fn dirs_data_path() -> Option<PathBuf> {
    dirs::data_dir().map(|p| p.join("att"))
}
