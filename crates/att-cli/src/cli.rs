//! Command-line argument definitions.

use std::path::PathBuf;

use att_core::AttendanceEventType;
use clap::{Parser, Subcommand, ValueEnum};

/// Attendance tracker.
///
/// Records check-in, break and check-out events per employee and day, rejects
/// illegal sequences, and derives daily summaries.
#[derive(Debug, Parser)]
#[command(name = "att", version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to config file.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Tenant to operate on (overrides `tenant_id` from config).
    #[arg(long, global = true)]
    pub tenant: Option<String>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Record an attendance event.
    Record {
        /// The kind of event.
        #[arg(value_enum)]
        kind: EventKind,

        /// Employee the event belongs to.
        #[arg(short, long)]
        employee: String,

        /// When it happened: RFC 3339, HH:MM today, or relative ("10 minutes ago").
        #[arg(long)]
        at: Option<String>,

        /// Free-form location label.
        #[arg(long)]
        location: Option<String>,

        /// Latitude of the location.
        #[arg(long, requires = "lon", allow_negative_numbers = true)]
        lat: Option<f64>,

        /// Longitude of the location.
        #[arg(long, requires = "lat", allow_negative_numbers = true)]
        lon: Option<f64>,

        /// Free-form remark stored with the event.
        #[arg(long)]
        notes: Option<String>,

        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Print events as JSONL.
    ///
    /// With only `--employee` (and optionally `--date`), prints that day's log in
    /// order. Any of `--from`, `--to`, `--type`, `--page` or `--limit` lists the
    /// tenant's matching events across days instead, newest first.
    Events {
        /// Employee whose events to print.
        #[arg(short, long)]
        employee: Option<String>,

        /// Day to read (YYYY-MM-DD, today, yesterday). Defaults to today.
        #[arg(
            short,
            long,
            requires = "employee",
            conflicts_with_all = ["from", "to", "kind", "page", "limit"]
        )]
        date: Option<String>,

        /// Earliest event time, inclusive: RFC 3339, HH:MM today, or relative.
        #[arg(long)]
        from: Option<String>,

        /// Latest event time, inclusive: RFC 3339, HH:MM today, or relative.
        #[arg(long)]
        to: Option<String>,

        /// Only events of this kind.
        #[arg(long = "type", value_enum)]
        kind: Option<EventKind>,

        /// Page to print, starting at 1.
        #[arg(long)]
        page: Option<u32>,

        /// Events per page (default 20, at most 100).
        #[arg(long)]
        limit: Option<u32>,
    },

    /// Print one event by id as JSON.
    Event {
        /// The event id.
        id: String,
    },

    /// Show where an employee's day stands.
    Status {
        #[arg(short, long)]
        employee: String,

        /// Day to read (YYYY-MM-DD, today, yesterday). Defaults to today.
        #[arg(short, long)]
        date: Option<String>,
    },

    /// Show the stored daily summary.
    Summary {
        /// Employee to show. Lists every employee when omitted.
        #[arg(short, long)]
        employee: Option<String>,

        /// Day to read (YYYY-MM-DD, today, yesterday). Defaults to today.
        #[arg(short, long)]
        date: Option<String>,

        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Recompute daily summaries from the event log.
    Recompute {
        /// Employee to recompute. Recomputes every employee with events when omitted.
        #[arg(short, long)]
        employee: Option<String>,

        /// Day to recompute (YYYY-MM-DD, today, yesterday). Defaults to today.
        #[arg(short, long)]
        date: Option<String>,
    },

    /// Show attendance statistics for a day.
    Stats {
        /// Day to read (YYYY-MM-DD, today, yesterday). Defaults to today.
        #[arg(short, long)]
        date: Option<String>,

        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },
}

/// Event kinds as spelled on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum EventKind {
    #[value(name = "checkin", alias = "check-in")]
    CheckIn,
    #[value(name = "checkout", alias = "check-out")]
    CheckOut,
    BreakStart,
    BreakEnd,
}

impl From<EventKind> for AttendanceEventType {
    fn from(kind: EventKind) -> Self {
        match kind {
            EventKind::CheckIn => Self::CheckIn,
            EventKind::CheckOut => Self::CheckOut,
            EventKind::BreakStart => Self::BreakStart,
            EventKind::BreakEnd => Self::BreakEnd,
        }
    }
}
