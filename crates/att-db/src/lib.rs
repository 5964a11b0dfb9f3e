//! Storage layer for attendance tracking.
//!
//! Provides persistence for attendance events and daily summaries using `rusqlite`.
//!
//! # Thread Safety
//!
//! The [`Database`] type wraps a `rusqlite::Connection`, which is `Send` but not `Sync`.
//! Open one `Database` per thread (or per process); they coordinate through SQLite's
//! file locks.
//!
//! # Write Serialization
//!
//! Accepting an event is "read the day's events, validate, append". Two writers that
//! both read before either appends could both pass validation (e.g. two check-ins).
//! [`Database::record_event`] therefore runs the whole sequence inside a
//! `BEGIN IMMEDIATE` transaction, which takes the database write lock before the
//! read. Writers for the same day key queue behind each other for up to
//! [`BUSY_TIMEOUT`] instead of racing.
//!
//! # Schema
//!
//! ## Timestamp Format
//!
//! Timestamps are stored as TEXT in ISO 8601 format with millisecond precision
//! (e.g., `2024-01-15T10:30:00.000Z`). Fixed width keeps lexicographic and
//! chronological ordering identical. Dates are stored as `YYYY-MM-DD`.
//!
//! ## Event Ordering
//!
//! `seq` records submission order. Day queries order by `timestamp, seq`, which is
//! the authoritative event order: ascending time, ties broken by submission.
//!
//! ## Immutability
//!
//! Triggers abort any `UPDATE` or `DELETE` on `attendance_events`. Summaries are
//! derived data and are replaced wholesale on every recomputation.

use std::path::Path;
use std::time::Duration;

use att_core::{
    AppendError, AttendanceEvent, AttendanceEventType, AttendancePolicy, AttendanceStats,
    AttendanceStatus, DailySummary, DayKey, DayLog, EmployeeId, EventId, Location, TenantId,
    ValidationError, aggregate, aggregate_days, calendar_day,
};
use chrono::{DateTime, NaiveDate, SecondsFormat, SubsecRound, Utc};
use rusqlite::types::Value;
use rusqlite::{Connection, OptionalExtension, Row, TransactionBehavior, params, params_from_iter};
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

/// How long a writer waits for another writer's transaction before failing.
pub const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Page size used when a query does not ask for one.
pub const DEFAULT_PAGE_LIMIT: u32 = 20;

/// Largest page a query may request.
pub const MAX_PAGE_LIMIT: u32 = 100;

/// Database errors.
#[derive(Debug, Error)]
pub enum DbError {
    /// An error from the underlying database.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    /// A stored value failed domain validation.
    #[error("invalid stored value: {0}")]
    Validation(#[from] ValidationError),
    /// Failed to parse a stored timestamp.
    #[error("invalid timestamp for event {event_id}: {timestamp}")]
    TimestampParse {
        event_id: String,
        timestamp: String,
        #[source]
        source: chrono::ParseError,
    },
    /// A stored row could not be turned back into a domain value.
    #[error("invalid event data for {event_id}: {message}")]
    InvalidEventData { event_id: String, message: String },
}

/// Why submitting an event failed.
///
/// A rejection means the event is illegal for the day and the caller should
/// report it. A store failure means nothing is known about legality.
#[derive(Debug, Error)]
pub enum SubmitError {
    #[error("event rejected")]
    Rejected(#[from] AppendError),
    #[error(transparent)]
    Store(#[from] DbError),
}

impl SubmitError {
    pub const fn is_rejection(&self) -> bool {
        matches!(self, Self::Rejected(_))
    }
}

impl From<rusqlite::Error> for SubmitError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Store(DbError::Sqlite(err))
    }
}

/// Database connection wrapper.
///
/// See the [module documentation](self) for thread safety considerations.
pub struct Database {
    conn: Connection,
}

/// An event as submitted, before it has an id or a calendar day.
#[derive(Debug, Clone, PartialEq)]
pub struct NewEvent {
    pub employee: EmployeeId,
    pub kind: AttendanceEventType,
    pub timestamp: DateTime<Utc>,
    pub location: Option<Location>,
    pub notes: Option<String>,
}

impl NewEvent {
    pub const fn new(
        employee: EmployeeId,
        kind: AttendanceEventType,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            employee,
            kind,
            timestamp,
            location: None,
            notes: None,
        }
    }
}

/// Result of an accepted submission.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Recorded {
    pub key: DayKey,
    pub event: AttendanceEvent,
    /// The refreshed summary, present when the event closed the day.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<DailySummary>,
}

/// Criteria for listing a tenant's events across days.
///
/// Every criterion is optional. Time bounds are inclusive. Pages count from 1.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventFilter {
    pub employee: Option<EmployeeId>,
    pub kind: Option<AttendanceEventType>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

impl EventFilter {
    /// The requested page, at least 1.
    pub fn page(&self) -> u32 {
        self.page.unwrap_or(1).max(1)
    }

    /// The requested page size, defaulted and capped at [`MAX_PAGE_LIMIT`].
    pub fn limit(&self) -> u32 {
        match self.limit {
            None | Some(0) => DEFAULT_PAGE_LIMIT,
            Some(limit) => limit.min(MAX_PAGE_LIMIT),
        }
    }
}

/// One page of events, newest first.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventPage {
    pub events: Vec<AttendanceEvent>,
    /// Events matching the filter across all pages.
    pub total: u64,
    pub page: u32,
    pub limit: u32,
}

/// A summary row with its day key.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoredSummary {
    pub key: DayKey,
    #[serde(flatten)]
    pub summary: DailySummary,
    pub updated_at: DateTime<Utc>,
}

impl Database {
    /// Opens a database at the given path, creating it if necessary.
    ///
    /// The database schema is automatically initialized on first open.
    pub fn open(path: &Path) -> Result<Self, DbError> {
        let conn = Connection::open(path)?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Opens an in-memory database.
    ///
    /// Useful for testing. The database is destroyed when the connection closes.
    pub fn open_in_memory() -> Result<Self, DbError> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Initializes the database schema.
    ///
    /// This is idempotent - safe to call on an already-initialized database.
    fn init(&self) -> Result<(), DbError> {
        self.conn.busy_timeout(BUSY_TIMEOUT)?;
        self.conn.execute_batch(
            "
            -- Append-only log of accepted attendance events
            -- seq: submission order, breaks timestamp ties
            -- type: checkin | checkout | break_start | break_end
            CREATE TABLE IF NOT EXISTS attendance_events (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                id TEXT NOT NULL UNIQUE,
                tenant_id TEXT NOT NULL,
                employee_id TEXT NOT NULL,
                date TEXT NOT NULL,
                type TEXT NOT NULL,
                timestamp TEXT NOT NULL,
                location TEXT,
                latitude REAL,
                longitude REAL,
                notes TEXT
            );

            CREATE INDEX IF NOT EXISTS idx_attendance_events_day
                ON attendance_events(tenant_id, employee_id, date, timestamp);
            CREATE INDEX IF NOT EXISTS idx_attendance_events_date
                ON attendance_events(tenant_id, date);
            CREATE INDEX IF NOT EXISTS idx_attendance_events_timestamp
                ON attendance_events(tenant_id, timestamp);

            CREATE TRIGGER IF NOT EXISTS attendance_events_no_update
            BEFORE UPDATE ON attendance_events
            BEGIN
                SELECT RAISE(ABORT, 'attendance events are immutable');
            END;

            CREATE TRIGGER IF NOT EXISTS attendance_events_no_delete
            BEFORE DELETE ON attendance_events
            BEGIN
                SELECT RAISE(ABORT, 'attendance events are immutable');
            END;

            -- One derived row per day key, replaced on every recomputation
            CREATE TABLE IF NOT EXISTS attendance_summaries (
                tenant_id TEXT NOT NULL,
                employee_id TEXT NOT NULL,
                date TEXT NOT NULL,
                checkin_time TEXT,
                checkout_time TEXT,
                work_hours REAL NOT NULL DEFAULT 0,
                break_hours REAL NOT NULL DEFAULT 0,
                overtime_hours REAL NOT NULL DEFAULT 0,
                status TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                PRIMARY KEY (tenant_id, employee_id, date)
            );

            CREATE INDEX IF NOT EXISTS idx_attendance_summaries_date
                ON attendance_summaries(tenant_id, date);
            ",
        )?;
        Ok(())
    }

    /// Lists a day's accepted events in authoritative order.
    pub fn day_events(&self, key: &DayKey) -> Result<Vec<AttendanceEvent>, DbError> {
        query_day_events(&self.conn, key)
    }

    /// Looks up one event by id within a tenant.
    pub fn event(&self, tenant: &TenantId, id: &EventId) -> Result<Option<AttendanceEvent>, DbError> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {EVENT_COLUMNS} FROM attendance_events WHERE tenant_id = ? AND id = ?"
        ))?;
        let row = stmt
            .query_row(params![tenant.as_str(), id.as_str()], EventRow::from_row)
            .optional()?;
        row.map(EventRow::into_event).transpose()
    }

    /// Lists a tenant's events matching `filter`, newest first, one page at a time.
    pub fn events(&self, tenant: &TenantId, filter: &EventFilter) -> Result<EventPage, DbError> {
        let mut clauses = vec!["tenant_id = ?"];
        let mut args = vec![Value::Text(tenant.as_str().to_string())];
        if let Some(employee) = &filter.employee {
            clauses.push("employee_id = ?");
            args.push(Value::Text(employee.as_str().to_string()));
        }
        if let Some(kind) = filter.kind {
            clauses.push("type = ?");
            args.push(Value::Text(kind.as_str().to_string()));
        }
        if let Some(from) = filter.from {
            clauses.push("timestamp >= ?");
            args.push(Value::Text(format_timestamp(from.trunc_subsecs(3))));
        }
        if let Some(to) = filter.to {
            clauses.push("timestamp <= ?");
            args.push(Value::Text(format_timestamp(to.trunc_subsecs(3))));
        }
        let where_clause = clauses.join(" AND ");

        let total: i64 = self.conn.query_row(
            &format!("SELECT COUNT(*) FROM attendance_events WHERE {where_clause}"),
            params_from_iter(args.iter()),
            |row| row.get(0),
        )?;

        let page = filter.page();
        let limit = filter.limit();
        args.push(Value::Integer(i64::from(limit)));
        args.push(Value::Integer(i64::from(page - 1) * i64::from(limit)));

        let mut stmt = self.conn.prepare(&format!(
            "
            SELECT {EVENT_COLUMNS}
            FROM attendance_events
            WHERE {where_clause}
            ORDER BY timestamp DESC, seq DESC
            LIMIT ? OFFSET ?
            "
        ))?;
        let rows = stmt.query_map(params_from_iter(args.iter()), EventRow::from_row)?;
        let mut events = Vec::new();
        for row in rows {
            events.push(row?.into_event()?);
        }

        tracing::debug!(%tenant, total, page, limit, returned = events.len(), "listed events");
        Ok(EventPage {
            events,
            total: total.unsigned_abs(),
            page,
            limit,
        })
    }

    /// Loads a day's accepted events as a [`DayLog`].
    pub fn day_log(&self, key: &DayKey) -> Result<DayLog, DbError> {
        Ok(DayLog::from_accepted(key.date, self.day_events(key)?))
    }

    /// Validates and appends an event, refreshing the summary on checkout.
    ///
    /// The event's calendar day is derived from its timestamp in the policy's
    /// offset. Timestamps are truncated to milliseconds, the stored precision.
    pub fn record_event(
        &mut self,
        tenant: &TenantId,
        new: NewEvent,
        policy: &AttendancePolicy,
    ) -> Result<Recorded, SubmitError> {
        let timestamp = new.timestamp.trunc_subsecs(3);
        let date = calendar_day(timestamp, policy.utc_offset);
        let key = DayKey::new(tenant.clone(), new.employee.clone(), date);
        let id = EventId::new(Uuid::new_v4().to_string()).map_err(DbError::from)?;
        let mut event = AttendanceEvent::new(id, new.employee, new.kind, timestamp, policy.utc_offset);
        if let Some(location) = new.location.filter(|location| !location.is_empty()) {
            event = event.with_location(location);
        }
        if let Some(notes) = new.notes.filter(|notes| !notes.trim().is_empty()) {
            event = event.with_notes(notes);
        }

        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        let mut log = DayLog::from_accepted(date, query_day_events(&tx, &key)?);

        if let Err(err) = log.try_append(event.clone()) {
            tracing::warn!(%key, kind = %event.kind, error = %err, "event rejected");
            return Err(err.into());
        }
        insert_event(&tx, &key, &event)?;

        let summary = if event.kind == AttendanceEventType::CheckOut {
            let summary = log.summarize(policy);
            upsert_summary_row(&tx, &key, &summary, Utc::now())?;
            Some(summary)
        } else {
            None
        };
        tx.commit()?;

        tracing::info!(%key, event_id = %event.id, kind = %event.kind, "event recorded");
        Ok(Recorded {
            key,
            event,
            summary,
        })
    }

    /// Replaces the summary stored for `key`.
    pub fn upsert_summary(&self, key: &DayKey, summary: &DailySummary) -> Result<(), DbError> {
        upsert_summary_row(&self.conn, key, summary, Utc::now())
    }

    /// Returns the stored summary for `key`, if one has been computed.
    pub fn summary(&self, key: &DayKey) -> Result<Option<StoredSummary>, DbError> {
        let mut stmt = self.conn.prepare(
            "
            SELECT employee_id, date, checkin_time, checkout_time,
                   work_hours, break_hours, overtime_hours, status, updated_at
            FROM attendance_summaries
            WHERE tenant_id = ? AND employee_id = ? AND date = ?
            ",
        )?;
        let row = stmt
            .query_row(
                params![key.tenant.as_str(), key.employee.as_str(), format_date(key.date)],
                SummaryRow::from_row,
            )
            .optional()?;
        row.map(|row| row.into_stored(&key.tenant)).transpose()
    }

    /// Lists every stored summary for a tenant's day, ordered by employee.
    pub fn summaries_for_date(
        &self,
        tenant: &TenantId,
        date: NaiveDate,
    ) -> Result<Vec<StoredSummary>, DbError> {
        let mut stmt = self.conn.prepare(
            "
            SELECT employee_id, date, checkin_time, checkout_time,
                   work_hours, break_hours, overtime_hours, status, updated_at
            FROM attendance_summaries
            WHERE tenant_id = ? AND date = ?
            ORDER BY employee_id ASC
            ",
        )?;
        let rows = stmt.query_map(
            params![tenant.as_str(), format_date(date)],
            SummaryRow::from_row,
        )?;
        let mut summaries = Vec::new();
        for row in rows {
            summaries.push(row?.into_stored(tenant)?);
        }
        Ok(summaries)
    }

    /// Recomputes and stores the summary for one day key.
    pub fn recompute_summary(
        &mut self,
        key: &DayKey,
        policy: &AttendancePolicy,
    ) -> Result<DailySummary, DbError> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        let events = query_day_events(&tx, key)?;
        let summary = aggregate(&events, policy);
        upsert_summary_row(&tx, key, &summary, Utc::now())?;
        tx.commit()?;

        tracing::debug!(%key, event_count = events.len(), status = %summary.status, "summary recomputed");
        Ok(summary)
    }

    /// Recomputes summaries for every employee with events on a tenant's day.
    pub fn recompute_date(
        &mut self,
        tenant: &TenantId,
        date: NaiveDate,
        policy: &AttendancePolicy,
    ) -> Result<Vec<(EmployeeId, DailySummary)>, DbError> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        let days = query_date_events(&tx, tenant, date)?;
        let summaries = aggregate_days(&days, policy);
        let now = Utc::now();
        for (employee, summary) in &summaries {
            let key = DayKey::new(tenant.clone(), employee.clone(), date);
            upsert_summary_row(&tx, &key, summary, now)?;
        }
        tx.commit()?;

        tracing::debug!(%tenant, %date, employees = summaries.len(), "date recomputed");
        Ok(summaries)
    }

    /// Computes headline statistics from a tenant's stored summaries for a day.
    pub fn attendance_stats(
        &self,
        tenant: &TenantId,
        date: NaiveDate,
    ) -> Result<AttendanceStats, DbError> {
        let stored = self.summaries_for_date(tenant, date)?;
        Ok(AttendanceStats::from_summaries(
            stored.iter().map(|row| &row.summary),
        ))
    }
}

const EVENT_COLUMNS: &str =
    "id, employee_id, date, type, timestamp, location, latitude, longitude, notes";

#[derive(Debug)]
struct EventRow {
    id: String,
    employee_id: String,
    date: String,
    kind: String,
    timestamp: String,
    location: Option<String>,
    latitude: Option<f64>,
    longitude: Option<f64>,
    notes: Option<String>,
}

impl EventRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            employee_id: row.get(1)?,
            date: row.get(2)?,
            kind: row.get(3)?,
            timestamp: row.get(4)?,
            location: row.get(5)?,
            latitude: row.get(6)?,
            longitude: row.get(7)?,
            notes: row.get(8)?,
        })
    }

    fn into_event(self) -> Result<AttendanceEvent, DbError> {
        let kind = self
            .kind
            .parse()
            .map_err(|err: ValidationError| DbError::InvalidEventData {
                event_id: self.id.clone(),
                message: err.to_string(),
            })?;
        let timestamp = parse_timestamp(&self.timestamp, &self.id)?;
        let date = parse_date(&self.date, &self.id)?;
        let location = Location {
            label: self.location,
            latitude: self.latitude,
            longitude: self.longitude,
        };
        Ok(AttendanceEvent {
            id: EventId::new(self.id)?,
            employee_id: EmployeeId::new(self.employee_id)?,
            date,
            kind,
            timestamp,
            location: (!location.is_empty()).then_some(location),
            notes: self.notes,
        })
    }
}

#[derive(Debug)]
struct SummaryRow {
    employee_id: String,
    date: String,
    checkin_time: Option<String>,
    checkout_time: Option<String>,
    work_hours: f64,
    break_hours: f64,
    overtime_hours: f64,
    status: String,
    updated_at: String,
}

impl SummaryRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            employee_id: row.get(0)?,
            date: row.get(1)?,
            checkin_time: row.get(2)?,
            checkout_time: row.get(3)?,
            work_hours: row.get(4)?,
            break_hours: row.get(5)?,
            overtime_hours: row.get(6)?,
            status: row.get(7)?,
            updated_at: row.get(8)?,
        })
    }

    fn into_stored(self, tenant: &TenantId) -> Result<StoredSummary, DbError> {
        let label = format!("summary {}/{}", self.employee_id, self.date);
        let date = parse_date(&self.date, &label)?;
        let status: AttendanceStatus = self.status.parse()?;
        let checkin_time = self
            .checkin_time
            .map(|ts| parse_timestamp(&ts, &label))
            .transpose()?;
        let checkout_time = self
            .checkout_time
            .map(|ts| parse_timestamp(&ts, &label))
            .transpose()?;
        let updated_at = parse_timestamp(&self.updated_at, &label)?;
        Ok(StoredSummary {
            key: DayKey::new(tenant.clone(), EmployeeId::new(self.employee_id)?, date),
            summary: DailySummary {
                checkin_time,
                checkout_time,
                work_hours: self.work_hours,
                break_hours: self.break_hours,
                overtime_hours: self.overtime_hours,
                status,
            },
            updated_at,
        })
    }
}

fn query_day_events(conn: &Connection, key: &DayKey) -> Result<Vec<AttendanceEvent>, DbError> {
    let mut stmt = conn.prepare(&format!(
        "
        SELECT {EVENT_COLUMNS}
        FROM attendance_events
        WHERE tenant_id = ? AND employee_id = ? AND date = ?
        ORDER BY timestamp ASC, seq ASC
        "
    ))?;
    let rows = stmt.query_map(
        params![key.tenant.as_str(), key.employee.as_str(), format_date(key.date)],
        EventRow::from_row,
    )?;
    let mut events = Vec::new();
    for row in rows {
        events.push(row?.into_event()?);
    }
    Ok(events)
}

/// Loads a tenant's events for one date, grouped by employee.
fn query_date_events(
    conn: &Connection,
    tenant: &TenantId,
    date: NaiveDate,
) -> Result<Vec<(EmployeeId, Vec<AttendanceEvent>)>, DbError> {
    let mut stmt = conn.prepare(&format!(
        "
        SELECT {EVENT_COLUMNS}
        FROM attendance_events
        WHERE tenant_id = ? AND date = ?
        ORDER BY employee_id ASC, timestamp ASC, seq ASC
        "
    ))?;
    let rows = stmt.query_map(params![tenant.as_str(), format_date(date)], EventRow::from_row)?;
    let mut days: Vec<(EmployeeId, Vec<AttendanceEvent>)> = Vec::new();
    for row in rows {
        let event = row?.into_event()?;
        match days.last_mut() {
            Some((employee, events)) if *employee == event.employee_id => events.push(event),
            _ => days.push((event.employee_id.clone(), vec![event])),
        }
    }
    Ok(days)
}

fn insert_event(conn: &Connection, key: &DayKey, event: &AttendanceEvent) -> Result<(), DbError> {
    let location = event.location.as_ref();
    conn.execute(
        "
        INSERT INTO attendance_events
        (id, tenant_id, employee_id, date, type, timestamp, location, latitude, longitude, notes)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ",
        params![
            event.id.as_str(),
            key.tenant.as_str(),
            key.employee.as_str(),
            format_date(key.date),
            event.kind.as_str(),
            format_timestamp(event.timestamp),
            location.and_then(|l| l.label.as_deref()),
            location.and_then(|l| l.latitude),
            location.and_then(|l| l.longitude),
            event.notes.as_deref(),
        ],
    )?;
    Ok(())
}

fn upsert_summary_row(
    conn: &Connection,
    key: &DayKey,
    summary: &DailySummary,
    now: DateTime<Utc>,
) -> Result<(), DbError> {
    conn.execute(
        "
        INSERT INTO attendance_summaries
        (tenant_id, employee_id, date, checkin_time, checkout_time,
         work_hours, break_hours, overtime_hours, status, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(tenant_id, employee_id, date) DO UPDATE SET
            checkin_time = excluded.checkin_time,
            checkout_time = excluded.checkout_time,
            work_hours = excluded.work_hours,
            break_hours = excluded.break_hours,
            overtime_hours = excluded.overtime_hours,
            status = excluded.status,
            updated_at = excluded.updated_at
        ",
        params![
            key.tenant.as_str(),
            key.employee.as_str(),
            format_date(key.date),
            summary.checkin_time.map(format_timestamp),
            summary.checkout_time.map(format_timestamp),
            summary.work_hours,
            summary.break_hours,
            summary.overtime_hours,
            summary.status.as_str(),
            format_timestamp(now),
        ],
    )?;
    Ok(())
}

fn parse_timestamp(timestamp: &str, event_id: &str) -> Result<DateTime<Utc>, DbError> {
    DateTime::parse_from_rfc3339(timestamp)
        .map(|parsed| parsed.with_timezone(&Utc))
        .map_err(|source| DbError::TimestampParse {
            event_id: event_id.to_string(),
            timestamp: timestamp.to_string(),
            source,
        })
}

fn parse_date(date: &str, event_id: &str) -> Result<NaiveDate, DbError> {
    NaiveDate::parse_from_str(date, "%Y-%m-%d").map_err(|err| DbError::InvalidEventData {
        event_id: event_id.to_string(),
        message: format!("invalid date {date}: {err}"),
    })
}

fn format_timestamp(timestamp: DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn format_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::{Arc, Barrier};

    use att_core::SequenceError;
    use chrono::{FixedOffset, NaiveTime, TimeDelta, TimeZone};

    fn policy() -> AttendancePolicy {
        AttendancePolicy::new(
            NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            TimeDelta::minutes(15),
            FixedOffset::east_opt(0).unwrap(),
        )
    }

    fn tenant() -> TenantId {
        TenantId::new("acme").unwrap()
    }

    fn employee(id: &str) -> EmployeeId {
        EmployeeId::new(id).unwrap()
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 1, 15).unwrap()
    }

    fn key(id: &str) -> DayKey {
        DayKey::new(tenant(), employee(id), date())
    }

    fn at(hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 15, hour, minute, 0)
            .single()
            .expect("valid test timestamp")
    }

    fn submit(
        db: &mut Database,
        id: &str,
        kind: AttendanceEventType,
        hour: u32,
        minute: u32,
    ) -> Result<Recorded, SubmitError> {
        db.record_event(
            &tenant(),
            NewEvent::new(employee(id), kind, at(hour, minute)),
            &policy(),
        )
    }

    fn table_columns(conn: &Connection, table: &str) -> Vec<String> {
        let mut stmt = conn
            .prepare(&format!("PRAGMA table_info({table})"))
            .expect("prepare table_info");
        let rows = stmt
            .query_map([], |row| row.get::<_, String>(1))
            .expect("query table_info");
        rows.map(|row| row.expect("table_info row")).collect()
    }

    fn index_names(conn: &Connection, table: &str) -> HashSet<String> {
        let mut stmt = conn
            .prepare(&format!("PRAGMA index_list({table})"))
            .expect("prepare index_list");
        let rows = stmt
            .query_map([], |row| row.get::<_, String>(1))
            .expect("query index_list");
        rows.map(|row| row.expect("index_list row")).collect()
    }

    #[test]
    fn open_in_memory_database() {
        let db = Database::open_in_memory();
        assert!(db.is_ok());
    }

    #[test]
    fn schema_matches_data_model() {
        let db = Database::open_in_memory().expect("open in-memory db");

        assert_eq!(
            table_columns(&db.conn, "attendance_events"),
            vec![
                "seq",
                "id",
                "tenant_id",
                "employee_id",
                "date",
                "type",
                "timestamp",
                "location",
                "latitude",
                "longitude",
                "notes",
            ]
        );
        assert_eq!(
            table_columns(&db.conn, "attendance_summaries"),
            vec![
                "tenant_id",
                "employee_id",
                "date",
                "checkin_time",
                "checkout_time",
                "work_hours",
                "break_hours",
                "overtime_hours",
                "status",
                "updated_at",
            ]
        );

        let event_indexes = index_names(&db.conn, "attendance_events");
        assert!(event_indexes.contains("idx_attendance_events_day"));
        assert!(event_indexes.contains("idx_attendance_events_date"));
        assert!(event_indexes.contains("idx_attendance_events_timestamp"));
        let summary_indexes = index_names(&db.conn, "attendance_summaries");
        assert!(summary_indexes.contains("idx_attendance_summaries_date"));
    }

    #[test]
    fn init_is_idempotent() {
        let db = Database::open_in_memory().unwrap();
        db.init().unwrap();
    }

    #[test]
    fn full_day_writes_summary_on_checkout() {
        let mut db = Database::open_in_memory().unwrap();
        assert!(submit(&mut db, "emp-1", AttendanceEventType::CheckIn, 9, 0).unwrap().summary.is_none());
        submit(&mut db, "emp-1", AttendanceEventType::BreakStart, 12, 0).unwrap();
        submit(&mut db, "emp-1", AttendanceEventType::BreakEnd, 12, 30).unwrap();
        let recorded = submit(&mut db, "emp-1", AttendanceEventType::CheckOut, 17, 0).unwrap();

        let summary = recorded.summary.expect("checkout refreshes summary");
        assert!((summary.work_hours - 7.5).abs() < f64::EPSILON);
        assert!((summary.break_hours - 0.5).abs() < f64::EPSILON);
        assert_eq!(summary.status, AttendanceStatus::Present);

        let stored = db.summary(&key("emp-1")).unwrap().expect("summary stored");
        assert_eq!(stored.summary, summary);
        assert_eq!(stored.key, key("emp-1"));
    }

    #[test]
    fn rejected_event_is_not_stored() {
        let mut db = Database::open_in_memory().unwrap();
        submit(&mut db, "emp-1", AttendanceEventType::CheckIn, 9, 0).unwrap();
        let err = submit(&mut db, "emp-1", AttendanceEventType::CheckIn, 9, 5).unwrap_err();

        assert!(err.is_rejection());
        assert!(matches!(
            err,
            SubmitError::Rejected(AppendError::Rejected(SequenceError::AlreadyCheckedIn))
        ));
        assert_eq!(db.day_events(&key("emp-1")).unwrap().len(), 1);
    }

    #[test]
    fn first_event_must_be_checkin() {
        let mut db = Database::open_in_memory().unwrap();
        let err = submit(&mut db, "emp-1", AttendanceEventType::BreakStart, 9, 0).unwrap_err();
        assert!(matches!(
            err,
            SubmitError::Rejected(AppendError::Rejected(SequenceError::FirstActionMustBeCheckIn))
        ));
    }

    #[test]
    fn out_of_order_submission_is_rejected() {
        let mut db = Database::open_in_memory().unwrap();
        submit(&mut db, "emp-1", AttendanceEventType::CheckIn, 9, 0).unwrap();
        let err = submit(&mut db, "emp-1", AttendanceEventType::BreakStart, 8, 0).unwrap_err();
        assert!(matches!(
            err,
            SubmitError::Rejected(AppendError::OutOfOrder { .. })
        ));
    }

    #[test]
    fn store_failure_is_not_a_rejection() {
        let err = SubmitError::from(rusqlite::Error::InvalidQuery);
        assert!(!err.is_rejection());
    }

    #[test]
    fn day_events_keep_submission_order_for_equal_timestamps() {
        let mut db = Database::open_in_memory().unwrap();
        submit(&mut db, "emp-1", AttendanceEventType::CheckIn, 9, 0).unwrap();
        submit(&mut db, "emp-1", AttendanceEventType::BreakStart, 9, 0).unwrap();
        submit(&mut db, "emp-1", AttendanceEventType::BreakEnd, 9, 0).unwrap();

        let kinds: Vec<_> = db
            .day_events(&key("emp-1"))
            .unwrap()
            .into_iter()
            .map(|e| e.kind)
            .collect();
        assert_eq!(
            kinds,
            vec![
                AttendanceEventType::CheckIn,
                AttendanceEventType::BreakStart,
                AttendanceEventType::BreakEnd,
            ]
        );
    }

    #[test]
    fn location_roundtrips() {
        let mut db = Database::open_in_memory().unwrap();
        let mut new = NewEvent::new(employee("emp-1"), AttendanceEventType::CheckIn, at(9, 0));
        new.location = Some(Location {
            label: Some("Warehouse 3".into()),
            latitude: Some(52.37),
            longitude: Some(4.89),
        });
        let recorded = db.record_event(&tenant(), new, &policy()).unwrap();

        let stored = db.day_events(&key("emp-1")).unwrap();
        assert_eq!(stored, vec![recorded.event]);
    }

    #[test]
    fn notes_are_stored_and_blank_notes_dropped() {
        let mut db = Database::open_in_memory().unwrap();
        let mut checkin = NewEvent::new(employee("emp-1"), AttendanceEventType::CheckIn, at(9, 0));
        checkin.notes = Some("train delayed".into());
        db.record_event(&tenant(), checkin, &policy()).unwrap();
        let mut break_start =
            NewEvent::new(employee("emp-1"), AttendanceEventType::BreakStart, at(12, 0));
        break_start.notes = Some("   ".into());
        db.record_event(&tenant(), break_start, &policy()).unwrap();

        let notes: Vec<_> = db
            .day_events(&key("emp-1"))
            .unwrap()
            .into_iter()
            .map(|e| e.notes)
            .collect();
        assert_eq!(notes, vec![Some("train delayed".to_string()), None]);
    }

    #[test]
    fn event_lookup_by_id_is_tenant_scoped() {
        let mut db = Database::open_in_memory().unwrap();
        let recorded = submit(&mut db, "emp-1", AttendanceEventType::CheckIn, 9, 0).unwrap();

        let found = db.event(&tenant(), &recorded.event.id).unwrap();
        assert_eq!(found, Some(recorded.event.clone()));

        let other = TenantId::new("globex").unwrap();
        assert_eq!(db.event(&other, &recorded.event.id).unwrap(), None);
        let missing = EventId::new("no-such-event").unwrap();
        assert_eq!(db.event(&tenant(), &missing).unwrap(), None);
    }

    fn seed_two_days(db: &mut Database) {
        for (id, kind, hour) in [
            ("emp-1", AttendanceEventType::CheckIn, 9),
            ("emp-2", AttendanceEventType::CheckIn, 10),
            ("emp-1", AttendanceEventType::BreakStart, 12),
            ("emp-1", AttendanceEventType::BreakEnd, 13),
            ("emp-1", AttendanceEventType::CheckOut, 17),
        ] {
            submit(db, id, kind, hour, 0).unwrap();
        }
        let next_day = Utc.with_ymd_and_hms(2025, 1, 16, 8, 30, 0).unwrap();
        db.record_event(
            &tenant(),
            NewEvent::new(employee("emp-1"), AttendanceEventType::CheckIn, next_day),
            &policy(),
        )
        .unwrap();
    }

    fn listed(page: &EventPage) -> Vec<(String, AttendanceEventType)> {
        page.events
            .iter()
            .map(|e| (e.employee_id.as_str().to_string(), e.kind))
            .collect()
    }

    #[test]
    fn events_are_listed_newest_first_across_days() {
        let mut db = Database::open_in_memory().unwrap();
        seed_two_days(&mut db);

        let page = db.events(&tenant(), &EventFilter::default()).unwrap();
        assert_eq!(page.total, 6);
        assert_eq!((page.page, page.limit), (1, DEFAULT_PAGE_LIMIT));
        let timestamps: Vec<_> = page.events.iter().map(|e| e.timestamp).collect();
        let mut sorted = timestamps.clone();
        sorted.sort_by(|a, b| b.cmp(a));
        assert_eq!(timestamps, sorted);
        assert_eq!(page.events[0].date, NaiveDate::from_ymd_opt(2025, 1, 16).unwrap());
    }

    #[test]
    fn events_filter_by_employee_kind_and_range() {
        let mut db = Database::open_in_memory().unwrap();
        seed_two_days(&mut db);

        let checkins = EventFilter {
            kind: Some(AttendanceEventType::CheckIn),
            ..EventFilter::default()
        };
        let page = db.events(&tenant(), &checkins).unwrap();
        assert_eq!(page.total, 3);

        let first_day_emp1 = EventFilter {
            employee: Some(employee("emp-1")),
            from: Some(at(9, 0)),
            to: Some(at(13, 0)),
            ..EventFilter::default()
        };
        let page = db.events(&tenant(), &first_day_emp1).unwrap();
        assert_eq!(
            listed(&page),
            vec![
                ("emp-1".to_string(), AttendanceEventType::BreakEnd),
                ("emp-1".to_string(), AttendanceEventType::BreakStart),
                ("emp-1".to_string(), AttendanceEventType::CheckIn),
            ]
        );

        let other = TenantId::new("globex").unwrap();
        assert_eq!(db.events(&other, &EventFilter::default()).unwrap().total, 0);
    }

    #[test]
    fn events_are_paginated() {
        let mut db = Database::open_in_memory().unwrap();
        seed_two_days(&mut db);

        let second = EventFilter {
            page: Some(2),
            limit: Some(4),
            ..EventFilter::default()
        };
        let page = db.events(&tenant(), &second).unwrap();
        assert_eq!(page.total, 6);
        assert_eq!(
            listed(&page),
            vec![
                ("emp-2".to_string(), AttendanceEventType::CheckIn),
                ("emp-1".to_string(), AttendanceEventType::CheckIn),
            ]
        );

        let beyond = EventFilter {
            page: Some(9),
            limit: Some(4),
            ..EventFilter::default()
        };
        assert!(db.events(&tenant(), &beyond).unwrap().events.is_empty());
    }

    #[test]
    fn page_bounds_are_normalized() {
        let zeroes = EventFilter {
            page: Some(0),
            limit: Some(0),
            ..EventFilter::default()
        };
        assert_eq!((zeroes.page(), zeroes.limit()), (1, DEFAULT_PAGE_LIMIT));
        let huge = EventFilter {
            limit: Some(5_000),
            ..EventFilter::default()
        };
        assert_eq!(huge.limit(), MAX_PAGE_LIMIT);
    }

    #[test]
    fn events_are_immutable() {
        let mut db = Database::open_in_memory().unwrap();
        submit(&mut db, "emp-1", AttendanceEventType::CheckIn, 9, 0).unwrap();

        let update = db
            .conn
            .execute("UPDATE attendance_events SET type = 'checkout'", []);
        assert!(update.is_err());
        let delete = db.conn.execute("DELETE FROM attendance_events", []);
        assert!(delete.is_err());
        assert_eq!(db.day_events(&key("emp-1")).unwrap().len(), 1);
    }

    #[test]
    fn days_are_scoped_by_tenant_and_employee() {
        let mut db = Database::open_in_memory().unwrap();
        submit(&mut db, "emp-1", AttendanceEventType::CheckIn, 9, 0).unwrap();
        submit(&mut db, "emp-2", AttendanceEventType::CheckIn, 9, 0).unwrap();

        let other_tenant = TenantId::new("globex").unwrap();
        db.record_event(
            &other_tenant,
            NewEvent::new(employee("emp-1"), AttendanceEventType::CheckIn, at(9, 0)),
            &policy(),
        )
        .unwrap();

        assert_eq!(db.day_events(&key("emp-1")).unwrap().len(), 1);
        assert_eq!(
            db.day_events(&DayKey::new(other_tenant, employee("emp-1"), date()))
                .unwrap()
                .len(),
            1
        );
    }

    #[test]
    fn calendar_day_uses_policy_offset() {
        let mut db = Database::open_in_memory().unwrap();
        let tokyo = AttendancePolicy {
            utc_offset: FixedOffset::east_opt(9 * 3600).unwrap(),
            ..policy()
        };
        let recorded = db
            .record_event(
                &tenant(),
                NewEvent::new(employee("emp-1"), AttendanceEventType::CheckIn, at(23, 30)),
                &tokyo,
            )
            .unwrap();
        assert_eq!(recorded.key.date, NaiveDate::from_ymd_opt(2025, 1, 16).unwrap());
    }

    #[test]
    fn recompute_summary_on_demand() {
        let mut db = Database::open_in_memory().unwrap();
        submit(&mut db, "emp-1", AttendanceEventType::CheckIn, 9, 20).unwrap();
        assert!(db.summary(&key("emp-1")).unwrap().is_none());

        let summary = db.recompute_summary(&key("emp-1"), &policy()).unwrap();
        assert_eq!(summary.status, AttendanceStatus::Late);
        assert_eq!(db.summary(&key("emp-1")).unwrap().unwrap().summary, summary);

        let again = db.recompute_summary(&key("emp-1"), &policy()).unwrap();
        assert_eq!(again, summary);
    }

    #[test]
    fn recompute_without_events_stores_absent() {
        let mut db = Database::open_in_memory().unwrap();
        let summary = db.recompute_summary(&key("emp-9"), &policy()).unwrap();
        assert_eq!(summary, DailySummary::absent());
    }

    #[test]
    fn upsert_replaces_whole_summary() {
        let db = Database::open_in_memory().unwrap();
        let first = DailySummary {
            checkin_time: Some(at(9, 0)),
            work_hours: 3.0,
            status: AttendanceStatus::Present,
            ..DailySummary::absent()
        };
        db.upsert_summary(&key("emp-1"), &first).unwrap();
        db.upsert_summary(&key("emp-1"), &DailySummary::absent()).unwrap();

        let stored = db.summary(&key("emp-1")).unwrap().unwrap();
        assert_eq!(stored.summary, DailySummary::absent());
        assert_eq!(db.summaries_for_date(&tenant(), date()).unwrap().len(), 1);
    }

    #[test]
    fn recompute_date_covers_every_employee() {
        let mut db = Database::open_in_memory().unwrap();
        submit(&mut db, "emp-1", AttendanceEventType::CheckIn, 8, 55).unwrap();
        submit(&mut db, "emp-1", AttendanceEventType::CheckOut, 17, 0).unwrap();
        submit(&mut db, "emp-2", AttendanceEventType::CheckIn, 9, 40).unwrap();
        submit(&mut db, "emp-3", AttendanceEventType::CheckIn, 9, 0).unwrap();

        let summaries = db.recompute_date(&tenant(), date(), &policy()).unwrap();
        let statuses: Vec<_> = summaries
            .iter()
            .map(|(employee, summary)| (employee.as_str(), summary.status))
            .collect();
        assert_eq!(
            statuses,
            vec![
                ("emp-1", AttendanceStatus::Present),
                ("emp-2", AttendanceStatus::Late),
                ("emp-3", AttendanceStatus::Present),
            ]
        );
        assert_eq!(db.summaries_for_date(&tenant(), date()).unwrap().len(), 3);
    }

    #[test]
    fn attendance_stats_from_stored_summaries() {
        let mut db = Database::open_in_memory().unwrap();
        submit(&mut db, "emp-1", AttendanceEventType::CheckIn, 9, 0).unwrap();
        submit(&mut db, "emp-1", AttendanceEventType::CheckOut, 17, 0).unwrap();
        submit(&mut db, "emp-2", AttendanceEventType::CheckIn, 10, 0).unwrap();
        db.recompute_date(&tenant(), date(), &policy()).unwrap();
        db.upsert_summary(&key("emp-3"), &DailySummary::absent()).unwrap();

        let stats = db.attendance_stats(&tenant(), date()).unwrap();
        assert_eq!(stats.total_employees, 3);
        assert_eq!(stats.present, 2);
        assert_eq!(stats.late, 1);
        assert_eq!(stats.absent, 1);
        assert!((stats.avg_work_hours - 8.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn concurrent_checkins_accept_exactly_one() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("att.db");
        drop(Database::open(&path).unwrap());

        let writers = 8;
        let barrier = Arc::new(Barrier::new(writers));
        let handles: Vec<_> = (0..writers)
            .map(|_| {
                let path = path.clone();
                let barrier = Arc::clone(&barrier);
                std::thread::spawn(move || {
                    let mut db = Database::open(&path).expect("open db");
                    barrier.wait();
                    submit(&mut db, "emp-1", AttendanceEventType::CheckIn, 9, 0)
                })
            })
            .collect();

        let results: Vec<_> = handles
            .into_iter()
            .map(|handle| handle.join().expect("writer thread"))
            .collect();

        let accepted = results.iter().filter(|r| r.is_ok()).count();
        assert_eq!(accepted, 1);
        for result in results.iter().filter(|r| r.is_err()) {
            assert!(matches!(
                result,
                Err(SubmitError::Rejected(AppendError::Rejected(
                    SequenceError::AlreadyCheckedIn
                )))
            ));
        }

        let db = Database::open(&path).unwrap();
        assert_eq!(db.day_events(&key("emp-1")).unwrap().len(), 1);
    }
}
