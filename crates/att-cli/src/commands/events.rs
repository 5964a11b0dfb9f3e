//! Events commands for reading the event log.
//!
//! A day key's events print as JSONL in the order validation and aggregation
//! see them. Filtered listings span days and print newest first.

use std::io::Write;

use anyhow::{Context, Result};
use att_core::{AttendanceEvent, DayKey, EventId, TenantId};
use att_db::{Database, EventFilter};

/// Runs the events command, writing one JSON object per line.
pub fn run<W: Write>(writer: &mut W, db: &Database, key: &DayKey) -> Result<()> {
    let events = db
        .day_events(key)
        .with_context(|| format!("failed to load events for {key}"))?;
    tracing::debug!(%key, event_count = events.len(), "loaded day events");

    write_jsonl(writer, &events)
}

/// Prints one page of a tenant's events matching `filter`, newest first.
pub fn list<W: Write>(
    writer: &mut W,
    db: &Database,
    tenant: &TenantId,
    filter: &EventFilter,
) -> Result<()> {
    let page = db
        .events(tenant, filter)
        .with_context(|| format!("failed to list events for tenant {tenant}"))?;
    tracing::info!(total = page.total, page = page.page, limit = page.limit, "listed events");
    write_jsonl(writer, &page.events)
}

/// Prints one event as pretty JSON; an unknown id is an error.
pub fn show<W: Write>(writer: &mut W, db: &Database, tenant: &TenantId, id: &EventId) -> Result<()> {
    let event = db
        .event(tenant, id)
        .with_context(|| format!("failed to load event {id}"))?
        .with_context(|| format!("no event {id} for tenant {tenant}"))?;
    writeln!(writer, "{}", serde_json::to_string_pretty(&event)?)?;
    Ok(())
}

fn write_jsonl<W: Write>(writer: &mut W, events: &[AttendanceEvent]) -> Result<()> {
    for event in events {
        let json = serde_json::to_string(event)?;
        writeln!(writer, "{json}")?;
    }
    Ok(())
}
