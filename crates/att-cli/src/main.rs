use std::io::{self, Write};
use std::path::Path;

use anyhow::{Context, Result};
use att_core::{AttendanceEventType, DayKey, EmployeeId, EventId, Location, TenantId};
use att_db::{EventFilter, NewEvent};
use chrono::Utc;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use att_cli::commands::util::{parse_at, parse_date};
use att_cli::commands::{events, recompute, record, stats, status, summary};
use att_cli::{Cli, Commands, Config};

/// Load config and open database, ensuring the parent directory exists.
fn open_database(config_path: Option<&Path>) -> Result<(att_db::Database, Config)> {
    let config = Config::load_from(config_path).context("failed to load configuration")?;
    tracing::debug!(?config, "loaded configuration");

    if let Some(parent) = config.database_path.parent() {
        std::fs::create_dir_all(parent).context("failed to create database directory")?;
    }

    let db = att_db::Database::open(&config.database_path).context("failed to open database")?;
    Ok((db, config))
}

fn employee_id(employee: &str) -> Result<EmployeeId> {
    EmployeeId::new(employee).context("invalid --employee")
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing with verbose flag support
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env()
    };
    // Use try_init to avoid panic if tracing is already initialized (e.g., in tests)
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();

    let Some(command) = &cli.command else {
        // No subcommand, show help
        use clap::CommandFactory;
        Cli::command().print_help()?;
        println!();
        return Ok(());
    };

    let (mut db, config) = open_database(cli.config.as_deref())?;
    let policy = config.policy.to_policy()?;
    let tenant = match &cli.tenant {
        Some(tenant) => TenantId::new(tenant.as_str()).context("invalid --tenant")?,
        None => config.tenant()?,
    };
    let now = Utc::now();
    let offset = policy.utc_offset;

    let stdout = io::stdout();
    let mut out = stdout.lock();

    match command {
        Commands::Record {
            kind,
            employee,
            at,
            location,
            lat,
            lon,
            notes,
            json,
        } => {
            let mut event = NewEvent::new(
                employee_id(employee)?,
                AttendanceEventType::from(*kind),
                parse_at(at.as_deref(), offset, now)?,
            );
            event.location = Some(Location {
                label: location.clone(),
                latitude: *lat,
                longitude: *lon,
            });
            event.notes.clone_from(notes);
            record::run(&mut out, &mut db, &tenant, event, &policy, *json)?;
        }
        Commands::Events {
            employee,
            date,
            from,
            to,
            kind,
            page,
            limit,
        } => {
            let employee = employee.as_deref().map(employee_id).transpose()?;
            let filtered = from.is_some()
                || to.is_some()
                || kind.is_some()
                || page.is_some()
                || limit.is_some();
            match employee {
                Some(employee) if !filtered => {
                    let key = DayKey::new(tenant, employee, parse_date(date.as_deref(), offset, now)?);
                    events::run(&mut out, &db, &key)?;
                }
                employee => {
                    let bound = |value: Option<&str>, flag: &str| {
                        value
                            .map(|v| parse_at(Some(v), offset, now).with_context(|| format!("invalid {flag}")))
                            .transpose()
                    };
                    let filter = EventFilter {
                        employee,
                        kind: kind.map(AttendanceEventType::from),
                        from: bound(from.as_deref(), "--from")?,
                        to: bound(to.as_deref(), "--to")?,
                        page: *page,
                        limit: *limit,
                    };
                    events::list(&mut out, &db, &tenant, &filter)?;
                }
            }
        }
        Commands::Event { id } => {
            let id = EventId::new(id.as_str()).context("invalid event id")?;
            events::show(&mut out, &db, &tenant, &id)?;
        }
        Commands::Status { employee, date } => {
            let key = DayKey::new(
                tenant,
                employee_id(employee)?,
                parse_date(date.as_deref(), offset, now)?,
            );
            status::run(&mut out, &db, &key, offset)?;
        }
        Commands::Summary {
            employee,
            date,
            json,
        } => {
            let employee = employee.as_deref().map(employee_id).transpose()?;
            let date = parse_date(date.as_deref(), offset, now)?;
            summary::run(
                &mut out,
                &db,
                &tenant,
                employee.as_ref(),
                date,
                offset,
                *json,
            )?;
        }
        Commands::Recompute { employee, date } => {
            let employee = employee.as_deref().map(employee_id).transpose()?;
            let date = parse_date(date.as_deref(), offset, now)?;
            recompute::run(&mut out, &mut db, &tenant, employee.as_ref(), date, &policy)?;
        }
        Commands::Stats { date, json } => {
            let date = parse_date(date.as_deref(), offset, now)?;
            stats::run(&mut out, &db, &tenant, date, *json)?;
        }
    }

    out.flush()?;
    Ok(())
}
