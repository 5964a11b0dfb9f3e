//! Attendance CLI library.
//!
//! This crate provides the CLI interface for recording attendance events and
//! reading back daily summaries.

mod cli;
pub mod commands;
mod config;

pub use cli::{Cli, Commands, EventKind};
pub use config::{Config, PolicyConfig};
