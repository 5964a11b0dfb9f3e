//! CLI subcommand implementations.

pub mod events;
pub mod recompute;
pub mod record;
pub mod stats;
pub mod status;
pub mod summary;
pub mod util;
