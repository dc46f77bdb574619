//! Subcommand implementations, one module per demonstration.

pub mod race;
pub mod scenario;
