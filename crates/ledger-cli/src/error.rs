//! Ledger CLI error types.

use ledger_core::error::DomainError;
use thiserror::Error;

/// Errors surfaced by the command-line driver.
#[derive(Debug, Error)]
pub enum CliError {
    /// A flag or environment variable holds an unusable value.
    #[error("configuration error: {0}")]
    Config(String),

    /// A domain operation failed.
    #[error(transparent)]
    Domain(#[from] DomainError),

    /// A concurrent writer task panicked or was cancelled.
    #[error("writer task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    /// The run finished but its results break a ledger invariant.
    #[error("report check failed: {0}")]
    Report(String),

    /// The report could not be rendered.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
