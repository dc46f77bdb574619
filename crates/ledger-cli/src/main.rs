//! Ledger CLI entry point.

use std::process::ExitCode;

use clap::Parser;
use ledger_cli::config::{Cli, LogFormat};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize tracing subscriber. Logs go to stderr; stdout carries the report.
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr);
    match cli.log_format {
        LogFormat::Json => subscriber.json().init(),
        LogFormat::Text => subscriber.init(),
    }

    tracing::info!(command = ?cli.command, "starting ledger");

    match ledger_cli::run(&cli).await {
        Ok(report) => {
            println!("{report}");
            ExitCode::SUCCESS
        }
        Err(err) => {
            tracing::error!(error = %err, "ledger command failed");
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}
