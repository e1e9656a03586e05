//! Chirpline - a command-line client for the Chirpline social feed.
//!
//! Every invocation restores the stored session, runs one command and
//! exits. Logs go to a daily file in the cache directory so stdout and
//! stderr stay readable.

mod commands;
mod output;

use std::path::Path;

use anyhow::Result;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use chirpline_core::Config;

use commands::Command;

/// Log file prefix inside the cache directory
const LOG_FILE_NAME: &str = "chirpline.log";

/// Initialize the tracing subscriber for logging.
///
/// The returned guard flushes buffered log lines on drop and must live
/// until the process exits.
fn init_tracing(log_dir: &Path) -> WorkerGuard {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    let file_appender = tracing_appender::rolling::daily(log_dir, LOG_FILE_NAME);
    let (writer, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(writer).with_ansi(false))
        .with(filter)
        .init();

    guard
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let command = match Command::parse(&args) {
        Ok(command) => command,
        Err(e) => {
            eprintln!("Error: {}\n", e);
            output::print_usage();
            std::process::exit(2);
        }
    };

    if command == Command::Help {
        output::print_usage();
        return Ok(());
    }

    let mut config = Config::load()?;
    config.apply_env_overrides();

    let cache_dir = config.cache_dir()?;
    std::fs::create_dir_all(&cache_dir)?;
    let log_guard = init_tracing(&cache_dir);
    info!(api = %config.api_base_url(), ?command, "Chirpline starting");

    let session = config.build_session()?;
    session.initialize().await;

    let result = commands::run(command, &session, &mut config).await;

    info!(ok = result.is_ok(), "Chirpline shutting down");
    drop(log_guard);

    if let Err(e) = result {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
    Ok(())
}
