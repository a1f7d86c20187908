//! Tracing subscriber setup for the binary

use std::path::Path;

use anyhow::{Context, anyhow};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

/// Log to `log_path`, filtered by `RUST_LOG` (default `info`).
///
/// The returned guard flushes pending lines when dropped and must be kept
/// alive for the lifetime of the program.
pub fn init(log_path: &Path, json: bool) -> anyhow::Result<WorkerGuard> {
    let directory = log_path
        .parent()
        .ok_or_else(|| anyhow!("log path {:?} has no parent directory", log_path))?;
    let file_name = log_path
        .file_name()
        .ok_or_else(|| anyhow!("log path {:?} has no file name", log_path))?;
    std::fs::create_dir_all(directory)
        .with_context(|| format!("failed to create log directory {:?}", directory))?;

    let (writer, guard) =
        tracing_appender::non_blocking(tracing_appender::rolling::never(directory, file_name));
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(false);

    let installed = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    installed.map_err(|e| anyhow!("failed to install tracing subscriber: {}", e))?;

    Ok(guard)
}
