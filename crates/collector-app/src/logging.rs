use std::path::Path;

use anyhow::{Context, Result};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

/// Installs the global subscriber: stderr always, plus `log_file` when given.
/// `RUST_LOG` takes precedence over `level`. Keep the returned guard alive
/// until exit so buffered file output is flushed.
pub fn init_logging(level: &str, log_file: Option<&str>) -> Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .with_context(|| format!("invalid log level {level:?}"))?;
    let stderr_layer = fmt::layer().with_writer(std::io::stderr);

    let Some(log_file) = log_file else {
        tracing_subscriber::registry()
            .with(filter)
            .with(stderr_layer)
            .try_init()
            .context("install tracing subscriber")?;
        return Ok(None);
    };

    let path = Path::new(log_file);
    let file_name = path
        .file_name()
        .with_context(|| format!("log file {log_file:?} has no file name"))?;
    let directory = path
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));

    let (writer, guard) =
        tracing_appender::non_blocking(tracing_appender::rolling::never(directory, file_name));
    tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(fmt::layer().with_ansi(false).with_writer(writer))
        .try_init()
        .context("install tracing subscriber")?;

    Ok(Some(guard))
}
