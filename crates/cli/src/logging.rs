// Tracing setup: stderr (pretty or JSON) plus a daily file in logs_dir

use anyhow::{Context, Result};
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::Layered;
use tracing_subscriber::{fmt, prelude::*, EnvFilter, Layer, Registry};

const DEFAULT_FILTER: &str = "gnnlaunch=info";
const LOG_FILE_PREFIX: &str = "gnnlaunch.log";

type Base = Layered<EnvFilter, Registry>;

/// Install the global subscriber
///
/// Records go to stderr so child output on stdout stays clean. The returned
/// guard flushes the file writer and must live until exit.
pub fn init(format: &str, logs_dir: Option<&Path>) -> Result<Option<WorkerGuard>> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let mut layers: Vec<Box<dyn Layer<Base> + Send + Sync>> = Vec::new();
    match format {
        // Production: JSON structured logging
        "json" => layers.push(fmt::layer().json().with_writer(std::io::stderr).boxed()),
        // Development: pretty formatting with colors
        _ => layers.push(fmt::layer().pretty().with_writer(std::io::stderr).boxed()),
    }

    let guard = match logs_dir.filter(|d| d.is_dir()) {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            layers.push(fmt::layer().with_ansi(false).with_writer(writer).boxed());
            Some(guard)
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(layers)
        .try_init()
        .context("Failed to install tracing subscriber")?;

    Ok(guard)
}
