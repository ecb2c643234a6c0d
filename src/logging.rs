/*!
 * Logging setup
 *
 * Diagnostics go to stderr; stdout carries command results, including the
 * `--json` output that scripts parse. With `log_file` set, events are
 * appended to that file as JSON lines instead. Each line carries the fields
 * of the enclosing `scan` or `next_bag` span, so the bag ID and gate appear on
 * every routing, snapshot and scan-log event.
 */

use std::fs::{File, OpenOptions};
use std::path::Path;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::{LogLevel, RouterConfig};
use crate::error::{ConfigError, Result};

/// Install the global subscriber for this process
pub fn init_logging(config: &RouterConfig) -> Result<()> {
    let filter = build_filter(config)?;

    let installed = match config.log_file {
        Some(ref path) => {
            let file = open_log_file(path)?;
            let layer = fmt::layer()
                .json()
                .with_current_span(true)
                .with_span_list(false)
                .flatten_event(true)
                .with_target(true)
                .with_ansi(false)
                .with_writer(file);
            tracing_subscriber::registry()
                .with(filter)
                .with(layer)
                .try_init()
        }
        None => {
            let layer = fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .compact();
            tracing_subscriber::registry()
                .with(filter)
                .with(layer)
                .try_init()
        }
    };

    installed.map_err(|e| ConfigError::Invalid(format!("logging already initialized: {}", e)))?;
    Ok(())
}

fn effective_level(config: &RouterConfig) -> LogLevel {
    if config.verbose {
        config.log_level.max(LogLevel::Debug)
    } else {
        config.log_level
    }
}

/// `RUST_LOG` wins; otherwise only the router crates log at the configured level
fn build_filter(config: &RouterConfig) -> Result<EnvFilter> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }

    let level = effective_level(config).as_str();
    let filter = EnvFilter::try_new(format!(
        "warn,bagrouter={level},bagrouter_core_routing={level}"
    ))
    .map_err(|e| ConfigError::Invalid(format!("failed to create log filter: {}", e)))?;
    Ok(filter)
}

/// Open the log for appending; each CLI invocation adds to the same file
fn open_log_file(path: &Path) -> Result<File> {
    let io_err = |source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }
    }

    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(io_err)?;
    Ok(file)
}
