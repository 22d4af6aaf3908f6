//! Logging setup

use anyhow::{Context, Result};
use std::path::Path;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const DEFAULT_FILTER: &str = "hass_run=info";
const LOG_FILE_NAME: &str = "hass-run.log";

/// Install the global subscriber
///
/// `HASS_RUN_LOG_FORMAT=json` switches to JSON lines; `RUST_LOG` overrides the filter. With
/// `log_dir` set, output goes to `<log_dir>/hass-run.log`, which is the only place a daemonized
/// run can still log to.
pub fn init(log_dir: Option<&Path>) -> Result<()> {
    let log_format = std::env::var("HASS_RUN_LOG_FORMAT").unwrap_or_else(|_| "pretty".to_string());

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(DEFAULT_FILTER))
        .context("Failed to create env filter")?;

    let registry = tracing_subscriber::registry().with(env_filter);

    match (log_dir, log_format.as_str()) {
        (Some(dir), format) => {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create log directory {}", dir.display()))?;
            // Plain blocking appender: no worker thread that a later fork would lose
            let appender = tracing_appender::rolling::never(dir, LOG_FILE_NAME);
            let layer = fmt::layer().with_writer(appender).with_ansi(false);
            if format == "json" {
                registry.with(layer.json()).try_init()?;
            } else {
                registry.with(layer).try_init()?;
            }
        }
        (None, "json") => {
            // Production: JSON structured logging
            registry
                .with(fmt::layer().json().with_writer(std::io::stderr))
                .try_init()?;
        }
        (None, _) => {
            // Development: Pretty formatting with colors
            registry
                .with(fmt::layer().pretty().with_writer(std::io::stderr))
                .try_init()?;
        }
    }

    Ok(())
}
