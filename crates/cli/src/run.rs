//! `hass-run run`: validate, detach, supervise

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use hass_run_core::application::{cancel_channel, CancelToken, Supervisor};
use hass_run_core::domain::Command;
use hass_run_core::port::SystemTimeProvider;
use hass_run_infra_hass::{validate_entity_name, validate_host_and_bearer, HomeAssistant};
use hass_run_infra_system::{
    forward_termination, remove_identifier_file, reserve_identifier_file, write_pid,
    SubprocessFactory,
};

use crate::settings::{Endpoint, Overrides, Settings};
use crate::daemonize::daemonize;
use crate::logging;

pub struct RunArgs {
    pub overrides: Overrides,
    pub daemon: bool,
    pub entity: String,
    pub identifier_file: PathBuf,
    pub command: Vec<String>,
}

pub fn execute(args: RunArgs) -> Result<()> {
    let settings = Settings::load(&args.overrides)?;
    logging::init(settings.log_dir.as_deref())?;
    info!("hass-run v{} starting...", hass_run_core::VERSION);

    let endpoint = settings.endpoint()?;
    let command = Command::new(args.command.iter().cloned()).context("Failed to parse command")?;
    validate(&args.entity, &endpoint, &args.identifier_file)?;

    // Absolute, so the daemon's pid file does not depend on where it was started from
    let identifier_file = std::fs::canonicalize(&args.identifier_file)
        .with_context(|| format!("invalid PID file: {}", args.identifier_file.display()))?;

    if args.daemon {
        info!(entity = %args.entity, command = %command, "Starting daemon");
        if !daemonize().context("Failed to spawn daemon")? {
            warn!("Daemonization is not supported on this platform, staying in the foreground");
        }
    }

    // Safe to start worker threads now: we are either in the foreground or the daemon itself
    let runtime = tokio::runtime::Runtime::new().context("Failed to create Tokio runtime")?;
    runtime.block_on(supervise(command, endpoint, args.entity, &identifier_file))
}

/// Reject bad configuration before anything is spawned
fn validate(entity: &str, endpoint: &Endpoint, identifier_file: &Path) -> Result<()> {
    validate_entity_name(entity).context("invalid configuration")?;

    // Short-lived runtime: it is gone (threads included) before a possible fork
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to create validation runtime")?;
    runtime
        .block_on(validate_host_and_bearer(&endpoint.host, &endpoint.bearer))
        .context("invalid host/bearer")?;
    drop(runtime);

    reserve_identifier_file(identifier_file).context("invalid PID file")?;
    Ok(())
}

async fn supervise(
    command: Command,
    endpoint: Endpoint,
    entity: String,
    identifier_file: &Path,
) -> Result<()> {
    let sink = Arc::new(HomeAssistant::new(endpoint.bearer, endpoint.host, entity)?);
    let (cancel_token, signals) = match arm_identifier_file(identifier_file) {
        Ok(armed) => armed,
        Err(e) => {
            remove_identifier_file(identifier_file);
            return Err(e);
        }
    };

    let mut supervisor = Supervisor::new(
        command,
        Arc::new(SubprocessFactory::new()),
        sink,
        Arc::new(SystemTimeProvider),
    );
    let snapshot = supervisor.run(cancel_token).await;

    signals.abort();
    remove_identifier_file(identifier_file);

    info!(
        state = %snapshot.state,
        exit_code = snapshot.attributes.exit_code,
        "Supervisor exiting"
    );
    Ok(())
}

/// Make the run cancellable by SIGTERM, then publish our pid
///
/// Whoever reads the pid from the file can rely on the handler already being installed.
fn arm_identifier_file(identifier_file: &Path) -> Result<(CancelToken, JoinHandle<()>)> {
    let (cancel_handle, cancel_token) = cancel_channel();
    let signals =
        forward_termination(cancel_handle).context("Failed to install signal handlers")?;

    if let Err(e) = write_pid(identifier_file, std::process::id()) {
        signals.abort();
        return Err(e).context("Failed to write PID file");
    }
    Ok((cancel_token, signals))
}
