//! `hass-run kill`: signal the supervisor recorded in an identifier file

use anyhow::{Context, Result};
use colored::Colorize;
use std::path::Path;

use hass_run_core::port::ProcessLocator;
use hass_run_infra_hass::validate_entity_name;
use hass_run_infra_system::{check_identifier_file, PidFileLocator};

use crate::logging;

pub fn execute(entity: &str, identifier_file: &Path) -> Result<()> {
    logging::init(None)?;

    validate_entity_name(entity).context("invalid configuration")?;
    if identifier_file.exists() {
        check_identifier_file(identifier_file).context("invalid PID file")?;
    }

    let pid = PidFileLocator::new()
        .terminate(identifier_file)
        .context("Failed to kill running command")?;

    println!(
        "{}",
        format!("✓ Sent SIGTERM to {} (pid {})", entity, pid)
            .green()
            .bold()
    );
    Ok(())
}
