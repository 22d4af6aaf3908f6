// Identifier file - where a daemonized supervisor records its pid
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::Path;
use tracing::{debug, info, warn};

use hass_run_core::AppError;

/// Make sure `path` can hold the supervisor's pid
///
/// An existing file must be readable and writable. A missing file is created empty and left in
/// place until [`write_pid`] fills it.
pub fn reserve_identifier_file(path: &Path) -> Result<(), AppError> {
    if path.exists() {
        check_identifier_file(path)?;
        debug!(path = %path.display(), "Reusing existing identifier file");
        return Ok(());
    }

    OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .map_err(|e| {
            AppError::Validation(format!(
                "PID file is not readable/writable at path: {}: {}",
                path.display(),
                e
            ))
        })?;
    debug!(path = %path.display(), "Created identifier file placeholder");
    Ok(())
}

/// Fail unless the existing file at `path` is readable and writable
pub fn check_identifier_file(path: &Path) -> Result<(), AppError> {
    check_access(path).map_err(|e| {
        AppError::Validation(format!(
            "existing PID file is not readable/writable: {}: {}",
            path.display(),
            e
        ))
    })
}

#[cfg(unix)]
fn check_access(path: &Path) -> io::Result<()> {
    use nix::unistd::{access, AccessFlags};

    access(path, AccessFlags::R_OK | AccessFlags::W_OK).map_err(io::Error::from)
}

#[cfg(not(unix))]
fn check_access(path: &Path) -> io::Result<()> {
    let metadata = fs::metadata(path)?;
    if metadata.permissions().readonly() {
        return Err(io::Error::new(io::ErrorKind::PermissionDenied, "read-only"));
    }
    Ok(())
}

/// Overwrite the identifier file with `pid`
pub fn write_pid(path: &Path, pid: u32) -> Result<(), AppError> {
    let mut file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(path)?;
    writeln!(file, "{}", pid)?;
    file.sync_all()?;
    info!(path = %path.display(), pid = pid, "PID file written");
    Ok(())
}

/// Remove the identifier file; failures are only logged
pub fn remove_identifier_file(path: &Path) {
    if path.exists() {
        if let Err(e) = fs::remove_file(path) {
            warn!(path = %path.display(), error = %e, "Failed to remove PID file");
        }
    }
}
