// Process Locator Port
// Finds a supervisor through its identifier file and asks it to terminate

use std::path::Path;
use thiserror::Error;

/// Kill path errors (hard failures for the invoker)
#[derive(Error, Debug)]
pub enum KillError {
    #[error("no running process found for {path}: {reason}")]
    NotFound { path: String, reason: String },

    #[error("failed to signal process {pid}: {reason}")]
    Signal { pid: i32, reason: String },
}

/// Process Locator trait
pub trait ProcessLocator: Send + Sync {
    /// Deliver exactly one graceful termination signal to the process recorded in
    /// `identifier_file`, returning its pid
    ///
    /// # Errors
    /// - KillError::NotFound if the file names no live process (nothing is signalled)
    /// - KillError::Signal if delivery fails
    fn terminate(&self, identifier_file: &Path) -> Result<i32, KillError>;
}
