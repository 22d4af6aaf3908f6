// Process locator backed by the pid recorded in an identifier file
use std::path::Path;
use tracing::{info, warn};

use hass_run_core::port::{KillError, ProcessLocator};

/// Reads the pid written by the daemonized supervisor and sends it SIGTERM
#[derive(Debug, Default, Clone)]
pub struct PidFileLocator;

impl PidFileLocator {
    pub fn new() -> Self {
        Self
    }

    /// Parse the pid recorded in `identifier_file`
    pub fn read_pid(identifier_file: &Path) -> Result<i32, KillError> {
        let not_found = |reason: String| KillError::NotFound {
            path: identifier_file.display().to_string(),
            reason,
        };

        let content = std::fs::read_to_string(identifier_file).map_err(|e| not_found(e.to_string()))?;
        let content = content.trim();
        if content.is_empty() {
            return Err(not_found("identifier file is empty".to_string()));
        }

        let pid: i32 = content
            .parse()
            .map_err(|_| not_found(format!("invalid pid {:?}", content)))?;
        // 0 and negative pids address process groups, never a single supervisor
        if pid <= 0 {
            return Err(not_found(format!("invalid pid {}", pid)));
        }
        Ok(pid)
    }
}

impl ProcessLocator for PidFileLocator {
    fn terminate(&self, identifier_file: &Path) -> Result<i32, KillError> {
        let pid = Self::read_pid(identifier_file)?;

        #[cfg(unix)]
        {
            use nix::errno::Errno;
            use nix::sys::signal::{kill, Signal};
            use nix::unistd::Pid;

            // Signal 0 checks if process exists without actually sending a signal
            if let Err(e) = kill(Pid::from_raw(pid), None) {
                if e == Errno::ESRCH {
                    warn!(pid = %pid, path = %identifier_file.display(), "No process for identifier file");
                    return Err(KillError::NotFound {
                        path: identifier_file.display().to_string(),
                        reason: format!("process {} is not running", pid),
                    });
                }
                return Err(KillError::Signal {
                    pid,
                    reason: e.to_string(),
                });
            }

            info!(pid = %pid, "Sending SIGTERM to supervisor");
            kill(Pid::from_raw(pid), Signal::SIGTERM).map_err(|e| KillError::Signal {
                pid,
                reason: format!("SIGTERM failed: {}", e),
            })?;

            Ok(pid)
        }

        #[cfg(not(unix))]
        {
            Err(KillError::Signal {
                pid,
                reason: "graceful termination is only supported on unix".to_string(),
            })
        }
    }
}
