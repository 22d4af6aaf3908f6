// hass-run Infrastructure - System Adapters
// Implements: ProcessFactory/ProcessHandle, ProcessLocator, signal forwarding, identifier files

pub mod identifier_file;
pub mod pid_locator;
pub mod signal;
pub mod subprocess_handle;

pub use identifier_file::{
    check_identifier_file, remove_identifier_file, reserve_identifier_file, write_pid,
};
pub use pid_locator::PidFileLocator;
pub use signal::forward_termination;
pub use subprocess_handle::{SubprocessFactory, SubprocessHandle};
