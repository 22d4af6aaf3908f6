// Port Layer - Interfaces for external dependencies

pub mod process_handle;
pub mod process_locator;
pub mod state_sink;
pub mod time_provider; // For deterministic testing

// Re-exports
pub use process_handle::{OutputStream, ProcessError, ProcessFactory, ProcessHandle};
pub use process_locator::{KillError, ProcessLocator};
pub use state_sink::{SinkError, StateSink};
pub use time_provider::{SystemTimeProvider, TimeProvider};
