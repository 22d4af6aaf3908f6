// Domain Layer - Command value object and lifecycle snapshots

pub mod command;
pub mod error;
pub mod snapshot;

// Re-exports
pub use command::Command;
pub use error::DomainError;
pub use snapshot::{duration_secs, RunState, Snapshot, SnapshotAttributes};
