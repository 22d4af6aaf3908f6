// Application Layer - Supervision use case

pub mod supervisor;

// Re-exports
pub use supervisor::{cancel_channel, CancelHandle, CancelToken, Supervisor};
