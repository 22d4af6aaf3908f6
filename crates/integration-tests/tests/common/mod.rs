//! Shared helpers for end-to-end tests

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use hass_run_core::application::Supervisor;
use hass_run_core::domain::Command;
use hass_run_core::port::{StateSink, SystemTimeProvider};
use hass_run_infra_system::SubprocessFactory;

pub use hass_run_infra_hass::testing::HassStub;

pub const TEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Supervisor wired to real processes and the given sink
pub fn supervisor(args: &[&str], sink: Arc<dyn StateSink>) -> Supervisor {
    Supervisor::new(
        Command::new(args.iter().copied()).unwrap(),
        Arc::new(SubprocessFactory::new()),
        sink,
        Arc::new(SystemTimeProvider),
    )
}
