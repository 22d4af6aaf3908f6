//! hass-run Infrastructure - HomeAssistant Adapters
//!
//! Publishes run snapshots as the state of a HomeAssistant entity and validates the
//! configuration pointing at it.
//!
//! # Example
//!
//! ```no_run
//! use hass_run_core::port::StateSink;
//! use hass_run_infra_hass::{validate_entity_name, validate_host_and_bearer, HomeAssistant};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     validate_entity_name("shell.backup")?;
//!     validate_host_and_bearer("https://hass.example", "TOKEN").await?;
//!
//!     let hass = HomeAssistant::new("TOKEN", "https://hass.example", "shell.backup")?;
//!     hass.submit(r#"{"state":"running","attributes":{}}"#).await?;
//!
//!     Ok(())
//! }
//! ```

mod client;
mod error;
mod types;
mod validators;

pub use client::HomeAssistant;
pub use error::{HassError, Result};
pub use types::ApiStatus;
pub use validators::{validate_entity_name, validate_host_and_bearer};

#[cfg(any(test, feature = "test-support"))]
pub mod testing;
