//! HomeAssistant REST API Types

use serde::Deserialize;

/// Message `GET /api/` answers with when the API is up
pub const API_RUNNING_MESSAGE: &str = "API running.";

/// Body of `GET /api/`
#[derive(Debug, Clone, Deserialize)]
pub struct ApiStatus {
    pub message: String,
}

impl ApiStatus {
    pub fn is_running(&self) -> bool {
        self.message == API_RUNNING_MESSAGE
    }
}
