//! Configuration validators run before a supervisor starts

use regex::Regex;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, StatusCode};
use std::sync::LazyLock;
use std::time::Duration;
use tracing::{debug, info};

use crate::error::{HassError, Result};
use crate::types::ApiStatus;

const VALIDATION_TIMEOUT: Duration = Duration::from_secs(10);

/// `<domain>.<object_id>` with both parts made of ASCII letters, digits and underscores
static ENTITY_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-zA-Z0-9_]+\.[a-zA-Z0-9_]+$").expect("invalid entity pattern")
});

/// Check that `entity` is a valid HomeAssistant entity id
pub fn validate_entity_name(entity: &str) -> Result<()> {
    if !ENTITY_REGEX.is_match(entity) {
        return Err(HassError::InvalidEntity(entity.to_string()));
    }
    Ok(())
}

/// Check that `host` serves the HomeAssistant REST API and accepts `bearer`
pub async fn validate_host_and_bearer(host: &str, bearer: &str) -> Result<()> {
    let client = Client::builder()
        .timeout(VALIDATION_TIMEOUT)
        .build()
        .map_err(|e| HassError::Client(e.to_string()))?;

    let url = format!("{}/api/", host);
    debug!(url = %url, "Validating HomeAssistant endpoint");

    let response = client
        .get(&url)
        .header(CONTENT_TYPE, "application/json")
        .header(AUTHORIZATION, format!("Bearer {}", bearer))
        .send()
        .await
        .map_err(|e| HassError::Connection(e.to_string()))?;

    let status = response.status();
    if status != StatusCode::OK {
        return Err(HassError::Status(status.as_u16()));
    }

    let body = response
        .text()
        .await
        .map_err(|e| HassError::Connection(e.to_string()))?;
    let api_status: ApiStatus =
        serde_json::from_str(&body).map_err(|e| HassError::InvalidResponse {
            reason: e.to_string(),
            body: body.clone(),
        })?;

    if !api_status.is_running() {
        return Err(HassError::ApiNotRunning(body));
    }

    info!(host = %host, "HomeAssistant API reachable");
    Ok(())
}
