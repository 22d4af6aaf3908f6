//! HomeAssistant state sink

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, StatusCode};
use std::time::Duration;
use tracing::debug;

use crate::error::{HassError, Result};
use hass_run_core::port::{SinkError, StateSink};

/// Upper bound for one state update
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Publishes snapshots as the state of one HomeAssistant entity
///
/// Every payload is posted to `{endpoint}/api/states/{entity}`. HomeAssistant answers 201 when
/// the entity is created and 200 when it is updated; any other status is an error carrying
/// the response body.
#[derive(Debug, Clone)]
pub struct HomeAssistant {
    bearer: String,
    endpoint: String,
    entity: String,
    client: Client,
}

impl HomeAssistant {
    /// Build a sink for `entity` on the instance at `endpoint`
    ///
    /// # Arguments
    ///
    /// * `bearer` - Long-lived access token
    /// * `endpoint` - Base URL (e.g., `https://hass.example`)
    /// * `entity` - Entity id (e.g., `shell.backup`)
    pub fn new(
        bearer: impl Into<String>,
        endpoint: impl Into<String>,
        entity: impl Into<String>,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| HassError::Client(e.to_string()))?;

        Ok(Self {
            bearer: bearer.into(),
            endpoint: endpoint.into(),
            entity: entity.into(),
            client,
        })
    }

    pub fn entity(&self) -> &str {
        &self.entity
    }

    /// URL the state updates are posted to
    pub fn state_url(&self) -> String {
        format!("{}/api/states/{}", self.endpoint, self.entity)
    }
}

#[async_trait]
impl StateSink for HomeAssistant {
    async fn submit(&self, payload: &str) -> std::result::Result<(), SinkError> {
        let response = self
            .client
            .post(self.state_url())
            .header(CONTENT_TYPE, "application/json")
            .header(AUTHORIZATION, format!("Bearer {}", self.bearer))
            .body(payload.to_string())
            .send()
            .await
            .map_err(|e| SinkError::Transport(e.to_string()))?;

        let status = response.status();
        if status != StatusCode::OK && status != StatusCode::CREATED {
            let body = response.text().await.unwrap_or_default();
            return Err(SinkError::UnexpectedStatus {
                status: status.as_u16(),
                body,
            });
        }

        debug!(entity = %self.entity, status = status.as_u16(), "State updated");
        Ok(())
    }
}
