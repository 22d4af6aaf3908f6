// State Sink Port
// Remote consumer of serialized snapshots

use async_trait::async_trait;
use thiserror::Error;

/// Sink errors (never fatal to a run)
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SinkError {
    #[error("request failed: {0}")]
    Transport(String),

    #[error("invalid status code: {status} != [200, 201]: {body}")]
    UnexpectedStatus { status: u16, body: String },
}

/// State Sink trait
#[async_trait]
pub trait StateSink: Send + Sync {
    /// Publish one serialized snapshot
    ///
    /// # Errors
    /// - SinkError::Transport if the endpoint is unreachable
    /// - SinkError::UnexpectedStatus if the endpoint answers outside {200, 201}
    async fn submit(&self, payload: &str) -> Result<(), SinkError>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use crate::domain::Snapshot;
    use std::sync::Mutex;
    use tokio::sync::watch;

    /// Records every payload; optionally fails every call after recording it
    pub struct RecordingSink {
        payloads: Mutex<Vec<String>>,
        count_tx: watch::Sender<usize>,
        failure: Option<SinkError>,
    }

    impl RecordingSink {
        pub fn new() -> Self {
            Self {
                payloads: Mutex::new(Vec::new()),
                count_tx: watch::channel(0).0,
                failure: None,
            }
        }

        pub fn failing(failure: SinkError) -> Self {
            Self {
                failure: Some(failure),
                ..Self::new()
            }
        }

        pub fn payloads(&self) -> Vec<String> {
            self.payloads.lock().unwrap().clone()
        }

        pub fn snapshots(&self) -> Vec<Snapshot> {
            self.payloads()
                .iter()
                .map(|p| serde_json::from_str(p).unwrap())
                .collect()
        }

        /// Wait until at least `count` payloads were submitted
        pub async fn wait_for(&self, count: usize) {
            let mut rx = self.count_tx.subscribe();
            let _ = rx.wait_for(|n| *n >= count).await;
        }
    }

    impl Default for RecordingSink {
        fn default() -> Self {
            Self::new()
        }
    }

    #[async_trait]
    impl StateSink for RecordingSink {
        async fn submit(&self, payload: &str) -> Result<(), SinkError> {
            let count = {
                let mut payloads = self.payloads.lock().unwrap();
                payloads.push(payload.to_string());
                payloads.len()
            };
            self.count_tx.send_replace(count);

            match &self.failure {
                Some(failure) => Err(failure.clone()),
                None => Ok(()),
            }
        }
    }
}
