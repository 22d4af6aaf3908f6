// Snapshot Domain Model - the state payload pushed to the sink

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle state as reported to the sink
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunState {
    Running,
    Success,
    Failure,
}

impl RunState {
    /// Derive the reported state from the running flag and exit code.
    pub fn derive(running: bool, exit_code: i32) -> Self {
        if running {
            RunState::Running
        } else if exit_code == 0 {
            RunState::Success
        } else {
            RunState::Failure
        }
    }
}

impl std::fmt::Display for RunState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunState::Running => write!(f, "running"),
            RunState::Success => write!(f, "success"),
            RunState::Failure => write!(f, "failure"),
        }
    }
}

/// Attributes block of a state payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotAttributes {
    pub output: String,
    pub running: bool,
    pub exit_code: i32,
    pub started_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    /// Whole seconds between `started_at` and `ended_at` (0 until the run ends)
    pub duration: i64,
}

/// Point-in-time view of a run, serialized as
/// `{"state": ..., "attributes": {...}}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub state: RunState,
    pub attributes: SnapshotAttributes,
}

impl Snapshot {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

/// Floor of `ended_at - started_at` in seconds, clamped at zero.
pub fn duration_secs(started_at: DateTime<Utc>, ended_at: DateTime<Utc>) -> i64 {
    // num_seconds truncates toward zero, which is floor for non-negative spans
    (ended_at - started_at).num_seconds().max(0)
}
