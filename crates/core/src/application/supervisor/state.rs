// Runner State - mutable record behind every snapshot of one run

use chrono::{DateTime, Utc};

use crate::domain::error::{DomainError, Result};
use crate::domain::{duration_secs, RunState, Snapshot, SnapshotAttributes};

#[derive(Debug, Clone)]
pub(crate) struct RunnerState {
    output: String,
    running: bool,
    exit_code: i32,
    started_at: DateTime<Utc>,
    updated_at: Option<DateTime<Utc>>,
    ended_at: Option<DateTime<Utc>>,
}

impl RunnerState {
    /// Fresh state for a run that starts at `now`
    pub(crate) fn start(now: DateTime<Utc>) -> Self {
        Self {
            output: String::new(),
            running: true,
            exit_code: 0,
            started_at: now,
            updated_at: None,
            ended_at: None,
        }
    }

    pub(crate) fn append_output(&mut self, content: &str, now: DateTime<Utc>) {
        self.output.push_str(content);
        self.updated_at = Some(now);
    }

    /// Transition to a terminal state (at most once per run)
    pub(crate) fn finish(&mut self, exit_code: i32, now: DateTime<Utc>) -> Result<()> {
        if !self.running {
            return Err(DomainError::InvalidStateTransition {
                from: self.state().to_string(),
                to: RunState::derive(false, exit_code).to_string(),
            });
        }
        self.running = false;
        self.exit_code = exit_code;
        self.ended_at = Some(now);
        Ok(())
    }

    pub(crate) fn state(&self) -> RunState {
        RunState::derive(self.running, self.exit_code)
    }

    pub(crate) fn snapshot(&self) -> Snapshot {
        Snapshot {
            state: self.state(),
            attributes: SnapshotAttributes {
                output: self.output.clone(),
                running: self.running,
                exit_code: self.exit_code,
                started_at: Some(self.started_at),
                updated_at: self.updated_at,
                ended_at: self.ended_at,
                duration: self
                    .ended_at
                    .map(|ended_at| duration_secs(self.started_at, ended_at))
                    .unwrap_or(0),
            },
        }
    }
}
