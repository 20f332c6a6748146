//! Request and status types for the query service

use chrono::{DateTime, Utc};
use hourledger::{SlotProgress, SlotState, SlotStats};
use serde::{Deserialize, Serialize};

use crate::unit::ExecutionContext;

/// A query submission
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryRequest {
    pub query: String,
    pub destination: String,
    pub context: ExecutionContext,
}

/// Remote job state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobState {
    Queued,
    Running,
    Succeeded,
    Failed,
    Cancelled,
}

impl JobState {
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed | Self::Cancelled)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "QUEUED",
            Self::Running => "RUNNING",
            Self::Succeeded => "SUCCEEDED",
            Self::Failed => "FAILED",
            Self::Cancelled => "CANCELLED",
        }
    }
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl From<JobState> for SlotState {
    fn from(state: JobState) -> Self {
        match state {
            JobState::Queued => SlotState::Queued,
            JobState::Running => SlotState::Running,
            JobState::Succeeded => SlotState::Succeeded,
            JobState::Failed => SlotState::Failed,
            JobState::Cancelled => SlotState::Cancelled,
        }
    }
}

/// Execution statistics reported with a status
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobStats {
    #[serde(default)]
    pub bytes_scanned: Option<u64>,
    #[serde(default)]
    pub duration_ms: Option<u64>,
    #[serde(default)]
    pub submit_time: Option<DateTime<Utc>>,
}

/// Result of a status query
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobStatus {
    pub state: JobState,
    /// State-change reason for failures
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub stats: Option<JobStats>,
}

impl JobStatus {
    pub fn new(state: JobState) -> Self {
        Self {
            state,
            reason: None,
            stats: None,
        }
    }

    pub fn failed(reason: impl Into<String>) -> Self {
        Self {
            state: JobState::Failed,
            reason: Some(reason.into()),
            stats: None,
        }
    }

    /// Reason to record for a failed job
    pub fn failure_reason(&self) -> String {
        self.reason.clone().unwrap_or_else(|| self.state.to_string())
    }

    /// Ledger observation for this status
    pub fn to_progress(&self, workgroup: Option<&str>) -> SlotProgress {
        let stats = self.stats.clone().unwrap_or_default();
        SlotProgress {
            state: Some(self.state.into()),
            stats: SlotStats {
                bytes_scanned: stats.bytes_scanned,
                run_time_ms: stats.duration_ms,
                start_time: stats.submit_time,
                workgroup: workgroup.map(str::to_string),
            },
        }
    }
}
