//! Job domain types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::principal::Principal;

/// One queued ledger mutation and its lifecycle
///
/// Structure shared between the gateway (persists and submits) and clients (poll).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub id: Uuid,
    pub principal: Principal,
    /// Backend transaction name, e.g. `CreateMessage`
    pub operation: String,
    /// Target record id; jobs sharing a key are submitted in enqueue order
    pub record_key: String,
    pub arguments: Vec<String>,
    pub state: JobState,
    /// Number of submit calls made so far
    pub attempts: u32,
    pub max_attempts: u32,
    /// Worker holding (or last holding) the claim
    pub worker_id: Option<String>,
    pub result: Option<serde_json::Value>,
    pub last_error: Option<JobError>,
    pub enqueued_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Earliest instant the job may be claimed again
    pub available_at: DateTime<Utc>,
}

impl Job {
    /// Build a freshly enqueued job
    pub fn queued(
        principal: Principal,
        operation: impl Into<String>,
        record_key: impl Into<String>,
        arguments: Vec<String>,
        max_attempts: u32,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            principal,
            operation: operation.into(),
            record_key: record_key.into(),
            arguments,
            state: JobState::Queued,
            attempts: 0,
            max_attempts,
            worker_id: None,
            result: None,
            last_error: None,
            enqueued_at: now,
            updated_at: now,
            available_at: now,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    /// Whether another submit attempt fits in the attempt budget
    pub fn has_attempts_left(&self) -> bool {
        self.attempts < self.max_attempts
    }
}

/// Job lifecycle state
///
/// `Queued -> InFlight -> {Succeeded | Failed}`, with `InFlight -> Queued`
/// only for a transient failure that still has attempts left.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JobState {
    Queued,
    InFlight,
    Succeeded,
    Failed,
}

impl JobState {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobState::Succeeded | JobState::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            JobState::Queued => "Queued",
            JobState::InFlight => "InFlight",
            JobState::Succeeded => "Succeeded",
            JobState::Failed => "Failed",
        }
    }
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for JobState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Queued" => Ok(JobState::Queued),
            "InFlight" => Ok(JobState::InFlight),
            "Succeeded" => Ok(JobState::Succeeded),
            "Failed" => Ok(JobState::Failed),
            other => Err(format!("unknown job state '{}'", other)),
        }
    }
}

/// Last failure recorded against a job
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobError {
    pub kind: JobErrorKind,
    pub message: String,
}

impl JobError {
    pub fn transient(message: impl Into<String>) -> Self {
        Self {
            kind: JobErrorKind::Transient,
            message: message.into(),
        }
    }

    pub fn permanent(message: impl Into<String>) -> Self {
        Self {
            kind: JobErrorKind::Permanent,
            message: message.into(),
        }
    }
}

/// Failure classification set by the backend adapter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobErrorKind {
    /// Retry may succeed (timeout, network)
    Transient,
    /// Retry is futile (business-rule rejection)
    Permanent,
}

impl JobErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            JobErrorKind::Transient => "transient",
            JobErrorKind::Permanent => "permanent",
        }
    }
}

impl std::str::FromStr for JobErrorKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "transient" => Ok(JobErrorKind::Transient),
            "permanent" => Ok(JobErrorKind::Permanent),
            other => Err(format!("unknown error kind '{}'", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_round_trips_through_str() {
        for state in [
            JobState::Queued,
            JobState::InFlight,
            JobState::Succeeded,
            JobState::Failed,
        ] {
            assert_eq!(state.as_str().parse::<JobState>(), Ok(state));
        }
        assert!("Running".parse::<JobState>().is_err());
    }

    #[test]
    fn test_terminal_states() {
        assert!(!JobState::Queued.is_terminal());
        assert!(!JobState::InFlight.is_terminal());
        assert!(JobState::Succeeded.is_terminal());
        assert!(JobState::Failed.is_terminal());
    }

    #[test]
    fn test_queued_job_defaults() {
        let job = Job::queued(
            Principal::new("alice", "Org1MSP"),
            "DeleteMessage",
            "m1",
            vec!["m1".to_string()],
            5,
        );

        assert_eq!(job.state, JobState::Queued);
        assert_eq!(job.attempts, 0);
        assert!(job.has_attempts_left());
        assert!(job.result.is_none());
        assert!(job.last_error.is_none());
        assert_eq!(job.enqueued_at, job.available_at);
    }

    #[test]
    fn test_job_serializes_camel_case() {
        let job = Job::queued(Principal::new("alice", "Org1MSP"), "X", "k", vec![], 1);
        let value = serde_json::to_value(&job).unwrap();

        assert!(value.get("recordKey").is_some());
        assert!(value.get("maxAttempts").is_some());
        assert_eq!(value["state"], "Queued");
    }
}
