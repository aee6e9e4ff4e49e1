//! Job DTOs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Acknowledgement returned when a mutation has been queued
///
/// The operation has not reached the ledger yet; poll the job id for the outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobAccepted {
    pub status: String,
    pub job_id: Uuid,
    pub timestamp: DateTime<Utc>,
}

impl JobAccepted {
    pub fn new(job_id: Uuid) -> Self {
        Self {
            status: "Accepted".to_string(),
            job_id,
            timestamp: Utc::now(),
        }
    }
}
