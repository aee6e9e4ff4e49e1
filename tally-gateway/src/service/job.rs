//! Job Service
//!
//! Status lookups for queued ledger mutations.

use tally_core::domain::job::Job;
use tally_core::domain::principal::Principal;
use thiserror::Error;
use uuid::Uuid;

use crate::queue::JobQueue;
use crate::repository::StoreError;

/// Service error type
#[derive(Debug, Error)]
pub enum JobServiceError {
    #[error("job {0} not found")]
    NotFound(Uuid),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Get a job by ID
///
/// Jobs are only visible to the principal (user and MSP) that created them;
/// anyone else gets `NotFound`, the same answer as for an unknown id.
pub async fn get_job(queue: &JobQueue, principal: &Principal, id: Uuid) -> Result<Job, JobServiceError> {
    let job = queue
        .get(id)
        .await?
        .filter(|job| job.principal == *principal)
        .ok_or(JobServiceError::NotFound(id))?;

    Ok(job)
}
