//! Repository Module
//!
//! Data access layer for jobs. The `JobStore` trait is both the job queue
//! and the job status store: one record per job, looked up by id and updated
//! in place through the claim protocol.
//!
//! Two implementations are provided:
//! - `PgJobStore`: durable PostgreSQL storage
//! - `MemoryJobStore`: process-local storage for development and tests

pub mod memory;
pub mod postgres;

pub use memory::MemoryJobStore;
pub use postgres::PgJobStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tally_core::domain::job::{Job, JobError};
use thiserror::Error;
use uuid::Uuid;

/// Repository error type
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("job {0} not found")]
    NotFound(Uuid),

    #[error("job {0} already exists")]
    Duplicate(Uuid),

    /// The caller no longer owns the claim (job moved on or was released)
    #[error("job {id} is not claimed by worker {worker_id}")]
    ClaimLost { id: Uuid, worker_id: String },

    #[error("job {id} has a corrupt row: {reason}")]
    Corrupt { id: Uuid, reason: String },

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl StoreError {
    /// Losing the store itself ends the process; everything else is per-job
    pub fn is_fatal(&self) -> bool {
        matches!(self, StoreError::Database(_))
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// Persistence for queued jobs and their status
///
/// Every state change other than `insert` is conditional: claiming only takes
/// `Queued` jobs, and `complete`/`requeue`/`fail` only apply while the caller
/// still holds the claim. Implementations must make each call atomic.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Persist a freshly queued job
    async fn insert(&self, job: &Job) -> Result<()>;

    /// Point lookup by id
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Job>>;

    /// Claim the oldest eligible job for `worker_id`
    ///
    /// A job is eligible when it is `Queued`, its `available_at` has passed,
    /// and no earlier job with the same record key is still unfinished. The
    /// claimed job comes back `InFlight` with `attempts` already incremented.
    async fn claim_next(&self, worker_id: &str, now: DateTime<Utc>) -> Result<Option<Job>>;

    /// `InFlight -> Succeeded`, storing the backend response
    async fn complete(&self, id: Uuid, worker_id: &str, result: serde_json::Value) -> Result<Job>;

    /// `InFlight -> Queued`, eligible again at `available_at`
    async fn requeue(
        &self,
        id: Uuid,
        worker_id: &str,
        error: JobError,
        available_at: DateTime<Utc>,
    ) -> Result<Job>;

    /// `InFlight -> Failed`, terminal
    async fn fail(&self, id: Uuid, worker_id: &str, error: JobError) -> Result<Job>;

    /// Return jobs stuck `InFlight` since before `claimed_before` to the queue
    async fn release_stale(&self, claimed_before: DateTime<Utc>) -> Result<u64>;

    /// Delete terminal jobs last updated before `updated_before`
    async fn reap_terminal(&self, updated_before: DateTime<Utc>) -> Result<u64>;
}
