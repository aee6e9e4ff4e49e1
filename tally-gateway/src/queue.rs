//! Job queue
//!
//! Thin layer over a `JobStore` that the API and the submission workers share.
//! Enqueueing wakes one idle worker; all other state changes go through the
//! store's conditional transitions.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tally_core::domain::job::{Job, JobError};
use tally_core::domain::principal::Principal;
use tokio::sync::Notify;
use tracing::{debug, info};
use uuid::Uuid;

use crate::repository::{JobStore, Result};

/// Default number of submit attempts per job
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Shared handle to the job store
///
/// `max_attempts` is the single attempt budget: every enqueued job carries
/// it, and workers stop retrying once a job has used it up.
#[derive(Clone)]
pub struct JobQueue {
    store: Arc<dyn JobStore>,
    signal: Arc<Notify>,
    max_attempts: u32,
}

impl JobQueue {
    pub fn new(store: Arc<dyn JobStore>, max_attempts: u32) -> Self {
        Self {
            store,
            signal: Arc::new(Notify::new()),
            max_attempts,
        }
    }

    pub fn store(&self) -> &Arc<dyn JobStore> {
        &self.store
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Persist a new `Queued` job and wake a worker
    pub async fn enqueue(
        &self,
        principal: Principal,
        operation: &str,
        record_key: &str,
        arguments: Vec<String>,
    ) -> Result<Job> {
        let job = Job::queued(principal, operation, record_key, arguments, self.max_attempts);
        self.store.insert(&job).await?;

        info!(
            "Enqueued job {} ({} on {}) for {}",
            job.id, job.operation, job.record_key, job.principal
        );
        self.signal.notify_one();

        Ok(job)
    }

    pub async fn get(&self, id: Uuid) -> Result<Option<Job>> {
        self.store.find_by_id(id).await
    }

    pub async fn claim(&self, worker_id: &str) -> Result<Option<Job>> {
        let claimed = self.store.claim_next(worker_id, Utc::now()).await?;

        if let Some(job) = &claimed {
            debug!(
                "Worker {} claimed job {} (attempt {}/{})",
                worker_id, job.id, job.attempts, job.max_attempts
            );
        }

        Ok(claimed)
    }

    pub async fn complete(&self, id: Uuid, worker_id: &str, result: serde_json::Value) -> Result<Job> {
        self.store.complete(id, worker_id, result).await
    }

    pub async fn requeue(
        &self,
        id: Uuid,
        worker_id: &str,
        error: JobError,
        available_at: DateTime<Utc>,
    ) -> Result<Job> {
        let job = self.store.requeue(id, worker_id, error, available_at).await?;

        // Another worker may be idle while this one moves on
        self.signal.notify_one();

        Ok(job)
    }

    pub async fn fail(&self, id: Uuid, worker_id: &str, error: JobError) -> Result<Job> {
        self.store.fail(id, worker_id, error).await
    }

    /// Wait for an enqueue signal, at most `timeout`
    pub async fn wait_for_work(&self, timeout: Duration) {
        let _ = tokio::time::timeout(timeout, self.signal.notified()).await;
    }

    /// Wake every waiting worker, e.g. after releasing stale claims
    pub fn wake_all(&self) {
        self.signal.notify_waiters();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::MemoryJobStore;
    use tally_core::domain::job::JobState;

    fn queue() -> JobQueue {
        JobQueue::new(Arc::new(MemoryJobStore::new()), 5)
    }

    #[tokio::test]
    async fn test_enqueue_persists_queued_job() {
        let queue = queue();
        let job = queue
            .enqueue(
                Principal::new("alice", "Org1MSP"),
                "DeleteMessage",
                "m1",
                vec!["m1".to_string()],
            )
            .await
            .unwrap();

        let stored = queue.get(job.id).await.unwrap().unwrap();
        assert_eq!(stored.state, JobState::Queued);
        assert_eq!(stored.max_attempts, 5);
        assert_eq!(stored.attempts, 0);
    }

    #[tokio::test]
    async fn test_enqueue_wakes_waiting_worker() {
        let queue = queue();
        let waiter = {
            let queue = queue.clone();
            tokio::spawn(async move { queue.wait_for_work(Duration::from_secs(30)).await })
        };

        tokio::task::yield_now().await;
        queue
            .enqueue(Principal::new("alice", "Org1MSP"), "DeleteMessage", "m1", vec![])
            .await
            .unwrap();

        tokio::time::timeout(Duration::from_secs(5), waiter)
            .await
            .expect("worker was not woken")
            .unwrap();
    }
}
