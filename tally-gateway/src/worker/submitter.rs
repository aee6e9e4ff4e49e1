//! Submission worker
//!
//! Claims one job at a time, submits it to the ledger and records the outcome.
//! A worker never holds more than one claim.

use std::sync::Arc;

use chrono::Utc;
use tally_core::domain::job::{Job, JobError, JobErrorKind};
use tokio::sync::watch;
use tokio::time;
use tracing::{error, info, warn};

use crate::backend::{LedgerBackend, SubmitError, decode_payload};
use crate::queue::JobQueue;
use crate::repository::StoreError;

use super::WorkerSettings;

pub struct SubmissionWorker {
    id: String,
    queue: JobQueue,
    backend: Arc<dyn LedgerBackend>,
    settings: WorkerSettings,
}

impl SubmissionWorker {
    pub fn new(
        id: impl Into<String>,
        queue: JobQueue,
        backend: Arc<dyn LedgerBackend>,
        settings: WorkerSettings,
    ) -> Self {
        Self {
            id: id.into(),
            queue,
            backend,
            settings,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Work until shutdown is signalled or the store becomes unreachable
    ///
    /// The current job always runs to its recorded outcome before the
    /// shutdown flag is checked again.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) -> Result<(), StoreError> {
        info!("Worker {} started", self.id);

        loop {
            if *shutdown.borrow() {
                break;
            }

            if self.process_next().await? {
                continue;
            }

            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                _ = self.queue.wait_for_work(self.settings.poll_interval) => {}
            }
        }

        info!("Worker {} stopped", self.id);
        Ok(())
    }

    /// Claim and process a single job
    ///
    /// Returns `Ok(false)` when nothing was claimable. Only fatal store
    /// errors are returned; a lost claim is logged and skipped.
    pub async fn process_next(&self) -> Result<bool, StoreError> {
        let job = match self.queue.claim(&self.id).await {
            Ok(Some(job)) => job,
            Ok(None) => return Ok(false),
            Err(err) if err.is_fatal() => return Err(err),
            Err(err) => {
                warn!("Worker {} failed to claim a job: {}", self.id, err);
                return Ok(false);
            }
        };

        let outcome = self.submit(&job).await;

        match self.record(&job, outcome).await {
            Ok(()) => Ok(true),
            Err(err) if err.is_fatal() => Err(err),
            Err(err) => {
                warn!("Worker {} dropped job {}: {}", self.id, job.id, err);
                Ok(true)
            }
        }
    }

    async fn submit(&self, job: &Job) -> Result<Vec<u8>, SubmitError> {
        let timeout = self.settings.submit_timeout;
        let call = self
            .backend
            .submit(&job.principal, &job.operation, &job.arguments);

        match time::timeout(timeout, call).await {
            Ok(outcome) => outcome,
            Err(_) => Err(SubmitError::Transient(format!(
                "submit timed out after {:?}",
                timeout
            ))),
        }
    }

    async fn record(&self, job: &Job, outcome: Result<Vec<u8>, SubmitError>) -> Result<(), StoreError> {
        match outcome {
            Ok(payload) => {
                self.queue
                    .complete(job.id, &self.id, decode_payload(&payload))
                    .await?;
                info!(
                    "Job {} ({} on {}) succeeded after {} attempt(s)",
                    job.id, job.operation, job.record_key, job.attempts
                );
            }
            Err(err) if err.is_transient() && job.has_attempts_left() => {
                let delay = self.settings.retry.delay_for(job.attempts);
                let available_at = Utc::now()
                    + chrono::Duration::from_std(delay).unwrap_or_else(|_| chrono::Duration::zero());

                warn!(
                    "Job {} attempt {}/{} failed, retrying in {:?}: {}",
                    job.id, job.attempts, job.max_attempts, delay, err
                );
                self.queue
                    .requeue(job.id, &self.id, JobError::from(err), available_at)
                    .await?;
            }
            Err(err) => {
                error!(
                    "Job {} ({} on {}) failed after {} attempt(s): {}",
                    job.id, job.operation, job.record_key, job.attempts, err
                );
                self.queue.fail(job.id, &self.id, final_error(job, err)).await?;
            }
        }

        Ok(())
    }
}

/// Error recorded on a job that will not be retried
///
/// A rejection that follows a transient failure may be the ledger refusing
/// a transaction that the earlier attempt already committed (a timed-out
/// `CreateMessage` retried into "already exists"), so it is flagged as such.
fn final_error(job: &Job, err: SubmitError) -> JobError {
    let after_transient = matches!(
        &job.last_error,
        Some(previous) if previous.kind == JobErrorKind::Transient
    );

    match err {
        SubmitError::Permanent(message) if after_transient => JobError::permanent(format!(
            "{} (an earlier attempt failed transiently and may have committed)",
            message
        )),
        other => JobError::from(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryLedger;
    use crate::repository::MemoryJobStore;
    use crate::worker::RetryPolicy;
    use std::time::Duration;
    use tally_core::domain::job::JobState;
    use tally_core::domain::principal::Principal;

    fn settings() -> WorkerSettings {
        WorkerSettings {
            retry: RetryPolicy::new(Duration::from_millis(1), Duration::from_millis(5)),
            submit_timeout: Duration::from_secs(5),
            poll_interval: Duration::from_millis(10),
            ..WorkerSettings::default()
        }
    }

    fn create_args(id: &str) -> Vec<String> {
        [id, "1", "1", "hello", "0", "2025-05-01T00:00:00Z"]
            .iter()
            .map(|s| s.to_string())
            .collect()
    }

    #[tokio::test]
    async fn test_process_next_idle() {
        let queue = JobQueue::new(Arc::new(MemoryJobStore::new()), 3);
        let worker = SubmissionWorker::new("w-0", queue, Arc::new(MemoryLedger::new()), settings());

        assert!(!worker.process_next().await.unwrap());
    }

    #[tokio::test]
    async fn test_business_rule_rejection_fails_without_retry() {
        let queue = JobQueue::new(Arc::new(MemoryJobStore::new()), 3);
        let worker = SubmissionWorker::new(
            "w-0",
            queue.clone(),
            Arc::new(MemoryLedger::seeded()),
            settings(),
        );

        let job = queue
            .enqueue(Principal::new("alice", "Org1MSP"), "CreateMessage", "1", create_args("1"))
            .await
            .unwrap();

        assert!(worker.process_next().await.unwrap());

        let job = queue.get(job.id).await.unwrap().unwrap();
        assert_eq!(job.state, JobState::Failed);
        assert_eq!(job.attempts, 1);

        let error = job.last_error.unwrap();
        assert_eq!(error.kind, JobErrorKind::Permanent);
        assert_eq!(error.message, "The message 1 already exists");
    }

    #[tokio::test]
    async fn test_success_stores_decoded_result() {
        let queue = JobQueue::new(Arc::new(MemoryJobStore::new()), 3);
        let worker = SubmissionWorker::new(
            "w-0",
            queue.clone(),
            Arc::new(MemoryLedger::seeded()),
            settings(),
        );

        let job = queue
            .enqueue(
                Principal::new("alice", "Org1MSP"),
                "TransferMessage",
                "1",
                vec!["1".to_string(), "8".to_string()],
            )
            .await
            .unwrap();

        worker.process_next().await.unwrap();

        let job = queue.get(job.id).await.unwrap().unwrap();
        assert_eq!(job.state, JobState::Succeeded);
        assert_eq!(job.result, Some(serde_json::json!(5)));
        assert_eq!(job.worker_id.as_deref(), Some("w-0"));
    }

    #[test]
    fn test_final_error_flags_rejection_after_transient_attempt() {
        let mut job = Job::queued(Principal::new("alice", "Org1MSP"), "CreateMessage", "m1", create_args("m1"), 3);
        job.attempts = 2;
        job.last_error = Some(JobError::transient("submit timed out after 30s"));

        let error = final_error(&job, SubmitError::Permanent("The message m1 already exists".to_string()));
        assert_eq!(error.kind, JobErrorKind::Permanent);
        assert_eq!(
            error.message,
            "The message m1 already exists (an earlier attempt failed transiently and may have committed)"
        );

        let error = final_error(&job, SubmitError::Transient("peer unavailable".to_string()));
        assert_eq!(error, JobError::transient("peer unavailable"));
    }

    #[test]
    fn test_final_error_first_attempt_is_unchanged() {
        let job = Job::queued(Principal::new("alice", "Org1MSP"), "CreateMessage", "m1", create_args("m1"), 3);

        let error = final_error(&job, SubmitError::Permanent("The message m1 already exists".to_string()));
        assert_eq!(error, JobError::permanent("The message m1 already exists"));
    }
}
