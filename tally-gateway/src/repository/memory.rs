//! In-memory job store
//!
//! Keeps every job in a map guarded by a single async mutex, which makes each
//! trait call trivially atomic. Survives worker crashes but not a process restart.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tally_core::domain::job::{Job, JobError, JobState};
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{JobStore, Result, StoreError};

#[derive(Debug, Default)]
pub struct MemoryJobStore {
    inner: Mutex<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    jobs: HashMap<Uuid, Job>,
    /// Unfinished job ids in enqueue order
    open: Vec<Uuid>,
}

impl Inner {
    fn claimed_mut(&mut self, id: Uuid, worker_id: &str) -> Result<&mut Job> {
        let job = self.jobs.get_mut(&id).ok_or(StoreError::NotFound(id))?;

        if job.state != JobState::InFlight || job.worker_id.as_deref() != Some(worker_id) {
            return Err(StoreError::ClaimLost {
                id,
                worker_id: worker_id.to_string(),
            });
        }

        Ok(job)
    }

    fn close(&mut self, id: Uuid) {
        self.open.retain(|open_id| *open_id != id);
    }
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of jobs currently held, terminal ones included
    pub async fn len(&self) -> usize {
        self.inner.lock().await.jobs.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn insert(&self, job: &Job) -> Result<()> {
        let mut inner = self.inner.lock().await;

        if inner.jobs.contains_key(&job.id) {
            return Err(StoreError::Duplicate(job.id));
        }

        if !job.is_terminal() {
            inner.open.push(job.id);
        }
        inner.jobs.insert(job.id, job.clone());

        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Job>> {
        Ok(self.inner.lock().await.jobs.get(&id).cloned())
    }

    async fn claim_next(&self, worker_id: &str, now: DateTime<Utc>) -> Result<Option<Job>> {
        let mut inner = self.inner.lock().await;

        // Keys with an earlier unfinished job; later jobs on them must wait.
        let mut blocked: HashSet<&str> = HashSet::new();
        let mut chosen = None;

        for id in &inner.open {
            let job = &inner.jobs[id];
            if blocked.contains(job.record_key.as_str()) {
                continue;
            }
            if job.state == JobState::Queued && job.available_at <= now {
                chosen = Some(*id);
                break;
            }
            blocked.insert(job.record_key.as_str());
        }

        let Some(id) = chosen else {
            return Ok(None);
        };

        let job = inner.jobs.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        job.state = JobState::InFlight;
        job.worker_id = Some(worker_id.to_string());
        job.attempts += 1;
        job.updated_at = now;

        Ok(Some(job.clone()))
    }

    async fn complete(&self, id: Uuid, worker_id: &str, result: serde_json::Value) -> Result<Job> {
        let mut inner = self.inner.lock().await;
        let job = inner.claimed_mut(id, worker_id)?;

        job.state = JobState::Succeeded;
        job.result = Some(result);
        job.last_error = None;
        job.updated_at = Utc::now();
        let job = job.clone();

        inner.close(id);
        Ok(job)
    }

    async fn requeue(
        &self,
        id: Uuid,
        worker_id: &str,
        error: JobError,
        available_at: DateTime<Utc>,
    ) -> Result<Job> {
        let mut inner = self.inner.lock().await;
        let job = inner.claimed_mut(id, worker_id)?;

        job.state = JobState::Queued;
        job.last_error = Some(error);
        job.available_at = available_at;
        job.updated_at = Utc::now();

        Ok(job.clone())
    }

    async fn fail(&self, id: Uuid, worker_id: &str, error: JobError) -> Result<Job> {
        let mut inner = self.inner.lock().await;
        let job = inner.claimed_mut(id, worker_id)?;

        job.state = JobState::Failed;
        job.result = None;
        job.last_error = Some(error);
        job.updated_at = Utc::now();
        let job = job.clone();

        inner.close(id);
        Ok(job)
    }

    async fn release_stale(&self, claimed_before: DateTime<Utc>) -> Result<u64> {
        let mut inner = self.inner.lock().await;
        let now = Utc::now();
        let mut released = 0;

        let Inner { jobs, open } = &mut *inner;
        for id in open.iter() {
            if let Some(job) = jobs.get_mut(id) {
                if job.state == JobState::InFlight && job.updated_at < claimed_before {
                    job.state = JobState::Queued;
                    job.worker_id = None;
                    job.available_at = now;
                    job.updated_at = now;
                    released += 1;
                }
            }
        }

        Ok(released)
    }

    async fn reap_terminal(&self, updated_before: DateTime<Utc>) -> Result<u64> {
        let mut inner = self.inner.lock().await;
        let before = inner.jobs.len();

        inner
            .jobs
            .retain(|_, job| !(job.is_terminal() && job.updated_at < updated_before));

        Ok((before - inner.jobs.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use tally_core::domain::principal::Principal;

    fn job(key: &str) -> Job {
        Job::queued(
            Principal::new("alice", "Org1MSP"),
            "UpdateMessage",
            key,
            vec![key.to_string()],
            3,
        )
    }

    #[tokio::test]
    async fn test_claim_marks_in_flight_and_counts_attempt() {
        let store = MemoryJobStore::new();
        let queued = job("m1");
        store.insert(&queued).await.unwrap();

        let claimed = store.claim_next("w1", Utc::now()).await.unwrap().unwrap();

        assert_eq!(claimed.id, queued.id);
        assert_eq!(claimed.state, JobState::InFlight);
        assert_eq!(claimed.worker_id.as_deref(), Some("w1"));
        assert_eq!(claimed.attempts, 1);
        assert!(store.claim_next("w2", Utc::now()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_same_key_waits_for_earlier_job() {
        let store = MemoryJobStore::new();
        let first = job("m1");
        let second = job("m1");
        let other = job("m2");
        store.insert(&first).await.unwrap();
        store.insert(&second).await.unwrap();
        store.insert(&other).await.unwrap();

        let a = store.claim_next("w1", Utc::now()).await.unwrap().unwrap();
        let b = store.claim_next("w2", Utc::now()).await.unwrap().unwrap();
        assert_eq!(a.id, first.id);
        assert_eq!(b.id, other.id);
        assert!(store.claim_next("w3", Utc::now()).await.unwrap().is_none());

        store
            .complete(first.id, "w1", serde_json::Value::Null)
            .await
            .unwrap();
        let c = store.claim_next("w3", Utc::now()).await.unwrap().unwrap();
        assert_eq!(c.id, second.id);
    }

    #[tokio::test]
    async fn test_backoff_blocks_later_jobs_on_same_key() {
        let store = MemoryJobStore::new();
        let first = job("m1");
        let second = job("m1");
        store.insert(&first).await.unwrap();
        store.insert(&second).await.unwrap();

        store.claim_next("w1", Utc::now()).await.unwrap().unwrap();
        let later = Utc::now() + Duration::seconds(60);
        store
            .requeue(first.id, "w1", JobError::transient("timeout"), later)
            .await
            .unwrap();

        assert!(store.claim_next("w1", Utc::now()).await.unwrap().is_none());

        let retried = store.claim_next("w1", later).await.unwrap().unwrap();
        assert_eq!(retried.id, first.id);
        assert_eq!(retried.attempts, 2);
    }

    #[tokio::test]
    async fn test_transitions_require_claim_owner() {
        let store = MemoryJobStore::new();
        let queued = job("m1");
        store.insert(&queued).await.unwrap();

        let err = store
            .complete(queued.id, "w1", serde_json::Value::Null)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::ClaimLost { .. }));

        store.claim_next("w1", Utc::now()).await.unwrap();
        let err = store
            .fail(queued.id, "w2", JobError::permanent("nope"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::ClaimLost { .. }));

        let failed = store
            .fail(queued.id, "w1", JobError::permanent("nope"))
            .await
            .unwrap();
        assert_eq!(failed.state, JobState::Failed);

        // Terminal jobs never move again
        let err = store
            .complete(queued.id, "w1", serde_json::Value::Null)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::ClaimLost { .. }));
    }

    #[tokio::test]
    async fn test_duplicate_insert_rejected() {
        let store = MemoryJobStore::new();
        let queued = job("m1");
        store.insert(&queued).await.unwrap();

        assert!(matches!(
            store.insert(&queued).await,
            Err(StoreError::Duplicate(id)) if id == queued.id
        ));
    }

    #[tokio::test]
    async fn test_release_stale_requeues_abandoned_claims() {
        let store = MemoryJobStore::new();
        let queued = job("m1");
        store.insert(&queued).await.unwrap();
        store.claim_next("w1", Utc::now()).await.unwrap();

        let released = store
            .release_stale(Utc::now() + Duration::seconds(1))
            .await
            .unwrap();
        assert_eq!(released, 1);

        let job = store.find_by_id(queued.id).await.unwrap().unwrap();
        assert_eq!(job.state, JobState::Queued);
        assert!(job.worker_id.is_none());
        assert_eq!(job.attempts, 1);
    }

    #[tokio::test]
    async fn test_reap_only_removes_old_terminal_jobs() {
        let store = MemoryJobStore::new();
        let done = job("m1");
        let pending = job("m2");
        store.insert(&done).await.unwrap();
        store.insert(&pending).await.unwrap();

        store.claim_next("w1", Utc::now()).await.unwrap();
        store
            .complete(done.id, "w1", serde_json::json!({"ok": true}))
            .await
            .unwrap();

        let reaped = store
            .reap_terminal(Utc::now() + Duration::seconds(1))
            .await
            .unwrap();

        assert_eq!(reaped, 1);
        assert!(store.find_by_id(done.id).await.unwrap().is_none());
        assert!(store.find_by_id(pending.id).await.unwrap().is_some());
    }
}
