//! Submission worker pool
//!
//! A fixed set of workers drains the job queue, each processing one job at a
//! time. Idle workers sleep until an enqueue signal or the poll interval,
//! whichever comes first; polling also picks up jobs whose backoff expired
//! and jobs enqueued by other gateway processes sharing the database.

pub mod maintenance;
pub mod retry;
pub mod submitter;

pub use maintenance::MaintenanceSettings;
pub use retry::RetryPolicy;
pub use submitter::SubmissionWorker;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{error, info};

use crate::backend::LedgerBackend;
use crate::queue::JobQueue;
use crate::repository::StoreError;

#[derive(Debug, Clone)]
pub struct WorkerSettings {
    pub worker_count: usize,
    /// Worker ids are `{id_prefix}-{n}`
    pub id_prefix: String,
    pub retry: RetryPolicy,
    pub submit_timeout: Duration,
    pub poll_interval: Duration,
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self {
            worker_count: 4,
            id_prefix: "worker".to_string(),
            retry: RetryPolicy::default(),
            submit_timeout: Duration::from_secs(30),
            poll_interval: Duration::from_secs(1),
        }
    }
}

pub struct WorkerPool {
    queue: JobQueue,
    backend: Arc<dyn LedgerBackend>,
    settings: WorkerSettings,
}

impl WorkerPool {
    pub fn new(queue: JobQueue, backend: Arc<dyn LedgerBackend>, settings: WorkerSettings) -> Self {
        Self {
            queue,
            backend,
            settings,
        }
    }

    /// Run all workers until shutdown
    ///
    /// Returns the first fatal store error; remaining workers are aborted and
    /// their claims are recovered by the stale-claim sweep.
    pub async fn run(self, shutdown: watch::Receiver<bool>) -> Result<(), StoreError> {
        info!(
            "Starting {} submission worker(s) (timeout: {:?}, max attempts: {})",
            self.settings.worker_count,
            self.settings.submit_timeout,
            self.queue.max_attempts()
        );

        let mut workers = JoinSet::new();

        for n in 0..self.settings.worker_count {
            let worker = SubmissionWorker::new(
                format!("{}-{}", self.settings.id_prefix, n),
                self.queue.clone(),
                Arc::clone(&self.backend),
                self.settings.clone(),
            );
            workers.spawn(worker.run(shutdown.clone()));
        }

        while let Some(joined) = workers.join_next().await {
            match joined {
                Ok(Ok(())) => {}
                Ok(Err(err)) => {
                    error!("Job store unavailable, stopping workers: {}", err);
                    workers.abort_all();
                    return Err(err);
                }
                Err(e) => {
                    error!("Worker task panicked: {}", e);
                }
            }
        }

        info!("All submission workers stopped");
        Ok(())
    }
}
