//! Job status endpoints

use std::time::Duration;

use reqwest::Method;
use tally_core::domain::job::Job;
use tokio::time::Instant;
use uuid::Uuid;

use crate::GatewayClient;
use crate::error::{ClientError, Result};

impl GatewayClient {
    /// Get the current status of a job
    pub async fn get_job(&self, job_id: Uuid) -> Result<Job> {
        let path = format!("/api/jobs/{}", job_id);
        let response = self.request(Method::GET, &path).send().await?;

        self.handle_response(response).await
    }

    /// Poll a job every `interval` until it succeeds or fails
    ///
    /// Returns [`ClientError::Timeout`] if the job is still pending after
    /// `timeout`. A terminal job is returned as-is, failed or not.
    pub async fn wait_for_job(&self, job_id: Uuid, interval: Duration, timeout: Duration) -> Result<Job> {
        let deadline = Instant::now() + timeout;

        loop {
            let job = self.get_job(job_id).await?;

            if job.is_terminal() {
                return Ok(job);
            }

            tracing::debug!(
                "Job {} is {} (attempt {}/{})",
                job.id,
                job.state,
                job.attempts,
                job.max_attempts
            );

            if Instant::now() + interval > deadline {
                return Err(ClientError::Timeout(job_id));
            }

            tokio::time::sleep(interval).await;
        }
    }
}
