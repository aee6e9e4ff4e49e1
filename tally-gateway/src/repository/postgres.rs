//! PostgreSQL job store
//!
//! Handles all database operations related to jobs. Claims use
//! `FOR UPDATE SKIP LOCKED` so concurrent workers (in this process or another
//! gateway instance) never pick the same row, and a `NOT EXISTS` guard keeps
//! jobs on the same record key in enqueue (`seq`) order.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tally_core::domain::job::{Job, JobError, JobState};
use tally_core::domain::principal::Principal;
use uuid::Uuid;

use super::{JobStore, Result, StoreError};

const JOB_COLUMNS: &str = "id, user_id, msp_id, operation, record_key, arguments, state, \
     attempts, max_attempts, worker_id, result, error_kind, error_message, \
     enqueued_at, updated_at, available_at";

#[derive(Debug, Clone)]
pub struct PgJobStore {
    pool: PgPool,
}

impl PgJobStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Distinguish a vanished job from one whose claim moved on
    async fn claim_lost(&self, id: Uuid, worker_id: &str) -> StoreError {
        match self.find_by_id(id).await {
            Ok(Some(_)) => StoreError::ClaimLost {
                id,
                worker_id: worker_id.to_string(),
            },
            Ok(None) => StoreError::NotFound(id),
            Err(err) => err,
        }
    }
}

#[async_trait]
impl JobStore for PgJobStore {
    async fn insert(&self, job: &Job) -> Result<()> {
        let (error_kind, error_message) = split_error(job.last_error.as_ref());

        sqlx::query(
            r#"
            INSERT INTO jobs (id, user_id, msp_id, operation, record_key, arguments, state,
                              attempts, max_attempts, worker_id, result, error_kind, error_message,
                              enqueued_at, updated_at, available_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
            "#,
        )
        .bind(job.id)
        .bind(&job.principal.user_id)
        .bind(&job.principal.msp_id)
        .bind(&job.operation)
        .bind(&job.record_key)
        .bind(serde_json::Value::from(job.arguments.clone()))
        .bind(job.state.as_str())
        .bind(job.attempts as i32)
        .bind(job.max_attempts as i32)
        .bind(&job.worker_id)
        .bind(&job.result)
        .bind(error_kind)
        .bind(error_message)
        .bind(job.enqueued_at)
        .bind(job.updated_at)
        .bind(job.available_at)
        .execute(&self.pool)
        .await
        .map_err(|err| match &err {
            sqlx::Error::Database(db) if db.is_unique_violation() => StoreError::Duplicate(job.id),
            _ => StoreError::Database(err),
        })?;

        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Job>> {
        let sql = format!("SELECT {} FROM jobs WHERE id = $1", JOB_COLUMNS);

        let row = sqlx::query_as::<_, JobRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(Job::try_from).transpose()
    }

    async fn claim_next(&self, worker_id: &str, now: DateTime<Utc>) -> Result<Option<Job>> {
        let sql = format!(
            r#"
            UPDATE jobs
            SET state = 'InFlight', worker_id = $1, attempts = attempts + 1, updated_at = $2
            WHERE id = (
                SELECT j.id FROM jobs j
                WHERE j.state = 'Queued'
                  AND j.available_at <= $2
                  AND NOT EXISTS (
                      SELECT 1 FROM jobs e
                      WHERE e.record_key = j.record_key
                        AND e.seq < j.seq
                        AND e.state IN ('Queued', 'InFlight')
                  )
                ORDER BY j.seq
                LIMIT 1
                FOR UPDATE SKIP LOCKED
            )
            AND state = 'Queued'
            RETURNING {}
            "#,
            JOB_COLUMNS
        );

        let row = sqlx::query_as::<_, JobRow>(&sql)
            .bind(worker_id)
            .bind(now)
            .fetch_optional(&self.pool)
            .await?;

        row.map(Job::try_from).transpose()
    }

    async fn complete(&self, id: Uuid, worker_id: &str, result: serde_json::Value) -> Result<Job> {
        let sql = format!(
            r#"
            UPDATE jobs
            SET state = 'Succeeded', result = $3, error_kind = NULL, error_message = NULL,
                updated_at = $4
            WHERE id = $1 AND state = 'InFlight' AND worker_id = $2
            RETURNING {}
            "#,
            JOB_COLUMNS
        );

        let row = sqlx::query_as::<_, JobRow>(&sql)
            .bind(id)
            .bind(worker_id)
            .bind(result)
            .bind(Utc::now())
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => Job::try_from(row),
            None => Err(self.claim_lost(id, worker_id).await),
        }
    }

    async fn requeue(
        &self,
        id: Uuid,
        worker_id: &str,
        error: JobError,
        available_at: DateTime<Utc>,
    ) -> Result<Job> {
        let sql = format!(
            r#"
            UPDATE jobs
            SET state = 'Queued', error_kind = $3, error_message = $4, available_at = $5,
                updated_at = $6
            WHERE id = $1 AND state = 'InFlight' AND worker_id = $2
            RETURNING {}
            "#,
            JOB_COLUMNS
        );

        let row = sqlx::query_as::<_, JobRow>(&sql)
            .bind(id)
            .bind(worker_id)
            .bind(error.kind.as_str())
            .bind(&error.message)
            .bind(available_at)
            .bind(Utc::now())
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => Job::try_from(row),
            None => Err(self.claim_lost(id, worker_id).await),
        }
    }

    async fn fail(&self, id: Uuid, worker_id: &str, error: JobError) -> Result<Job> {
        let sql = format!(
            r#"
            UPDATE jobs
            SET state = 'Failed', result = NULL, error_kind = $3, error_message = $4,
                updated_at = $5
            WHERE id = $1 AND state = 'InFlight' AND worker_id = $2
            RETURNING {}
            "#,
            JOB_COLUMNS
        );

        let row = sqlx::query_as::<_, JobRow>(&sql)
            .bind(id)
            .bind(worker_id)
            .bind(error.kind.as_str())
            .bind(&error.message)
            .bind(Utc::now())
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => Job::try_from(row),
            None => Err(self.claim_lost(id, worker_id).await),
        }
    }

    async fn release_stale(&self, claimed_before: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE jobs
            SET state = 'Queued', worker_id = NULL, available_at = $2, updated_at = $2
            WHERE state = 'InFlight' AND updated_at < $1
            "#,
        )
        .bind(claimed_before)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn reap_terminal(&self, updated_before: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query(
            "DELETE FROM jobs WHERE state IN ('Succeeded', 'Failed') AND updated_at < $1",
        )
        .bind(updated_before)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

fn split_error(error: Option<&JobError>) -> (Option<&'static str>, Option<String>) {
    match error {
        Some(error) => (Some(error.kind.as_str()), Some(error.message.clone())),
        None => (None, None),
    }
}

// =============================================================================
// Database Row Types
// =============================================================================

#[derive(sqlx::FromRow)]
struct JobRow {
    id: Uuid,
    user_id: String,
    msp_id: String,
    operation: String,
    record_key: String,
    arguments: serde_json::Value,
    state: String,
    attempts: i32,
    max_attempts: i32,
    worker_id: Option<String>,
    result: Option<serde_json::Value>,
    error_kind: Option<String>,
    error_message: Option<String>,
    enqueued_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    available_at: DateTime<Utc>,
}

impl TryFrom<JobRow> for Job {
    type Error = StoreError;

    fn try_from(row: JobRow) -> Result<Self> {
        let corrupt = |reason: String| StoreError::Corrupt { id: row.id, reason };

        let state: JobState = row.state.parse().map_err(corrupt)?;
        let arguments: Vec<String> = serde_json::from_value(row.arguments.clone())
            .map_err(|e| corrupt(format!("arguments: {}", e)))?;

        let last_error = match (row.error_kind.as_deref(), row.error_message) {
            (Some(kind), Some(message)) => Some(JobError {
                kind: kind.parse().map_err(corrupt)?,
                message,
            }),
            _ => None,
        };

        Ok(Job {
            id: row.id,
            principal: Principal::new(row.user_id, row.msp_id),
            operation: row.operation,
            record_key: row.record_key,
            arguments,
            state,
            attempts: row.attempts.max(0) as u32,
            max_attempts: row.max_attempts.max(0) as u32,
            worker_id: row.worker_id,
            result: row.result,
            last_error,
            enqueued_at: row.enqueued_at,
            updated_at: row.updated_at,
            available_at: row.available_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(state: &str) -> JobRow {
        let now = Utc::now();
        JobRow {
            id: Uuid::new_v4(),
            user_id: "alice".to_string(),
            msp_id: "Org1MSP".to_string(),
            operation: "CreateMessage".to_string(),
            record_key: "m1".to_string(),
            arguments: serde_json::json!(["m1", "3"]),
            state: state.to_string(),
            attempts: 2,
            max_attempts: 5,
            worker_id: Some("gateway-0".to_string()),
            result: None,
            error_kind: Some("transient".to_string()),
            error_message: Some("timed out".to_string()),
            enqueued_at: now,
            updated_at: now,
            available_at: now,
        }
    }

    #[test]
    fn test_row_converts_to_job() {
        let job = Job::try_from(row("Queued")).unwrap();

        assert_eq!(job.state, JobState::Queued);
        assert_eq!(job.arguments, vec!["m1", "3"]);
        assert_eq!(job.attempts, 2);
        assert_eq!(job.principal, Principal::new("alice", "Org1MSP"));
        assert_eq!(job.last_error, Some(JobError::transient("timed out")));
    }

    #[test]
    fn test_unknown_state_is_corrupt() {
        let err = Job::try_from(row("Running")).unwrap_err();
        assert!(matches!(err, StoreError::Corrupt { .. }));
    }

    #[test]
    fn test_split_error() {
        assert_eq!(split_error(None), (None, None));
        assert_eq!(
            split_error(Some(&JobError::permanent("exists"))),
            (Some("permanent"), Some("exists".to_string()))
        );
    }
}
