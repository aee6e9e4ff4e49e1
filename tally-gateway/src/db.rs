use sqlx::{PgPool, postgres::PgPoolOptions};
use std::time::Duration;

pub async fn create_pool(database_url: &str) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .acquire_timeout(Duration::from_secs(5))
        .connect(database_url)
        .await
}

pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::Error> {
    // `seq` gives the per-key enqueue order independently of clock skew
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS jobs (
            seq BIGSERIAL UNIQUE,
            id UUID PRIMARY KEY,
            user_id VARCHAR(255) NOT NULL,
            msp_id VARCHAR(255) NOT NULL,
            operation VARCHAR(255) NOT NULL,
            record_key TEXT NOT NULL,
            arguments JSONB NOT NULL DEFAULT '[]',
            state VARCHAR(20) NOT NULL,
            attempts INTEGER NOT NULL DEFAULT 0,
            max_attempts INTEGER NOT NULL,
            worker_id VARCHAR(255),
            result JSONB,
            error_kind VARCHAR(20),
            error_message TEXT,
            enqueued_at TIMESTAMPTZ NOT NULL,
            updated_at TIMESTAMPTZ NOT NULL,
            available_at TIMESTAMPTZ NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_jobs_claimable ON jobs(state, available_at, seq)")
        .execute(pool)
        .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_jobs_record_key ON jobs(record_key, seq)")
        .execute(pool)
        .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_jobs_updated_at ON jobs(updated_at)")
        .execute(pool)
        .await?;

    tracing::info!("Database migrations completed successfully");
    Ok(())
}
