//! Periodic job housekeeping
//!
//! Deletes terminal jobs past their retention and returns claims abandoned by
//! crashed workers to the queue.

use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tokio::time;
use tracing::{debug, info, warn};

use crate::queue::JobQueue;
use crate::repository::StoreError;

#[derive(Debug, Clone, Copy)]
pub struct MaintenanceSettings {
    pub interval: Duration,
    /// How long terminal jobs stay queryable
    pub retention: Duration,
    /// Claims older than this are considered abandoned
    pub claim_lease: Duration,
}

/// Run one housekeeping pass, returning `(reaped, released)`
pub async fn sweep(queue: &JobQueue, settings: &MaintenanceSettings) -> Result<(u64, u64), StoreError> {
    let now = Utc::now();
    let store = queue.store();

    let reaped = match cutoff(now, settings.retention) {
        Some(before) => store.reap_terminal(before).await?,
        None => 0,
    };

    let released = match cutoff(now, settings.claim_lease) {
        Some(before) => store.release_stale(before).await?,
        None => 0,
    };

    if reaped > 0 {
        info!("Removed {} expired job(s)", reaped);
    }
    if released > 0 {
        warn!("Released {} stale claim(s) back to the queue", released);
        queue.wake_all();
    }

    Ok((reaped, released))
}

/// Sweep every `settings.interval` until shutdown
///
/// Returns only on shutdown or a fatal store error.
pub async fn run(
    queue: JobQueue,
    settings: MaintenanceSettings,
    mut shutdown: watch::Receiver<bool>,
) -> Result<(), StoreError> {
    info!(
        "Starting job maintenance (interval: {:?}, retention: {:?})",
        settings.interval, settings.retention
    );

    let mut ticker = time::interval(settings.interval);

    loop {
        tokio::select! {
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
            _ = ticker.tick() => {
                debug!("Running job maintenance");
                match sweep(&queue, &settings).await {
                    Ok(_) => {}
                    Err(err) if err.is_fatal() => return Err(err),
                    Err(err) => warn!("Job maintenance failed: {}", err),
                }
            }
        }
    }

    Ok(())
}

fn cutoff(now: DateTime<Utc>, age: Duration) -> Option<DateTime<Utc>> {
    chrono::Duration::from_std(age)
        .ok()
        .and_then(|age| now.checked_sub_signed(age))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::MemoryJobStore;
    use std::sync::Arc;
    use tally_core::domain::principal::Principal;

    #[tokio::test]
    async fn test_sweep_removes_expired_and_releases_stale() {
        let queue = JobQueue::new(Arc::new(MemoryJobStore::new()), 3);
        let principal = Principal::new("alice", "Org1MSP");

        let done = queue
            .enqueue(principal.clone(), "DeleteMessage", "m1", vec!["m1".into()])
            .await
            .unwrap();
        queue.claim("w-0").await.unwrap();
        queue
            .complete(done.id, "w-0", serde_json::Value::Null)
            .await
            .unwrap();

        let stuck = queue
            .enqueue(principal, "DeleteMessage", "m2", vec!["m2".into()])
            .await
            .unwrap();
        queue.claim("w-1").await.unwrap();

        let settings = MaintenanceSettings {
            interval: Duration::from_secs(60),
            retention: Duration::ZERO,
            claim_lease: Duration::ZERO,
        };
        tokio::time::sleep(Duration::from_millis(5)).await;

        let (reaped, released) = sweep(&queue, &settings).await.unwrap();
        assert_eq!((reaped, released), (1, 1));
        assert!(queue.get(done.id).await.unwrap().is_none());
        assert!(queue.get(stuck.id).await.unwrap().unwrap().worker_id.is_none());
    }

    #[test]
    fn test_cutoff_overflow_is_none() {
        assert!(cutoff(Utc::now(), Duration::MAX).is_none());
        assert!(cutoff(Utc::now(), Duration::from_secs(60)).is_some());
    }
}
