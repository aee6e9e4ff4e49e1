//! Gateway configuration
//!
//! Defines all configurable parameters for the gateway: listen address,
//! storage and ledger selection, worker pool sizing and retry behaviour.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::Context;

use crate::queue::DEFAULT_MAX_ATTEMPTS;
use crate::worker::{MaintenanceSettings, RetryPolicy, WorkerSettings};

/// Gateway configuration
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Listen address (e.g., "0.0.0.0:3000")
    pub bind_addr: String,

    /// PostgreSQL URL; the in-memory job store is used when unset
    pub database_url: Option<String>,

    /// Ledger REST bridge URL; the in-memory ledger is used when unset
    pub ledger_url: Option<String>,

    /// Identity wallet file
    pub wallet_path: PathBuf,

    /// Answer CORS requests from any origin
    pub cors_allow_any: bool,

    /// Number of submission workers
    pub worker_count: usize,

    /// Prefix for worker ids, unique per process
    pub worker_id_prefix: String,

    /// Submit attempts per job, including the first
    pub max_attempts: u32,

    /// Backoff between attempts
    pub retry: RetryPolicy,

    /// Upper bound on a single submit call
    pub submit_timeout: Duration,

    /// Upper bound on a ledger read, including the response body
    pub evaluate_timeout: Duration,

    /// How often idle workers look for claimable jobs
    pub poll_interval: Duration,

    /// How long terminal jobs remain queryable
    pub job_retention: Duration,

    /// Age after which an in-flight claim is considered abandoned
    pub claim_lease: Duration,

    /// How often retention and stale-claim sweeps run
    pub maintenance_interval: Duration,
}

impl GatewayConfig {
    /// Creates a new configuration with defaults
    pub fn new(bind_addr: String) -> Self {
        Self {
            bind_addr,
            database_url: None,
            ledger_url: None,
            wallet_path: PathBuf::from("wallet.json"),
            cors_allow_any: false,
            worker_count: 4,
            worker_id_prefix: default_worker_prefix(),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            retry: RetryPolicy::default(),
            submit_timeout: Duration::from_secs(30),
            evaluate_timeout: Duration::from_secs(10),
            poll_interval: Duration::from_millis(1000),
            job_retention: Duration::from_secs(24 * 60 * 60),
            claim_lease: Duration::from_secs(300),
            maintenance_interval: Duration::from_secs(60),
        }
    }

    /// Creates configuration from environment variables
    ///
    /// Every variable is optional:
    /// - GATEWAY_BIND_ADDR (default: 0.0.0.0:3000)
    /// - DATABASE_URL, LEDGER_URL (default: in-memory)
    /// - WALLET_PATH (default: wallet.json)
    /// - CORS_ALLOW_ANY (default: false)
    /// - WORKER_COUNT (default: 4)
    /// - MAX_ATTEMPTS (default: 5)
    /// - RETRY_BASE_DELAY_MS (default: 500), RETRY_MAX_DELAY_MS (default: 30000)
    /// - SUBMIT_TIMEOUT_SECS (default: 30)
    /// - EVALUATE_TIMEOUT_SECS (default: 10)
    /// - POLL_INTERVAL_MS (default: 1000)
    /// - JOB_RETENTION_SECS (default: 86400)
    /// - CLAIM_LEASE_SECS (default: 300)
    /// - MAINTENANCE_INTERVAL_SECS (default: 60)
    /// - WORKER_ID_PREFIX (default: gateway-<random hex>)
    pub fn from_env() -> anyhow::Result<Self> {
        let mut config = Self::default();

        if let Ok(addr) = std::env::var("GATEWAY_BIND_ADDR") {
            config.bind_addr = addr;
        }
        config.database_url = non_empty_var("DATABASE_URL");
        config.ledger_url = non_empty_var("LEDGER_URL");
        if let Some(path) = non_empty_var("WALLET_PATH") {
            config.wallet_path = PathBuf::from(path);
        }
        if let Some(allow) = parse_var("CORS_ALLOW_ANY")? {
            config.cors_allow_any = allow;
        }

        if let Some(count) = parse_var("WORKER_COUNT")? {
            config.worker_count = count;
        }
        if let Some(prefix) = non_empty_var("WORKER_ID_PREFIX") {
            config.worker_id_prefix = prefix;
        }
        if let Some(attempts) = parse_var("MAX_ATTEMPTS")? {
            config.max_attempts = attempts;
        }
        if let Some(ms) = parse_var("RETRY_BASE_DELAY_MS")? {
            config.retry.base_delay = Duration::from_millis(ms);
        }
        if let Some(ms) = parse_var("RETRY_MAX_DELAY_MS")? {
            config.retry.max_delay = Duration::from_millis(ms);
        }
        if let Some(secs) = parse_var("SUBMIT_TIMEOUT_SECS")? {
            config.submit_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = parse_var("EVALUATE_TIMEOUT_SECS")? {
            config.evaluate_timeout = Duration::from_secs(secs);
        }
        if let Some(ms) = parse_var("POLL_INTERVAL_MS")? {
            config.poll_interval = Duration::from_millis(ms);
        }
        if let Some(secs) = parse_var("JOB_RETENTION_SECS")? {
            config.job_retention = Duration::from_secs(secs);
        }
        if let Some(secs) = parse_var("CLAIM_LEASE_SECS")? {
            config.claim_lease = Duration::from_secs(secs);
        }
        if let Some(secs) = parse_var("MAINTENANCE_INTERVAL_SECS")? {
            config.maintenance_interval = Duration::from_secs(secs);
        }

        Ok(config)
    }

    /// Validates the configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.bind_addr.is_empty() {
            anyhow::bail!("bind_addr cannot be empty");
        }

        if let Some(url) = &self.ledger_url {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                anyhow::bail!("ledger_url must start with http:// or https://");
            }
        }

        if self.worker_count == 0 {
            anyhow::bail!("worker_count must be greater than 0");
        }

        if self.max_attempts == 0 {
            anyhow::bail!("max_attempts must be greater than 0");
        }

        if self.retry.base_delay > self.retry.max_delay {
            anyhow::bail!("retry base delay cannot exceed the max delay");
        }

        if self.submit_timeout.is_zero() {
            anyhow::bail!("submit_timeout must be greater than 0");
        }

        if self.evaluate_timeout.is_zero() {
            anyhow::bail!("evaluate_timeout must be greater than 0");
        }

        if self.poll_interval.is_zero() {
            anyhow::bail!("poll_interval must be greater than 0");
        }

        if self.maintenance_interval.is_zero() {
            anyhow::bail!("maintenance_interval must be greater than 0");
        }

        // A live submit must never look abandoned
        if self.claim_lease <= self.submit_timeout {
            anyhow::bail!("claim_lease must be longer than submit_timeout");
        }

        Ok(())
    }

    pub fn worker_settings(&self) -> WorkerSettings {
        WorkerSettings {
            worker_count: self.worker_count,
            id_prefix: self.worker_id_prefix.clone(),
            retry: self.retry,
            submit_timeout: self.submit_timeout,
            poll_interval: self.poll_interval,
        }
    }

    pub fn maintenance_settings(&self) -> MaintenanceSettings {
        MaintenanceSettings {
            interval: self.maintenance_interval,
            retention: self.job_retention,
            claim_lease: self.claim_lease,
        }
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self::new("0.0.0.0:3000".to_string())
    }
}

fn default_worker_prefix() -> String {
    let id = uuid::Uuid::new_v4().simple().to_string();
    format!("gateway-{}", &id[..8])
}

fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|value| !value.trim().is_empty())
}

fn parse_var<T>(name: &str) -> anyhow::Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    non_empty_var(name)
        .map(|raw| {
            raw.trim()
                .parse::<T>()
                .with_context(|| format!("invalid value for {}: {:?}", name, raw))
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = GatewayConfig::default();
        assert_eq!(config.bind_addr, "0.0.0.0:3000");
        assert_eq!(config.worker_count, 4);
        assert_eq!(config.max_attempts, 5);
        assert_eq!(config.retry.base_delay, Duration::from_millis(500));
        assert_eq!(config.retry.max_delay, Duration::from_secs(30));
        assert_eq!(config.submit_timeout, Duration::from_secs(30));
        assert_eq!(config.evaluate_timeout, Duration::from_secs(10));
        assert_eq!(config.job_retention, Duration::from_secs(86400));
        assert!(config.database_url.is_none());
        assert!(!config.cors_allow_any);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = GatewayConfig::default();

        config.worker_count = 0;
        assert!(config.validate().is_err());
        config.worker_count = 2;

        config.ledger_url = Some("ledger:7000".to_string());
        assert!(config.validate().is_err());
        config.ledger_url = Some("http://ledger:7000".to_string());
        assert!(config.validate().is_ok());

        config.max_attempts = 0;
        assert!(config.validate().is_err());
        config.max_attempts = 1;

        config.evaluate_timeout = Duration::ZERO;
        assert!(config.validate().is_err());
        config.evaluate_timeout = Duration::from_secs(2);

        config.claim_lease = config.submit_timeout;
        assert!(config.validate().is_err());
        config.claim_lease = Duration::from_secs(600);

        config.retry.base_delay = Duration::from_secs(60);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_worker_settings_follow_config() {
        let mut config = GatewayConfig::default();
        config.worker_count = 8;
        config.worker_id_prefix = "gw".to_string();

        let settings = config.worker_settings();
        assert_eq!(settings.worker_count, 8);
        assert_eq!(settings.id_prefix, "gw");
        assert_eq!(settings.retry, config.retry);
        assert_eq!(
            config.maintenance_settings().claim_lease,
            Duration::from_secs(300)
        );
    }
}
