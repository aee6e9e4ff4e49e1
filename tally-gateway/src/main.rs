use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tally_gateway::auth::{ApiKeyStore, CredentialResolver, FileWallet, IdentityWallet};
use tally_gateway::backend::{HttpLedgerBackend, LedgerBackend, MemoryLedger};
use tally_gateway::repository::{JobStore, MemoryJobStore, PgJobStore, StoreError};
use tally_gateway::worker::{WorkerPool, maintenance};
use tally_gateway::{AppState, GatewayConfig, JobQueue, api, db};
use tokio::sync::watch;
use tokio::task::{JoinError, JoinSet};
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const LEDGER_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tally_gateway=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Tally Gateway...");

    let config = GatewayConfig::from_env().context("Failed to load configuration")?;
    config.validate()?;

    let store = build_store(&config).await?;
    let backend = build_backend(&config)?;
    let wallet = load_wallet(&config).await?;
    let credentials: Arc<dyn CredentialResolver> = Arc::new(ApiKeyStore::new());

    let queue = JobQueue::new(store, config.max_attempts);
    let state = AppState::new(queue.clone(), Arc::clone(&backend), wallet, credentials);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // Background tasks: a fatal error from either one stops the process
    let mut tasks = JoinSet::new();
    tasks.spawn(WorkerPool::new(queue.clone(), backend, config.worker_settings()).run(shutdown_rx.clone()));
    tasks.spawn(maintenance::run(
        queue,
        config.maintenance_settings(),
        shutdown_rx.clone(),
    ));

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", config.bind_addr))?;

    info!("Listening on {}", config.bind_addr);

    let mut app = api::create_router(state);
    if config.cors_allow_any {
        warn!("CORS_ALLOW_ANY set, accepting cross-origin requests from any origin");
        app = api::with_permissive_cors(app);
    }

    let mut server_shutdown = shutdown_rx.clone();
    let server = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = server_shutdown.wait_for(|stop| *stop).await;
            })
            .await
    });

    let mut failure = None;
    tokio::select! {
        _ = shutdown_signal() => info!("Shutdown signal received"),
        Some(joined) = tasks.join_next() => failure = task_failure(joined),
    }

    // Stop accepting requests and let workers finish their current job
    let _ = shutdown_tx.send(true);

    while let Some(joined) = tasks.join_next().await {
        if let Some(err) = task_failure(joined) {
            failure.get_or_insert(err);
        }
    }

    match server.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!("Server error during shutdown: {}", e),
        Err(e) => warn!("Server task panicked: {}", e),
    }

    match failure {
        Some(err) => {
            error!("Gateway stopped: {:#}", err);
            Err(err)
        }
        None => {
            info!("Gateway stopped");
            Ok(())
        }
    }
}

/// PostgreSQL when DATABASE_URL is set, otherwise process memory
async fn build_store(config: &GatewayConfig) -> Result<Arc<dyn JobStore>> {
    let Some(database_url) = &config.database_url else {
        warn!("DATABASE_URL not set, jobs are kept in memory and lost on restart");
        return Ok(Arc::new(MemoryJobStore::new()));
    };

    info!("Connecting to database...");

    let pool = db::create_pool(database_url)
        .await
        .context("Failed to create database pool")?;

    db::run_migrations(&pool)
        .await
        .context("Failed to run database migrations")?;

    let store = PgJobStore::new(pool);

    // Claims left behind by a previous process
    let cutoff = chrono::Duration::from_std(config.claim_lease)
        .ok()
        .and_then(|lease| chrono::Utc::now().checked_sub_signed(lease))
        .context("claim lease out of range")?;
    let released = store.release_stale(cutoff).await?;
    if released > 0 {
        warn!("Released {} stale claim(s) from a previous run", released);
    }

    Ok(Arc::new(store))
}

/// HTTP bridge when LEDGER_URL is set, otherwise the in-memory contract
fn build_backend(config: &GatewayConfig) -> Result<Arc<dyn LedgerBackend>> {
    match &config.ledger_url {
        Some(url) => {
            info!("Using ledger bridge at {}", url);
            let backend = HttpLedgerBackend::new(
                url.clone(),
                LEDGER_CONNECT_TIMEOUT,
                config.evaluate_timeout,
            )
            .context("Failed to build ledger client")?;
            Ok(Arc::new(backend))
        }
        None => {
            warn!("LEDGER_URL not set, using the in-memory ledger");
            Ok(Arc::new(MemoryLedger::seeded()))
        }
    }
}

async fn load_wallet(config: &GatewayConfig) -> Result<Arc<dyn IdentityWallet>> {
    if !tokio::fs::try_exists(&config.wallet_path).await.unwrap_or(false) {
        warn!(
            "Wallet {} not found, no user can log in",
            config.wallet_path.display()
        );
        return Ok(Arc::new(FileWallet::default()));
    }

    let wallet = FileWallet::load(&config.wallet_path)
        .await
        .with_context(|| format!("Failed to load wallet {}", config.wallet_path.display()))?;

    Ok(Arc::new(wallet))
}

fn task_failure(joined: Result<Result<(), StoreError>, JoinError>) -> Option<anyhow::Error> {
    match joined {
        Ok(Ok(())) => None,
        Ok(Err(err)) => Some(anyhow::Error::new(err).context("Job store failure")),
        Err(err) => Some(anyhow::Error::new(err).context("Background task panicked")),
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
