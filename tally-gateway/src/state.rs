use std::sync::Arc;

use crate::auth::{CredentialResolver, IdentityWallet};
use crate::backend::LedgerBackend;
use crate::queue::JobQueue;

/// Shared handles injected into every request handler
#[derive(Clone)]
pub struct AppState {
    pub queue: JobQueue,
    pub backend: Arc<dyn LedgerBackend>,
    pub wallet: Arc<dyn IdentityWallet>,
    pub credentials: Arc<dyn CredentialResolver>,
}

impl AppState {
    pub fn new(
        queue: JobQueue,
        backend: Arc<dyn LedgerBackend>,
        wallet: Arc<dyn IdentityWallet>,
        credentials: Arc<dyn CredentialResolver>,
    ) -> Self {
        Self {
            queue,
            backend,
            wallet,
            credentials,
        }
    }
}
