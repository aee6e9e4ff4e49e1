//! Caller authentication
//!
//! Login verifies a user against the identity wallet and binds a fresh API
//! key to the resulting principal. Every protected request resolves its
//! `X-API-Key` header back to that principal.

pub mod api_key;
pub mod wallet;

pub use api_key::ApiKeyStore;
pub use wallet::FileWallet;

use async_trait::async_trait;
use tally_core::domain::principal::Principal;
use thiserror::Error;

/// Request header carrying the API key
pub const API_KEY_HEADER: &str = "X-API-Key";

#[derive(Debug, Error)]
pub enum WalletError {
    #[error("No identity found in wallet for user {0}")]
    UnknownIdentity(String),

    #[error("Invalid private key for user {0}")]
    InvalidKey(String),

    #[error("failed to read wallet: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid wallet file: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Source of enrolled ledger identities
#[async_trait]
pub trait IdentityWallet: Send + Sync {
    /// Check `private_key` against the stored identity of `user_id`
    async fn verify(&self, user_id: &str, private_key: &str) -> Result<Principal, WalletError>;
}

/// Mapping from issued API keys to principals
pub trait CredentialResolver: Send + Sync {
    /// Issue a new key bound to `principal`
    fn issue(&self, principal: Principal) -> String;

    fn resolve(&self, api_key: &str) -> Option<Principal>;
}
