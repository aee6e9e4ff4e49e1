//! Auth Service
//!
//! Login against the identity wallet and API key issuance.

use serde_json::Value;
use tally_core::dto::auth::LoginResponse;
use tally_core::dto::error::FieldError;
use thiserror::Error;

use crate::auth::{CredentialResolver, IdentityWallet, WalletError};

/// Service error type
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("invalid login request")]
    Validation(Vec<FieldError>),

    #[error("{0}")]
    LoginFailed(String),

    #[error(transparent)]
    Wallet(WalletError),
}

/// Verify `{userId, privateKey}` and issue a fresh API key
pub async fn login(
    wallet: &dyn IdentityWallet,
    credentials: &dyn CredentialResolver,
    body: &Value,
) -> Result<LoginResponse, AuthError> {
    let (user_id, private_key) = validate_login_body(body).map_err(AuthError::Validation)?;

    let principal = wallet
        .verify(&user_id, &private_key)
        .await
        .map_err(|e| match e {
            WalletError::UnknownIdentity(_) | WalletError::InvalidKey(_) => {
                AuthError::LoginFailed(e.to_string())
            }
            other => AuthError::Wallet(other),
        })?;

    let api_key = credentials.issue(principal.clone());
    tracing::info!("Issued API key for {}", principal);

    Ok(LoginResponse {
        status: "OK".to_string(),
        message: "Login successful".to_string(),
        user_id,
        api_key,
    })
}

// =============================================================================
// Validation
// =============================================================================

fn validate_login_body(body: &Value) -> Result<(String, String), Vec<FieldError>> {
    let field = |name: &str| {
        body.get(name)
            .and_then(Value::as_str)
            .filter(|value| !value.is_empty())
            .map(str::to_string)
    };

    match (field("userId"), field("privateKey")) {
        (Some(user_id), Some(private_key)) => Ok((user_id, private_key)),
        (user_id, private_key) => {
            let mut errors = Vec::new();
            if user_id.is_none() {
                errors.push(FieldError::new("userId", "userId is required"));
            }
            if private_key.is_none() {
                errors.push(FieldError::new("privateKey", "privateKey is required"));
            }
            Err(errors)
        }
    }
}
