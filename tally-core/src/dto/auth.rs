//! Authentication DTOs

use serde::{Deserialize, Serialize};

/// Login with a wallet identity and its private key
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    pub user_id: String,
    pub private_key: String,
}

/// Successful login; `api_key` goes in the `X-API-Key` header of later requests
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub status: String,
    pub message: String,
    pub user_id: String,
    pub api_key: String,
}
