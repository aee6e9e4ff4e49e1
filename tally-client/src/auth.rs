//! Authentication endpoint

use reqwest::Method;
use tally_core::dto::auth::{LoginRequest, LoginResponse};

use crate::GatewayClient;
use crate::error::Result;

impl GatewayClient {
    /// Log in with a wallet identity
    ///
    /// The returned `api_key` is not stored; pass it to
    /// [`GatewayClient::with_api_key`] to authenticate later calls.
    pub async fn login(&self, user_id: &str, private_key: &str) -> Result<LoginResponse> {
        let response = self
            .request(Method::POST, "/api/auth/login")
            .json(&LoginRequest {
                user_id: user_id.to_string(),
                private_key: private_key.to_string(),
            })
            .send()
            .await?;

        self.handle_response(response).await
    }
}
