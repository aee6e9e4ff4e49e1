//! Configuration module
//!
//! Handles CLI configuration including the gateway URL and API key.

use anyhow::{Result, bail};
use tally_client::GatewayClient;

/// CLI configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// URL of the gateway service
    pub gateway_url: String,
    /// Key sent as `X-API-Key`
    pub api_key: Option<String>,
}

impl Config {
    /// Client without credentials, for login
    pub fn anonymous_client(&self) -> GatewayClient {
        GatewayClient::new(&self.gateway_url)
    }

    /// Client carrying the configured API key
    pub fn client(&self) -> Result<GatewayClient> {
        match &self.api_key {
            Some(key) => Ok(self.anonymous_client().with_api_key(key)),
            None => bail!("No API key configured; run `tally login` and set TALLY_API_KEY"),
        }
    }
}
