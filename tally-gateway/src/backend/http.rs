//! HTTP ledger backend
//!
//! Talks to a ledger REST bridge that exposes the contract as
//! `POST /evaluate` and `POST /submit`. The bridge reports failures with an
//! optional JSON body `{"kind": "...", "message": "..."}`; an explicit kind
//! wins over the status-code heuristics.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tally_core::domain::principal::Principal;
use tracing::debug;

use super::{EvaluateError, LedgerBackend, SubmitError};

/// Header carrying the caller identity label to the bridge
pub const IDENTITY_HEADER: &str = "X-Ledger-Identity";

/// Ledger backend speaking HTTP to a REST bridge
#[derive(Debug, Clone)]
pub struct HttpLedgerBackend {
    client: Client,
    base_url: String,
    evaluate_timeout: Duration,
}

impl HttpLedgerBackend {
    /// Creates a backend for the bridge at `base_url`
    ///
    /// Reads are bounded by `evaluate_timeout` end to end. Submits only get
    /// the connect timeout here; the submission worker applies its own
    /// per-attempt timeout around each call.
    pub fn new(
        base_url: impl Into<String>,
        connect_timeout: Duration,
        evaluate_timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let client = Client::builder().connect_timeout(connect_timeout).build()?;
        let base_url = base_url.into();

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            evaluate_timeout,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn call(
        &self,
        endpoint: &str,
        principal: &Principal,
        operation: &str,
        args: &[String],
        timeout: Option<Duration>,
    ) -> Result<reqwest::Response, reqwest::Error> {
        let url = format!("{}/{}", self.base_url, endpoint);
        debug!("{} {} as {}", endpoint, operation, principal);

        let request = self
            .client
            .post(&url)
            .header(IDENTITY_HEADER, &principal.user_id)
            .json(&TransactionRequest {
                identity: principal,
                transaction: operation,
                arguments: args,
            });

        match timeout {
            Some(timeout) => request.timeout(timeout).send().await,
            None => request.send().await,
        }
    }
}

#[async_trait]
impl LedgerBackend for HttpLedgerBackend {
    async fn evaluate(
        &self,
        principal: &Principal,
        operation: &str,
        args: &[String],
    ) -> Result<Vec<u8>, EvaluateError> {
        let response = self
            .call("evaluate", principal, operation, args, Some(self.evaluate_timeout))
            .await
            .map_err(|e| evaluate_transport_error(e, self.evaluate_timeout))?;

        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| evaluate_transport_error(e, self.evaluate_timeout))?;

        if !status.is_success() {
            return Err(classify_evaluate_failure(
                status,
                &String::from_utf8_lossy(&body),
            ));
        }

        Ok(body.to_vec())
    }

    async fn submit(
        &self,
        principal: &Principal,
        operation: &str,
        args: &[String],
    ) -> Result<Vec<u8>, SubmitError> {
        // Any transport failure is retryable: the peer may have committed anyway.
        let response = self
            .call("submit", principal, operation, args, None)
            .await
            .map_err(|e| SubmitError::Transient(format!("ledger unreachable: {}", e)))?;

        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| SubmitError::Transient(format!("failed to read ledger response: {}", e)))?;

        if !status.is_success() {
            return Err(classify_submit_failure(
                status,
                &String::from_utf8_lossy(&body),
            ));
        }

        Ok(body.to_vec())
    }
}

// =============================================================================
// Failure Classification
// =============================================================================

/// Classify a non-2xx submit response
pub fn classify_submit_failure(status: StatusCode, body: &str) -> SubmitError {
    let parsed = LedgerErrorBody::parse(body);
    let message = parsed.message.unwrap_or_else(|| fallback_message(status, body));

    match parsed.kind.as_deref() {
        Some("transient") => SubmitError::Transient(message),
        Some("permanent") | Some("not_found") => SubmitError::Permanent(message),
        _ if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS => {
            SubmitError::Transient(message)
        }
        _ if status == StatusCode::REQUEST_TIMEOUT => SubmitError::Transient(message),
        _ => SubmitError::Permanent(message),
    }
}

/// Classify a non-2xx evaluate response
pub fn classify_evaluate_failure(status: StatusCode, body: &str) -> EvaluateError {
    let parsed = LedgerErrorBody::parse(body);
    let message = parsed.message.unwrap_or_else(|| fallback_message(status, body));

    match parsed.kind.as_deref() {
        Some("not_found") => EvaluateError::NotFound(message),
        Some(_) => EvaluateError::Internal(message),
        None if status == StatusCode::NOT_FOUND => EvaluateError::NotFound(message),
        None => EvaluateError::Internal(message),
    }
}

fn evaluate_transport_error(err: reqwest::Error, timeout: Duration) -> EvaluateError {
    if err.is_timeout() {
        EvaluateError::Internal(format!("ledger did not answer within {:?}", timeout))
    } else {
        EvaluateError::Internal(format!("ledger unreachable: {}", err))
    }
}

fn fallback_message(status: StatusCode, body: &str) -> String {
    let body = body.trim();
    if body.is_empty() {
        format!("ledger returned {}", status)
    } else {
        format!("ledger returned {}: {}", status, body)
    }
}

// =============================================================================
// Wire Types
// =============================================================================

#[derive(Debug, Serialize)]
struct TransactionRequest<'a> {
    identity: &'a Principal,
    transaction: &'a str,
    arguments: &'a [String],
}

#[derive(Debug, Default, Deserialize)]
struct LedgerErrorBody {
    kind: Option<String>,
    message: Option<String>,
}

impl LedgerErrorBody {
    fn parse(body: &str) -> Self {
        serde_json::from_str(body).unwrap_or_default()
    }
}
