//! Ledger Backend
//!
//! Capability interface over the transactional ledger. The gateway only needs
//! two calls: `evaluate` for reads and `submit` for mutations. Adapters are
//! responsible for tagging every failure with its kind; the submission worker
//! never inspects error text to decide whether to retry.

pub mod http;
pub mod memory;

pub use http::HttpLedgerBackend;
pub use memory::MemoryLedger;

use async_trait::async_trait;
use tally_core::domain::job::JobError;
use tally_core::domain::principal::Principal;
use thiserror::Error;

/// Failure of a read-only evaluation
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EvaluateError {
    /// The ledger reported the requested key as missing
    #[error("not found: {0}")]
    NotFound(String),

    #[error("ledger error: {0}")]
    Internal(String),
}

/// Failure of a mutating submission
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubmitError {
    /// Network failure, timeout or overloaded peer; the transaction may still commit
    #[error("transient submit failure: {0}")]
    Transient(String),

    /// Business-rule rejection; retrying cannot succeed
    #[error("permanent submit failure: {0}")]
    Permanent(String),
}

impl SubmitError {
    pub fn is_transient(&self) -> bool {
        matches!(self, SubmitError::Transient(_))
    }
}

impl From<SubmitError> for JobError {
    fn from(err: SubmitError) -> Self {
        match err {
            SubmitError::Transient(message) => JobError::transient(message),
            SubmitError::Permanent(message) => JobError::permanent(message),
        }
    }
}

/// Transactional ledger reachable as `{Evaluate, Submit}`
#[async_trait]
pub trait LedgerBackend: Send + Sync {
    /// Run a read-only transaction; no side effects on the ledger
    async fn evaluate(
        &self,
        principal: &Principal,
        operation: &str,
        args: &[String],
    ) -> Result<Vec<u8>, EvaluateError>;

    /// Submit a transaction for endorsement and commit
    async fn submit(
        &self,
        principal: &Principal,
        operation: &str,
        args: &[String],
    ) -> Result<Vec<u8>, SubmitError>;
}

/// Interpret a raw ledger response for storage in job status
///
/// JSON payloads are kept as JSON, anything else as text, empty as null.
pub fn decode_payload(payload: &[u8]) -> serde_json::Value {
    if payload.is_empty() {
        return serde_json::Value::Null;
    }

    serde_json::from_slice(payload)
        .unwrap_or_else(|_| serde_json::Value::String(String::from_utf8_lossy(payload).into_owned()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tally_core::domain::job::JobErrorKind;

    #[test]
    fn test_decode_payload() {
        assert_eq!(decode_payload(b""), serde_json::Value::Null);
        assert_eq!(decode_payload(b"5"), serde_json::json!(5));
        assert_eq!(decode_payload(br#"{"id":"m1"}"#), serde_json::json!({"id": "m1"}));
        assert_eq!(decode_payload(b"ok then"), serde_json::json!("ok then"));
    }

    #[test]
    fn test_submit_error_maps_to_job_error_kind() {
        let transient: JobError = SubmitError::Transient("timeout".into()).into();
        let permanent: JobError = SubmitError::Permanent("exists".into()).into();

        assert_eq!(transient.kind, JobErrorKind::Transient);
        assert_eq!(permanent.kind, JobErrorKind::Permanent);
        assert_eq!(permanent.message, "exists");
    }
}
