//! Error types for the Tally client

use tally_core::dto::error::{ErrorBody, FieldError};
use thiserror::Error;
use uuid::Uuid;

/// Result type alias for client operations
pub type Result<T> = std::result::Result<T, ClientError>;

/// Errors that can occur when using the Tally client
#[derive(Debug, Error)]
pub enum ClientError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    /// Gateway returned an error status code
    #[error("API error (status {status}): {message}")]
    ApiError {
        /// HTTP status code
        status: u16,
        /// Reason code from the error body, e.g. `VALIDATION_ERROR`
        reason: Option<String>,
        message: String,
        /// Per-field validation failures
        errors: Vec<FieldError>,
    },

    /// Failed to parse response
    #[error("Failed to parse response: {0}")]
    ParseError(String),

    /// Job did not reach a terminal state in time
    #[error("Timed out waiting for job {0}")]
    Timeout(Uuid),
}

impl ClientError {
    /// Create an API error from status code and message
    pub fn api_error(status: u16, message: impl Into<String>) -> Self {
        Self::ApiError {
            status,
            reason: None,
            message: message.into(),
            errors: Vec::new(),
        }
    }

    /// Build an API error from a raw error response body
    ///
    /// Bodies in the gateway's error format keep their reason and field
    /// errors; anything else is kept verbatim as the message.
    pub fn from_body(status: u16, body: &str) -> Self {
        match serde_json::from_str::<ErrorBody>(body) {
            Ok(parsed) => Self::ApiError {
                status,
                reason: Some(parsed.reason),
                message: parsed.message,
                errors: parsed.errors,
            },
            Err(_) => Self::api_error(status, body),
        }
    }

    /// Reason code reported by the gateway, if any
    pub fn reason(&self) -> Option<&str> {
        match self {
            Self::ApiError { reason, .. } => reason.as_deref(),
            _ => None,
        }
    }

    /// Check if this error is a "not found" error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::ApiError { status: 404, .. })
    }

    /// Check if this error is an authentication failure
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Self::ApiError { status: 401, .. })
    }

    /// Check if this error is a client error (4xx status)
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::ApiError { status, .. } if *status >= 400 && *status < 500)
    }

    /// Check if this error is a server error (5xx status)
    pub fn is_server_error(&self) -> bool {
        matches!(self, Self::ApiError { status, .. } if *status >= 500)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_gateway_error_body() {
        let err = ClientError::from_body(
            400,
            r#"{"status":"Bad Request","reason":"VALIDATION_ERROR","message":"Invalid request body",
                "timestamp":"2025-04-04T10:00:00Z","errors":[{"field":"id","message":"must be a string"}]}"#,
        );

        assert_eq!(err.reason(), Some("VALIDATION_ERROR"));
        assert!(err.is_client_error());
        match err {
            ClientError::ApiError { errors, .. } => {
                assert_eq!(errors, vec![FieldError::new("id", "must be a string")]);
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_from_plain_text_body() {
        let err = ClientError::from_body(502, "Bad Gateway");

        assert_eq!(err.reason(), None);
        assert!(err.is_server_error());
        assert_eq!(err.to_string(), "API error (status 502): Bad Gateway");
    }

    #[test]
    fn test_status_helpers() {
        assert!(ClientError::api_error(404, "gone").is_not_found());
        assert!(ClientError::api_error(401, "who").is_unauthorized());
        assert!(!ClientError::Timeout(Uuid::nil()).is_client_error());
    }
}
