//! API Error Handling
//!
//! Unified error type and conversion for API responses. Every error body has
//! the `{status, reason, message, timestamp, errors?}` shape.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::Utc;
use tally_core::dto::error::{ErrorBody, FieldError};

/// API error type
#[derive(Debug)]
pub enum ApiError {
    Validation {
        message: String,
        errors: Vec<FieldError>,
    },
    IdMismatch,
    NotFound(String),
    Unauthorized,
    LoginFailed(String),
    InternalError(String),
}

impl ApiError {
    pub fn validation(errors: Vec<FieldError>) -> Self {
        ApiError::Validation {
            message: "Invalid request body".to_string(),
            errors,
        }
    }

    pub fn reason(&self) -> &'static str {
        match self {
            ApiError::Validation { .. } => "VALIDATION_ERROR",
            ApiError::IdMismatch => "ID_MISMATCH",
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::Unauthorized => "NO_VALID_APIKEY",
            ApiError::LoginFailed(_) => "LOGIN_FAILED",
            ApiError::InternalError(_) => "INTERNAL_ERROR",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Validation { .. } | ApiError::IdMismatch => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Unauthorized | ApiError::LoginFailed(_) => StatusCode::UNAUTHORIZED,
            ApiError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let reason = self.reason().to_string();

        let (message, errors) = match self {
            ApiError::Validation { message, errors } => (message, errors),
            ApiError::IdMismatch => ("ID must match".to_string(), Vec::new()),
            ApiError::NotFound(msg) => (msg, Vec::new()),
            ApiError::Unauthorized => ("Missing or unknown API key".to_string(), Vec::new()),
            ApiError::LoginFailed(msg) => (msg, Vec::new()),
            ApiError::InternalError(msg) => {
                tracing::error!("Internal error: {}", msg);
                ("Internal server error".to_string(), Vec::new())
            }
        };

        let body = ErrorBody {
            status: status.canonical_reason().unwrap_or("Error").to_string(),
            reason,
            message,
            timestamp: Utc::now(),
            errors,
        };

        (status, Json(body)).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reason_codes() {
        assert_eq!(ApiError::validation(vec![]).reason(), "VALIDATION_ERROR");
        assert_eq!(ApiError::IdMismatch.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::Unauthorized.reason(), "NO_VALID_APIKEY");
        assert_eq!(
            ApiError::InternalError("db down".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[tokio::test]
    async fn test_internal_detail_not_exposed() {
        let response = ApiError::InternalError("connection refused at 10.0.0.3".into()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: ErrorBody = serde_json::from_slice(&bytes).unwrap();

        assert_eq!(body.status, "Internal Server Error");
        assert_eq!(body.reason, "INTERNAL_ERROR");
        assert_eq!(body.message, "Internal server error");
        assert!(body.errors.is_empty());
    }
}
