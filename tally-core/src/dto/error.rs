//! Error body returned by the gateway

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// JSON body of every non-2xx gateway response
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    /// HTTP reason phrase, e.g. "Bad Request"
    pub status: String,
    /// Machine-readable reason code, e.g. `VALIDATION_ERROR`
    pub reason: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<FieldError>,
}

/// A single rejected request field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}
