//! Message DTOs

use serde::{Deserialize, Serialize};
use serde_json::Number;

/// Body for creating or replacing a message
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageInput {
    pub id: String,
    pub message_id: Number,
    pub user_id: Number,
    pub content: String,
    #[serde(rename = "type")]
    pub kind: Number,
    pub created_at: String,
}

/// Body for reassigning a message to another user
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferMessage {
    pub user_id: Number,
}
