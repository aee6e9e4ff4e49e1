//! Message domain type
//!
//! Messages are the ledger-resident records managed through the gateway.

use serde::{Deserialize, Serialize};
use serde_json::Number;

/// Document type tag stored alongside every message
pub const MESSAGE_DOC_TYPE: &str = "message";

/// A message as stored in ledger world state
///
/// Fields are declared in sorted key order so the serialized form is
/// deterministic across every peer that writes it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub content: String,
    pub created_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doc_type: Option<String>,
    pub id: String,
    pub message_id: Number,
    #[serde(rename = "type")]
    pub kind: Number,
    pub user_id: Number,
}

impl Message {
    /// Positional transaction arguments for `CreateMessage` / `UpdateMessage`
    pub fn to_arguments(&self) -> Vec<String> {
        vec![
            self.id.clone(),
            self.message_id.to_string(),
            self.user_id.to_string(),
            self.content.clone(),
            self.kind.to_string(),
            self.created_at.clone(),
        ]
    }
}
