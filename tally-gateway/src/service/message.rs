//! Message Service
//!
//! Validates message requests, turns mutations into queued jobs and runs
//! read-only queries against the ledger.

use serde_json::{Number, Value};
use tally_core::domain::job::Job;
use tally_core::domain::message::Message;
use tally_core::domain::principal::Principal;
use tally_core::dto::error::FieldError;
use tally_core::dto::message::{MessageInput, TransferMessage};
use thiserror::Error;

use crate::backend::{EvaluateError, LedgerBackend};
use crate::queue::JobQueue;
use crate::repository::StoreError;

/// Service error type
#[derive(Debug, Error)]
pub enum MessageError {
    #[error("invalid request body")]
    Validation(Vec<FieldError>),

    #[error("path id {path} does not match body id {body}")]
    IdMismatch { path: String, body: String },

    #[error("message {0} not found")]
    NotFound(String),

    #[error("ledger query failed: {0}")]
    Ledger(String),

    #[error("malformed ledger response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error(transparent)]
    Store(#[from] StoreError),
}

pub type Result<T> = std::result::Result<T, MessageError>;

// =============================================================================
// Mutations (queued)
// =============================================================================

/// Queue `CreateMessage`
pub async fn create_message(queue: &JobQueue, principal: Principal, body: &Value) -> Result<Job> {
    let input = validate_message_body(body).map_err(MessageError::Validation)?;
    let message = into_message(input);

    let job = queue
        .enqueue(principal, "CreateMessage", &message.id, message.to_arguments())
        .await?;

    Ok(job)
}

/// Queue `UpdateMessage`; the body id must match the path id
pub async fn update_message(
    queue: &JobQueue,
    principal: Principal,
    id: &str,
    body: &Value,
) -> Result<Job> {
    let input = validate_message_body(body).map_err(MessageError::Validation)?;

    if input.id != id {
        return Err(MessageError::IdMismatch {
            path: id.to_string(),
            body: input.id,
        });
    }

    let message = into_message(input);
    let job = queue
        .enqueue(principal, "UpdateMessage", &message.id, message.to_arguments())
        .await?;

    Ok(job)
}

/// Queue `TransferMessage` to a new owning user
pub async fn transfer_message(
    queue: &JobQueue,
    principal: Principal,
    id: &str,
    body: &Value,
) -> Result<Job> {
    let transfer = validate_transfer_body(body).map_err(MessageError::Validation)?;

    let job = queue
        .enqueue(
            principal,
            "TransferMessage",
            id,
            vec![id.to_string(), transfer.user_id.to_string()],
        )
        .await?;

    Ok(job)
}

/// Queue `DeleteMessage`
pub async fn delete_message(queue: &JobQueue, principal: Principal, id: &str) -> Result<Job> {
    let job = queue
        .enqueue(principal, "DeleteMessage", id, vec![id.to_string()])
        .await?;

    Ok(job)
}

// =============================================================================
// Queries (evaluated directly)
// =============================================================================

/// Read one message; never creates a job
pub async fn read_message(backend: &dyn LedgerBackend, principal: &Principal, id: &str) -> Result<Message> {
    let raw = backend
        .evaluate(principal, "ReadMessage", &[id.to_string()])
        .await
        .map_err(|e| match e {
            EvaluateError::NotFound(_) => MessageError::NotFound(id.to_string()),
            EvaluateError::Internal(msg) => MessageError::Ledger(msg),
        })?;

    Ok(serde_json::from_slice(&raw)?)
}

/// All messages in ledger key order
pub async fn list_messages(backend: &dyn LedgerBackend, principal: &Principal) -> Result<Vec<Message>> {
    let raw = backend
        .evaluate(principal, "GetAllMessages", &[])
        .await
        .map_err(ledger_error)?;

    decode_list(&raw)
}

/// Messages sharing a `messageId`
pub async fn messages_by_message_id(
    backend: &dyn LedgerBackend,
    principal: &Principal,
    message_id: &str,
) -> Result<Vec<Message>> {
    let message_id = message_id
        .parse::<Number>()
        .map_err(|_| MessageError::Validation(vec![FieldError::new("messageId", "must be a number")]))?;

    let raw = backend
        .evaluate(principal, "GetMessagesByMessageId", &[message_id.to_string()])
        .await
        .map_err(ledger_error)?;

    decode_list(&raw)
}

// =============================================================================
// Validation
// =============================================================================

/// Check a create/update body, reporting every invalid field at once
pub fn validate_message_body(body: &Value) -> std::result::Result<MessageInput, Vec<FieldError>> {
    let Some(fields) = body.as_object() else {
        return Err(vec![FieldError::new("body", "body must contain a message object")]);
    };

    let mut errors = Vec::new();

    let mut text = |name: &str| match fields.get(name).and_then(Value::as_str) {
        Some(value) if !value.is_empty() => Some(value.to_string()),
        _ => {
            errors.push(FieldError::new(name, "must be a string"));
            None
        }
    };
    let id = text("id");
    let content = text("content");
    let created_at = text("createdAt");

    let mut number = |name: &str| match fields.get(name).and_then(numeric) {
        Some(value) => Some(value),
        None => {
            errors.push(FieldError::new(name, "must be a number"));
            None
        }
    };
    let message_id = number("messageId");
    let user_id = number("userId");
    let kind = number("type");

    match (id, message_id, user_id, content, kind, created_at) {
        (Some(id), Some(message_id), Some(user_id), Some(content), Some(kind), Some(created_at)) => {
            Ok(MessageInput {
                id,
                message_id,
                user_id,
                content,
                kind,
                created_at,
            })
        }
        _ => Err(errors),
    }
}

/// Check a transfer body: `{"userId": <number>}`
pub fn validate_transfer_body(body: &Value) -> std::result::Result<TransferMessage, Vec<FieldError>> {
    match body.get("userId").and_then(numeric) {
        Some(user_id) => Ok(TransferMessage { user_id }),
        None => Err(vec![FieldError::new("userId", "must be a number")]),
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// JSON numbers and numeric strings are both accepted
fn numeric(value: &Value) -> Option<Number> {
    match value {
        Value::Number(n) => Some(n.clone()),
        Value::String(s) => s.parse::<Number>().ok(),
        _ => None,
    }
}

fn into_message(input: MessageInput) -> Message {
    Message {
        content: input.content,
        created_at: input.created_at,
        doc_type: None,
        id: input.id,
        message_id: input.message_id,
        kind: input.kind,
        user_id: input.user_id,
    }
}

fn ledger_error(err: EvaluateError) -> MessageError {
    MessageError::Ledger(err.to_string())
}

fn decode_list(raw: &[u8]) -> Result<Vec<Message>> {
    if raw.is_empty() {
        return Ok(Vec::new());
    }
    Ok(serde_json::from_slice(raw)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn valid_body() -> Value {
        json!({
            "id": "m1",
            "messageId": 3,
            "userId": "5",
            "content": "Hello",
            "type": 0,
            "createdAt": "2025-04-04T10:00:00Z"
        })
    }

    #[test]
    fn test_validate_message_body_valid() {
        let input = validate_message_body(&valid_body()).unwrap();

        assert_eq!(input.id, "m1");
        assert_eq!(input.message_id, Number::from(3));
        assert_eq!(input.user_id, Number::from(5));
    }

    #[test]
    fn test_validate_message_body_reports_all_fields() {
        let errors = validate_message_body(&json!({
            "id": "",
            "messageId": "three",
            "userId": 5,
            "type": true,
            "createdAt": "2025-04-04T10:00:00Z"
        }))
        .unwrap_err();

        let fields: Vec<&str> = errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(fields, vec!["id", "content", "messageId", "type"]);
        assert_eq!(errors[0].message, "must be a string");
        assert_eq!(errors[2].message, "must be a number");
    }

    #[test]
    fn test_validate_message_body_not_object() {
        let errors = validate_message_body(&json!(["m1"])).unwrap_err();
        assert_eq!(errors, vec![FieldError::new("body", "body must contain a message object")]);
    }

    #[test]
    fn test_validate_transfer_body() {
        assert_eq!(
            validate_transfer_body(&json!({"userId": 9})).unwrap().user_id,
            Number::from(9)
        );
        assert!(validate_transfer_body(&json!({"userId": "x"})).is_err());
        assert!(validate_transfer_body(&json!({})).is_err());
    }

    #[test]
    fn test_decode_list_empty_payload() {
        assert!(decode_list(b"").unwrap().is_empty());
        assert!(decode_list(b"[]").unwrap().is_empty());
        assert!(decode_list(b"{").is_err());
    }
}
