//! In-process message ledger
//!
//! Implements the message contract over a sorted map so the gateway can run
//! without a ledger network. World state iteration order is key order, the
//! same as a range scan on a real peer.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde_json::Number;
use tally_core::domain::message::{MESSAGE_DOC_TYPE, Message};
use tally_core::domain::principal::Principal;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::debug;

use super::{EvaluateError, LedgerBackend, SubmitError};

#[derive(Debug, Default)]
pub struct MemoryLedger {
    state: RwLock<BTreeMap<String, Message>>,
}

#[derive(Debug, Error)]
enum ContractError {
    #[error("The message {0} does not exist")]
    Missing(String),

    #[error("The message {0} already exists")]
    Exists(String),

    #[error("{0}")]
    InvalidArguments(String),

    #[error("unknown transaction {0}")]
    UnknownTransaction(String),

    #[error(transparent)]
    Encoding(#[from] serde_json::Error),
}

type ContractResult<T> = std::result::Result<T, ContractError>;

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ledger pre-populated with the contract's `InitLedger` messages
    pub fn seeded() -> Self {
        let state = seed_messages()
            .into_iter()
            .map(|message| (message.id.clone(), message))
            .collect();

        Self {
            state: RwLock::new(state),
        }
    }

    pub async fn len(&self) -> usize {
        self.state.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Direct world-state lookup, bypassing the contract
    pub async fn get(&self, id: &str) -> Option<Message> {
        self.state.read().await.get(id).cloned()
    }
}

#[async_trait]
impl LedgerBackend for MemoryLedger {
    async fn evaluate(
        &self,
        principal: &Principal,
        operation: &str,
        args: &[String],
    ) -> Result<Vec<u8>, EvaluateError> {
        debug!("evaluate {} as {}", operation, principal);
        let state = self.state.read().await;

        query(&state, operation, args).map_err(|err| match err {
            ContractError::Missing(_) => EvaluateError::NotFound(err.to_string()),
            _ => EvaluateError::Internal(err.to_string()),
        })
    }

    async fn submit(
        &self,
        principal: &Principal,
        operation: &str,
        args: &[String],
    ) -> Result<Vec<u8>, SubmitError> {
        debug!("submit {} as {}", operation, principal);
        let mut state = self.state.write().await;

        invoke(&mut state, operation, args).map_err(|err| SubmitError::Permanent(err.to_string()))
    }
}

// =============================================================================
// Contract
// =============================================================================

/// Read-only transactions
fn query(state: &BTreeMap<String, Message>, operation: &str, args: &[String]) -> ContractResult<Vec<u8>> {
    match operation {
        "ReadMessage" => {
            let [id] = expect_args::<1>(operation, args)?;
            let message = state
                .get(id.as_str())
                .ok_or_else(|| ContractError::Missing(id.clone()))?;
            Ok(serde_json::to_vec(message)?)
        }
        "MessageExists" => {
            let [id] = expect_args::<1>(operation, args)?;
            Ok(serde_json::to_vec(&state.contains_key(id.as_str()))?)
        }
        "GetAllMessages" => {
            expect_args::<0>(operation, args)?;
            let all: Vec<&Message> = state.values().collect();
            Ok(serde_json::to_vec(&all)?)
        }
        "GetMessagesByMessageId" => {
            let [message_id] = expect_args::<1>(operation, args)?;
            let message_id = parse_number("messageId", message_id)?;
            let matching: Vec<&Message> = state
                .values()
                .filter(|message| message.message_id == message_id)
                .collect();
            Ok(serde_json::to_vec(&matching)?)
        }
        _ => Err(ContractError::UnknownTransaction(operation.to_string())),
    }
}

/// Mutating transactions; read-only ones are also accepted
fn invoke(state: &mut BTreeMap<String, Message>, operation: &str, args: &[String]) -> ContractResult<Vec<u8>> {
    match operation {
        "InitLedger" => {
            expect_args::<0>(operation, args)?;
            for message in seed_messages() {
                state.insert(message.id.clone(), message);
            }
            Ok(Vec::new())
        }
        "CreateMessage" => {
            let message = message_from_args(operation, args)?;
            if state.contains_key(&message.id) {
                return Err(ContractError::Exists(message.id));
            }
            state.insert(message.id.clone(), message);
            Ok(Vec::new())
        }
        "UpdateMessage" => {
            let mut message = message_from_args(operation, args)?;
            if !state.contains_key(&message.id) {
                return Err(ContractError::Missing(message.id));
            }
            // Updates rewrite the record without its docType tag
            message.doc_type = None;
            state.insert(message.id.clone(), message);
            Ok(Vec::new())
        }
        "DeleteMessage" => {
            let [id] = expect_args::<1>(operation, args)?;
            state
                .remove(id.as_str())
                .ok_or_else(|| ContractError::Missing(id.clone()))?;
            Ok(Vec::new())
        }
        "TransferMessage" => {
            let [id, new_user_id] = expect_args::<2>(operation, args)?;
            let new_user_id = parse_number("userId", new_user_id)?;
            let message = state
                .get_mut(id.as_str())
                .ok_or_else(|| ContractError::Missing(id.clone()))?;
            let old_user_id = std::mem::replace(&mut message.user_id, new_user_id);
            Ok(serde_json::to_vec(&old_user_id)?)
        }
        _ => query(state, operation, args),
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

fn expect_args<'a, const N: usize>(operation: &str, args: &'a [String]) -> ContractResult<&'a [String; N]> {
    <&[String; N]>::try_from(args).map_err(|_| {
        ContractError::InvalidArguments(format!(
            "{} expects {} arguments, got {}",
            operation,
            N,
            args.len()
        ))
    })
}

fn parse_number(field: &str, raw: &str) -> ContractResult<Number> {
    raw.trim()
        .parse::<Number>()
        .map_err(|_| ContractError::InvalidArguments(format!("{} must be numeric, got {:?}", field, raw)))
}

fn message_from_args(operation: &str, args: &[String]) -> ContractResult<Message> {
    let [id, message_id, user_id, content, kind, created_at] = expect_args::<6>(operation, args)?;

    Ok(Message {
        content: content.clone(),
        created_at: created_at.clone(),
        doc_type: Some(MESSAGE_DOC_TYPE.to_string()),
        id: id.clone(),
        message_id: parse_number("messageId", message_id)?,
        kind: parse_number("type", kind)?,
        user_id: parse_number("userId", user_id)?,
    })
}

fn seed_messages() -> Vec<Message> {
    vec![
        Message {
            content: "Hello World!".to_string(),
            created_at: "2025-04-04T10:00:00Z".to_string(),
            doc_type: None,
            id: "1".to_string(),
            message_id: Number::from(3),
            kind: Number::from(0),
            user_id: Number::from(5),
        },
        Message {
            content: "Fabric Smart Contracts are cool!".to_string(),
            created_at: "2025-04-04T10:05:00Z".to_string(),
            doc_type: None,
            id: "2".to_string(),
            message_id: Number::from(3),
            kind: Number::from(0),
            user_id: Number::from(4),
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alice() -> Principal {
        Principal::new("alice", "Org1MSP")
    }

    fn args(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    fn create_args(id: &str) -> Vec<String> {
        args(&[id, "7", "1", "hi", "0", "2025-05-01T00:00:00Z"])
    }

    #[tokio::test]
    async fn test_create_then_read() {
        let ledger = MemoryLedger::new();
        ledger
            .submit(&alice(), "CreateMessage", &create_args("m1"))
            .await
            .unwrap();

        let raw = ledger
            .evaluate(&alice(), "ReadMessage", &args(&["m1"]))
            .await
            .unwrap();
        let message: Message = serde_json::from_slice(&raw).unwrap();

        assert_eq!(message.id, "m1");
        assert_eq!(message.message_id, Number::from(7));
        assert_eq!(message.doc_type.as_deref(), Some(MESSAGE_DOC_TYPE));
    }

    #[tokio::test]
    async fn test_update_drops_doc_type() {
        let ledger = MemoryLedger::new();
        ledger
            .submit(&alice(), "CreateMessage", &create_args("m1"))
            .await
            .unwrap();
        ledger
            .submit(
                &alice(),
                "UpdateMessage",
                &args(&["m1", "7", "1", "edited", "0", "2025-05-01T00:00:00Z"]),
            )
            .await
            .unwrap();

        let raw = ledger
            .evaluate(&alice(), "ReadMessage", &args(&["m1"]))
            .await
            .unwrap();
        let message: Message = serde_json::from_slice(&raw).unwrap();
        assert_eq!(message.content, "edited");
        assert_eq!(message.doc_type, None);

        let raw = ledger
            .evaluate(&alice(), "GetMessagesByMessageId", &args(&["7"]))
            .await
            .unwrap();
        let grouped: Vec<Message> = serde_json::from_slice(&raw).unwrap();
        assert_eq!(grouped.len(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_create_is_permanent() {
        let ledger = MemoryLedger::new();
        ledger
            .submit(&alice(), "CreateMessage", &create_args("m1"))
            .await
            .unwrap();

        let err = ledger
            .submit(&alice(), "CreateMessage", &create_args("m1"))
            .await
            .unwrap_err();
        assert_eq!(
            err,
            SubmitError::Permanent("The message m1 already exists".to_string())
        );
    }

    #[tokio::test]
    async fn test_missing_message() {
        let ledger = MemoryLedger::new();

        let err = ledger
            .evaluate(&alice(), "ReadMessage", &args(&["m9"]))
            .await
            .unwrap_err();
        assert_eq!(
            err,
            EvaluateError::NotFound("The message m9 does not exist".to_string())
        );

        for op in ["DeleteMessage", "UpdateMessage"] {
            let call_args = if op == "DeleteMessage" { args(&["m9"]) } else { create_args("m9") };
            let err = ledger.submit(&alice(), op, &call_args).await.unwrap_err();
            assert!(!err.is_transient());
        }
    }

    #[tokio::test]
    async fn test_transfer_returns_previous_owner() {
        let ledger = MemoryLedger::seeded();

        let raw = ledger
            .submit(&alice(), "TransferMessage", &args(&["1", "9"]))
            .await
            .unwrap();

        assert_eq!(serde_json::from_slice::<serde_json::Value>(&raw).unwrap(), 5);
        assert_eq!(ledger.get("1").await.unwrap().user_id, Number::from(9));
    }

    #[tokio::test]
    async fn test_queries_over_seeded_state() {
        let ledger = MemoryLedger::new();
        ledger.submit(&alice(), "InitLedger", &[]).await.unwrap();
        ledger
            .submit(&alice(), "CreateMessage", &create_args("m1"))
            .await
            .unwrap();

        let all: Vec<Message> = serde_json::from_slice(
            &ledger.evaluate(&alice(), "GetAllMessages", &[]).await.unwrap(),
        )
        .unwrap();
        let ids: Vec<&str> = all.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["1", "2", "m1"]);

        let by_mid: Vec<Message> = serde_json::from_slice(
            &ledger
                .evaluate(&alice(), "GetMessagesByMessageId", &args(&["3"]))
                .await
                .unwrap(),
        )
        .unwrap();
        assert_eq!(by_mid.len(), 2);

        let exists = ledger
            .evaluate(&alice(), "MessageExists", &args(&["m1"]))
            .await
            .unwrap();
        assert_eq!(exists, b"true");
    }

    #[tokio::test]
    async fn test_bad_arguments_are_rejected() {
        let ledger = MemoryLedger::new();

        let err = ledger
            .submit(&alice(), "CreateMessage", &args(&["m1", "x"]))
            .await
            .unwrap_err();
        assert!(matches!(err, SubmitError::Permanent(msg) if msg.contains("expects 6")));

        let err = ledger
            .submit(
                &alice(),
                "CreateMessage",
                &args(&["m1", "seven", "1", "hi", "0", "2025-05-01T00:00:00Z"]),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, SubmitError::Permanent(msg) if msg.contains("messageId")));

        let err = ledger.evaluate(&alice(), "Mint", &[]).await.unwrap_err();
        assert!(matches!(err, EvaluateError::Internal(_)));
        assert!(ledger.is_empty().await);
    }
}
