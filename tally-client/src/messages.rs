//! Message endpoints

use reqwest::Method;
use serde_json::Number;
use tally_core::domain::message::Message;
use tally_core::dto::job::JobAccepted;
use tally_core::dto::message::{MessageInput, TransferMessage};

use crate::GatewayClient;
use crate::error::Result;

impl GatewayClient {
    // =============================================================================
    // Queries
    // =============================================================================

    /// List every message on the ledger
    pub async fn list_messages(&self) -> Result<Vec<Message>> {
        let response = self.request(Method::GET, "/api/messages").send().await?;

        self.handle_response(response).await
    }

    /// Read a single message
    pub async fn read_message(&self, id: &str) -> Result<Message> {
        let path = format!("/api/messages/{}", id);
        let response = self.request(Method::GET, &path).send().await?;

        self.handle_response(response).await
    }

    /// List messages sharing a `messageId`
    pub async fn messages_by_message_id(&self, message_id: &str) -> Result<Vec<Message>> {
        let path = format!("/api/messages/by-message-id/{}", message_id);
        let response = self.request(Method::GET, &path).send().await?;

        self.handle_response(response).await
    }

    // =============================================================================
    // Queued Mutations
    // =============================================================================
    //
    // Each call returns as soon as the gateway has queued the job; poll the
    // job id to learn the outcome.

    pub async fn create_message(&self, message: &MessageInput) -> Result<JobAccepted> {
        let response = self
            .request(Method::POST, "/api/messages")
            .json(message)
            .send()
            .await?;

        self.handle_response(response).await
    }

    pub async fn update_message(&self, id: &str, message: &MessageInput) -> Result<JobAccepted> {
        let path = format!("/api/messages/{}", id);
        let response = self.request(Method::PUT, &path).json(message).send().await?;

        self.handle_response(response).await
    }

    /// Reassign a message to `user_id`
    pub async fn transfer_message(&self, id: &str, user_id: Number) -> Result<JobAccepted> {
        let path = format!("/api/messages/{}", id);
        let response = self
            .request(Method::PATCH, &path)
            .json(&TransferMessage { user_id })
            .send()
            .await?;

        self.handle_response(response).await
    }

    pub async fn delete_message(&self, id: &str) -> Result<JobAccepted> {
        let path = format!("/api/messages/{}", id);
        let response = self.request(Method::DELETE, &path).send().await?;

        self.handle_response(response).await
    }
}
