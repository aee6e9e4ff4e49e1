//! Message API Handlers
//!
//! Reads are answered synchronously from the ledger. Mutations answer
//! 202 Accepted with a job id as soon as the job is queued.

use axum::{
    Extension, Json,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
};
use serde_json::Value;
use tally_core::domain::job::Job;
use tally_core::domain::message::Message;
use tally_core::domain::principal::Principal;
use tally_core::dto::error::FieldError;
use tally_core::dto::job::JobAccepted;

use crate::api::error::{ApiError, ApiResult};
use crate::service::message_service::{self, MessageError};
use crate::state::AppState;

type Accepted = (StatusCode, Json<JobAccepted>);

// =============================================================================
// Query Endpoints
// =============================================================================

/// GET /api/messages
pub async fn list_messages(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
) -> ApiResult<Json<Vec<Message>>> {
    tracing::debug!("Listing messages for {}", principal);

    let messages = message_service::list_messages(state.backend.as_ref(), &principal)
        .await
        .map_err(api_error)?;

    Ok(Json(messages))
}

/// GET /api/messages/{id}
pub async fn read_message(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<String>,
) -> ApiResult<Json<Message>> {
    tracing::debug!("Reading message {} for {}", id, principal);

    let message = message_service::read_message(state.backend.as_ref(), &principal, &id)
        .await
        .map_err(api_error)?;

    Ok(Json(message))
}

/// GET /api/messages/by-message-id/{message_id}
pub async fn messages_by_message_id(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(message_id): Path<String>,
) -> ApiResult<Json<Vec<Message>>> {
    tracing::debug!("Listing messages with messageId {} for {}", message_id, principal);

    let messages =
        message_service::messages_by_message_id(state.backend.as_ref(), &principal, &message_id)
            .await
            .map_err(api_error)?;

    Ok(Json(messages))
}

// =============================================================================
// Mutation Endpoints
// =============================================================================

/// POST /api/messages
pub async fn create_message(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    payload: Result<Json<Value>, JsonRejection>,
) -> ApiResult<Accepted> {
    let body = json_body(payload)?;

    let job = message_service::create_message(&state.queue, principal, &body)
        .await
        .map_err(api_error)?;

    Ok(accepted(&job))
}

/// PUT /api/messages/{id}
pub async fn update_message(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<String>,
    payload: Result<Json<Value>, JsonRejection>,
) -> ApiResult<Accepted> {
    let body = json_body(payload)?;

    let job = message_service::update_message(&state.queue, principal, &id, &body)
        .await
        .map_err(api_error)?;

    Ok(accepted(&job))
}

/// PATCH /api/messages/{id}
/// Transfer the message to another user
pub async fn transfer_message(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<String>,
    payload: Result<Json<Value>, JsonRejection>,
) -> ApiResult<Accepted> {
    let body = json_body(payload)?;

    let job = message_service::transfer_message(&state.queue, principal, &id, &body)
        .await
        .map_err(api_error)?;

    Ok(accepted(&job))
}

/// DELETE /api/messages/{id}
pub async fn delete_message(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<String>,
) -> ApiResult<Accepted> {
    let job = message_service::delete_message(&state.queue, principal, &id)
        .await
        .map_err(api_error)?;

    Ok(accepted(&job))
}

// =============================================================================
// Helper Functions
// =============================================================================

fn json_body(payload: Result<Json<Value>, JsonRejection>) -> ApiResult<Value> {
    payload
        .map(|Json(body)| body)
        .map_err(|e| ApiError::validation(vec![FieldError::new("body", e.body_text())]))
}

fn accepted(job: &Job) -> Accepted {
    (StatusCode::ACCEPTED, Json(JobAccepted::new(job.id)))
}

fn api_error(err: MessageError) -> ApiError {
    match err {
        MessageError::Validation(errors) => ApiError::validation(errors),
        MessageError::IdMismatch { .. } => ApiError::IdMismatch,
        MessageError::NotFound(id) => ApiError::NotFound(format!("Message {} not found", id)),
        MessageError::Ledger(_) | MessageError::Decode(_) | MessageError::Store(_) => {
            ApiError::InternalError(err.to_string())
        }
    }
}
