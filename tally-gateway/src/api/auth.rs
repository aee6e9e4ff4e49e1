//! Auth API Handlers
//!
//! Login endpoint and the API key middleware guarding everything else.

use axum::{
    Json,
    extract::{Request, State, rejection::JsonRejection},
    middleware::Next,
    response::Response,
};
use serde_json::Value;
use tally_core::dto::auth::LoginResponse;
use tally_core::dto::error::FieldError;

use crate::api::error::{ApiError, ApiResult};
use crate::auth::API_KEY_HEADER;
use crate::service::auth_service;
use crate::state::AppState;

/// POST /api/auth/login
pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<Value>, JsonRejection>,
) -> ApiResult<Json<LoginResponse>> {
    let Json(body) = payload.map_err(|e| {
        ApiError::validation(vec![FieldError::new("body", e.body_text())])
    })?;

    let response = auth_service::login(state.wallet.as_ref(), state.credentials.as_ref(), &body)
        .await
        .map_err(|e| match e {
            auth_service::AuthError::Validation(errors) => ApiError::validation(errors),
            auth_service::AuthError::LoginFailed(msg) => {
                tracing::warn!("Login failed: {}", msg);
                ApiError::LoginFailed(msg)
            }
            auth_service::AuthError::Wallet(err) => ApiError::InternalError(err.to_string()),
        })?;

    Ok(Json(response))
}

/// Resolve `X-API-Key` to a principal and attach it to the request
pub async fn require_api_key(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> ApiResult<Response> {
    let principal = request
        .headers()
        .get(API_KEY_HEADER)
        .and_then(|value| value.to_str().ok())
        .and_then(|key| state.credentials.resolve(key))
        .ok_or_else(|| {
            tracing::debug!("No valid {} on {}", API_KEY_HEADER, request.uri());
            ApiError::Unauthorized
        })?;

    request.extensions_mut().insert(principal);
    Ok(next.run(request).await)
}
