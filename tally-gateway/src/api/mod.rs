//! API Module
//!
//! HTTP API layer for the gateway.
//! Each submodule handles endpoints for a specific domain.

pub mod auth;
pub mod error;
pub mod health;
pub mod job;
pub mod message;

use axum::{
    Router, middleware,
    routing::{get, post},
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Create the main API router with all endpoints
pub fn create_router(state: AppState) -> Router {
    // Everything under /api except login needs an X-API-Key
    let protected = Router::new()
        // Message endpoints
        .route(
            "/api/messages",
            get(message::list_messages).post(message::create_message),
        )
        .route(
            "/api/messages/by-message-id/{message_id}",
            get(message::messages_by_message_id),
        )
        .route(
            "/api/messages/{id}",
            get(message::read_message)
                .put(message::update_message)
                .patch(message::transfer_message)
                .delete(message::delete_message),
        )
        // Job endpoints
        .route("/api/jobs/{job_id}", get(job::get_job))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_api_key,
        ));

    Router::new()
        // Health check
        .route("/health", get(health::health_check))
        .route("/api/auth/login", post(auth::login))
        .merge(protected)
        // Add state and middleware
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

/// Lets browser clients on any origin call the API
///
/// Meant for development setups; preflight requests are answered before
/// the API key check runs.
pub fn with_permissive_cors(router: Router) -> Router {
    router.layer(CorsLayer::permissive())
}
