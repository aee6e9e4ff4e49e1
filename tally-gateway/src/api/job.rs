//! Job API Handlers

use axum::{
    Extension, Json,
    extract::{Path, State},
};
use tally_core::domain::job::Job;
use tally_core::domain::principal::Principal;
use uuid::Uuid;

use crate::api::error::{ApiError, ApiResult};
use crate::service::job_service;
use crate::state::AppState;

/// GET /api/jobs/{job_id}
/// Current status of a queued mutation
pub async fn get_job(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(job_id): Path<String>,
) -> ApiResult<Json<Job>> {
    tracing::debug!("Getting job: {}", job_id);

    let not_found = || ApiError::NotFound(format!("Job {} not found", job_id));
    let id = Uuid::parse_str(&job_id).map_err(|_| not_found())?;

    let job = job_service::get_job(&state.queue, &principal, id)
        .await
        .map_err(|e| match e {
            job_service::JobServiceError::NotFound(_) => not_found(),
            job_service::JobServiceError::Store(err) => ApiError::InternalError(err.to_string()),
        })?;

    Ok(Json(job))
}
