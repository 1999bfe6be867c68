//! Build job progress endpoints

use axum::{
    extract::{Path, State},
    Json,
};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::processing::JobProgress;
use crate::server::state::AppState;

/// GET /api/jobs - list build jobs, newest first
pub async fn list_jobs(State(state): State<AppState>) -> Result<Json<Vec<JobProgress>>> {
    Ok(Json(state.job_queue().list()))
}

/// GET /api/jobs/:id - progress for one build job
pub async fn get_job(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<JobProgress>> {
    let progress = state
        .job_queue()
        .get(id)
        .ok_or_else(|| Error::NotFound(format!("Job {} not found", id)))?;
    Ok(Json(progress))
}
