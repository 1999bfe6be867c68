//! Engine management endpoints

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::ingestion::source::SourceLocator;
use crate::server::state::AppState;
use crate::types::{EngineSpec, EngineType, QueryEngine};

/// Response for engine creation
#[derive(Debug, Serialize)]
pub struct CreateEngineResponse {
    /// Build job to poll; absent for integrated engines created directly
    pub job_id: Option<Uuid>,
    /// Engine id; present immediately for integrated engines
    pub engine_id: Option<Uuid>,
    pub engine_name: String,
    pub message: String,
}

/// GET /api/engines - list live engines
pub async fn list_engines(State(state): State<AppState>) -> Result<Json<Vec<QueryEngine>>> {
    let engines = state.store().list_engines()?;
    Ok(Json(engines))
}

/// POST /api/engines - create an engine
///
/// Corpus-backed engines are built out-of-band: the request validates the
/// locator and name, enqueues a build job, and returns the job id.
/// Integrated engines have no corpus and are created directly.
pub async fn create_engine(
    State(state): State<AppState>,
    Json(spec): Json<EngineSpec>,
) -> Result<Json<CreateEngineResponse>> {
    if spec.name.trim().is_empty() {
        return Err(Error::Validation("engine name must not be empty".into()));
    }

    // advisory uniqueness check; the pipeline re-checks before creating
    if state.store().find_engine_by_name(&spec.name)?.is_some() {
        return Err(Error::Validation(format!(
            "Query engine already exists: {}",
            spec.name
        )));
    }

    if spec.engine_type == EngineType::IntegratedSearch {
        let engine = QueryEngine::new(&spec);
        state.store().create_engine(&engine)?;
        tracing::info!(engine = %engine.name, "created integrated engine");
        return Ok(Json(CreateEngineResponse {
            job_id: None,
            engine_id: Some(engine.id),
            engine_name: engine.name,
            message: "Integrated engine created".into(),
        }));
    }

    let doc_url = spec
        .doc_url
        .as_deref()
        .ok_or_else(|| Error::Validation("doc_url is required".into()))?;

    // reject unknown schemes before any work is queued
    SourceLocator::parse(doc_url)?;
    if doc_url.ends_with(".pdf") {
        return Err(Error::Validation(
            "doc_url must point to a bucket, folder, or website, not a single document".into(),
        ));
    }

    let engine_name = spec.name.clone();
    let job_id = state.job_queue().submit(spec).await?;

    tracing::info!(engine = %engine_name, %job_id, "queued engine build");
    Ok(Json(CreateEngineResponse {
        job_id: Some(job_id),
        engine_id: None,
        engine_name,
        message: format!("Build queued. Poll /api/jobs/{} for progress.", job_id),
    }))
}

/// Update payload for an engine; only the description can change
#[derive(Debug, Deserialize)]
pub struct UpdateEngineRequest {
    pub description: String,
}

/// PUT /api/engines/:id - update an engine description
pub async fn update_engine(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(update): Json<UpdateEngineRequest>,
) -> Result<Json<serde_json::Value>> {
    state
        .store()
        .update_engine_description(id, &update.description)?;
    Ok(Json(serde_json::json!({ "success": true })))
}

/// Delete options
#[derive(Debug, Deserialize)]
pub struct DeleteParams {
    #[serde(default)]
    pub hard: bool,
}

/// DELETE /api/engines/:id - soft delete by default; hard delete cascades
/// to documents and chunks and drops the retrieval index
pub async fn delete_engine(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(params): Query<DeleteParams>,
) -> Result<Json<serde_json::Value>> {
    let engine = state
        .store()
        .find_engine(id)?
        .ok_or_else(|| Error::NotFound(format!("Engine {} not found", id)))?;

    if params.hard {
        if engine.index_id.is_some() {
            if let Err(e) = state.retriever().drop_index(&engine).await {
                tracing::warn!(engine = %engine.name, "failed to drop retrieval index: {}", e);
            }
        }
        state.store().hard_delete_engine(id)?;
    } else {
        state.store().soft_delete_engine(id)?;
    }

    tracing::info!(engine = %engine.name, hard = params.hard, "deleted engine");
    Ok(Json(serde_json::json!({ "success": true })))
}

/// GET /api/engines/:id/urls - document URLs indexed by an engine
pub async fn engine_urls(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<String>>> {
    if state.store().find_engine(id)?.is_none() {
        return Err(Error::NotFound(format!("Engine {} not found", id)));
    }

    let urls = state
        .store()
        .documents_for_engine(id)?
        .into_iter()
        .map(|d| d.doc_url)
        .collect();
    Ok(Json(urls))
}
