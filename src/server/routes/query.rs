//! Query and conversation endpoints

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::server::state::AppState;
use crate::types::{QueryReference, QueryResult, UserQuery};

use super::engines::DeleteParams;

/// Query payload
#[derive(Debug, Deserialize)]
pub struct QueryRequest {
    pub prompt: String,
    /// Per-request generation model override
    pub llm_model: Option<String>,
    #[serde(default = "default_user")]
    pub user_id: String,
}

fn default_user() -> String {
    "anonymous".to_string()
}

/// One generated turn
#[derive(Debug, Serialize)]
pub struct QueryResponse {
    pub user_query_id: Uuid,
    pub result: QueryResult,
    pub references: Vec<QueryReference>,
}

/// POST /api/engines/:id/query - start a conversation against an engine
pub async fn query_engine(
    State(state): State<AppState>,
    Path(engine_id): Path<Uuid>,
    Json(request): Json<QueryRequest>,
) -> Result<Json<QueryResponse>> {
    let engine = state
        .store()
        .find_engine(engine_id)?
        .ok_or_else(|| Error::NotFound(format!("Engine {} not found", engine_id)))?;

    let (result, references) = state
        .orchestrator()
        .generate(
            &request.user_id,
            &request.prompt,
            &engine,
            request.llm_model.as_deref(),
            None,
        )
        .await?;

    // one persistence pass per turn: references + result, then the thread
    state.store().persist_query_result(&result, &references)?;

    let user_query = UserQuery::new(request.user_id, engine.id, request.prompt.clone());
    state.store().create_user_query(&user_query)?;
    state
        .store()
        .update_history(user_query.id, &request.prompt, &result.response, &references)?;

    Ok(Json(QueryResponse {
        user_query_id: user_query.id,
        result,
        references,
    }))
}

/// POST /api/queries/:id - continue a prior conversation
///
/// The prior thread's history rides along as context; one new human/AI
/// pair is appended and earlier entries are never rewritten.
pub async fn continue_query(
    State(state): State<AppState>,
    Path(query_id): Path<Uuid>,
    Json(request): Json<QueryRequest>,
) -> Result<Json<QueryResponse>> {
    let prior = state
        .store()
        .find_user_query(query_id)?
        .ok_or_else(|| Error::NotFound(format!("Query {} not found", query_id)))?;

    let engine = state
        .store()
        .find_engine(prior.engine_id)?
        .ok_or_else(|| Error::NotFound(format!("Engine {} not found", prior.engine_id)))?;

    let (result, references) = state
        .orchestrator()
        .generate(
            &prior.user_id,
            &request.prompt,
            &engine,
            request.llm_model.as_deref(),
            Some(&prior),
        )
        .await?;

    state.store().persist_query_result(&result, &references)?;
    state
        .store()
        .update_history(prior.id, &request.prompt, &result.response, &references)?;

    Ok(Json(QueryResponse {
        user_query_id: prior.id,
        result,
        references,
    }))
}

/// Pagination parameters
#[derive(Debug, Deserialize)]
pub struct ListParams {
    #[serde(default)]
    pub skip: usize,
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_limit() -> usize {
    20
}

/// Conversation summary without the history payload
#[derive(Debug, Serialize)]
pub struct UserQuerySummary {
    pub id: Uuid,
    pub user_id: String,
    pub title: Option<String>,
    pub engine_id: Uuid,
    pub prompt: String,
    pub response: Option<String>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

impl From<UserQuery> for UserQuerySummary {
    fn from(query: UserQuery) -> Self {
        Self {
            id: query.id,
            user_id: query.user_id,
            title: query.title,
            engine_id: query.engine_id,
            prompt: query.prompt,
            response: query.response,
            created_at: query.created_at,
            updated_at: query.updated_at,
        }
    }
}

/// GET /api/queries/user/:user_id - list a user's conversations.
/// History is elided to keep the payload slim; fetch a single query for it.
pub async fn list_user_queries(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Query(params): Query<ListParams>,
) -> Result<Json<Vec<UserQuerySummary>>> {
    if params.limit < 1 {
        return Err(Error::Validation(
            "invalid value passed to \"limit\" query parameter".into(),
        ));
    }

    let queries = state
        .store()
        .queries_for_user(&user_id, params.skip, params.limit)?
        .into_iter()
        .map(UserQuerySummary::from)
        .collect();
    Ok(Json(queries))
}

/// GET /api/queries/:id - one conversation with full history
pub async fn get_query(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<UserQuery>> {
    let query = state
        .store()
        .find_user_query(id)?
        .ok_or_else(|| Error::NotFound(format!("Query {} not found", id)))?;
    Ok(Json(query))
}

/// Update payload for a conversation; only the title can change
#[derive(Debug, Deserialize)]
pub struct UpdateQueryRequest {
    pub title: String,
}

/// PUT /api/queries/:id - update a conversation title
pub async fn update_query(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(update): Json<UpdateQueryRequest>,
) -> Result<Json<serde_json::Value>> {
    state.store().update_query_title(id, &update.title)?;
    Ok(Json(serde_json::json!({ "success": true })))
}

/// DELETE /api/queries/:id - soft delete by default
pub async fn delete_query(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(params): Query<DeleteParams>,
) -> Result<Json<serde_json::Value>> {
    if state.store().find_user_query(id)?.is_none() {
        return Err(Error::NotFound(format!("Query {} not found", id)));
    }

    if params.hard {
        state.store().hard_delete_user_query(id)?;
    } else {
        state.store().soft_delete_user_query(id)?;
    }
    Ok(Json(serde_json::json!({ "success": true })))
}
