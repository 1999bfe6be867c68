//! API routes

pub mod engines;
pub mod jobs;
pub mod query;

use axum::{
    routing::{delete, get, post, put},
    Router,
};

use crate::server::state::AppState;

/// Build all API routes
pub fn api_routes() -> Router<AppState> {
    Router::new()
        // Engine management
        .route("/engines", get(engines::list_engines))
        .route("/engines", post(engines::create_engine))
        .route("/engines/:id", put(engines::update_engine))
        .route("/engines/:id", delete(engines::delete_engine))
        .route("/engines/:id/urls", get(engines::engine_urls))
        // Query + continuation
        .route("/engines/:id/query", post(query::query_engine))
        .route("/queries/:id", post(query::continue_query))
        // Conversation management
        .route("/queries/user/:user_id", get(query::list_user_queries))
        .route("/queries/:id", get(query::get_query))
        .route("/queries/:id", put(query::update_query))
        .route("/queries/:id", delete(query::delete_query))
        // Build jobs
        .route("/jobs", get(jobs::list_jobs))
        .route("/jobs/:id", get(jobs::get_job))
        // Info
        .route("/info", get(info))
}

/// API info endpoint
async fn info() -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({
        "name": "corpus-rag",
        "version": env!("CARGO_PKG_VERSION"),
        "description": "Retrieval-augmented query service with grounded answers and references",
        "endpoints": {
            "GET /api/engines": "List query engines",
            "POST /api/engines": "Create an engine (starts a build job)",
            "PUT /api/engines/:id": "Update an engine description",
            "DELETE /api/engines/:id": "Delete an engine (soft by default, ?hard=true cascades)",
            "GET /api/engines/:id/urls": "Document URLs indexed by an engine",
            "POST /api/engines/:id/query": "Ask a question against an engine",
            "POST /api/queries/:id": "Continue a prior conversation",
            "GET /api/queries/user/:user_id": "List a user's conversations",
            "GET /api/queries/:id": "Get one conversation with history",
            "PUT /api/queries/:id": "Update a conversation title",
            "DELETE /api/queries/:id": "Delete a conversation",
            "GET /api/jobs": "List build jobs",
            "GET /api/jobs/:id": "Get build job progress"
        }
    }))
}
