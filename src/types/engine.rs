//! Query engine model: a named, versioned index over one document corpus

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Kind of backend answering queries for an engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineType {
    /// Chunks embedded into an external vector index, answers grounded on
    /// retrieved chunks
    VectorSearch,
    /// Delegates both retrieval and answering to an external LLM service
    LlmService,
    /// Federated engine that fans a query out over child engines
    IntegratedSearch,
}

impl EngineType {
    /// Stable string form used in storage and over the wire
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::VectorSearch => "vector_search",
            Self::LlmService => "llm_service",
            Self::IntegratedSearch => "integrated_search",
        }
    }

    /// Parse the stable string form
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "vector_search" => Some(Self::VectorSearch),
            "llm_service" => Some(Self::LlmService),
            "integrated_search" => Some(Self::IntegratedSearch),
            _ => None,
        }
    }
}

/// A named index over one document corpus plus its configured backends
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryEngine {
    /// Unique engine ID
    pub id: Uuid,
    /// Human-readable name, unique among non-deleted engines
    pub name: String,
    /// Backend kind
    pub engine_type: EngineType,
    /// Free-form description
    pub description: String,
    /// Generation model; falls back to the service default when absent
    pub llm_model: Option<String>,
    /// Embedding model used by the retrieval backend
    pub embedding_model: String,
    /// Vector store identifier (which index backend holds the vectors)
    pub vector_store: Option<String>,
    /// Identifier of the built index in the retrieval backend; set when the
    /// build completes, `None` means the engine is not yet queryable
    pub index_id: Option<String>,
    /// Source locator the corpus was built from
    pub doc_url: Option<String>,
    /// Visible to all users
    pub is_public: bool,
    /// User who requested the build
    pub created_by: String,
    /// Parent engine for federated/integrated engines
    pub parent_engine_id: Option<Uuid>,
    /// Free-form parameter map (e.g. per-build chunking overrides)
    pub params: HashMap<String, serde_json::Value>,
    /// Creation timestamp
    pub created_at: chrono::DateTime<chrono::Utc>,
    /// Last modification timestamp
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

impl QueryEngine {
    /// Create a new engine from a build spec; not yet queryable
    pub fn new(spec: &EngineSpec) -> Self {
        let now = chrono::Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: spec.name.clone(),
            engine_type: spec.engine_type,
            description: spec.description.clone().unwrap_or_default(),
            llm_model: spec.llm_model.clone(),
            embedding_model: spec.embedding_model.clone(),
            vector_store: spec.vector_store.clone(),
            index_id: None,
            doc_url: spec.doc_url.clone(),
            is_public: spec.is_public,
            created_by: spec.created_by.clone(),
            parent_engine_id: spec.parent_engine_id,
            params: spec.params.clone(),
            created_at: now,
            updated_at: now,
        }
    }

    /// An engine is queryable once its index has been built
    pub fn is_queryable(&self) -> bool {
        self.index_id.is_some() || self.engine_type == EngineType::IntegratedSearch
    }

    /// Integer parameter from the params map
    pub fn param_usize(&self, key: &str) -> Option<usize> {
        self.params
            .get(key)
            .and_then(|v| v.as_u64())
            .map(|v| v as usize)
    }
}

/// Engine build request: everything needed to create and build an engine
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineSpec {
    /// Engine name
    pub name: String,
    /// Backend kind
    #[serde(default = "default_engine_type")]
    pub engine_type: EngineType,
    /// Source locator (required except for integrated engines)
    pub doc_url: Option<String>,
    /// Embedding model identifier
    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,
    /// Generation model override for this engine
    pub llm_model: Option<String>,
    /// Vector store identifier
    pub vector_store: Option<String>,
    /// Free-form description
    pub description: Option<String>,
    /// Visible to all users
    #[serde(default)]
    pub is_public: bool,
    /// Requesting user
    #[serde(default)]
    pub created_by: String,
    /// Parent engine for integrated engines
    pub parent_engine_id: Option<Uuid>,
    /// Free-form parameters
    #[serde(default)]
    pub params: HashMap<String, serde_json::Value>,
}

fn default_engine_type() -> EngineType {
    EngineType::VectorSearch
}

fn default_embedding_model() -> String {
    "text-embedding-3-small".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn engine_type_round_trips_through_storage_form() {
        for ty in [
            EngineType::VectorSearch,
            EngineType::LlmService,
            EngineType::IntegratedSearch,
        ] {
            assert_eq!(EngineType::parse(ty.as_str()), Some(ty));
        }
        assert_eq!(EngineType::parse("bogus"), None);
    }

    #[test]
    fn new_engine_is_not_queryable_until_indexed() {
        let spec = EngineSpec {
            name: "docs".into(),
            engine_type: EngineType::VectorSearch,
            doc_url: Some("gs://corpus/docs".into()),
            embedding_model: "embed-1".into(),
            llm_model: None,
            vector_store: None,
            description: None,
            is_public: false,
            created_by: "tester".into(),
            parent_engine_id: None,
            params: HashMap::new(),
        };

        let mut engine = QueryEngine::new(&spec);
        assert!(!engine.is_queryable());

        engine.index_id = Some("idx-1".into());
        assert!(engine.is_queryable());
    }
}
