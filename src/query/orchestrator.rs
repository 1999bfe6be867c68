//! Query orchestration
//!
//! Composes retrieval, reference resolution, and generation into one
//! request/response cycle. Persistence of the conversation turn is the
//! caller's responsibility, so retrieval and generation stay testable
//! without a store.

use std::sync::Arc;

use crate::config::{LlmConfig, QueryConfig};
use crate::error::{Error, Result};
use crate::providers::{Generator, RetrievedChunk, Retriever};
use crate::query::prompt;
use crate::storage::Database;
use crate::types::{EngineType, QueryEngine, QueryReference, QueryResult, UserQuery};

/// Engine params key overriding the configured retrieval depth
const PARAM_TOP_K: &str = "top_k";

/// Orchestrates one query or continuation turn
pub struct QueryOrchestrator {
    store: Arc<Database>,
    retriever: Arc<dyn Retriever>,
    generator: Arc<dyn Generator>,
    max_prompt_bytes: usize,
    default_top_k: usize,
    default_model: String,
}

impl QueryOrchestrator {
    /// Create an orchestrator over the given store and backends
    pub fn new(
        store: Arc<Database>,
        retriever: Arc<dyn Retriever>,
        generator: Arc<dyn Generator>,
        query_config: &QueryConfig,
        llm_config: &LlmConfig,
    ) -> Self {
        Self {
            store,
            retriever,
            generator,
            max_prompt_bytes: query_config.max_prompt_bytes,
            default_top_k: query_config.top_k,
            default_model: llm_config.default_model.clone(),
        }
    }

    /// Run one turn: validate, retrieve, resolve references, generate.
    ///
    /// When `prior` is given, its history is included as context ahead of
    /// the new prompt for both retrieval and generation. Returns the result
    /// and its ordered references without persisting either.
    pub async fn generate(
        &self,
        user_id: &str,
        prompt_text: &str,
        engine: &QueryEngine,
        model_override: Option<&str>,
        prior: Option<&UserQuery>,
    ) -> Result<(QueryResult, Vec<QueryReference>)> {
        if prompt_text.trim().is_empty() {
            return Err(Error::Validation("prompt must not be empty".into()));
        }
        if prompt_text.len() > self.max_prompt_bytes {
            return Err(Error::PayloadTooLarge(format!(
                "prompt must be less than {} bytes",
                self.max_prompt_bytes
            )));
        }
        if !engine.is_queryable() {
            return Err(Error::Validation(format!(
                "engine {} has no built index yet",
                engine.name
            )));
        }

        tracing::info!(
            user_id,
            engine = %engine.name,
            continuation = prior.is_some(),
            "running query"
        );

        let context = prompt::conversation_context(prior);
        let retrieval_query = prompt::retrieval_query(&context, prompt_text);

        let top_k = engine.param_usize(PARAM_TOP_K).unwrap_or(self.default_top_k);
        let references = match engine.engine_type {
            EngineType::IntegratedSearch => {
                self.retrieve_federated(engine, &retrieval_query, top_k).await?
            }
            _ => {
                let hits = self
                    .retriever
                    .retrieve(engine, &retrieval_query, top_k)
                    .await?;
                self.resolve_references(engine, &hits)?
            }
        };

        let model = model_override
            .map(|m| m.to_string())
            .or_else(|| engine.llm_model.clone())
            .unwrap_or_else(|| self.default_model.clone());

        let generation_prompt = prompt::grounded_prompt(prompt_text, &context, &references);
        let answer = self.generator.generate(&model, &generation_prompt).await?;

        let result = QueryResult::new(engine, &references, answer);

        tracing::info!(
            result_id = %result.id,
            references = references.len(),
            "query generated"
        );

        Ok((result, references))
    }

    /// Fan a query out over an integrated engine's children and merge the
    /// ranked hits. References carry the child engine they came from.
    async fn retrieve_federated(
        &self,
        engine: &QueryEngine,
        retrieval_query: &str,
        top_k: usize,
    ) -> Result<Vec<QueryReference>> {
        let children = self.store.find_child_engines(engine.id)?;
        if children.is_empty() {
            return Err(Error::Validation(format!(
                "integrated engine {} has no child engines",
                engine.name
            )));
        }

        let mut ranked: Vec<(usize, RetrievedChunk)> = Vec::new();
        for (child_pos, child) in children.iter().enumerate() {
            if !child.is_queryable() {
                tracing::warn!(child = %child.name, "skipping unbuilt child engine");
                continue;
            }
            let hits = self.retriever.retrieve(child, retrieval_query, top_k).await?;
            ranked.extend(hits.into_iter().map(|hit| (child_pos, hit)));
        }

        ranked.sort_by(|a, b| b.1.score.total_cmp(&a.1.score));
        ranked.truncate(top_k);

        let mut references = Vec::with_capacity(ranked.len());
        for (child_pos, hit) in ranked {
            let child = &children[child_pos];
            references.extend(self.resolve_references(child, std::slice::from_ref(&hit))?);
        }

        Ok(references)
    }

    /// Resolve retrieved chunk positions into denormalized references.
    /// Document URL and chunk text are copied here so later chunk deletion
    /// cannot invalidate historical results.
    fn resolve_references(
        &self,
        engine: &QueryEngine,
        hits: &[RetrievedChunk],
    ) -> Result<Vec<QueryReference>> {
        let mut references = Vec::with_capacity(hits.len());

        for hit in hits {
            let Some(chunk) = self.store.find_chunk_by_index(engine.id, hit.chunk_index)? else {
                tracing::warn!(
                    engine = %engine.name,
                    chunk_index = hit.chunk_index,
                    "retrieved chunk no longer exists, skipping"
                );
                continue;
            };

            let document_url = self
                .store
                .find_document(chunk.document_id)?
                .map(|d| d.doc_url)
                .unwrap_or_default();

            references.push(QueryReference::new(
                engine,
                chunk.document_id,
                document_url,
                Some(chunk.id),
                chunk.clean_text,
            ));
        }

        Ok(references)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::RetrievedChunk;
    use crate::types::{EngineSpec, EngineType, QueryDocument, QueryDocumentChunk};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct StubRetriever {
        hits: Vec<RetrievedChunk>,
        calls: AtomicUsize,
    }

    impl StubRetriever {
        fn returning(hits: Vec<RetrievedChunk>) -> Arc<Self> {
            Arc::new(Self {
                hits,
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl Retriever for StubRetriever {
        async fn index_chunks(
            &self,
            _engine: &QueryEngine,
            _chunks: &[QueryDocumentChunk],
        ) -> Result<String> {
            Ok("stub-index".into())
        }

        async fn retrieve(
            &self,
            _engine: &QueryEngine,
            _query: &str,
            _top_k: usize,
        ) -> Result<Vec<RetrievedChunk>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.hits.clone())
        }

        async fn drop_index(&self, _engine: &QueryEngine) -> Result<()> {
            Ok(())
        }

        async fn health_check(&self) -> Result<bool> {
            Ok(true)
        }

        fn name(&self) -> &str {
            "stub"
        }
    }

    struct StubGenerator {
        answer: String,
        calls: AtomicUsize,
    }

    impl StubGenerator {
        fn answering(answer: &str) -> Arc<Self> {
            Arc::new(Self {
                answer: answer.to_string(),
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl Generator for StubGenerator {
        async fn generate(&self, _model: &str, _prompt: &str) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.answer.clone())
        }

        async fn health_check(&self) -> Result<bool> {
            Ok(true)
        }

        fn name(&self) -> &str {
            "stub"
        }
    }

    fn named_engine(store: &Database, name: &str, parent: Option<uuid::Uuid>) -> QueryEngine {
        let mut engine = QueryEngine::new(&EngineSpec {
            name: name.into(),
            engine_type: EngineType::VectorSearch,
            doc_url: Some(format!("gs://corpus/{name}")),
            embedding_model: "embed-1".into(),
            llm_model: None,
            vector_store: None,
            description: None,
            is_public: false,
            created_by: "tester".into(),
            parent_engine_id: parent,
            params: HashMap::new(),
        });
        store.create_engine(&engine).unwrap();

        let document = QueryDocument::new(engine.id, format!("gs://corpus/{name}/a.txt"));
        let chunks: Vec<QueryDocumentChunk> = (0..3)
            .map(|i| {
                QueryDocumentChunk::new(
                    engine.id,
                    document.id,
                    i,
                    format!("{name} window {i}"),
                    format!("{name} window {i}"),
                    vec![format!("{name} window {i}")],
                )
            })
            .collect();
        store.persist_build(&[document], &chunks).unwrap();
        let index_id = format!("idx-{name}");
        store.set_engine_index(engine.id, &index_id).unwrap();
        engine.index_id = Some(index_id);
        engine
    }

    fn indexed_engine(store: &Database) -> QueryEngine {
        named_engine(store, "manuals", None)
    }

    fn orchestrator(
        store: Arc<Database>,
        retriever: Arc<StubRetriever>,
        generator: Arc<StubGenerator>,
    ) -> QueryOrchestrator {
        QueryOrchestrator::new(
            store,
            retriever,
            generator,
            &QueryConfig::default(),
            &LlmConfig::default(),
        )
    }

    #[tokio::test]
    async fn resolves_hits_into_denormalized_references() {
        let store = Arc::new(Database::in_memory().unwrap());
        let engine = indexed_engine(&store);

        let retriever = StubRetriever::returning(vec![
            RetrievedChunk {
                chunk_index: 2,
                score: 0.9,
            },
            RetrievedChunk {
                chunk_index: 0,
                score: 0.7,
            },
        ]);
        let generator = StubGenerator::answering("grounded answer");
        let orchestrator = orchestrator(store, retriever, generator);

        let (result, references) = orchestrator
            .generate("user-1", "what is covered?", &engine, None, None)
            .await
            .unwrap();

        assert_eq!(result.response, "grounded answer");
        assert_eq!(references.len(), 2);
        // references preserve retrieval rank order and carry chunk text
        assert_eq!(references[0].chunk_text, "manuals window 2");
        assert_eq!(references[1].chunk_text, "manuals window 0");
        assert_eq!(references[0].document_url, "gs://corpus/manuals/a.txt");
        assert_eq!(result.reference_ids.len(), 2);
    }

    #[tokio::test]
    async fn integrated_engine_fans_out_over_children() {
        let store = Arc::new(Database::in_memory().unwrap());

        let parent = {
            let engine = QueryEngine::new(&EngineSpec {
                name: "federated".into(),
                engine_type: EngineType::IntegratedSearch,
                doc_url: None,
                embedding_model: "embed-1".into(),
                llm_model: None,
                vector_store: None,
                description: None,
                is_public: false,
                created_by: "tester".into(),
                parent_engine_id: None,
                params: HashMap::new(),
            });
            store.create_engine(&engine).unwrap();
            engine
        };
        named_engine(&store, "child-a", Some(parent.id));
        named_engine(&store, "child-b", Some(parent.id));

        let retriever = StubRetriever::returning(vec![RetrievedChunk {
            chunk_index: 0,
            score: 0.8,
        }]);
        let generator = StubGenerator::answering("merged answer");
        let orchestrator = orchestrator(store, retriever, generator);

        let (result, references) = orchestrator
            .generate("user-1", "what is covered?", &parent, None, None)
            .await
            .unwrap();

        // one hit per child, both resolved against their own chunk sets
        assert_eq!(references.len(), 2);
        let engine_names: Vec<&str> =
            references.iter().map(|r| r.engine_name.as_str()).collect();
        assert!(engine_names.contains(&"child-a"));
        assert!(engine_names.contains(&"child-b"));
        assert_eq!(result.response, "merged answer");
    }

    #[tokio::test]
    async fn empty_prompt_is_rejected_before_any_backend_call() {
        let store = Arc::new(Database::in_memory().unwrap());
        let engine = indexed_engine(&store);

        let retriever = StubRetriever::returning(vec![]);
        let generator = StubGenerator::answering("unused");
        let orchestrator = orchestrator(store, Arc::clone(&retriever), Arc::clone(&generator));

        let err = orchestrator
            .generate("user-1", "   ", &engine, None, None)
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Validation(_)));
        assert_eq!(retriever.calls.load(Ordering::SeqCst), 0);
        assert_eq!(generator.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn oversized_prompt_is_rejected_before_any_backend_call() {
        let store = Arc::new(Database::in_memory().unwrap());
        let engine = indexed_engine(&store);

        let retriever = StubRetriever::returning(vec![]);
        let generator = StubGenerator::answering("unused");
        let orchestrator = orchestrator(store, Arc::clone(&retriever), Arc::clone(&generator));

        let oversized = "x".repeat(QueryConfig::default().max_prompt_bytes + 1);
        let err = orchestrator
            .generate("user-1", &oversized, &engine, None, None)
            .await
            .unwrap_err();

        assert!(matches!(err, Error::PayloadTooLarge(_)));
        assert_eq!(retriever.calls.load(Ordering::SeqCst), 0);
        assert_eq!(generator.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn unbuilt_engine_is_not_queryable() {
        let store = Arc::new(Database::in_memory().unwrap());
        let mut engine = indexed_engine(&store);
        engine.index_id = None;

        let retriever = StubRetriever::returning(vec![]);
        let generator = StubGenerator::answering("unused");
        let orchestrator = orchestrator(store, retriever, generator);

        let err = orchestrator
            .generate("user-1", "hello?", &engine, None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[tokio::test]
    async fn missing_chunks_are_skipped_not_fatal() {
        let store = Arc::new(Database::in_memory().unwrap());
        let engine = indexed_engine(&store);

        let retriever = StubRetriever::returning(vec![
            RetrievedChunk {
                chunk_index: 0,
                score: 0.9,
            },
            RetrievedChunk {
                chunk_index: 42,
                score: 0.8,
            },
        ]);
        let generator = StubGenerator::answering("answer");
        let orchestrator = orchestrator(store, retriever, generator);

        let (_, references) = orchestrator
            .generate("user-1", "what is covered?", &engine, None, None)
            .await
            .unwrap();

        assert_eq!(references.len(), 1);
    }
}
