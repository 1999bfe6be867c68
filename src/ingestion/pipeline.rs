//! Engine build pipeline
//!
//! Drives one engine build through fetch, read/chunk, and persist. A
//! per-document failure is downgraded to an "unprocessed" entry; fetch
//! resolving to nothing and persistence failures are fatal. A fatal error
//! after engine creation removes the partial engine so re-running the same
//! name starts clean.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::config::AppConfig;
use crate::error::{Error, Result};
use crate::ingestion::chunker::SentenceWindowChunker;
use crate::ingestion::normalize::normalizer_for;
use crate::ingestion::reader::read_document;
use crate::ingestion::source::SourceFetcher;
use crate::providers::Retriever;
use crate::storage::Database;
use crate::types::{
    DocFormat, EngineSpec, QueryDocument, QueryDocumentChunk, QueryEngine, SourceDocument,
};

/// Engine params key overriding the configured sentence padding
const PARAM_SENTENCE_PADDING: &str = "chunk_sentence_padding";

/// Build progress stages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildStage {
    Pending,
    Fetching,
    Chunking,
    Persisting,
    Complete,
    Failed,
}

/// Outcome of a completed build
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildOutcome {
    /// The built, queryable engine
    pub engine: QueryEngine,
    /// Number of fetched documents (unprocessed included)
    pub documents: usize,
    /// Number of persisted chunks
    pub chunks: usize,
    /// Source URLs that contributed zero chunks (read failure or vacuous
    /// content); surfaced to the caller for visibility
    pub unprocessed: Vec<String>,
}

/// Orchestrates SourceFetcher -> reader -> normalizer -> chunker -> store
pub struct IngestionPipeline {
    store: Arc<Database>,
    fetcher: SourceFetcher,
    retriever: Arc<dyn Retriever>,
    config: AppConfig,
}

impl IngestionPipeline {
    /// Create a pipeline over the given store and backends
    pub fn new(
        store: Arc<Database>,
        fetcher: SourceFetcher,
        retriever: Arc<dyn Retriever>,
        config: AppConfig,
    ) -> Self {
        Self {
            store,
            fetcher,
            retriever,
            config,
        }
    }

    /// Build a new engine from its spec.
    ///
    /// The engine name must not already exist among live engines. On any
    /// fatal error the partially-created engine is hard-deleted before the
    /// error propagates.
    pub async fn build_engine(
        &self,
        spec: &EngineSpec,
        progress: impl Fn(BuildStage) + Send,
    ) -> Result<BuildOutcome> {
        if self.store.find_engine_by_name(&spec.name)?.is_some() {
            return Err(Error::Validation(format!(
                "Query engine already exists: {}",
                spec.name
            )));
        }

        let doc_url = spec
            .doc_url
            .clone()
            .ok_or_else(|| Error::Validation("doc_url is required for a corpus build".into()))?;

        let mut engine = QueryEngine::new(spec);
        self.store.create_engine(&engine)?;

        match self.run_build(&mut engine, &doc_url, &progress).await {
            Ok(outcome) => {
                progress(BuildStage::Complete);
                Ok(outcome)
            }
            Err(e) => {
                progress(BuildStage::Failed);
                tracing::error!(engine = %engine.name, "build failed: {}", e);
                if let Err(cleanup) = self.store.hard_delete_engine(engine.id) {
                    tracing::error!(
                        engine = %engine.name,
                        "failed to clean up partial engine: {}",
                        cleanup
                    );
                }
                Err(e)
            }
        }
    }

    async fn run_build(
        &self,
        engine: &mut QueryEngine,
        doc_url: &str,
        progress: &(impl Fn(BuildStage) + Send),
    ) -> Result<BuildOutcome> {
        // the scratch directory is exclusively owned by this build and is
        // removed on drop, on success and failure paths alike
        std::fs::create_dir_all(&self.config.storage.scratch_root)?;
        let scratch = tempfile::Builder::new()
            .prefix("build-")
            .tempdir_in(&self.config.storage.scratch_root)?;

        progress(BuildStage::Fetching);
        let sources = self.fetcher.fetch(doc_url, scratch.path()).await?;
        tracing::info!(engine = %engine.name, "fetched {} documents", sources.len());

        progress(BuildStage::Chunking);
        let padding = engine
            .param_usize(PARAM_SENTENCE_PADDING)
            .unwrap_or(self.config.chunking.sentence_padding);
        let chunker = SentenceWindowChunker::new(padding);

        let mut documents = Vec::with_capacity(sources.len());
        let mut chunk_records: Vec<QueryDocumentChunk> = Vec::new();
        let mut unprocessed = Vec::new();
        let mut next_index: u32 = 0;

        for source in &sources {
            let document = QueryDocument::new(engine.id, source.src_url.clone());

            match self.chunk_source(&chunker, source) {
                Some(chunks) if !chunks.is_empty() => {
                    for chunk in chunks {
                        chunk_records.push(QueryDocumentChunk::new(
                            engine.id,
                            document.id,
                            next_index,
                            chunk.text,
                            chunk.clean_text,
                            chunk.sentences,
                        ));
                        next_index += 1;
                    }
                }
                _ => unprocessed.push(source.src_url.clone()),
            }

            // unprocessed documents are persisted too, so operators can
            // audit what a build skipped
            documents.push(document);
        }

        if chunk_records.is_empty() {
            return Err(Error::NoDocumentsIndexed(format!(
                "none of the {} documents at {} produced indexable content",
                sources.len(),
                doc_url
            )));
        }

        progress(BuildStage::Persisting);
        self.store.persist_build(&documents, &chunk_records)?;

        let index_id = self.retriever.index_chunks(engine, &chunk_records).await?;
        self.store.set_engine_index(engine.id, &index_id)?;
        engine.index_id = Some(index_id);

        if !unprocessed.is_empty() {
            tracing::warn!(
                engine = %engine.name,
                "{} documents were not processed: {:?}",
                unprocessed.len(),
                unprocessed
            );
        }

        Ok(BuildOutcome {
            engine: engine.clone(),
            documents: documents.len(),
            chunks: chunk_records.len(),
            unprocessed,
        })
    }

    /// Chunk one fetched document. Returns `None` when the document could
    /// not be read; the build continues without it.
    fn chunk_source(
        &self,
        chunker: &SentenceWindowChunker,
        source: &SourceDocument,
    ) -> Option<Vec<crate::ingestion::chunker::ChunkText>> {
        let units = match read_document(&source.doc_name, &source.local_path) {
            Ok(units) => units,
            Err(e) => {
                tracing::warn!(doc = %source.doc_name, "skipping unreadable document: {}", e);
                return None;
            }
        };

        if units.is_empty() {
            tracing::warn!(doc = %source.doc_name, "no content read");
            return None;
        }

        let format = DocFormat::from_name(&source.doc_name)?;
        let normalizer = normalizer_for(format);
        let chunks = chunker.chunk_units(normalizer.as_ref(), &units);

        if chunks.is_empty() {
            tracing::warn!(doc = %source.doc_name, "all extracted content is empty");
        }

        Some(chunks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SourceConfig;
    use crate::providers::object_store::FsObjectStore;
    use crate::providers::RetrievedChunk;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::path::Path;

    struct StubRetriever;

    #[async_trait]
    impl Retriever for StubRetriever {
        async fn index_chunks(
            &self,
            engine: &QueryEngine,
            _chunks: &[QueryDocumentChunk],
        ) -> Result<String> {
            Ok(format!("idx-{}", engine.id))
        }

        async fn retrieve(
            &self,
            _engine: &QueryEngine,
            _query: &str,
            _top_k: usize,
        ) -> Result<Vec<RetrievedChunk>> {
            Ok(vec![])
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

    fn spec(name: &str, doc_url: &str) -> EngineSpec {
        EngineSpec {
            name: name.to_string(),
            engine_type: crate::types::EngineType::VectorSearch,
            doc_url: Some(doc_url.to_string()),
            embedding_model: "embed-1".into(),
            llm_model: None,
            vector_store: None,
            description: None,
            is_public: false,
            created_by: "tester".into(),
            parent_engine_id: None,
            params: HashMap::new(),
        }
    }

    fn pipeline_over(store_root: &Path, scratch_root: &Path) -> (IngestionPipeline, Arc<Database>) {
        let store = Arc::new(Database::in_memory().unwrap());
        let mut config = AppConfig::default();
        config.storage.scratch_root = scratch_root.to_path_buf();

        let fetcher = SourceFetcher::new(
            Arc::new(FsObjectStore::new(store_root.to_path_buf())),
            &SourceConfig::default(),
        );

        let pipeline = IngestionPipeline::new(
            Arc::clone(&store),
            fetcher,
            Arc::new(StubRetriever),
            config,
        );
        (pipeline, store)
    }

    #[tokio::test]
    async fn build_completes_with_contiguous_chunk_indices() {
        let store_root = tempfile::tempdir().unwrap();
        let bucket = store_root.path().join("corpus");
        std::fs::create_dir_all(&bucket).unwrap();
        std::fs::write(
            bucket.join("a.txt"),
            "Page one text. More page one. Final sentence.",
        )
        .unwrap();
        std::fs::write(bucket.join("b.txt"), "Doc b first. Doc b second.").unwrap();

        let scratch = tempfile::tempdir().unwrap();
        let (pipeline, store) = pipeline_over(store_root.path(), scratch.path());

        let outcome = pipeline
            .build_engine(&spec("manuals", "gs://corpus"), |_| {})
            .await
            .unwrap();

        assert!(outcome.unprocessed.is_empty());
        assert_eq!(outcome.documents, 2);
        assert!(outcome.engine.index_id.is_some());

        // indices are contiguous from 0 across the engine
        let count = store.chunk_count(outcome.engine.id).unwrap();
        assert_eq!(count as usize, outcome.chunks);
        for index in 0..count {
            assert!(store
                .find_chunk_by_index(outcome.engine.id, index)
                .unwrap()
                .is_some());
        }
    }

    #[tokio::test]
    async fn corrupt_document_lands_in_unprocessed_and_build_completes() {
        let store_root = tempfile::tempdir().unwrap();
        let bucket = store_root.path().join("corpus");
        std::fs::create_dir_all(&bucket).unwrap();
        std::fs::write(bucket.join("good.txt"), "Readable text. More of it.").unwrap();
        std::fs::write(bucket.join("broken.txt"), [0xff_u8, 0xfe, 0x00]).unwrap();

        let scratch = tempfile::tempdir().unwrap();
        let (pipeline, store) = pipeline_over(store_root.path(), scratch.path());

        let outcome = pipeline
            .build_engine(&spec("mixed", "gs://corpus"), |_| {})
            .await
            .unwrap();

        assert_eq!(outcome.documents, 2);
        assert_eq!(outcome.unprocessed.len(), 1);
        assert!(outcome.unprocessed[0].contains("broken.txt"));

        // both documents persisted, chunks only from the readable one
        let documents = store.documents_for_engine(outcome.engine.id).unwrap();
        assert_eq!(documents.len(), 2);
        assert!(outcome.chunks > 0);
    }

    #[tokio::test]
    async fn unsupported_format_is_a_per_document_skip() {
        let store_root = tempfile::tempdir().unwrap();
        let bucket = store_root.path().join("corpus");
        std::fs::create_dir_all(&bucket).unwrap();
        std::fs::write(bucket.join("good.txt"), "Readable text. More of it.").unwrap();
        std::fs::write(bucket.join("blob.bin"), [0_u8, 1, 2]).unwrap();

        let scratch = tempfile::tempdir().unwrap();
        let (pipeline, _) = pipeline_over(store_root.path(), scratch.path());

        let outcome = pipeline
            .build_engine(&spec("mixed", "gs://corpus"), |_| {})
            .await
            .unwrap();

        assert_eq!(outcome.unprocessed.len(), 1);
        assert!(outcome.unprocessed[0].contains("blob.bin"));
    }

    #[tokio::test]
    async fn empty_source_fails_and_leaves_no_engine() {
        let store_root = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(store_root.path().join("corpus")).unwrap();

        let scratch = tempfile::tempdir().unwrap();
        let (pipeline, store) = pipeline_over(store_root.path(), scratch.path());

        let err = pipeline
            .build_engine(&spec("empty", "gs://corpus/none"), |_| {})
            .await
            .unwrap_err();

        assert!(matches!(err, Error::NoDocumentsIndexed(_)));
        assert!(store.find_engine_by_name("empty").unwrap().is_none());
    }

    #[tokio::test]
    async fn duplicate_engine_name_is_rejected_before_fetch() {
        let store_root = tempfile::tempdir().unwrap();
        let bucket = store_root.path().join("corpus");
        std::fs::create_dir_all(&bucket).unwrap();
        std::fs::write(bucket.join("a.txt"), "Some text here. More text.").unwrap();

        let scratch = tempfile::tempdir().unwrap();
        let (pipeline, _) = pipeline_over(store_root.path(), scratch.path());

        pipeline
            .build_engine(&spec("manuals", "gs://corpus"), |_| {})
            .await
            .unwrap();

        let err = pipeline
            .build_engine(&spec("manuals", "gs://corpus"), |_| {})
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[tokio::test]
    async fn failed_build_allows_rerun_without_duplicates() {
        let store_root = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(store_root.path().join("corpus")).unwrap();

        let scratch = tempfile::tempdir().unwrap();
        let (pipeline, store) = pipeline_over(store_root.path(), scratch.path());

        // first attempt fails: nothing to index
        assert!(pipeline
            .build_engine(&spec("retry", "gs://corpus"), |_| {})
            .await
            .is_err());

        // documents appear, second attempt succeeds cleanly
        std::fs::write(
            store_root.path().join("corpus/a.txt"),
            "Now there is content. Enough for chunks.",
        )
        .unwrap();

        let outcome = pipeline
            .build_engine(&spec("retry", "gs://corpus"), |_| {})
            .await
            .unwrap();
        assert_eq!(store.documents_for_engine(outcome.engine.id).unwrap().len(), 1);
    }

    #[tokio::test]
    async fn scratch_directory_is_removed_after_build() {
        let store_root = tempfile::tempdir().unwrap();
        let bucket = store_root.path().join("corpus");
        std::fs::create_dir_all(&bucket).unwrap();
        std::fs::write(bucket.join("a.txt"), "Some text here. More text.").unwrap();

        let scratch = tempfile::tempdir().unwrap();
        let (pipeline, _) = pipeline_over(store_root.path(), scratch.path());

        pipeline
            .build_engine(&spec("manuals", "gs://corpus"), |_| {})
            .await
            .unwrap();

        let leftovers: Vec<_> = std::fs::read_dir(scratch.path()).unwrap().collect();
        assert!(leftovers.is_empty());
    }
}
