//! Shared application state

use std::sync::Arc;

use crate::config::AppConfig;
use crate::error::Result;
use crate::ingestion::pipeline::IngestionPipeline;
use crate::ingestion::source::SourceFetcher;
use crate::processing::{BuildWorker, JobQueue};
use crate::providers::{
    FsObjectStore, Generator, HttpRetriever, ObjectStore, OllamaGenerator, Retriever,
};
use crate::query::QueryOrchestrator;
use crate::storage::Database;

/// Shared state handed to every route handler
#[derive(Clone)]
pub struct AppState {
    config: Arc<AppConfig>,
    store: Arc<Database>,
    retriever: Arc<dyn Retriever>,
    generator: Arc<dyn Generator>,
    orchestrator: Arc<QueryOrchestrator>,
    job_queue: Arc<JobQueue>,
}

impl AppState {
    /// Wire up the store, providers, orchestrator, and the background build
    /// worker from configuration
    pub async fn new(config: AppConfig) -> Result<Self> {
        let store = Arc::new(Database::new(&config.storage.database_path)?);

        let object_store: Arc<dyn ObjectStore> = Arc::new(FsObjectStore::new(
            config.storage.object_store_root.clone(),
        ));
        let retriever: Arc<dyn Retriever> = Arc::new(HttpRetriever::new(&config.retrieval));
        let generator: Arc<dyn Generator> = Arc::new(OllamaGenerator::new(&config.llm));

        let orchestrator = Arc::new(QueryOrchestrator::new(
            Arc::clone(&store),
            Arc::clone(&retriever),
            Arc::clone(&generator),
            &config.query,
            &config.llm,
        ));

        let fetcher = SourceFetcher::new(object_store, &config.sources);
        let pipeline = Arc::new(IngestionPipeline::new(
            Arc::clone(&store),
            fetcher,
            Arc::clone(&retriever),
            config.clone(),
        ));

        let (job_queue, receiver) = JobQueue::new(64);
        let job_queue = Arc::new(job_queue);
        let worker = BuildWorker::new(pipeline, Arc::clone(&job_queue));
        tokio::spawn(worker.run(receiver));

        Ok(Self {
            config: Arc::new(config),
            store,
            retriever,
            generator,
            orchestrator,
            job_queue,
        })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<Database> {
        &self.store
    }

    pub fn retriever(&self) -> &Arc<dyn Retriever> {
        &self.retriever
    }

    pub fn generator(&self) -> &Arc<dyn Generator> {
        &self.generator
    }

    pub fn orchestrator(&self) -> &Arc<QueryOrchestrator> {
        &self.orchestrator
    }

    pub fn job_queue(&self) -> &Arc<JobQueue> {
        &self.job_queue
    }
}
