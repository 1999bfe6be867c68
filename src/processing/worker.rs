//! Background worker driving engine builds

use std::sync::Arc;
use tokio::sync::mpsc;

use crate::ingestion::pipeline::IngestionPipeline;

use super::job_queue::{BuildJob, JobQueue};

/// Consumes build jobs and runs them through the pipeline, one at a time
pub struct BuildWorker {
    pipeline: Arc<IngestionPipeline>,
    queue: Arc<JobQueue>,
}

impl BuildWorker {
    /// Create a worker over the given pipeline and queue
    pub fn new(pipeline: Arc<IngestionPipeline>, queue: Arc<JobQueue>) -> Self {
        Self { pipeline, queue }
    }

    /// Process jobs until the queue side is dropped
    pub async fn run(self, mut receiver: mpsc::Receiver<BuildJob>) {
        tracing::info!("build worker started");

        while let Some(job) = receiver.recv().await {
            let job_id = job.id;
            tracing::info!(engine = %job.spec.name, %job_id, "starting engine build");
            self.queue.set_running(job_id);

            let queue = Arc::clone(&self.queue);
            let result = self
                .pipeline
                .build_engine(&job.spec, move |stage| queue.set_stage(job_id, stage))
                .await;

            match result {
                Ok(outcome) => {
                    tracing::info!(
                        engine = %outcome.engine.name,
                        chunks = outcome.chunks,
                        unprocessed = outcome.unprocessed.len(),
                        "engine build complete"
                    );
                    self.queue.complete(job_id, &outcome);
                }
                Err(e) => {
                    tracing::error!(%job_id, "engine build failed: {}", e);
                    self.queue.fail(job_id, &e);
                }
            }
        }

        tracing::info!("build worker stopped");
    }
}
