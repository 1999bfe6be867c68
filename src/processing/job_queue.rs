//! Job queue for out-of-band engine builds
//!
//! Builds are long-running, so creation requests enqueue a job and return
//! immediately; callers poll job progress by id.

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::ingestion::pipeline::{BuildOutcome, BuildStage};
use crate::types::EngineSpec;

/// Job status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Running,
    Complete,
    Failed,
}

/// One queued engine build
#[derive(Debug, Clone)]
pub struct BuildJob {
    pub id: Uuid,
    pub spec: EngineSpec,
}

/// Progress of one build job
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobProgress {
    pub job_id: Uuid,
    pub engine_name: String,
    pub status: JobStatus,
    pub stage: BuildStage,
    /// Set once the build completes
    pub engine_id: Option<Uuid>,
    pub documents: usize,
    pub chunks: usize,
    /// Source URLs that contributed zero chunks
    pub unprocessed: Vec<String>,
    pub error: Option<String>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

impl JobProgress {
    fn new(job_id: Uuid, engine_name: String) -> Self {
        let now = chrono::Utc::now();
        Self {
            job_id,
            engine_name,
            status: JobStatus::Pending,
            stage: BuildStage::Pending,
            engine_id: None,
            documents: 0,
            chunks: 0,
            unprocessed: Vec::new(),
            error: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Queue handing build jobs to the background worker
pub struct JobQueue {
    jobs: Arc<DashMap<Uuid, JobProgress>>,
    sender: mpsc::Sender<BuildJob>,
}

impl JobQueue {
    /// Create a queue; the receiver goes to the [`BuildWorker`](crate::processing::BuildWorker)
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<BuildJob>) {
        let (sender, receiver) = mpsc::channel(capacity);
        (
            Self {
                jobs: Arc::new(DashMap::new()),
                sender,
            },
            receiver,
        )
    }

    /// Submit a build and return its job id
    pub async fn submit(&self, spec: EngineSpec) -> Result<Uuid> {
        let job = BuildJob {
            id: Uuid::new_v4(),
            spec,
        };
        let job_id = job.id;

        self.jobs
            .insert(job_id, JobProgress::new(job_id, job.spec.name.clone()));

        self.sender
            .send(job)
            .await
            .map_err(|_| Error::Internal("build worker is not running".into()))?;

        Ok(job_id)
    }

    /// Progress for one job
    pub fn get(&self, job_id: Uuid) -> Option<JobProgress> {
        self.jobs.get(&job_id).map(|p| p.value().clone())
    }

    /// All known jobs, newest first
    pub fn list(&self) -> Vec<JobProgress> {
        let mut jobs: Vec<JobProgress> = self.jobs.iter().map(|e| e.value().clone()).collect();
        jobs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        jobs
    }

    /// Mark a job as running
    pub fn set_running(&self, job_id: Uuid) {
        self.update(job_id, |p| p.status = JobStatus::Running);
    }

    /// Record the current build stage
    pub fn set_stage(&self, job_id: Uuid, stage: BuildStage) {
        self.update(job_id, |p| p.stage = stage);
    }

    /// Record a successful build
    pub fn complete(&self, job_id: Uuid, outcome: &BuildOutcome) {
        self.update(job_id, |p| {
            p.status = JobStatus::Complete;
            p.stage = BuildStage::Complete;
            p.engine_id = Some(outcome.engine.id);
            p.documents = outcome.documents;
            p.chunks = outcome.chunks;
            p.unprocessed = outcome.unprocessed.clone();
        });
    }

    /// Record a failed build
    pub fn fail(&self, job_id: Uuid, error: &Error) {
        self.update(job_id, |p| {
            p.status = JobStatus::Failed;
            p.stage = BuildStage::Failed;
            p.error = Some(error.to_string());
        });
    }

    fn update(&self, job_id: Uuid, apply: impl FnOnce(&mut JobProgress)) {
        if let Some(mut progress) = self.jobs.get_mut(&job_id) {
            apply(&mut progress);
            progress.updated_at = chrono::Utc::now();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::EngineType;
    use std::collections::HashMap;

    fn spec(name: &str) -> EngineSpec {
        EngineSpec {
            name: name.to_string(),
            engine_type: EngineType::VectorSearch,
            doc_url: Some("gs://corpus".into()),
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

    #[tokio::test]
    async fn submitted_job_is_visible_with_pending_status() {
        let (queue, mut receiver) = JobQueue::new(4);
        let job_id = queue.submit(spec("manuals")).await.unwrap();

        let progress = queue.get(job_id).unwrap();
        assert_eq!(progress.status, JobStatus::Pending);
        assert_eq!(progress.engine_name, "manuals");

        let job = receiver.recv().await.unwrap();
        assert_eq!(job.id, job_id);
    }

    #[tokio::test]
    async fn stage_updates_are_reflected() {
        let (queue, _receiver) = JobQueue::new(4);
        let job_id = queue.submit(spec("manuals")).await.unwrap();

        queue.set_running(job_id);
        queue.set_stage(job_id, BuildStage::Fetching);

        let progress = queue.get(job_id).unwrap();
        assert_eq!(progress.status, JobStatus::Running);
        assert_eq!(progress.stage, BuildStage::Fetching);
    }

    #[tokio::test]
    async fn failed_job_records_error() {
        let (queue, _receiver) = JobQueue::new(4);
        let job_id = queue.submit(spec("manuals")).await.unwrap();

        queue.fail(job_id, &Error::NoDocumentsIndexed("empty".into()));

        let progress = queue.get(job_id).unwrap();
        assert_eq!(progress.status, JobStatus::Failed);
        assert!(progress.error.unwrap().contains("empty"));
    }

    #[tokio::test]
    async fn listing_orders_newest_first() {
        let (queue, _receiver) = JobQueue::new(4);
        queue.submit(spec("first")).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        queue.submit(spec("second")).await.unwrap();

        let jobs = queue.list();
        assert_eq!(jobs.len(), 2);
        assert_eq!(jobs[0].engine_name, "second");
    }
}
