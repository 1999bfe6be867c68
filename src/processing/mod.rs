//! Background processing of engine builds

pub mod job_queue;
pub mod worker;

pub use job_queue::{BuildJob, JobProgress, JobQueue, JobStatus};
pub use worker::BuildWorker;
