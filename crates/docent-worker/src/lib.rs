//! Asynchronous ingestion: a durable job table, a bounded queue and a pool of
//! workers that run each job at least once.

mod error;
mod handler;
mod job;
mod runner;
mod store;

pub use error::WorkerError;
pub use handler::{JobHandler, JobOutcome};
pub use job::{JobRecord, JobStatus, TaskId};
pub use runner::{RunnerConfig, TaskHandle, TaskRunner};
pub use store::{ClaimedJob, JobStore};
