//! Background jobs: a closed set of job variants and the runner that executes them.

pub mod index;
pub mod runner;

pub use index::{
    EnrichJob, IndexJob, IndexSummary, MappingPass, RecentsJob, SharedTable, shared_table,
};
pub use runner::{JobHandle, JobRunner};

/// Lifecycle of a launched job.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum JobState {
    NotStarted,
    Running,
    Completed,
    Failed,
}

/// Why a job did not complete.
#[derive(Debug, thiserror::Error)]
pub enum JobExecutionError {
    #[error("job runner at capacity ({limit} running)")]
    AtCapacity { limit: usize },
    #[error("{job} job failed: {source:#}")]
    Failed {
        job: &'static str,
        source: anyhow::Error,
    },
    #[error("{job} job panicked")]
    Panicked { job: &'static str },
}

/// Work the runner can execute.
pub enum Job {
    /// Full rebuild: reload stores under a fresh epoch, then enrich albums and artists.
    Index(IndexJob),
    /// Enrichment pass for one item type without reloading.
    Enrich(EnrichJob),
    /// Rebuild the recently-added view from the album store.
    Recents(RecentsJob),
}

impl Job {
    pub fn name(&self) -> &'static str {
        match self {
            Job::Index(_) => "index",
            Job::Enrich(_) => "enrich",
            Job::Recents(_) => "recents",
        }
    }

    /// False when the job mutates shared catalog state and must not overlap any other job.
    pub fn independent(&self) -> bool {
        match self {
            Job::Index(_) | Job::Enrich(_) => false,
            Job::Recents(_) => true,
        }
    }

    /// Perform the job's work on the calling thread.
    pub fn start(&self) -> Result<(), JobExecutionError> {
        let outcome = match self {
            Job::Index(job) => job.run().map(|_| ()),
            Job::Enrich(job) => job.run().map(|_| ()),
            Job::Recents(job) => {
                job.run();
                Ok(())
            }
        };
        outcome.map_err(|source| JobExecutionError::Failed {
            job: self.name(),
            source,
        })
    }
}
