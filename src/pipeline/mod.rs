//! Enrichment pipeline: worker contract, bounded pool, batched persistence.

pub mod enrich;
pub mod pool;
pub mod worker;

pub use enrich::{EnrichmentPipeline, EnrichmentReport, PipelineOptions, hydrate_store};
pub use pool::{PoolStats, WorkerPool};
pub use worker::{
    EnrichError, EnrichmentResult, EnrichmentTask, WorkerContext, extract_color, run_task,
};
