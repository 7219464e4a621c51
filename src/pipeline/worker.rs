//! Enrichment worker: one task in, one result out. Touches no store.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use crate::ItemType;
use crate::engine::{ColorExtractor, asset_path};
use crate::utils::config::EXTRACT_COLOR_COUNT;

/// Request crossing the worker boundary. Plain owned data; no reference into a store.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EnrichmentTask {
    pub hash: String,
    pub item_type: ItemType,
    /// Directory holding this item type's artwork.
    pub asset_dir: PathBuf,
}

impl EnrichmentTask {
    pub fn asset_path(&self) -> PathBuf {
        asset_path(&self.asset_dir, &self.hash)
    }
}

/// Why a task produced no color.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum EnrichError {
    #[error("image not found: {}", .0.display())]
    SourceNotFound(PathBuf),
    #[error("color extraction failed")]
    ExtractionFailed,
    #[error("{0}")]
    Worker(String),
    #[error("deadline of {0:?} exceeded")]
    DeadlineExceeded(Duration),
    #[error("cancelled")]
    Cancelled,
}

/// Outcome of one task: a `rgb(r, g, b)` color or the reason there is none.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EnrichmentResult {
    pub hash: String,
    pub outcome: Result<String, EnrichError>,
}

impl EnrichmentResult {
    pub fn color(&self) -> Option<&str> {
        self.outcome.as_deref().ok()
    }
}

/// Read-only state shared by every worker of a pool.
pub struct WorkerContext {
    pub extractor: Arc<dyn ColorExtractor>,
    /// Caller's cancel signal for the whole pass.
    pub cancel: Arc<AtomicBool>,
    /// Set by the pool when the orchestrator gives up (e.g. persistence failure).
    pub abort: Arc<AtomicBool>,
    pub deadline: Duration,
}

impl WorkerContext {
    pub fn new(
        extractor: Arc<dyn ColorExtractor>,
        cancel: Arc<AtomicBool>,
        deadline: Duration,
    ) -> Self {
        Self {
            extractor,
            cancel,
            abort: Arc::new(AtomicBool::new(false)),
            deadline,
        }
    }

    fn stopped(&self) -> bool {
        self.cancel.load(Ordering::Relaxed) || self.abort.load(Ordering::Relaxed)
    }
}

/// Resolve the artwork, extract colors, and format the first (hue-sorted) one.
pub fn extract_color(task: &EnrichmentTask, ctx: &WorkerContext) -> Result<String, EnrichError> {
    if ctx.stopped() {
        return Err(EnrichError::Cancelled);
    }
    let path = task.asset_path();
    if !path.is_file() {
        return Err(EnrichError::SourceNotFound(path));
    }

    let started = Instant::now();
    let should_stop = || ctx.stopped() || started.elapsed() > ctx.deadline;
    let extracted = ctx
        .extractor
        .extract(&path, EXTRACT_COLOR_COUNT, &should_stop);

    if ctx.stopped() {
        return Err(EnrichError::Cancelled);
    }
    if started.elapsed() > ctx.deadline {
        return Err(EnrichError::DeadlineExceeded(ctx.deadline));
    }
    match extracted {
        Ok(colors) => colors
            .first()
            .map(|c| c.to_css())
            .ok_or(EnrichError::ExtractionFailed),
        Err(e) => Err(EnrichError::Worker(format!("{e:#}"))),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("worker panicked: {s}")
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("worker panicked: {s}")
    } else {
        "worker panicked".to_string()
    }
}

/// Run one task. A panic inside extraction becomes [`EnrichError::Worker`] for this item only.
pub fn run_task(task: &EnrichmentTask, ctx: &WorkerContext) -> EnrichmentResult {
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| extract_color(task, ctx)))
        .unwrap_or_else(|payload| Err(EnrichError::Worker(panic_message(payload.as_ref()))));
    EnrichmentResult {
        hash: task.hash.clone(),
        outcome,
    }
}
