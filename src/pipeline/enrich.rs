//! Enrichment pass for one item type: select items lacking a color, extract on the pool,
//! flush results in batches to the attribute table, then to the in-memory store.

use anyhow::{Context, Result};
use log::{debug, error, warn};
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use crate::catalog::Store;
use crate::engine::db_ops::AttributeTable;
use crate::engine::progress::{enrichment_bar, update_progress_bar};
use crate::engine::{ColorExtractor, ImageColorExtractor};
use crate::utils::config::{ENRICH_BATCH_SIZE, EnrichConsts, WorkerThreadLimits};
use crate::{AttributeRecord, CatalogItem, ItemType, Opts};

use super::pool::WorkerPool;
use super::worker::{EnrichError, EnrichmentTask, WorkerContext};

/// Tuning and collaborators for an enrichment pass.
#[derive(Clone)]
pub struct PipelineOptions {
    /// Worker threads. Defaults to half the available threads, at least one.
    pub workers: usize,
    /// Successful results per flush.
    pub batch_size: usize,
    /// Deadline for a single extraction.
    pub task_deadline: Duration,
    /// Extra attempts for a failed flush.
    pub flush_retries: u32,
    /// Wait before the first retry; doubles each time.
    pub retry_backoff: Duration,
    /// Show a kdam bar for the pass.
    pub show_progress: bool,
    /// Cooperative cancel for the whole pass.
    pub cancel: Arc<AtomicBool>,
    pub extractor: Arc<dyn ColorExtractor>,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            workers: WorkerThreadLimits::current().enrichment_workers(),
            batch_size: ENRICH_BATCH_SIZE,
            task_deadline: EnrichConsts::TASK_DEADLINE,
            flush_retries: EnrichConsts::FLUSH_RETRIES,
            retry_backoff: EnrichConsts::RETRY_BACKOFF,
            show_progress: false,
            cancel: Arc::new(AtomicBool::new(false)),
            extractor: Arc::new(ImageColorExtractor),
        }
    }
}

impl From<&Opts> for PipelineOptions {
    fn from(o: &Opts) -> Self {
        let defaults = PipelineOptions::default();
        PipelineOptions {
            workers: o.workers.map(|n| n.max(1)).unwrap_or(defaults.workers),
            task_deadline: o.task_deadline,
            flush_retries: o.flush_retries,
            show_progress: o.verbose,
            ..defaults
        }
    }
}

/// What one pass did. Durable and in-memory side effects are the real output.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EnrichmentReport {
    pub item_type: Option<ItemType>,
    /// Items dispatched to workers.
    pub selected: usize,
    /// Colors written to the table and the store.
    pub persisted: usize,
    pub not_found: usize,
    pub extraction_failed: usize,
    /// Panics, extractor faults and missed deadlines.
    pub worker_errors: usize,
    pub cancelled_tasks: usize,
    /// Size of each flush, in order.
    pub flushes: Vec<usize>,
    pub cancelled: bool,
}

/// Derives and persists the dominant color for one item type.
pub struct EnrichmentPipeline<'a> {
    item_type: ItemType,
    store: &'a Store<CatalogItem>,
    asset_dir: PathBuf,
    options: PipelineOptions,
}

impl<'a> EnrichmentPipeline<'a> {
    pub fn new(
        item_type: ItemType,
        store: &'a Store<CatalogItem>,
        asset_dir: impl Into<PathBuf>,
        options: PipelineOptions,
    ) -> Self {
        Self {
            item_type,
            store,
            asset_dir: asset_dir.into(),
            options,
        }
    }

    pub fn item_type(&self) -> ItemType {
        self.item_type
    }

    /// Hashes whose color is already durable. These are never recomputed.
    fn exclusion_set(&self, table: &dyn AttributeTable) -> Result<HashSet<String>> {
        let records = table
            .all_records(self.item_type)
            .with_context(|| format!("read durable {} colors", self.item_type))?;
        Ok(records
            .into_iter()
            .filter(|r| r.color.is_some())
            .map(|r| r.hash)
            .collect())
    }

    /// Items with no color in memory and none in the table.
    fn items_needing_colors<'s>(
        &'s self,
        items: Vec<CatalogItem>,
        excluded: &'s HashSet<String>,
    ) -> impl Iterator<Item = EnrichmentTask> + 's {
        items
            .into_iter()
            .filter(|item| item.color.is_none())
            .filter(move |item| !excluded.contains(&item.hash))
            .map(move |item| EnrichmentTask {
                hash: item.hash,
                item_type: self.item_type,
                asset_dir: self.asset_dir.clone(),
            })
    }

    /// Run the pass. Per-item failures are logged and skipped; only a persistence failure
    /// (after retries) is returned as an error, with earlier flushes left in place.
    pub fn run(&self, table: &mut dyn AttributeTable) -> Result<EnrichmentReport> {
        let mut report = EnrichmentReport {
            item_type: Some(self.item_type),
            ..Default::default()
        };

        let excluded = self.exclusion_set(table)?;
        let work: Vec<EnrichmentTask> = self
            .items_needing_colors(self.store.flat_list(), &excluded)
            .collect();
        report.selected = work.len();
        if work.is_empty() {
            debug!("No {} needs a color", self.item_type);
            return Ok(report);
        }

        let total = work.len();
        let ctx = WorkerContext::new(
            Arc::clone(&self.options.extractor),
            Arc::clone(&self.options.cancel),
            self.options.task_deadline,
        );
        let mut pool = WorkerPool::spawn(self.options.workers, ctx)?;
        debug!(
            "Extracting {} {} colors on {} workers",
            total,
            self.item_type,
            pool.size()
        );
        for task in work {
            pool.submit(task)?;
        }
        pool.close();

        let bar = enrichment_bar(self.options.show_progress, self.item_type.as_str(), total);
        let batch_size = self.options.batch_size.max(1);
        let mut batch: Vec<(String, String)> = Vec::with_capacity(batch_size);
        let mut processed = 0_usize;
        let mut flush_error = None;

        while processed < total {
            let Some(result) = pool.recv() else {
                break;
            };
            processed += 1;
            if let Some(ref bar) = bar {
                update_progress_bar(bar, 1);
            }

            match result.outcome {
                Ok(color) => batch.push((result.hash, color)),
                Err(EnrichError::SourceNotFound(path)) => {
                    report.not_found += 1;
                    debug!(
                        "{} {}: no image at {}",
                        self.item_type,
                        result.hash,
                        path.display()
                    );
                }
                Err(EnrichError::ExtractionFailed) => {
                    report.extraction_failed += 1;
                    debug!("{} {}: color extraction failed", self.item_type, result.hash);
                }
                Err(EnrichError::Cancelled) => report.cancelled_tasks += 1,
                Err(e) => {
                    report.worker_errors += 1;
                    error!(
                        "Error processing {} {}={}: {}",
                        self.item_type,
                        self.item_type.hash_field(),
                        result.hash,
                        e
                    );
                }
            }

            if batch.len() >= batch_size || (processed == total && !batch.is_empty()) {
                match self.flush_with_retry(table, &batch) {
                    Ok(()) => {
                        report.flushes.push(batch.len());
                        report.persisted += batch.len();
                        batch.clear();
                    }
                    Err(e) => {
                        flush_error = Some(e);
                        break;
                    }
                }
            }
        }

        if flush_error.is_some() {
            pool.abort();
        } else if !batch.is_empty() {
            // Workers vanished before every result arrived; keep what was computed.
            warn!(
                "{} of {} {} results never arrived",
                total - processed,
                total,
                self.item_type
            );
            match self.flush_with_retry(table, &batch) {
                Ok(()) => {
                    report.flushes.push(batch.len());
                    report.persisted += batch.len();
                }
                Err(e) => flush_error = Some(e),
            }
        }
        pool.shutdown()?;

        if let Some(e) = flush_error {
            return Err(e);
        }
        report.cancelled = self.options.cancel.load(Ordering::Relaxed);
        debug!(
            "{} colors: {} persisted in {} flushes, {} without image, {} failed, {} errors",
            self.item_type,
            report.persisted,
            report.flushes.len(),
            report.not_found,
            report.extraction_failed,
            report.worker_errors
        );
        Ok(report)
    }

    /// Flush, retrying with doubling backoff. A retry after a partial write is safe: rows
    /// inserted by the failed attempt are found and updated instead.
    fn flush_with_retry(
        &self,
        table: &mut dyn AttributeTable,
        batch: &[(String, String)],
    ) -> Result<()> {
        let mut backoff = self.options.retry_backoff;
        let mut attempt = 0;
        loop {
            match self.flush_batch(table, batch) {
                Ok(()) => return Ok(()),
                Err(e) if attempt < self.options.flush_retries => {
                    attempt += 1;
                    warn!(
                        "Flushing {} {} colors failed (attempt {}): {:#}",
                        batch.len(),
                        self.item_type,
                        attempt,
                        e
                    );
                    thread::sleep(backoff);
                    backoff = backoff.saturating_mul(2);
                }
                Err(e) => {
                    return Err(e).with_context(|| {
                        format!("persist batch of {} {} colors", batch.len(), self.item_type)
                    });
                }
            }
        }
    }

    /// Write one batch: new rows in one bulk insert, existing rows updated one by one.
    /// The store is touched only after every durable write succeeded.
    fn flush_batch(
        &self,
        table: &mut dyn AttributeTable,
        batch: &[(String, String)],
    ) -> Result<()> {
        let mut inserts = Vec::new();
        let mut updates = Vec::new();
        for (hash, color) in batch {
            match table.find_one(hash, self.item_type)? {
                None => inserts.push(AttributeRecord {
                    item_type: self.item_type,
                    hash: hash.clone(),
                    color: Some(color.clone()),
                }),
                Some(_) => updates.push((hash, color)),
            }
        }

        table.insert_many(&inserts)?;
        for (hash, color) in updates {
            table.update_one(hash, self.item_type, color)?;
        }

        let applied = self
            .store
            .set_colors(batch.iter().map(|(h, c)| (h.as_str(), c.as_str())));
        if applied < batch.len() {
            debug!(
                "{} {} items left the store before their color was applied",
                batch.len() - applied,
                self.item_type
            );
        }
        Ok(())
    }
}

/// Copy durable colors into resident items (after a reload every item starts without one).
/// Returns how many were applied.
pub fn hydrate_store(
    table: &dyn AttributeTable,
    store: &Store<CatalogItem>,
    item_type: ItemType,
) -> Result<usize> {
    let records = table
        .all_records(item_type)
        .with_context(|| format!("read durable {item_type} colors"))?;
    let applied = store.set_colors(
        records
            .iter()
            .filter_map(|r| r.color.as_deref().map(|c| (r.hash.as_str(), c))),
    );
    Ok(applied)
}
