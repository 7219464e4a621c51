//! Index job: full catalog rebuild followed by color enrichment.

use anyhow::{Context, Result};
use log::{debug, info, warn};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::catalog::{Catalog, LibrarySource};
use crate::engine::db_ops::AttributeTable;
use crate::pipeline::{EnrichmentPipeline, EnrichmentReport, PipelineOptions, hydrate_store};
use crate::utils::config::RECENTLY_ADDED_LIMIT;
use crate::{AssetPaths, Epoch, ItemType};

/// Attribute table shared between jobs. Only one job writes at a time.
pub type SharedTable = Arc<Mutex<dyn AttributeTable + Send>>;

/// Wrap a table for use by jobs.
pub fn shared_table<T: AttributeTable + Send + 'static>(table: T) -> SharedTable {
    Arc::new(Mutex::new(table))
}

fn lock_table(table: &SharedTable) -> MutexGuard<'_, dyn AttributeTable + Send + 'static> {
    table.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Post-rebuild pass over the catalog (scrobble counts, favorites, ...). Failures are logged
/// and do not abort the rebuild.
pub trait MappingPass: Send + Sync {
    fn name(&self) -> &str;
    fn run(&self, catalog: &Catalog) -> Result<()>;
}

/// Outcome of one rebuild.
#[derive(Clone, Debug, Default)]
pub struct IndexSummary {
    pub epoch: Option<Epoch>,
    pub tracks: usize,
    pub albums: usize,
    pub artists: usize,
    pub folders: usize,
    /// Items whose color was restored from the attribute table.
    pub hydrated: usize,
    pub recently_added: usize,
    pub album_colors: EnrichmentReport,
    pub artist_colors: EnrichmentReport,
    /// Names of mapping passes that failed.
    pub failed_passes: Vec<String>,
}

/// Full rebuild of the catalog.
pub struct IndexJob {
    catalog: Arc<Catalog>,
    source: Arc<dyn LibrarySource>,
    table: SharedTable,
    assets: AssetPaths,
    options: PipelineOptions,
    mapping_passes: Vec<Arc<dyn MappingPass>>,
}

impl IndexJob {
    pub fn new(
        catalog: Arc<Catalog>,
        source: Arc<dyn LibrarySource>,
        table: SharedTable,
        assets: AssetPaths,
        options: PipelineOptions,
    ) -> Self {
        Self {
            catalog,
            source,
            table,
            assets,
            options,
            mapping_passes: Vec::new(),
        }
    }

    /// Add a pass to run after enrichment.
    pub fn with_mapping_pass(mut self, pass: Arc<dyn MappingPass>) -> Self {
        self.mapping_passes.push(pass);
        self
    }

    /// Reload every store under a fresh epoch, restore durable colors, rebuild the
    /// recently-added view, enrich albums then artists, then run mapping passes.
    ///
    /// Readers may see stores from different epochs while this runs.
    pub fn run(&self) -> Result<IndexSummary> {
        let raw = self
            .source
            .extract()
            .context("extract library metadata")?;

        let epoch = Epoch::next();
        let catalog = &self.catalog;
        catalog.tracks.load(raw.tracks, epoch);
        catalog.albums.load(raw.albums, epoch);
        catalog.artists.load(raw.artists, epoch);
        catalog.folders.load(raw.folders);

        let mut summary = IndexSummary {
            epoch: Some(epoch),
            tracks: catalog.tracks.len(),
            albums: catalog.albums.len(),
            artists: catalog.artists.len(),
            folders: catalog.folders.len(),
            ..Default::default()
        };
        debug!(
            "Loaded epoch {}: {} tracks, {} albums, {} artists, {} folders",
            epoch, summary.tracks, summary.albums, summary.artists, summary.folders
        );

        {
            let mut table = lock_table(&self.table);
            for item_type in [ItemType::Album, ItemType::Artist] {
                summary.hydrated += hydrate_store(&*table, catalog.store(item_type), item_type)?;
            }

            summary.recently_added = catalog.rebuild_recently_added(RECENTLY_ADDED_LIMIT);

            summary.album_colors = EnrichmentPipeline::new(
                ItemType::Album,
                &catalog.albums,
                self.assets.dir_for(ItemType::Album),
                self.options.clone(),
            )
            .run(&mut *table)?;
            summary.artist_colors = EnrichmentPipeline::new(
                ItemType::Artist,
                &catalog.artists,
                self.assets.dir_for(ItemType::Artist),
                self.options.clone(),
            )
            .run(&mut *table)?;
        }

        for pass in &self.mapping_passes {
            if let Err(e) = pass.run(catalog) {
                warn!("Mapping pass {} failed: {:#}", pass.name(), e);
                summary.failed_passes.push(pass.name().to_string());
            }
        }

        info!(
            "Indexing completed (epoch {}): {} album and {} artist colors added",
            epoch, summary.album_colors.persisted, summary.artist_colors.persisted
        );
        Ok(summary)
    }
}

/// Enrichment for one item type against the stores as they are.
pub struct EnrichJob {
    catalog: Arc<Catalog>,
    table: SharedTable,
    item_type: ItemType,
    asset_dir: PathBuf,
    options: PipelineOptions,
}

impl EnrichJob {
    pub fn new(
        catalog: Arc<Catalog>,
        table: SharedTable,
        item_type: ItemType,
        asset_dir: impl Into<PathBuf>,
        options: PipelineOptions,
    ) -> Self {
        Self {
            catalog,
            table,
            item_type,
            asset_dir: asset_dir.into(),
            options,
        }
    }

    pub fn run(&self) -> Result<EnrichmentReport> {
        let mut table = lock_table(&self.table);
        EnrichmentPipeline::new(
            self.item_type,
            self.catalog.store(self.item_type),
            self.asset_dir.clone(),
            self.options.clone(),
        )
        .run(&mut *table)
    }
}

/// Rebuild of the recently-added view only. Reads the album store; safe alongside readers.
pub struct RecentsJob {
    catalog: Arc<Catalog>,
    limit: usize,
}

impl RecentsJob {
    pub fn new(catalog: Arc<Catalog>) -> Self {
        Self {
            catalog,
            limit: RECENTLY_ADDED_LIMIT,
        }
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    pub fn run(&self) -> usize {
        let n = self.catalog.rebuild_recently_added(self.limit);
        debug!("Recently added view rebuilt with {} albums", n);
        n
    }
}
