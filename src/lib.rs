//! chromadex: media-library catalog indexer with dominant color enrichment

pub mod catalog;
pub mod engine;
pub mod jobs;
pub mod pipeline;
pub mod types;
pub mod utils;

/// Re-export types for API
pub use types::*;

use log::debug;
use std::sync::Arc;

use catalog::{Catalog, JsonLibrarySource};
use engine::db_ops::{SqliteAttributeTable, open_db};
use jobs::{IndexJob, IndexSummary, shared_table};
use pipeline::PipelineOptions;

/// Result alias used by public chromadex API
pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, Error>;

/// Single entry point: rebuild the catalog described by `opts` on the calling thread and
/// return the populated stores with a summary.
///
/// Reads `opts.catalog_path`, opens (or creates) the attribute DB at `opts.db_path`
/// (default: next to the catalog), and extracts colors for albums and artists whose artwork
/// exists. Use [`jobs::JobRunner`] instead when several jobs share a catalog.
///
/// ```ignore
/// let opts = chromadex::Opts {
///     catalog_path: "library/catalog.json".into(),
///     ..Default::default()
/// };
/// let (catalog, summary) = chromadex::index_library(&opts)?;
/// println!("{} albums, {} new colors", catalog.albums.len(), summary.album_colors.persisted);
/// ```
pub fn index_library(opts: &Opts) -> Result<(Arc<Catalog>, IndexSummary)> {
    let config_str = format!(
        "{} CONFIG:{:#?}",
        env!("CARGO_PKG_NAME").to_string().to_uppercase(),
        opts
    );
    debug!("{}", config_str);

    let db_path = opts.db_path.clone().unwrap_or_else(|| {
        opts.library_dir()
            .join(utils::config::PackagePaths::get().db_filename())
    });
    let table = SqliteAttributeTable::new(open_db(&db_path)?);
    let catalog = Arc::new(Catalog::new());
    let job = IndexJob::new(
        Arc::clone(&catalog),
        Arc::new(JsonLibrarySource::new(opts.catalog_path.clone())),
        shared_table(table),
        opts.asset_paths(),
        PipelineOptions::from(opts),
    );
    let summary = job.run()?;
    Ok((catalog, summary))
}
