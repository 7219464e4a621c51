//! CLI command handler: assemble options, then run one index job through the runner.

use anyhow::{Context, Result, anyhow};
use log::debug;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::Opts;
use crate::catalog::{Catalog, JsonLibrarySource};
use crate::engine::arg_parser::Cli;
use crate::engine::db_ops::{SqliteAttributeTable, open_db};
use crate::jobs::{IndexJob, Job, JobRunner, shared_table};
use crate::pipeline::PipelineOptions;
use crate::utils::config::PackagePaths;
use crate::utils::{apply_file_to_opts, load_chromadex_toml, setup_logging};

/// Database path from `CHROMADEX_DB`, loading `.env` in `library_dir` first.
fn db_path_from_env(library_dir: &std::path::Path) -> Option<std::path::PathBuf> {
    let env_path = library_dir.join(".env");
    if env_path.is_file() {
        let _ = dotenvy::from_path(&env_path);
    }
    std::env::var(PackagePaths::get().env_key_db())
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .map(std::path::PathBuf::from)
}

/// Defaults → config file → environment → CLI flags.
pub fn setup_opts(cli: &Cli) -> Opts {
    let library_dir = cli.library_dir();
    let mut opts = Opts {
        catalog_path: cli.catalog.clone(),
        ..Default::default()
    };
    if let Some(file) = load_chromadex_toml(&library_dir) {
        apply_file_to_opts(&file, &library_dir, &mut opts);
    }
    if let Some(p) = db_path_from_env(&library_dir) {
        opts.db_path = Some(p);
    }

    if let Some(ref p) = cli.db {
        opts.db_path = Some(p.clone());
    }
    if let Some(ref p) = cli.thumbs {
        opts.thumbs_dir = Some(p.clone());
    }
    if let Some(ref p) = cli.artist_images {
        opts.artist_images_dir = Some(p.clone());
    }
    if cli.max_jobs.is_some() {
        opts.max_jobs = cli.max_jobs;
    }
    if cli.workers.is_some() {
        opts.workers = cli.workers;
    }
    if let Some(secs) = cli.task_timeout {
        opts.task_deadline = std::time::Duration::from_secs(secs);
    }
    if let Some(v) = cli.verbose {
        opts.verbose = v;
    }
    if opts.db_path.is_none() {
        opts.db_path = Some(cli.default_db_path());
    }
    opts
}

/// Rebuild the catalog described by `cli` and enrich it. Ctrl+C stops extraction early;
/// batches already flushed stay in the database.
pub fn handle_run(cli: &Cli) -> Result<()> {
    setup_logging(cli.verbose.unwrap_or(false));
    let opts = setup_opts(cli);
    debug!(
        "{} CONFIG:{:#?}",
        PackagePaths::get().pkg_name().to_uppercase(),
        opts
    );

    let cancel_requested = Arc::new(AtomicBool::new(false));
    let cancel_requested_handler = Arc::clone(&cancel_requested);
    ctrlc::set_handler(move || {
        cancel_requested_handler.store(true, Ordering::Relaxed);
    })
    .context("set Ctrl+C handler")?;

    let db_path = opts
        .db_path
        .clone()
        .unwrap_or_else(|| cli.default_db_path());
    let table = SqliteAttributeTable::new(
        open_db(&db_path).with_context(|| format!("open {}", db_path.display()))?,
    );

    let mut options = PipelineOptions::from(&opts);
    options.cancel = Arc::clone(&cancel_requested);

    let job = IndexJob::new(
        Arc::new(Catalog::new()),
        Arc::new(JsonLibrarySource::new(opts.catalog_path.clone())),
        shared_table(table),
        opts.asset_paths(),
        options,
    );
    JobRunner::new(opts.max_jobs).run(Job::Index(job))?;

    if cancel_requested.load(Ordering::Relaxed) {
        return Err(anyhow!(
            "Indexing cancelled by user; completed batches were flushed"
        ));
    }
    Ok(())
}
