use clap::Parser;
use std::path::PathBuf;

use crate::utils::config::PackagePaths;

struct DefaultArgs;

impl DefaultArgs {
    pub const CATALOG: &'static str = "catalog.json";
}

/// Rebuild a media-library catalog and derive dominant artwork colors.
#[derive(Clone, Debug, Parser)]
#[command(name = "chromadex")]
#[command(about = "Reload the catalog and extract album/artist colors into the attribute DB.")]
pub struct Cli {
    /// Catalog JSON written by the metadata extractor. Default: ./catalog.json.
    #[arg(value_name = "CATALOG", default_value = DefaultArgs::CATALOG)]
    pub catalog: PathBuf,

    /// Attribute database. Default: `chromadex.db` next to the catalog (or CHROMADEX_DB).
    #[arg(long, short)]
    pub db: Option<PathBuf>,

    /// Album thumbnail directory. Default: `images/thumbnails` next to the catalog.
    #[arg(long)]
    pub thumbs: Option<PathBuf>,

    /// Artist image directory. Default: `images/artists` next to the catalog.
    #[arg(long)]
    pub artist_images: Option<PathBuf>,

    /// Maximum number of jobs allowed to run at once.
    #[arg(long, short = 'j')]
    pub max_jobs: Option<usize>,

    /// Color extraction worker threads. Default: half the available threads.
    #[arg(long, short = 'w')]
    pub workers: Option<usize>,

    /// Per-image extraction deadline in seconds.
    #[arg(long, short = 't')]
    pub task_timeout: Option<u64>,

    /// Verbose output (debug logs and progress bars).
    #[arg(
        long,
        short = 'v',
        num_args = 0..=1,
        default_missing_value = "true",
        value_parser = clap::value_parser!(bool)
    )]
    pub verbose: Option<bool>,
}

impl Cli {
    /// Directory holding the catalog (config file and default asset dirs live here).
    pub fn library_dir(&self) -> PathBuf {
        self.catalog
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(|p| p.to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."))
    }

    /// Default database path when neither CLI, env, nor config file set one.
    pub fn default_db_path(&self) -> PathBuf {
        self.library_dir().join(PackagePaths::get().db_filename())
    }
}
