//! Public and internal types for the chromadex API and pipeline.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use crate::utils::config::EnrichConsts;

/// Kind of catalog item that carries a derived color.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemType {
    Album,
    Artist,
}

impl ItemType {
    /// Tag stored in the `itemtype` column.
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemType::Album => "album",
            ItemType::Artist => "artist",
        }
    }

    /// Name of the identity field, used in log lines (`albumhash`, `artisthash`).
    pub fn hash_field(&self) -> &'static str {
        match self {
            ItemType::Album => "albumhash",
            ItemType::Artist => "artisthash",
        }
    }
}

impl fmt::Display for ItemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

static NEXT_EPOCH: AtomicU64 = AtomicU64::new(1);

/// Generation id stamped on one store reload. Strictly increasing within the process.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Epoch(u64);

impl Epoch {
    /// Take the next epoch. Two calls never return the same value.
    pub fn next() -> Self {
        Epoch(NEXT_EPOCH.fetch_add(1, Ordering::Relaxed))
    }

    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for Epoch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// An album or artist held by a catalog store.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CatalogItem {
    pub kind: ItemType,
    pub hash: String,
    pub name: String,
    /// Seconds since epoch when the item first appeared in the library.
    #[serde(default)]
    pub date_added: i64,
    /// Derived dominant color, `rgb(r, g, b)`.
    #[serde(default)]
    pub color: Option<String>,
}

impl CatalogItem {
    pub fn new(kind: ItemType, hash: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            kind,
            hash: hash.into(),
            name: name.into(),
            date_added: 0,
            color: None,
        }
    }

    pub fn set_color(&mut self, color: impl Into<String>) {
        self.color = Some(color.into());
    }
}

/// A track in the catalog. Only reloaded; never enriched.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Track {
    pub hash: String,
    pub title: String,
    #[serde(default)]
    pub album_hash: String,
    #[serde(default)]
    pub artist_hashes: Vec<String>,
    /// Folder containing the audio file.
    #[serde(default)]
    pub folder: PathBuf,
    #[serde(default)]
    pub date_added: i64,
}

/// Row of the durable attribute table.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AttributeRecord {
    pub item_type: ItemType,
    pub hash: String,
    pub color: Option<String>,
}

/// Per-type artwork directories. Asset file = `<dir>/<hash><IMAGE_EXTENSION>`.
#[derive(Clone, Debug, Default)]
pub struct AssetPaths {
    pub album_dir: PathBuf,
    pub artist_dir: PathBuf,
}

impl AssetPaths {
    /// Default layout under a library directory: `images/thumbnails` and `images/artists`.
    pub fn under(library_dir: &Path) -> Self {
        let images = library_dir.join("images");
        Self {
            album_dir: images.join("thumbnails"),
            artist_dir: images.join("artists"),
        }
    }

    pub fn dir_for(&self, item_type: ItemType) -> &Path {
        match item_type {
            ItemType::Album => &self.album_dir,
            ItemType::Artist => &self.artist_dir,
        }
    }
}

/// Full options (CLI and config file).
#[derive(Clone, Debug)]
pub struct Opts {
    /// Catalog JSON produced by the metadata extractor.
    pub catalog_path: PathBuf,
    /// Attribute database. When None, `<catalog dir>/<package db filename>`.
    pub db_path: Option<PathBuf>,
    /// Album thumbnail directory override.
    pub thumbs_dir: Option<PathBuf>,
    /// Artist image directory override.
    pub artist_images_dir: Option<PathBuf>,
    /// Ceiling on concurrently running jobs. None = unbounded.
    pub max_jobs: Option<usize>,
    /// Enrichment worker count. When None, half the available threads.
    pub workers: Option<usize>,
    /// Deadline for a single color extraction.
    pub task_deadline: Duration,
    /// Extra flush attempts before a persistence error fails the job.
    pub flush_retries: u32,
    /// Debug logging and progress bars.
    pub verbose: bool,
}

impl Default for Opts {
    fn default() -> Self {
        Self {
            catalog_path: PathBuf::from("catalog.json"),
            db_path: None,
            thumbs_dir: None,
            artist_images_dir: None,
            max_jobs: None,
            workers: None,
            task_deadline: EnrichConsts::TASK_DEADLINE,
            flush_retries: EnrichConsts::FLUSH_RETRIES,
            verbose: false,
        }
    }
}

impl Opts {
    /// Directory containing the catalog file.
    pub fn library_dir(&self) -> PathBuf {
        self.catalog_path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."))
    }

    /// Artwork directories with overrides applied.
    pub fn asset_paths(&self) -> AssetPaths {
        let mut paths = AssetPaths::under(&self.library_dir());
        if let Some(ref d) = self.thumbs_dir {
            paths.album_dir = d.clone();
        }
        if let Some(ref d) = self.artist_images_dir {
            paths.artist_dir = d.clone();
        }
        paths
    }
}
