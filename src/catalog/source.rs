//! Raw library metadata: the extractor's output that stores are reloaded from.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use crate::engine::item_hash;
use crate::{CatalogItem, ItemType, Track};

/// One extraction snapshot.
#[derive(Clone, Debug, Default)]
pub struct RawLibrary {
    pub tracks: Vec<Track>,
    pub albums: Vec<CatalogItem>,
    pub artists: Vec<CatalogItem>,
    pub folders: Vec<PathBuf>,
}

/// Produces raw library metadata (tag reading and file discovery live behind this).
pub trait LibrarySource: Send + Sync {
    /// Run extraction and return the resulting snapshot.
    fn extract(&self) -> Result<RawLibrary>;
}

/// Album or artist entry as written in the catalog file. `hash` is derived when absent.
#[derive(Debug, Deserialize)]
struct CatalogEntry {
    #[serde(default)]
    hash: Option<String>,
    name: String,
    /// Album artist; empty for artists.
    #[serde(default)]
    artist: String,
    #[serde(default)]
    date_added: i64,
}

#[derive(Debug, Default, Deserialize)]
struct CatalogFile {
    #[serde(default)]
    tracks: Vec<Track>,
    #[serde(default)]
    albums: Vec<CatalogEntry>,
    #[serde(default)]
    artists: Vec<CatalogEntry>,
    #[serde(default)]
    folders: Option<Vec<PathBuf>>,
}

impl CatalogEntry {
    fn into_item(self, kind: ItemType) -> CatalogItem {
        let hash = self.hash.unwrap_or_else(|| match kind {
            ItemType::Album => item_hash(&[&self.name, &self.artist]),
            ItemType::Artist => item_hash(&[&self.name]),
        });
        CatalogItem {
            kind,
            hash,
            name: self.name,
            date_added: self.date_added,
            color: None,
        }
    }
}

/// [`LibrarySource`] reading the JSON catalog written by the tag extractor.
pub struct JsonLibrarySource {
    path: PathBuf,
}

impl JsonLibrarySource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Parse catalog JSON text. Folders default to the distinct track folders.
pub fn parse_catalog(json: &str) -> Result<RawLibrary> {
    let file: CatalogFile = serde_json::from_str(json).context("parse catalog JSON")?;
    let folders = match file.folders {
        Some(f) => f,
        None => file
            .tracks
            .iter()
            .filter(|t| !t.folder.as_os_str().is_empty())
            .map(|t| t.folder.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect(),
    };
    Ok(RawLibrary {
        tracks: file.tracks,
        albums: file
            .albums
            .into_iter()
            .map(|e| e.into_item(ItemType::Album))
            .collect(),
        artists: file
            .artists
            .into_iter()
            .map(|e| e.into_item(ItemType::Artist))
            .collect(),
        folders,
    })
}

impl LibrarySource for JsonLibrarySource {
    fn extract(&self) -> Result<RawLibrary> {
        let json = std::fs::read_to_string(&self.path)
            .with_context(|| format!("read catalog {}", self.path.display()))?;
        parse_catalog(&json).with_context(|| format!("catalog {}", self.path.display()))
    }
}
