//! In-memory catalog: track, album, artist and folder stores plus derived views.

pub mod source;
pub mod store;

pub use source::{JsonLibrarySource, LibrarySource, RawLibrary, parse_catalog};
pub use store::{FolderStore, Store, StoreItem};

use std::sync::{PoisonError, RwLock};

use crate::{CatalogItem, ItemType, Track};

/// All stores of one library. Shared between jobs and readers as `Arc<Catalog>`.
#[derive(Default)]
pub struct Catalog {
    pub tracks: Store<Track>,
    pub albums: Store<CatalogItem>,
    pub artists: Store<CatalogItem>,
    pub folders: FolderStore,
    recently_added: RwLock<Vec<String>>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store holding items of `item_type`.
    pub fn store(&self, item_type: ItemType) -> &Store<CatalogItem> {
        match item_type {
            ItemType::Album => &self.albums,
            ItemType::Artist => &self.artists,
        }
    }

    /// Album hashes, newest first.
    pub fn recently_added(&self) -> Vec<String> {
        self.recently_added
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Rebuild the recently-added view from the album store: newest `date_added` first,
    /// ties by hash, at most `limit` entries. Returns the view length.
    pub fn rebuild_recently_added(&self, limit: usize) -> usize {
        let mut albums = self.albums.flat_list();
        albums.sort_by(|a, b| {
            b.date_added
                .cmp(&a.date_added)
                .then_with(|| a.hash.cmp(&b.hash))
        });
        let view: Vec<String> = albums.into_iter().take(limit).map(|a| a.hash).collect();
        let n = view.len();
        *self
            .recently_added
            .write()
            .unwrap_or_else(PoisonError::into_inner) = view;
        n
    }
}
