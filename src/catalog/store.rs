//! In-memory catalog stores: hash → item maps tagged with the epoch of their last reload.

use std::collections::{BTreeSet, HashMap};
use std::path::PathBuf;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::{CatalogItem, Epoch, Track};

/// Anything a [`Store`] can hold: must expose its stable hash.
pub trait StoreItem: Clone + Send + Sync {
    fn key(&self) -> &str;
}

impl StoreItem for CatalogItem {
    fn key(&self) -> &str {
        &self.hash
    }
}

impl StoreItem for Track {
    fn key(&self) -> &str {
        &self.hash
    }
}

struct StoreState<T> {
    epoch: Option<Epoch>,
    map: HashMap<String, T>,
}

/// Hash-keyed map behind an `RwLock`. Readers may run while a rebuild is in flight; every
/// mutation comes from the orchestrating job thread.
pub struct Store<T> {
    state: RwLock<StoreState<T>>,
}

impl<T: StoreItem> Default for Store<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: StoreItem> Store<T> {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(StoreState {
                epoch: None,
                map: HashMap::new(),
            }),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, StoreState<T>> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, StoreState<T>> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Replace the whole map and stamp it with `epoch`. Later items win on duplicate hashes.
    pub fn load(&self, items: impl IntoIterator<Item = T>, epoch: Epoch) {
        let map: HashMap<String, T> = items
            .into_iter()
            .map(|item| (item.key().to_string(), item))
            .collect();
        let mut state = self.write();
        state.map = map;
        state.epoch = Some(epoch);
    }

    /// Epoch of the last [`Store::load`], or None if never loaded.
    pub fn epoch(&self) -> Option<Epoch> {
        self.read().epoch
    }

    pub fn len(&self) -> usize {
        self.read().map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().map.is_empty()
    }

    pub fn get(&self, hash: &str) -> Option<T> {
        self.read().map.get(hash).cloned()
    }

    pub fn contains(&self, hash: &str) -> bool {
        self.read().map.contains_key(hash)
    }

    /// Snapshot of every item, ordered by hash.
    pub fn flat_list(&self) -> Vec<T> {
        let state = self.read();
        let mut items: Vec<T> = state.map.values().cloned().collect();
        items.sort_by(|a, b| a.key().cmp(b.key()));
        items
    }
}

impl Store<CatalogItem> {
    /// Set the derived color of one item. Returns false if the hash is not resident.
    pub fn set_color(&self, hash: &str, color: &str) -> bool {
        match self.write().map.get_mut(hash) {
            Some(item) => {
                item.set_color(color);
                true
            }
            None => false,
        }
    }

    /// Apply many colors under one write lock. Returns how many hashes were resident.
    pub fn set_colors<'a>(&self, colors: impl IntoIterator<Item = (&'a str, &'a str)>) -> usize {
        let mut state = self.write();
        let mut applied = 0;
        for (hash, color) in colors {
            if let Some(item) = state.map.get_mut(hash) {
                item.set_color(color);
                applied += 1;
            }
        }
        applied
    }
}

/// Folder paths of the library. Reloaded without an epoch.
#[derive(Default)]
pub struct FolderStore {
    folders: RwLock<BTreeSet<PathBuf>>,
}

impl FolderStore {
    pub fn load(&self, folders: impl IntoIterator<Item = PathBuf>) {
        let set: BTreeSet<PathBuf> = folders.into_iter().collect();
        *self.folders.write().unwrap_or_else(PoisonError::into_inner) = set;
    }

    pub fn len(&self) -> usize {
        self.folders
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, folder: &std::path::Path) -> bool {
        self.folders
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(folder)
    }
}
