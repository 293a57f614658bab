//! Owned registry of collections with legacy and custom persistence
//!
//! The legacy `collection.db` has this layout:
//! - u32: version
//! - u32: number of collections
//! - for each collection: name string, u32 map count, map hash strings
//!
//! The custom `collections.db` additionally stores a list of deleted hashes
//! before the map list of each collection.

use std::collections::HashSet;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::binary::{DbReader, DbWriter};
use crate::catalog::osu_db::DEFAULT_MAX_VERSION;
use crate::error::{Error, Result};
use crate::hash::Md5Hash;

use super::model::{normalize_name, Collection};

/// Current custom collection file version
pub const COLLECTIONS_DB_VERSION: u32 = 20240429;

/// First version storing deleted hashes
const DELETED_MAPS_VERSION: u32 = 20240429;

/// All collections, in creation order
#[derive(Debug, Default)]
pub struct CollectionRegistry {
    collections: Vec<Collection>,
    loaded: bool,
    missing_from_catalog: Option<usize>,
}

/// `collections.db` -> `collections.db.<version>`
fn backup_path(path: &Path, version: u32) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(format!(".{}", version));
    PathBuf::from(name)
}

impl CollectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a load completed. Saving is refused otherwise.
    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    /// Drop every collection and mark the registry unloaded
    pub fn unload(&mut self) {
        self.collections.clear();
        self.loaded = false;
        self.missing_from_catalog = None;
    }

    /// Entries not in the catalog, as counted by the last load that was
    /// given the catalog's hashes
    pub fn missing_from_catalog(&self) -> Option<usize> {
        self.missing_from_catalog
    }

    /// Number of collection entries whose beatmap is not in `known`
    pub fn count_missing(&self, known: &HashSet<Md5Hash>) -> usize {
        self.collections
            .iter()
            .flat_map(|c| c.maps.iter())
            .filter(|h| !known.contains(h))
            .count()
    }

    fn index_of(&self, name: &str) -> Option<usize> {
        self.collections.iter().position(|c| c.name == name)
    }

    /// Look up a collection by exact name, creating it if missing
    pub fn get_or_create(&mut self, name: &str) -> &mut Collection {
        let name = normalize_name(name);
        let index = match self.index_of(&name) {
            Some(index) => index,
            None => {
                self.collections.push(Collection::new(name));
                self.collections.len() - 1
            }
        };
        &mut self.collections[index]
    }

    pub fn find(&self, name: &str) -> Option<&Collection> {
        self.index_of(name).map(|i| &self.collections[i])
    }

    pub fn find_mut(&mut self, name: &str) -> Option<&mut Collection> {
        self.index_of(name).map(move |i| &mut self.collections[i])
    }

    pub fn add_map(&mut self, name: &str, hash: Md5Hash) {
        self.get_or_create(name).add_map(hash);
    }

    /// Returns false when the collection does not exist
    pub fn remove_map(&mut self, name: &str, hash: &Md5Hash) -> bool {
        match self.find_mut(name) {
            Some(collection) => {
                collection.remove_map(hash);
                true
            }
            None => false,
        }
    }

    /// Move every map of `old_name` into `new_name`.
    ///
    /// An existing collection called `new_name` receives the maps, so two
    /// collections merge silently. Returns false when `old_name` is unknown.
    pub fn rename(&mut self, old_name: &str, new_name: &str) -> bool {
        let Some(source) = self.index_of(old_name) else {
            return false;
        };

        let new_name = normalize_name(new_name);
        if new_name == old_name {
            return true;
        }

        self.get_or_create(&new_name);
        let Some(target) = self.index_of(&new_name) else {
            return false;
        };

        let maps = self.collections[source].maps.clone();
        for hash in maps {
            self.collections[source].remove_map(&hash);
            self.collections[target].add_map(hash);
        }
        true
    }

    /// Remove every map of a collection.
    ///
    /// The emptied collection stays registered so its deletion markers are
    /// saved and legacy maps stay hidden after the next legacy load.
    pub fn delete(&mut self, name: &str) -> bool {
        let Some(collection) = self.find_mut(name) else {
            return false;
        };

        let maps = collection.maps.clone();
        for hash in &maps {
            collection.remove_map(hash);
        }
        true
    }

    /// Collections that currently hold at least one map
    pub fn visible(&self) -> impl Iterator<Item = &Collection> {
        self.collections.iter().filter(|c| !c.is_empty())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Collection> {
        self.collections.iter()
    }

    pub fn len(&self) -> usize {
        self.collections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.collections.is_empty()
    }

    /// Load the legacy file and then the custom one, replacing any
    /// collections in memory.
    ///
    /// Returns false when the custom file is too new, in which case the
    /// registry is left empty and unloaded. `known` is used to report how
    /// many entries point at beatmaps missing from the catalog.
    pub fn load(
        &mut self,
        legacy: Option<&Path>,
        custom: Option<&Path>,
        known: Option<&HashSet<Md5Hash>>,
    ) -> bool {
        let start = Instant::now();
        self.unload();

        if let Some(path) = legacy {
            self.load_legacy(path);
        }

        if let Some(path) = custom {
            if !self.load_custom(path) {
                self.unload();
                return false;
            }
        }

        let legacy_count: usize = self.collections.iter().map(|c| c.legacy_maps.len()).sum();
        let custom_count: usize = self.collections.iter().map(|c| c.custom_maps.len()).sum();
        let total: usize = self.collections.iter().map(|c| c.maps.len()).sum();
        tracing::info!(
            "Loaded {} collections in {:?} ({} legacy, {} custom, {} maps total)",
            self.collections.len(),
            start.elapsed(),
            legacy_count,
            custom_count,
            total
        );

        if let Some(known) = known {
            let missing = self.count_missing(known);
            if missing > 0 {
                tracing::info!("{} collection entries are not in the catalog", missing);
            }
            self.missing_from_catalog = Some(missing);
        }

        self.loaded = true;
        true
    }

    fn load_legacy(&mut self, path: &Path) {
        let mut reader = DbReader::open(path);
        if reader.is_empty() {
            tracing::debug!("No legacy collections at {}", path.display());
            return;
        }

        let version = reader.read_u32();
        let count = reader.read_u32();
        if version > DEFAULT_MAX_VERSION {
            tracing::debug!(
                "collection.db version {} is newer than known, loading might fail",
                version
            );
        }

        for _ in 0..count {
            if reader.is_dead() {
                break;
            }

            let name = reader.read_string();
            let map_count = reader.read_u32();
            let collection = self.get_or_create(&name);
            for _ in 0..map_count {
                if reader.is_dead() {
                    break;
                }
                let hash = reader.read_hash();
                if !hash.is_empty() {
                    collection.maps.push(hash);
                    collection.legacy_maps.push(hash);
                }
            }
        }
    }

    fn load_custom(&mut self, path: &Path) -> bool {
        let mut reader = DbReader::open(path);
        if reader.is_empty() {
            tracing::debug!("No custom collections at {}", path.display());
            return true;
        }

        let version = reader.read_u32();
        let count = reader.read_u32();

        if version > COLLECTIONS_DB_VERSION {
            tracing::warn!(
                "{} version {} is newer than supported ({}), not loading collections",
                path.display(),
                version,
                COLLECTIONS_DB_VERSION
            );
            return false;
        }
        if version < COLLECTIONS_DB_VERSION {
            let backup = backup_path(path, version);
            if let Err(e) = fs::copy(path, &backup) {
                tracing::warn!("Failed to back up {}: {}", path.display(), e);
            }
        }

        for _ in 0..count {
            if reader.is_dead() {
                break;
            }

            let name = reader.read_string();
            let collection = self.get_or_create(&name);

            let deleted_count = if version >= DELETED_MAPS_VERSION {
                reader.read_u32()
            } else {
                0
            };
            for _ in 0..deleted_count {
                if reader.is_dead() {
                    break;
                }
                let hash = reader.read_hash();
                if let Some(index) = collection.maps.iter().position(|h| *h == hash) {
                    collection.maps.remove(index);
                }
                collection.deleted_maps.push(hash);
            }

            let map_count = reader.read_u32();
            for _ in 0..map_count {
                if reader.is_dead() {
                    break;
                }
                let hash = reader.read_hash();
                if !collection.maps.contains(&hash) {
                    collection.maps.push(hash);
                }
                collection.custom_maps.push(hash);
            }
        }
        true
    }

    /// Write the custom collection file
    pub fn save(&self, path: &Path) -> Result<()> {
        if !self.loaded {
            tracing::warn!("Collections were not loaded, refusing to save them");
            return Err(Error::NotLoaded("Collections"));
        }

        let start = Instant::now();
        let mut writer = DbWriter::create(path);
        writer.write_u32(COLLECTIONS_DB_VERSION);
        writer.write_u32(self.collections.len() as u32);
        for collection in &self.collections {
            writer.write_string(&collection.name);
            writer.write_u32(collection.deleted_maps.len() as u32);
            for hash in &collection.deleted_maps {
                writer.write_hash(hash);
            }
            writer.write_u32(collection.custom_maps.len() as u32);
            for hash in &collection.custom_maps {
                writer.write_hash(hash);
            }
        }
        writer.finish()?;

        tracing::info!(
            "Saved {} collections to {} in {:?}",
            self.collections.len(),
            path.display(),
            start.elapsed()
        );
        Ok(())
    }
}
