//! Data model for beatmap collections

use serde::{Deserialize, Serialize};

use crate::hash::Md5Hash;

/// Name used when a collection is given an empty name
pub const DEFAULT_COLLECTION_NAME: &str = "Untitled collection";

/// Normalize a user supplied collection name
pub fn normalize_name(name: &str) -> String {
    if name.trim().is_empty() {
        DEFAULT_COLLECTION_NAME.to_string()
    } else {
        name.to_string()
    }
}

/// A named set of beatmap hashes with provenance tracking.
///
/// `maps` is what the user sees. `legacy_maps` came from osu!stable,
/// `custom_maps` were added here and `deleted_maps` remembers legacy maps the
/// user removed so a later legacy import does not bring them back.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Collection {
    pub name: String,
    pub maps: Vec<Md5Hash>,
    pub legacy_maps: Vec<Md5Hash>,
    pub custom_maps: Vec<Md5Hash>,
    pub deleted_maps: Vec<Md5Hash>,
}

fn remove_from(list: &mut Vec<Md5Hash>, hash: &Md5Hash) -> bool {
    match list.iter().position(|h| h == hash) {
        Some(index) => {
            list.remove(index);
            true
        }
        None => false,
    }
}

fn push_unique(list: &mut Vec<Md5Hash>, hash: Md5Hash) {
    if !list.contains(&hash) {
        list.push(hash);
    }
}

impl Collection {
    /// Create a new empty collection with the given name
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Add a map, clearing any deletion marker. Adding twice is a no-op.
    pub fn add_map(&mut self, hash: Md5Hash) {
        remove_from(&mut self.deleted_maps, &hash);
        push_unique(&mut self.custom_maps, hash);
        push_unique(&mut self.maps, hash);
    }

    /// Remove a map. Legacy maps are remembered as deleted.
    pub fn remove_map(&mut self, hash: &Md5Hash) {
        remove_from(&mut self.maps, hash);
        remove_from(&mut self.custom_maps, hash);
        if self.legacy_maps.contains(hash) {
            push_unique(&mut self.deleted_maps, *hash);
        }
    }

    pub fn contains(&self, hash: &Md5Hash) -> bool {
        self.maps.contains(hash)
    }

    /// Number of beatmaps in this collection
    pub fn len(&self) -> usize {
        self.maps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.maps.is_empty()
    }
}
