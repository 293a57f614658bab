//! In-memory beatmap catalog
//!
//! Difficulties live in one owning vector; sets and the hash index refer to
//! them by [`DifficultyId`].

pub mod grouping;
pub mod osu_db;
pub mod raw_scan;

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;

use crate::beatmap::{BeatmapDifficulty, BeatmapSet, DifficultyId};
use crate::hash::Md5Hash;

/// Queryable collection of beatmap sets and their difficulties
#[derive(Debug, Default)]
pub struct Catalog {
    difficulties: Vec<BeatmapDifficulty>,
    sets: Vec<BeatmapSet>,
    /// Set index per difficulty, parallel to `difficulties`
    set_of: Vec<usize>,
    by_md5: HashMap<Md5Hash, DifficultyId>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a set. Difficulties whose hash is already known are dropped and
    /// nothing is added when none remain.
    ///
    /// Returns the index of the new set.
    pub fn add_set(
        &mut self,
        set_id: i32,
        folder: PathBuf,
        difficulties: Vec<BeatmapDifficulty>,
    ) -> Option<usize> {
        let set_index = self.sets.len();
        let mut ids = Vec::with_capacity(difficulties.len());

        for diff in difficulties {
            if self.by_md5.contains_key(&diff.md5) {
                tracing::debug!("Skipping duplicate difficulty {}", diff.md5);
                continue;
            }

            let id = DifficultyId(self.difficulties.len());
            self.by_md5.insert(diff.md5, id);
            self.difficulties.push(diff);
            self.set_of.push(set_index);
            ids.push(id);
        }

        if ids.is_empty() {
            return None;
        }

        self.sets.push(BeatmapSet {
            set_id,
            folder,
            difficulties: ids,
        });
        Some(set_index)
    }

    pub fn difficulty(&self, id: DifficultyId) -> Option<&BeatmapDifficulty> {
        self.difficulties.get(id.0)
    }

    pub fn difficulty_by_md5(&self, md5: &Md5Hash) -> Option<&BeatmapDifficulty> {
        self.by_md5.get(md5).and_then(|id| self.difficulty(*id))
    }

    /// The set containing the difficulty with this hash
    pub fn set_by_md5(&self, md5: &Md5Hash) -> Option<&BeatmapSet> {
        let id = self.by_md5.get(md5)?;
        self.set_of.get(id.0).and_then(|&index| self.sets.get(index))
    }

    pub fn contains(&self, md5: &Md5Hash) -> bool {
        self.by_md5.contains_key(md5)
    }

    pub fn sets(&self) -> impl Iterator<Item = &BeatmapSet> {
        self.sets.iter()
    }

    pub fn difficulties(&self) -> impl Iterator<Item = &BeatmapDifficulty> {
        self.difficulties.iter()
    }

    pub fn difficulties_of<'a>(
        &'a self,
        set: &'a BeatmapSet,
    ) -> impl Iterator<Item = &'a BeatmapDifficulty> + 'a {
        set.difficulties
            .iter()
            .filter_map(move |id| self.difficulty(*id))
    }

    /// Every known difficulty hash
    pub fn hashes(&self) -> HashSet<Md5Hash> {
        self.by_md5.keys().copied().collect()
    }

    pub fn set_count(&self) -> usize {
        self.sets.len()
    }

    pub fn difficulty_count(&self) -> usize {
        self.difficulties.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }
}
