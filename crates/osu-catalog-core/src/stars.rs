//! Persistent star rating and BPM cache (`stars.cache`)

use std::collections::HashMap;
use std::path::Path;
use std::time::Instant;

use crate::beatmap::{BeatmapDifficulty, BpmInfo};
use crate::binary::{DbReader, DbWriter};
use crate::catalog::Catalog;
use crate::error::Result;
use crate::hash::Md5Hash;

/// Current cache format version
pub const STARS_CACHE_VERSION: u32 = 20240812;

/// First version storing the BPM triple next to the star rating
const BPM_FIELDS_VERSION: u32 = 20240812;

/// Saving is skipped when fewer entries qualify
pub const MIN_ENTRIES_TO_SAVE: usize = 1;

const IGNORED_CHECKSUM: &str = "00000000000000000000000000000000";

/// Cached metrics for one difficulty
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct StarsCacheEntry {
    pub stars: f32,
    pub bpm: BpmInfo,
}

/// Map from beatmap hash to precomputed metrics
#[derive(Debug, Default)]
pub struct StarsCache {
    entries: HashMap<Md5Hash, StarsCacheEntry>,
}

impl StarsCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the cache. Missing, corrupt or too new files give an empty cache.
    pub fn load<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        let mut reader = DbReader::open(path);
        let mut cache = Self::new();

        if reader.is_empty() {
            tracing::debug!("No stars cache at {}", path.display());
            return cache;
        }

        let version = reader.read_u32();
        if version > STARS_CACHE_VERSION {
            tracing::warn!(
                "Stars cache version {} is newer than supported ({}), ignoring",
                version,
                STARS_CACHE_VERSION
            );
            return cache;
        }

        reader.skip_string();
        let count = reader.read_u64();
        let has_bpm = version >= BPM_FIELDS_VERSION;

        for _ in 0..count {
            if reader.is_dead() {
                break;
            }

            let md5 = reader.read_hash();
            let stars = reader.read_f32();
            let bpm = if has_bpm {
                BpmInfo {
                    min: reader.read_i32(),
                    max: reader.read_i32(),
                    common: reader.read_i32(),
                }
            } else {
                BpmInfo::default()
            };

            if !reader.is_dead() && !md5.is_empty() {
                cache.entries.insert(md5, StarsCacheEntry { stars, bpm });
            }
        }

        tracing::info!(
            "Loaded {} stars cache entries (version {})",
            cache.entries.len(),
            version
        );
        cache
    }

    pub fn get(&self, md5: &Md5Hash) -> Option<&StarsCacheEntry> {
        self.entries.get(md5)
    }

    pub fn insert(&mut self, md5: Md5Hash, entry: StarsCacheEntry) {
        self.entries.insert(md5, entry);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Overwrite a difficulty's stars and BPM with cached values.
    ///
    /// Without a cache hit, or for an entry from a cache version that had no
    /// BPM data, the BPM is computed from the timing points instead.
    pub fn apply(&self, diff: &mut BeatmapDifficulty) {
        let cached = self.entries.get(&diff.md5);

        if let Some(entry) = cached {
            diff.stars = entry.stars;
        }

        diff.bpm = match cached {
            Some(entry) if entry.bpm != BpmInfo::default() => entry.bpm,
            _ => BpmInfo::from_timing_points(&diff.timing_points),
        };
    }

    /// Record every rated difficulty of the catalog
    pub fn update_from_catalog(&mut self, catalog: &Catalog) {
        for diff in catalog.difficulties().filter(|d| d.stars > 0.0) {
            self.entries.insert(
                diff.md5,
                StarsCacheEntry {
                    stars: diff.stars,
                    bpm: diff.bpm,
                },
            );
        }
    }

    /// Write the cache. Returns `Ok(false)` when there was too little to save.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<bool> {
        let start = Instant::now();
        let mut rated: Vec<(&Md5Hash, &StarsCacheEntry)> =
            self.entries.iter().filter(|(_, e)| e.stars > 0.0).collect();

        if rated.len() < MIN_ENTRIES_TO_SAVE {
            tracing::debug!("No stars cached, nothing to write");
            return Ok(false);
        }
        rated.sort_by_key(|(md5, _)| **md5);

        let mut writer = DbWriter::create(path.as_ref());
        writer.write_u32(STARS_CACHE_VERSION);
        writer.write_string(IGNORED_CHECKSUM);
        writer.write_u64(rated.len() as u64);
        for (md5, entry) in &rated {
            writer.write_hash(md5);
            writer.write_f32(entry.stars);
            writer.write_i32(entry.bpm.min);
            writer.write_i32(entry.bpm.max);
            writer.write_i32(entry.bpm.common);
        }
        writer.finish()?;

        tracing::info!(
            "Saved {} stars cache entries in {:?}",
            rated.len(),
            start.elapsed()
        );
        Ok(true)
    }
}
