//! Per-beatmap score lists with dual-format loading

use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::hash::Md5Hash;

use super::custom::{read_custom_scores, write_custom_scores, SCORES_DB_VERSION};
use super::legacy::read_legacy_scores;
use super::model::{FinishedScore, ScoreSource};
use super::sort::SortMethod;

/// Scores newer than this carry a trustworthy max possible combo
const MAX_COMBO_FIELDS_AFTER: u32 = 20180722;

/// Counts from a score load
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreLoadSummary {
    pub custom: usize,
    pub legacy: usize,
    /// Legacy scores skipped because they were imported before
    pub duplicates: usize,
}

/// Map from beatmap hash to its scores
#[derive(Debug, Default)]
pub struct ScoreStore {
    scores: HashMap<Md5Hash, Vec<FinishedScore>>,
    sort_method: SortMethod,
    next_sort_hack: u64,
    persist_dirty: bool,
    stats_dirty: bool,
    autosave_path: Option<PathBuf>,
}

impl ScoreStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sort_method(sort_method: SortMethod) -> Self {
        Self {
            sort_method,
            ..Self::default()
        }
    }

    /// Save to `path` after every added score
    pub fn set_autosave(&mut self, path: Option<PathBuf>) {
        self.autosave_path = path;
    }

    fn next_sort_hack(&mut self) -> u64 {
        let hack = self.next_sort_hack;
        self.next_sort_hack += 1;
        hack
    }

    /// Append a score and backfill `perfect` on older scores of the map
    fn insert(&mut self, mut score: FinishedScore) -> u64 {
        score.sort_hack = self.next_sort_hack();
        let hack = score.sort_hack;
        let is_legacy = score.is_legacy();
        let list = self.scores.entry(score.beatmap_md5).or_default();
        list.push(score);

        if !is_legacy {
            backfill_perfect(list);
        }
        hack
    }

    /// Load the custom store, then the legacy one. Clears previous scores.
    pub fn load(&mut self, custom: Option<&Path>, legacy: Option<&Path>) -> ScoreLoadSummary {
        let start = Instant::now();
        self.scores.clear();
        self.stats_dirty = true;

        let mut summary = ScoreLoadSummary::default();
        let mut custom_size = None;

        if let Some(path) = custom {
            let (count, size) = self.load_custom(path);
            summary.custom = count;
            custom_size = Some(size).filter(|&s| s > 0);
        }

        if let Some(path) = legacy {
            let (added, duplicates) = self.import_legacy(path, custom_size);
            summary.legacy = added;
            summary.duplicates = duplicates;
        }

        tracing::info!(
            "Loaded {} custom and {} legacy scores in {:?} ({} already imported)",
            summary.custom,
            summary.legacy,
            start.elapsed(),
            summary.duplicates
        );
        summary
    }

    /// Add scores from the custom store. Returns the count and the file size.
    pub fn load_custom(&mut self, path: &Path) -> (usize, u64) {
        let file = read_custom_scores(path);
        let count = file.scores.len();
        for score in file.scores {
            self.insert(score);
        }
        (count, file.file_size)
    }

    /// Add standard scores from an osu!stable score file.
    ///
    /// Scores that match an already imported legacy score are skipped. The
    /// file is ignored entirely when its size equals `skip_if_size`, which
    /// happens when the osu! folder points at the data folder.
    pub fn import_legacy(&mut self, path: &Path, skip_if_size: Option<u64>) -> (usize, usize) {
        let size = std::fs::metadata(path).map(|m| m.len()).unwrap_or(0);
        if size > 0 && Some(size) == skip_if_size {
            tracing::warn!(
                "{} looks like the custom score file, not loading legacy scores",
                path.display()
            );
            return (0, 0);
        }

        let file = read_legacy_scores(path);

        let mut added = 0;
        let mut duplicates = 0;
        for score in file.scores {
            let already_imported = self
                .scores
                .get(&score.beatmap_md5)
                .is_some_and(|list| list.iter().any(|other| score.is_same_legacy_play(other)));

            if already_imported {
                duplicates += 1;
            } else {
                self.insert(score);
                added += 1;
            }
        }
        (added, duplicates)
    }

    /// Add a finished score and return its rank under the active sort order
    pub fn add_score(&mut self, score: FinishedScore) -> Option<usize> {
        let md5 = score.beatmap_md5;
        let hack = self.insert(score);
        self.sort_scores(&md5);

        self.persist_dirty = true;
        self.stats_dirty = true;

        if let Some(path) = self.autosave_path.clone() {
            if let Err(e) = self.save(&path) {
                tracing::warn!("Failed to save scores: {}", e);
            }
        }

        self.scores_for(&md5).iter().position(|s| s.sort_hack == hack)
    }

    /// Remove the score set at `timestamp`. Returns whether one was found.
    pub fn delete_score(&mut self, md5: &Md5Hash, timestamp: u64) -> bool {
        let Some(list) = self.scores.get_mut(md5) else {
            return false;
        };
        let Some(index) = list.iter().position(|s| s.timestamp == timestamp) else {
            return false;
        };

        list.remove(index);
        if list.is_empty() {
            self.scores.remove(md5);
        }
        self.persist_dirty = true;
        self.stats_dirty = true;
        true
    }

    pub fn scores_for(&self, md5: &Md5Hash) -> &[FinishedScore] {
        self.scores.get(md5).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn sort_method(&self) -> SortMethod {
        self.sort_method
    }

    /// Change the sort order and re-sort every list
    pub fn set_sort_method(&mut self, sort_method: SortMethod) {
        self.sort_method = sort_method;
        for list in self.scores.values_mut() {
            sort_method.sort(list);
        }
    }

    pub fn sort_scores(&mut self, md5: &Md5Hash) {
        if let Some(list) = self.scores.get_mut(md5) {
            self.sort_method.sort(list);
        }
    }

    /// Move every non-legacy score of `from` to `to`. Returns how many moved.
    pub fn rename_player_scores(&mut self, from: &str, to: &str) -> usize {
        let mut renamed = 0;
        for score in self.scores.values_mut().flatten() {
            if !score.is_legacy() && score.player_name == from {
                score.player_name = to.to_string();
                renamed += 1;
            }
        }

        if renamed > 0 {
            tracing::info!("Renamed {} scores from {:?} to {:?}", renamed, from, to);
            self.persist_dirty = true;
            self.stats_dirty = true;
        }
        renamed
    }

    /// Turn loaded legacy scores into imported ones so the next save keeps
    /// them and later legacy loads skip them.
    ///
    /// Current score versions derive `perfect` from the max possible combo,
    /// so a perfect legacy play records its own combo as the maximum.
    pub fn convert_legacy_scores(&mut self) -> usize {
        let mut converted = 0;
        for score in self.scores.values_mut().flatten() {
            if score.is_legacy() {
                score.source = ScoreSource::ImportedLegacy;
                score.version = SCORES_DB_VERSION;
                if score.perfect && score.max_possible_combo < 1 {
                    score.max_possible_combo = i32::from(score.max_combo);
                }
                converted += 1;
            }
        }

        if converted > 0 {
            self.persist_dirty = true;
            self.stats_dirty = true;
        }
        converted
    }

    /// Players with at least one non-legacy score, plus the local player
    pub fn player_names_with_pp_scores(&self, local: &str) -> Vec<String> {
        self.player_names(false, local)
    }

    /// Sorted unique player names, always including the local player
    pub fn player_names(&self, include_legacy: bool, local: &str) -> Vec<String> {
        let mut names: BTreeSet<&str> = self
            .scores
            .values()
            .flatten()
            .filter(|s| include_legacy || !s.is_legacy())
            .map(|s| s.player_name.as_str())
            .collect();
        names.insert(local);

        names
            .into_iter()
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Md5Hash, &[FinishedScore])> {
        self.scores.iter().map(|(md5, list)| (md5, list.as_slice()))
    }

    pub fn beatmap_count(&self) -> usize {
        self.scores.len()
    }

    pub fn score_count(&self) -> usize {
        self.scores.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }

    /// Whether there are unsaved changes
    pub fn is_persist_dirty(&self) -> bool {
        self.persist_dirty
    }

    /// Whether scores changed since player stats were last cached
    pub fn is_stats_dirty(&self) -> bool {
        self.stats_dirty
    }

    pub(crate) fn mark_stats_clean(&mut self) {
        self.stats_dirty = false;
    }

    /// Write the custom store when there are unsaved changes.
    ///
    /// Returns `Ok(false)` when nothing needed writing.
    pub fn save(&mut self, path: &Path) -> Result<bool> {
        if !self.persist_dirty || self.scores.is_empty() {
            return Ok(false);
        }

        let start = Instant::now();
        let beatmaps = write_custom_scores(path, &self.scores)?;
        self.persist_dirty = false;

        tracing::info!(
            "Saved scores for {} beatmaps to {} in {:?}",
            beatmaps,
            path.display(),
            start.elapsed()
        );
        Ok(true)
    }
}

/// Recompute `perfect` for scores lacking a usable max combo, once any score
/// of the same beatmap has one
fn backfill_perfect(list: &mut [FinishedScore]) {
    let Some(max_possible_combo) = list
        .iter()
        .find(|s| s.version > MAX_COMBO_FIELDS_AFTER && s.max_possible_combo > 0)
        .map(|s| s.max_possible_combo)
    else {
        return;
    };

    for score in list.iter_mut() {
        if score.version <= MAX_COMBO_FIELDS_AFTER || score.max_possible_combo < 1 {
            score.perfect = score.max_combo > 0 && score.max_combo as i32 >= max_possible_combo;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::score::legacy::tests::{legacy_file_bytes, LegacyRecord, HASH};
    use tempfile::TempDir;

    fn score(timestamp: u64, value: u64) -> FinishedScore {
        FinishedScore {
            beatmap_md5: Md5Hash::from(HASH),
            timestamp,
            score: value,
            player_name: "player".to_string(),
            max_combo: 100,
            ..Default::default()
        }
    }

    #[test]
    fn test_add_score_returns_rank() {
        let mut store = ScoreStore::new();
        assert_eq!(store.add_score(score(1, 500)), Some(0));
        assert_eq!(store.add_score(score(2, 1000)), Some(0));
        assert_eq!(store.add_score(score(3, 100)), Some(2));
        assert!(store.is_persist_dirty());
        assert!(store.is_stats_dirty());
    }

    #[test]
    fn test_backfill_perfect() {
        let mut store = ScoreStore::new();
        let old = FinishedScore {
            version: 20170101,
            max_combo: 250,
            ..score(1, 10)
        };
        let broken = FinishedScore {
            max_possible_combo: 0,
            max_combo: 100,
            perfect: true,
            ..score(2, 20)
        };
        store.add_score(old);
        store.add_score(broken);

        let with_info = FinishedScore {
            max_possible_combo: 250,
            max_combo: 200,
            ..score(3, 30)
        };
        store.add_score(with_info);

        let md5 = Md5Hash::from(HASH);
        let find = |ts: u64| store.scores_for(&md5).iter().find(|s| s.timestamp == ts).unwrap().perfect;
        assert!(find(1));
        assert!(!find(2));
        assert!(!find(3));
    }

    #[test]
    fn test_delete_score() {
        let mut store = ScoreStore::new();
        store.add_score(score(1, 500));
        store.add_score(score(2, 600));

        let md5 = Md5Hash::from(HASH);
        assert!(store.delete_score(&md5, 1));
        assert!(!store.delete_score(&md5, 1));
        assert_eq!(store.scores_for(&md5).len(), 1);
    }

    #[test]
    fn test_save_and_reload() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("scores.db");

        let mut store = ScoreStore::new();
        store.add_score(score(1, 500));
        store.add_score(score(2, 600));
        assert!(store.save(&path).unwrap());
        assert!(!store.save(&path).unwrap());

        let mut reloaded = ScoreStore::new();
        let summary = reloaded.load(Some(&path), None);
        assert_eq!(summary.custom, 2);

        let md5 = Md5Hash::from(HASH);
        let mut values: Vec<u64> = reloaded.scores_for(&md5).iter().map(|s| s.score).collect();
        values.sort();
        assert_eq!(values, vec![500, 600]);
    }

    #[test]
    fn test_save_skips_empty_store() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("scores.db");
        let mut store = ScoreStore::new();
        assert!(!store.save(&path).unwrap());
        assert!(!path.exists());
    }

    #[test]
    fn test_autosave() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("scores.db");
        let mut store = ScoreStore::new();
        store.set_autosave(Some(path.clone()));
        store.add_score(score(1, 500));
        assert!(path.exists());
        assert!(!store.is_persist_dirty());
    }

    #[test]
    fn test_legacy_import_is_deduplicated() {
        let dir = TempDir::new().unwrap();
        let legacy_path = dir.path().join("legacy.db");
        let custom_path = dir.path().join("scores.db");
        std::fs::write(
            &legacy_path,
            legacy_file_bytes(&[LegacyRecord::default(), LegacyRecord { score: 1, ..Default::default() }]),
        )
        .unwrap();

        let mut store = ScoreStore::new();
        let first = store.load(Some(&custom_path), Some(&legacy_path));
        assert_eq!(first.legacy, 2);
        assert_eq!(store.convert_legacy_scores(), 2);
        store.save(&custom_path).unwrap();

        let mut again = ScoreStore::new();
        let second = again.load(Some(&custom_path), Some(&legacy_path));
        assert_eq!(second.custom, 2);
        assert_eq!(second.legacy, 0);
        assert_eq!(second.duplicates, 2);
        assert_eq!(again.score_count(), 2);
    }

    #[test]
    fn test_converted_legacy_scores_survive_reload() {
        let dir = TempDir::new().unwrap();
        let legacy_path = dir.path().join("legacy.db");
        let custom_path = dir.path().join("scores.db");
        std::fs::write(
            &legacy_path,
            legacy_file_bytes(&[
                LegacyRecord { perfect: true, ..Default::default() },
                LegacyRecord { score: 1, max_combo: 200, online_id: 77, ..Default::default() },
            ]),
        )
        .unwrap();

        let mut store = ScoreStore::new();
        store.load(None, Some(&legacy_path));
        store.convert_legacy_scores();
        store.save(&custom_path).unwrap();

        let mut reloaded = ScoreStore::new();
        let summary = reloaded.load(Some(&custom_path), None);
        assert_eq!(summary.custom, 2);

        let md5 = Md5Hash::from(HASH);
        let find = |value: u64| {
            reloaded
                .scores_for(&md5)
                .iter()
                .find(|s| s.score == value)
                .unwrap()
                .clone()
        };
        let full_combo = find(500_000);
        assert!(full_combo.perfect);
        assert_eq!(full_combo.source, ScoreSource::ImportedLegacy);
        assert_eq!(full_combo.online_score_id, 123_456_789_012);
        assert_eq!(full_combo.server, "ppy.sh");

        let other = find(1);
        assert!(!other.perfect);
        assert_eq!(other.online_score_id, 77);
    }

    #[test]
    fn test_legacy_skipped_when_same_size_as_custom() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("scores.db");

        let mut store = ScoreStore::new();
        store.add_score(score(1, 500));
        store.save(&path).unwrap();

        let mut reloaded = ScoreStore::new();
        let summary = reloaded.load(Some(&path), Some(&path));
        assert_eq!(summary.custom, 1);
        assert_eq!(summary.legacy, 0);
        assert_eq!(reloaded.score_count(), 1);
    }

    #[test]
    fn test_rename_and_player_names() {
        let mut store = ScoreStore::new();
        store.add_score(score(1, 500));
        store.add_score(FinishedScore {
            player_name: "stable".to_string(),
            source: ScoreSource::Legacy,
            ..score(2, 10)
        });

        assert_eq!(store.rename_player_scores("player", "renamed"), 1);
        assert_eq!(store.rename_player_scores("stable", "x"), 0);

        assert_eq!(store.player_names_with_pp_scores("me"), vec!["me", "renamed"]);
        assert_eq!(store.player_names(true, ""), vec!["renamed", "stable"]);
    }

    #[test]
    fn test_set_sort_method_resorts() {
        let mut store = ScoreStore::new();
        store.add_score(FinishedScore { count_miss: 5, ..score(1, 900) });
        store.add_score(FinishedScore { count_miss: 0, ..score(2, 100) });

        let md5 = Md5Hash::from(HASH);
        assert_eq!(store.scores_for(&md5)[0].score, 900);
        store.set_sort_method(SortMethod::Misses);
        assert_eq!(store.scores_for(&md5)[0].score, 100);
    }
}
