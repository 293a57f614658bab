//! In-process facade over every store
//!
//! [`Database`] owns the catalog, scores, stars cache and collections. A load
//! runs on a worker thread; the owner calls [`Database::update`] from its own
//! loop, which swaps in the finished result and then advances any pending
//! folder scan by one time slice.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::beatmap::BeatmapDifficulty;
use crate::catalog::raw_scan::RawScanner;
use crate::catalog::Catalog;
use crate::collection::CollectionRegistry;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::hash::Md5Hash;
use crate::loader::{
    load_collections, DatabaseLoader, LoadControl, LoadOutput, LoadPhase, LoadWarning,
};
use crate::score::{FinishedScore, ReplayStore, ScoreStore, SortMethod};
use crate::stars::StarsCache;
use crate::stats::{PlayerStats, PlayerStatsCalculator};

/// Time slice given to the folder scan per [`Database::update`]
pub const UPDATE_BUDGET: Duration = Duration::from_millis(33);

pub struct Database {
    config: Config,
    control: Arc<LoadControl>,
    loader: Option<DatabaseLoader>,
    scanner: Option<RawScanner>,
    catalog: Catalog,
    scores: ScoreStore,
    stars: StarsCache,
    collections: CollectionRegistry,
    stats: PlayerStatsCalculator,
    replays: ReplayStore,
    /// Folders read by earlier folder scans
    raw_scanned: HashSet<PathBuf>,
    warnings: Vec<LoadWarning>,
    db_version: Option<u32>,
}

impl Database {
    pub fn new(config: Config) -> Self {
        let control = Arc::new(LoadControl::new());
        control.set_phase(LoadPhase::Done);

        Self {
            stats: PlayerStatsCalculator::new(config.stats_options()),
            replays: ReplayStore::new(config.replays_dir()),
            scores: ScoreStore::with_sort_method(config.scores.sort_method),
            config,
            control,
            loader: None,
            scanner: None,
            catalog: Catalog::new(),
            stars: StarsCache::new(),
            collections: CollectionRegistry::new(),
            raw_scanned: HashSet::new(),
            warnings: Vec::new(),
            db_version: None,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Start a background load. Ignored while one is running.
    ///
    /// After an earlier folder scan, a scan triggered by this load only reads
    /// folders that were not seen before and keeps the existing catalog.
    pub fn load(&mut self) {
        if self.is_loading() {
            tracing::debug!("Load already in progress");
            return;
        }

        self.control = Arc::new(LoadControl::new());
        self.loader = Some(DatabaseLoader::start(
            self.config.clone(),
            Arc::clone(&self.control),
        ));
    }

    /// Load and block until done, folder scan included
    pub fn load_blocking(&mut self) {
        self.load();
        if let Some(loader) = self.loader.take() {
            let out = loader.wait();
            self.apply(out);
        }
        while self.scanner.is_some() {
            self.update_with_budget(Duration::from_secs(1));
        }
    }

    /// Foreground tick with the default budget
    pub fn update(&mut self) {
        self.update_with_budget(UPDATE_BUDGET);
    }

    /// Swap in a finished load, then scan folders for up to `budget`
    pub fn update_with_budget(&mut self, budget: Duration) {
        if let Some(loader) = self.loader.as_mut() {
            match loader.poll() {
                Some(out) => {
                    self.loader = None;
                    self.apply(out);
                }
                None => return,
            }
        }

        if let Some(scanner) = self.scanner.as_mut() {
            if scanner.step(&mut self.catalog, &self.stars, budget) {
                self.finish_scan();
            }
        }
    }

    fn apply(&mut self, out: LoadOutput) {
        let incremental = out.needs_raw_scan && !self.raw_scanned.is_empty();
        if !incremental {
            self.catalog = out.catalog;
        }
        if !out.needs_raw_scan {
            self.raw_scanned.clear();
        }

        self.scores = out.scores;
        self.stars = out.stars;
        self.collections = out.collections;
        self.warnings = out.warnings;
        self.db_version = out.db_version;
        self.stats.invalidate();

        for warning in &self.warnings {
            tracing::warn!("{}", warning);
        }

        if !out.needs_raw_scan || self.control.is_cancelled() {
            return;
        }

        match out.songs_folder {
            Some(songs) => {
                let seen = std::mem::take(&mut self.raw_scanned);
                let base = self.control.progress();
                self.scanner = Some(RawScanner::new(&songs, seen, Arc::clone(&self.control), base));
            }
            None => {
                tracing::warn!("No songs folder to scan");
                self.collections = load_collections(&self.config, &self.catalog);
                self.control.set_progress(1.0);
                self.control.set_phase(LoadPhase::Done);
            }
        }
    }

    /// Collections are loaded against the scanned catalog unless the scan
    /// was cancelled
    fn finish_scan(&mut self) {
        if let Some(scanner) = self.scanner.take() {
            self.raw_scanned = scanner.into_seen();
        }
        if !self.control.is_cancelled() {
            self.collections = load_collections(&self.config, &self.catalog);
        }
        self.control.set_progress(1.0);
        self.control.set_phase(LoadPhase::Done);
        tracing::info!(
            "Folder scan finished: {} sets, {} difficulties",
            self.catalog.set_count(),
            self.catalog.difficulty_count()
        );
    }

    pub fn progress(&self) -> f32 {
        self.control.progress()
    }

    pub fn phase(&self) -> LoadPhase {
        self.control.phase()
    }

    pub fn is_loading(&self) -> bool {
        self.loader.is_some() || self.scanner.is_some()
    }

    /// Stop the running load. Everything loaded so far stays available.
    pub fn cancel(&mut self) {
        self.control.cancel();
        if self.scanner.is_some() {
            self.finish_scan();
        }
    }

    /// Warnings from the last load
    pub fn warnings(&self) -> &[LoadWarning] {
        &self.warnings
    }

    /// `osu!.db` version seen by the last load
    pub fn db_version(&self) -> Option<u32> {
        self.db_version
    }

    /// Write scores, collections and the stars cache
    pub fn save(&mut self) -> Result<()> {
        if self.loader.is_some() {
            return Err(Error::NotLoaded("Databases"));
        }

        if self.config.scores.enabled {
            self.scores.save(&self.config.custom_scores_path())?;
        }

        if self.config.collections.custom_enabled && self.collections.is_loaded() {
            self.collections.save(&self.config.custom_collections_path())?;
        }

        if self.config.stars_cache_enabled {
            self.stars.update_from_catalog(&self.catalog);
            self.stars.save(self.config.stars_cache_path())?;
        }
        Ok(())
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn difficulty(&self, md5: &Md5Hash) -> Option<&BeatmapDifficulty> {
        self.catalog.difficulty_by_md5(md5)
    }

    pub fn stars(&self) -> &StarsCache {
        &self.stars
    }

    pub fn scores(&self) -> &ScoreStore {
        &self.scores
    }

    pub fn scores_for(&self, md5: &Md5Hash) -> &[FinishedScore] {
        self.scores.scores_for(md5)
    }

    pub fn replays(&self) -> &ReplayStore {
        &self.replays
    }

    /// Record a finished score and its replay. Returns the score's rank.
    pub fn add_score(&mut self, score: FinishedScore, replay: Option<&[u8]>) -> Option<usize> {
        if let Some(data) = replay {
            if let Err(e) = self.replays.save(score.timestamp, data) {
                tracing::warn!("Failed to save replay {}: {}", score.timestamp, e);
            }
        }
        self.scores.add_score(score)
    }

    pub fn delete_score(&mut self, md5: &Md5Hash, timestamp: u64) -> bool {
        self.scores.delete_score(md5, timestamp)
    }

    pub fn set_sort_method(&mut self, sort_method: SortMethod) {
        self.config.scores.sort_method = sort_method;
        self.scores.set_sort_method(sort_method);
    }

    pub fn rename_player_scores(&mut self, from: &str, to: &str) -> usize {
        self.scores.rename_player_scores(from, to)
    }

    pub fn convert_legacy_scores(&mut self) -> usize {
        self.scores.convert_legacy_scores()
    }

    /// Known player names, always including the local player
    pub fn player_names(&self) -> Vec<String> {
        self.scores.player_names(
            self.config.scores.include_legacy_names,
            &self.config.player_name,
        )
    }

    pub fn player_stats(&mut self, name: &str) -> PlayerStats {
        self.stats.calculate(&mut self.scores, name)
    }

    pub fn local_player_stats(&mut self) -> PlayerStats {
        let name = self.config.player_name.clone();
        self.player_stats(&name)
    }

    pub fn collections(&self) -> &CollectionRegistry {
        &self.collections
    }

    fn collections_changed(&mut self) {
        if !self.config.collections.save_immediately || !self.config.collections.custom_enabled {
            return;
        }
        if let Err(e) = self.collections.save(&self.config.custom_collections_path()) {
            tracing::warn!("Failed to save collections: {}", e);
        }
    }

    pub fn add_to_collection(&mut self, name: &str, md5: Md5Hash) {
        self.collections.add_map(name, md5);
        self.collections_changed();
    }

    pub fn remove_from_collection(&mut self, name: &str, md5: &Md5Hash) -> bool {
        let removed = self.collections.remove_map(name, md5);
        if removed {
            self.collections_changed();
        }
        removed
    }

    pub fn rename_collection(&mut self, old_name: &str, new_name: &str) -> bool {
        let renamed = self.collections.rename(old_name, new_name);
        if renamed {
            self.collections_changed();
        }
        renamed
    }

    pub fn delete_collection(&mut self, name: &str) -> bool {
        let deleted = self.collections.delete(name);
        if deleted {
            self.collections_changed();
        }
        deleted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const HASH: &str = "0123456789abcdef0123456789abcdef";

    fn database(dir: &TempDir) -> Database {
        let osu = dir.path().join("osu!");
        std::fs::create_dir_all(osu.join("Songs")).unwrap();
        let mut config = Config::with_folders(Some(osu), dir.path().join("data"));
        config.player_name = "player".to_string();
        Database::new(config)
    }

    fn score(timestamp: u64, pp: f32) -> FinishedScore {
        FinishedScore {
            beatmap_md5: Md5Hash::from(HASH),
            player_name: "player".to_string(),
            timestamp,
            pp,
            score: 1000,
            count_300: 10,
            ..Default::default()
        }
    }

    #[test]
    fn test_new_database_is_idle() {
        let dir = TempDir::new().unwrap();
        let db = database(&dir);
        assert!(!db.is_loading());
        assert_eq!(db.phase(), LoadPhase::Done);
        assert!(db.catalog().is_empty());
    }

    #[test]
    fn test_update_swaps_in_load() {
        let dir = TempDir::new().unwrap();
        let mut db = database(&dir);

        db.load();
        assert!(db.is_loading());
        for _ in 0..1000 {
            db.update();
            if !db.is_loading() {
                break;
            }
            std::thread::sleep(Duration::from_millis(5));
        }

        assert!(!db.is_loading());
        assert_eq!(db.progress(), 1.0);
        assert!(matches!(db.warnings()[0], LoadWarning::DatabaseMissing { .. }));
        assert!(db.collections().is_loaded());
    }

    #[test]
    fn test_add_score_persists_with_replay() {
        let dir = TempDir::new().unwrap();
        let mut db = database(&dir);
        db.load_blocking();

        assert_eq!(db.add_score(score(1_700_000_000, 120.0), Some(&[1, 2, 3])), Some(0));
        assert!(db.replays().exists(1_700_000_000));
        assert!(db.config().custom_scores_path().exists());

        let mut reloaded = database(&dir);
        reloaded.load_blocking();
        assert_eq!(reloaded.scores_for(&Md5Hash::from(HASH)).len(), 1);
        assert_eq!(reloaded.local_player_stats().num_scores_with_pp, 1);
    }

    #[test]
    fn test_collection_changes_are_saved() {
        let dir = TempDir::new().unwrap();
        let mut db = database(&dir);
        db.load_blocking();

        db.add_to_collection("Farm", Md5Hash::from(HASH));
        assert!(db.rename_collection("Farm", "Jumps"));

        let mut reloaded = database(&dir);
        reloaded.load_blocking();
        let jumps = reloaded.collections().find("Jumps").unwrap();
        assert!(jumps.contains(&Md5Hash::from(HASH)));
    }

    #[test]
    fn test_cancel_stops_loading() {
        let dir = TempDir::new().unwrap();
        let mut db = database(&dir);
        db.load();
        db.cancel();
        assert_eq!(db.progress(), 1.0);

        for _ in 0..1000 {
            db.update();
            if !db.is_loading() {
                break;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        assert!(!db.is_loading());
    }

    #[test]
    fn test_save_refused_while_loading() {
        let dir = TempDir::new().unwrap();
        let mut db = database(&dir);
        db.load();
        let result = db.save();
        // The worker may already be done, but it has not been swapped in yet
        assert!(matches!(result, Err(Error::NotLoaded(_))));
    }
}
