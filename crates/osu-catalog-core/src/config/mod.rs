//! Configuration and path detection

mod paths;

pub use paths::*;

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::catalog::osu_db::DEFAULT_MAX_VERSION;
use crate::error::{Error, Result};
use crate::score::SortMethod;
use crate::stats::StatsOptions;

/// Configuration for osu-catalog
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// osu!stable installation holding `osu!.db`, `scores.db` and `collection.db`
    pub osu_folder: Option<PathBuf>,
    /// Songs folder override, relative paths are joined onto `osu_folder`
    pub songs_folder: Option<PathBuf>,
    /// Where this client keeps its own score, collection and cache files
    pub data_dir: PathBuf,
    /// Local player name used for stats
    pub player_name: String,
    pub database: DatabaseConfig,
    /// Read and write the star rating cache
    pub stars_cache_enabled: bool,
    pub scores: ScoresConfig,
    pub collections: CollectionsConfig,
}

/// Primary database loading
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Read `osu!.db`. When off every load is a folder scan.
    pub enabled: bool,
    /// Newest `osu!.db` version trusted to parse
    pub max_version: u32,
    /// Parse newer databases anyway. Unsafe, the layout may have changed.
    pub ignore_version: bool,
    /// Do not report outdated database versions
    pub ignore_version_warnings: bool,
}

/// Score loading and statistics
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoresConfig {
    pub enabled: bool,
    /// Read osu!stable's `scores.db`
    pub legacy_enabled: bool,
    /// Read this client's `scores.db`
    pub custom_enabled: bool,
    /// Save after every added score
    pub save_immediately: bool,
    pub sort_method: SortMethod,
    pub bonus_pp: bool,
    pub include_relax_autopilot: bool,
    /// List players that only appear in legacy scores
    pub include_legacy_names: bool,
}

/// Collection loading
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectionsConfig {
    /// Read osu!stable's `collection.db`
    pub legacy_enabled: bool,
    /// Read this client's `collections.db`
    pub custom_enabled: bool,
    /// Save after every collection change
    pub save_immediately: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_version: DEFAULT_MAX_VERSION,
            ignore_version: false,
            ignore_version_warnings: false,
        }
    }
}

impl Default for ScoresConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            legacy_enabled: true,
            custom_enabled: true,
            save_immediately: true,
            sort_method: SortMethod::default(),
            bonus_pp: true,
            include_relax_autopilot: false,
            include_legacy_names: false,
        }
    }
}

impl Default for CollectionsConfig {
    fn default() -> Self {
        Self {
            legacy_enabled: true,
            custom_enabled: true,
            save_immediately: true,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            osu_folder: detect_osu_folder(),
            songs_folder: None,
            data_dir: default_data_dir(),
            player_name: default_player_name(),
            database: DatabaseConfig::default(),
            stars_cache_enabled: true,
            scores: ScoresConfig::default(),
            collections: CollectionsConfig::default(),
        }
    }
}

impl Config {
    /// Create a new config with auto-detected paths
    pub fn auto_detect() -> Self {
        Self::default()
    }

    /// Config rooted at explicit folders, without touching the environment
    pub fn with_folders(osu_folder: Option<PathBuf>, data_dir: PathBuf) -> Self {
        Self {
            osu_folder,
            songs_folder: None,
            data_dir,
            player_name: String::new(),
            database: DatabaseConfig::default(),
            stars_cache_enabled: true,
            scores: ScoresConfig::default(),
            collections: CollectionsConfig::default(),
        }
    }

    /// Get the config file path
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("osu-catalog").join("config.json"))
    }

    /// Load config from disk, falling back to auto-detection if not found
    pub fn load() -> Self {
        Self::config_path()
            .and_then(|path| Self::load_from(&path).ok())
            .unwrap_or_default()
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Save config to disk
    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()
            .ok_or_else(|| Error::Config("no config directory on this platform".to_string()))?;
        self.save_to(&path)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Stats options derived from the score settings
    pub fn stats_options(&self) -> StatsOptions {
        StatsOptions {
            bonus_pp: self.scores.bonus_pp,
            include_relax_autopilot: self.scores.include_relax_autopilot,
        }
    }

    fn in_osu_folder(&self, name: &str) -> Option<PathBuf> {
        self.osu_folder.as_ref().map(|p| p.join(name))
    }

    /// osu!stable's beatmap database
    pub fn osu_db_path(&self) -> Option<PathBuf> {
        self.in_osu_folder("osu!.db")
    }

    /// osu!stable's score database
    pub fn legacy_scores_path(&self) -> Option<PathBuf> {
        self.in_osu_folder("scores.db")
    }

    /// osu!stable's collection database
    pub fn legacy_collections_path(&self) -> Option<PathBuf> {
        self.in_osu_folder("collection.db")
    }

    pub fn custom_scores_path(&self) -> PathBuf {
        self.data_dir.join("scores.db")
    }

    pub fn custom_collections_path(&self) -> PathBuf {
        self.data_dir.join("collections.db")
    }

    pub fn stars_cache_path(&self) -> PathBuf {
        self.data_dir.join("stars.cache")
    }

    pub fn replays_dir(&self) -> PathBuf {
        self.data_dir.join("replays")
    }

    /// Songs folder from the override, the osu! user config or `<osu>/Songs`
    pub fn resolve_songs_folder(&self) -> Option<PathBuf> {
        let osu_folder = self.osu_folder.as_deref();

        if let Some(songs) = &self.songs_folder {
            return match osu_folder {
                Some(osu) if !is_absolute_path(songs) => Some(osu.join(songs)),
                _ => Some(songs.clone()),
            };
        }

        let osu = osu_folder?;
        let username = std::env::var("USER")
            .or_else(|_| std::env::var("USERNAME"))
            .unwrap_or_default();
        Some(beatmap_directory_from_user_config(osu, &username).unwrap_or_else(|| osu.join("Songs")))
    }
}
