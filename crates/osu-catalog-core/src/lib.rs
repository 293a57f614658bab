//! # osu-catalog-core
//!
//! Local beatmap catalog and score persistence for an osu! client.
//!
//! This crate provides the foundational functionality for:
//! - Decoding osu!stable's `osu!.db`, `scores.db` and `collection.db`
//! - Scanning the Songs folder when `osu!.db` is missing or unusable
//! - Storing scores, collections and star ratings in the client's own files
//! - Loading everything on a background thread with progress and cancellation
//! - Computing weighted pp, accuracy and level for a player
//!
//! ## Modules
//!
//! - [`beatmap`] - Difficulty and beatmap set data structures
//! - [`binary`] - Reader and writer for the osu! binary database format
//! - [`catalog`] - `osu!.db` decoding, folder scanning and set grouping
//! - [`collection`] - Collections with legacy and custom persistence
//! - [`config`] - Configuration and path detection
//! - [`database`] - Facade owning every store
//! - [`error`] - Error types and Result alias
//! - [`loader`] - Background loading, progress and cancellation
//! - [`score`] - Score storage, ordering, export and replays
//! - [`stars`] - Star rating cache
//! - [`stats`] - Player statistics
//!
//! ## Example
//!
//! ```no_run
//! use osu_catalog_core::{Config, Database};
//!
//! let mut db = Database::new(Config::load());
//! db.load();
//! while db.is_loading() {
//!     db.update();
//! }
//! println!("{} beatmap sets", db.catalog().set_count());
//! ```

pub mod beatmap;
pub mod binary;
pub mod catalog;
pub mod collection;
pub mod config;
pub mod database;
pub mod error;
pub mod hash;
pub mod loader;
pub mod score;
pub mod stars;
pub mod stats;

// Error types
pub use error::{Error, Result};

// Beatmap types
pub use beatmap::{BeatmapDifficulty, BeatmapSet, BpmInfo, DifficultyId, GameMode, TimingPoint};
pub use catalog::Catalog;
pub use hash::Md5Hash;

// Configuration
pub use config::{detect_osu_folder, validate_osu_folder, Config};

// Loading
pub use database::Database;
pub use loader::{DatabaseLoader, LoadControl, LoadOutput, LoadPhase, LoadWarning};

// Scores
pub use score::{FinishedScore, ReplayStore, ScoreSource, ScoreStore, SortMethod};

// Collections
pub use collection::{Collection, CollectionRegistry};

// Star ratings
pub use stars::{StarsCache, StarsCacheEntry};

// Statistics
pub use stats::{PlayerStats, PlayerStatsCalculator, StatsOptions};
