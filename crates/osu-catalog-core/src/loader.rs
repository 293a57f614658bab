//! Background database loading with progress and cancellation
//!
//! A load runs on one worker thread: scores, then the stars cache, then
//! `osu!.db`, then collections. The caller polls [`LoadControl::progress`]
//! and takes the finished [`LoadOutput`] from [`DatabaseLoader::poll`].
//! When `osu!.db` cannot be used the output asks for a folder scan, which
//! the caller runs in time slices (see [`crate::catalog::raw_scan`]) before
//! loading collections with [`load_collections`].

use std::fmt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU8, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;

use crate::binary::DbReader;
use crate::catalog::grouping::group_into_catalog;
use crate::catalog::osu_db::{read_records, OsuDbHeader, VersionStatus};
use crate::catalog::Catalog;
use crate::collection::CollectionRegistry;
use crate::config::Config;
use crate::score::{ScoreLoadSummary, ScoreStore};
use crate::stars::StarsCache;

const SCORES_DONE: f32 = 0.05;
const STARS_DONE: f32 = 0.1;
const GROUPING_DONE: f32 = 0.75;

/// Stage of a load
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum LoadPhase {
    Init = 0,
    LoadScores = 1,
    LoadStarsCache = 2,
    LoadPrimaryDb = 3,
    RawScan = 4,
    Done = 5,
}

impl LoadPhase {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::LoadScores,
            2 => Self::LoadStarsCache,
            3 => Self::LoadPrimaryDb,
            4 => Self::RawScan,
            5 => Self::Done,
            _ => Self::Init,
        }
    }
}

impl fmt::Display for LoadPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadPhase::Init => write!(f, "Starting"),
            LoadPhase::LoadScores => write!(f, "Loading scores"),
            LoadPhase::LoadStarsCache => write!(f, "Loading star ratings"),
            LoadPhase::LoadPrimaryDb => write!(f, "Loading osu!.db"),
            LoadPhase::RawScan => write!(f, "Scanning beatmap folders"),
            LoadPhase::Done => write!(f, "Done"),
        }
    }
}

/// Progress, phase and cancellation shared between a load and its caller
#[derive(Debug)]
pub struct LoadControl {
    /// f32 bits, only ever raised
    progress: AtomicU32,
    cancelled: AtomicBool,
    phase: AtomicU8,
}

impl Default for LoadControl {
    fn default() -> Self {
        Self {
            progress: AtomicU32::new(0f32.to_bits()),
            cancelled: AtomicBool::new(false),
            phase: AtomicU8::new(LoadPhase::Init as u8),
        }
    }
}

impl LoadControl {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }

    /// Request cancellation. Progress jumps to 1.0, cancelling completes the load.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
        self.set_progress(1.0);
    }

    /// Raise progress to `value`. Lower values are ignored.
    pub fn set_progress(&self, value: f32) {
        let value = value.clamp(0.0, 1.0);
        let _ = self
            .progress
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |bits| {
                (value > f32::from_bits(bits)).then(|| value.to_bits())
            });
    }

    /// Current progress in `0.0..=1.0`
    pub fn progress(&self) -> f32 {
        f32::from_bits(self.progress.load(Ordering::Acquire))
    }

    pub fn phase(&self) -> LoadPhase {
        LoadPhase::from_u8(self.phase.load(Ordering::Acquire))
    }

    pub fn set_phase(&self, phase: LoadPhase) {
        self.phase.store(phase as u8, Ordering::Release);
    }
}

/// Problems the user should hear about after a load
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadWarning {
    /// `osu!.db` predates the oldest supported layout, no beatmaps loaded
    DatabaseTooOld { version: u32, minimum: u32 },
    /// `osu!.db` loads but its star ratings are stale
    DatabaseOutdated { version: u32 },
    /// `osu!.db` is newer than known, beatmaps come from a folder scan
    DatabaseVersionUnknown { version: u32, max_version: u32 },
    /// No usable `osu!.db`, beatmaps come from a folder scan
    DatabaseMissing { path: Option<PathBuf> },
}

impl fmt::Display for LoadWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadWarning::DatabaseTooOld { version, minimum } => write!(
                f,
                "osu!.db version {} is too old (minimum {}), update osu!stable and restart",
                version, minimum
            ),
            LoadWarning::DatabaseOutdated { version } => write!(
                f,
                "osu!.db version {} is outdated, star ratings may be wrong",
                version
            ),
            LoadWarning::DatabaseVersionUnknown {
                version,
                max_version,
            } => write!(
                f,
                "osu!.db version {} is newer than supported ({}), scanning folders instead",
                version, max_version
            ),
            LoadWarning::DatabaseMissing { path: Some(path) } => write!(
                f,
                "{} not found, scanning folders instead",
                path.display()
            ),
            LoadWarning::DatabaseMissing { path: None } => {
                write!(f, "No osu! folder configured, scanning folders instead")
            }
        }
    }
}

/// Everything a load produced
#[derive(Debug, Default)]
pub struct LoadOutput {
    pub scores: ScoreStore,
    pub score_summary: ScoreLoadSummary,
    pub stars: StarsCache,
    pub catalog: Catalog,
    pub collections: CollectionRegistry,
    /// Beatmaps still have to come from a folder scan
    pub needs_raw_scan: bool,
    /// Folder to scan, when known
    pub songs_folder: Option<PathBuf>,
    pub warnings: Vec<LoadWarning>,
    /// Version found in the `osu!.db` header
    pub db_version: Option<u32>,
}

/// Handle to a load running on its own thread
pub struct DatabaseLoader {
    handle: Option<JoinHandle<LoadOutput>>,
    control: Arc<LoadControl>,
}

impl DatabaseLoader {
    /// Spawn the worker thread
    pub fn start(config: Config, control: Arc<LoadControl>) -> Self {
        let worker_control = Arc::clone(&control);
        let handle = thread::spawn(move || run_load(&config, &worker_control));

        Self {
            handle: Some(handle),
            control,
        }
    }

    pub fn control(&self) -> &Arc<LoadControl> {
        &self.control
    }

    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().map_or(true, JoinHandle::is_finished)
    }

    /// Take the output once the worker is done, without blocking
    pub fn poll(&mut self) -> Option<LoadOutput> {
        if !self.is_finished() {
            return None;
        }
        self.handle.take().map(join_worker)
    }

    /// Block until the worker is done
    pub fn wait(mut self) -> LoadOutput {
        self.handle.take().map(join_worker).unwrap_or_default()
    }
}

fn join_worker(handle: JoinHandle<LoadOutput>) -> LoadOutput {
    handle.join().unwrap_or_else(|_| {
        tracing::error!("Database load thread panicked");
        LoadOutput::default()
    })
}

/// Run a complete load on the current thread
pub fn run_load(config: &Config, control: &LoadControl) -> LoadOutput {
    let start = Instant::now();
    let mut out = LoadOutput {
        songs_folder: config.resolve_songs_folder(),
        ..Default::default()
    };

    control.set_phase(LoadPhase::LoadScores);
    out.scores = ScoreStore::with_sort_method(config.scores.sort_method);
    if config.scores.enabled {
        let custom = config
            .scores
            .custom_enabled
            .then(|| config.custom_scores_path());
        let legacy = config
            .legacy_scores_path()
            .filter(|_| config.scores.legacy_enabled);
        out.score_summary = out.scores.load(custom.as_deref(), legacy.as_deref());
        if config.scores.save_immediately {
            out.scores.set_autosave(Some(config.custom_scores_path()));
        }
    }
    control.set_progress(SCORES_DONE);

    if control.is_cancelled() {
        return finish(out, control, start);
    }

    control.set_phase(LoadPhase::LoadStarsCache);
    if config.stars_cache_enabled {
        out.stars = StarsCache::load(config.stars_cache_path());
    }
    control.set_progress(STARS_DONE);

    if control.is_cancelled() {
        return finish(out, control, start);
    }

    control.set_phase(LoadPhase::LoadPrimaryDb);
    load_primary_db(config, control, &mut out);

    if control.is_cancelled() {
        return finish(out, control, start);
    }

    // A folder scan loads collections once the catalog is complete
    if !out.needs_raw_scan {
        out.collections = load_collections(config, &out.catalog);
    }

    finish(out, control, start)
}

/// Load legacy and custom collections, reporting entries missing from
/// `catalog` unless it is empty
pub fn load_collections(config: &Config, catalog: &Catalog) -> CollectionRegistry {
    let known = (!catalog.is_empty()).then(|| catalog.hashes());
    let legacy = config
        .legacy_collections_path()
        .filter(|_| config.collections.legacy_enabled);
    let custom = config
        .collections
        .custom_enabled
        .then(|| config.custom_collections_path());

    let mut collections = CollectionRegistry::new();
    collections.load(legacy.as_deref(), custom.as_deref(), known.as_ref());
    collections
}

fn finish(out: LoadOutput, control: &LoadControl, start: Instant) -> LoadOutput {
    if out.needs_raw_scan && !control.is_cancelled() {
        control.set_phase(LoadPhase::RawScan);
    } else {
        control.set_progress(1.0);
        control.set_phase(LoadPhase::Done);
    }

    tracing::info!(
        "Database load finished in {:?}: {} sets, {} difficulties, {} scores{}",
        start.elapsed(),
        out.catalog.set_count(),
        out.catalog.difficulty_count(),
        out.scores.score_count(),
        if out.needs_raw_scan { ", folder scan pending" } else { "" }
    );
    out
}

/// Parse `osu!.db` into the catalog, or flag the folder scan
fn load_primary_db(config: &Config, control: &LoadControl, out: &mut LoadOutput) {
    if !config.database.enabled {
        tracing::info!("osu!.db disabled, scanning folders");
        out.needs_raw_scan = true;
        return;
    }

    let path = config.osu_db_path();
    let Some(mut reader) = path.as_deref().map(DbReader::open).filter(|r| !r.is_empty()) else {
        tracing::warn!("No usable osu!.db, scanning folders");
        out.warnings.push(LoadWarning::DatabaseMissing { path });
        out.needs_raw_scan = true;
        return;
    };

    let header = OsuDbHeader::read(&mut reader);
    out.db_version = Some(header.version);
    tracing::info!(
        "osu!.db version {}, {} folders, {} records, player {:?}",
        header.version,
        header.folder_count,
        header.record_count,
        header.player_name
    );

    let max_version = config.database.max_version;
    match VersionStatus::classify(header.version, max_version) {
        VersionStatus::TooOld => {
            tracing::warn!("osu!.db version {} is too old, not loading beatmaps", header.version);
            out.warnings.push(LoadWarning::DatabaseTooOld {
                version: header.version,
                minimum: crate::catalog::osu_db::MIN_SUPPORTED_VERSION,
            });
            return;
        }
        VersionStatus::Unknown => {
            out.warnings.push(LoadWarning::DatabaseVersionUnknown {
                version: header.version,
                max_version,
            });
            if !config.database.ignore_version {
                tracing::warn!(
                    "osu!.db version {} is newer than {}, scanning folders",
                    header.version,
                    max_version
                );
                out.needs_raw_scan = true;
                return;
            }
            tracing::warn!("Loading osu!.db version {} anyway, this may fail", header.version);
        }
        VersionStatus::Outdated => {
            if !config.database.ignore_version_warnings {
                out.warnings.push(LoadWarning::DatabaseOutdated {
                    version: header.version,
                });
            }
        }
        VersionStatus::Supported => {}
    }

    let songs_folder = out.songs_folder.clone().unwrap_or_default();
    let stars = config.stars_cache_enabled.then_some(&out.stars);
    let difficulties = read_records(&mut reader, &header, &songs_folder, stars, control);
    group_into_catalog(difficulties, &mut out.catalog);
    control.set_progress(GROUPING_DONE);
}
