//! Folder scan fallback used when `osu!.db` is missing or unusable
//!
//! The scan runs in bounded time slices on the caller's thread: each call to
//! [`RawScanner::step`] reads whole beatmap folders until its budget is spent.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant, UNIX_EPOCH};

use md5::{Digest, Md5};
use rosu_map::section::difficulty::Difficulty;
use rosu_map::section::metadata::Metadata;
use rosu_map::section::timing_points::TimingPoints;
use rosu_map::DecodeBeatmap;
use walkdir::WalkDir;

use crate::beatmap::{set_id_from_folder_name, BeatmapDifficulty, GameMode, TimingPoint};
use crate::error::{Error, Result};
use crate::hash::Md5Hash;
use crate::loader::LoadControl;
use crate::stars::StarsCache;

use super::Catalog;

/// .NET ticks at the Unix epoch
const UNIX_EPOCH_TICKS: u64 = 621_355_968_000_000_000;

/// Incremental scanner over the immediate sub-folders of the songs folder
pub struct RawScanner {
    folders: Vec<PathBuf>,
    next: usize,
    seen: HashSet<PathBuf>,
    control: Arc<LoadControl>,
    progress_base: f32,
}

impl RawScanner {
    /// List the folders to scan, skipping any in `seen`.
    ///
    /// Progress reported by the scanner maps onto `progress_base..1.0`.
    pub fn new(
        songs_folder: &Path,
        seen: HashSet<PathBuf>,
        control: Arc<LoadControl>,
        progress_base: f32,
    ) -> Self {
        let folders: Vec<PathBuf> = WalkDir::new(songs_folder)
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_dir())
            .map(|e| e.into_path())
            .filter(|path| !seen.contains(path))
            .collect();

        tracing::info!(
            "Raw scan of {} found {} new folders",
            songs_folder.display(),
            folders.len()
        );

        Self {
            folders,
            next: 0,
            seen,
            control,
            progress_base: progress_base.clamp(0.0, 1.0),
        }
    }

    /// Folders left to scan
    pub fn pending(&self) -> usize {
        self.folders.len() - self.next
    }

    pub fn is_finished(&self) -> bool {
        self.next >= self.folders.len() || self.control.is_cancelled()
    }

    /// Every folder scanned so far, including those skipped at creation
    pub fn into_seen(self) -> HashSet<PathBuf> {
        self.seen
    }

    /// Scan folders into the catalog until `budget` is used up.
    ///
    /// At least one folder is processed per call. Returns true once the scan
    /// is complete or cancelled, at which point progress is 1.0.
    pub fn step(&mut self, catalog: &mut Catalog, stars: &StarsCache, budget: Duration) -> bool {
        let start = Instant::now();

        while self.next < self.folders.len() {
            if self.control.is_cancelled() {
                tracing::info!(
                    "Raw scan cancelled at folder {}/{}",
                    self.next,
                    self.folders.len()
                );
                break;
            }

            let folder = self.folders[self.next].clone();
            self.next += 1;

            let difficulties = scan_folder(&folder, stars);
            if let Some(first) = difficulties.first() {
                let set_id = first.set_id;
                catalog.add_set(set_id, folder.clone(), difficulties);
            }
            self.seen.insert(folder);

            let fraction = self.next as f32 / self.folders.len() as f32;
            self.control
                .set_progress(self.progress_base + (1.0 - self.progress_base) * fraction);

            if start.elapsed() >= budget {
                break;
            }
        }

        let finished = self.is_finished();
        if finished {
            self.control.set_progress(1.0);
        }
        finished
    }
}

/// Read every standard .osu file of one beatmap folder
pub fn scan_folder(folder: &Path, stars: &StarsCache) -> Vec<BeatmapDifficulty> {
    let mut difficulties: Vec<BeatmapDifficulty> = WalkDir::new(folder)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter(|e| {
            e.path()
                .extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case("osu"))
        })
        .filter_map(|e| match parse_osu_file(e.path()) {
            Ok(diff) if diff.mode == GameMode::Osu => Some(diff),
            Ok(_) => None,
            Err(err) => {
                tracing::debug!("{}", err);
                None
            }
        })
        .collect();

    let folder_name = folder
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let set_id = difficulties
        .iter()
        .map(|d| d.set_id)
        .find(|&id| id > 0)
        .unwrap_or_else(|| set_id_from_folder_name(&folder_name));

    for diff in &mut difficulties {
        diff.set_id = set_id;
        stars.apply(diff);
    }
    difficulties
}

fn modified_ticks(path: &Path) -> u64 {
    fs::metadata(path)
        .and_then(|m| m.modified())
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| UNIX_EPOCH_TICKS + d.as_secs() * 10_000_000)
        .unwrap_or(0)
}

/// Hit object tallies from the `[HitObjects]` section
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
struct HitObjectCounts {
    circles: u16,
    sliders: u16,
    spinners: u16,
    last_start_ms: u32,
}

const TYPE_CIRCLE: u32 = 1;
const TYPE_SLIDER: u32 = 1 << 1;
const TYPE_SPINNER: u32 = 1 << 3;

/// Count objects from the time and type fields of each line without
/// building curves.
fn count_hit_objects(content: &str) -> HitObjectCounts {
    let mut counts = HitObjectCounts::default();
    let mut in_section = false;

    for line in content.lines() {
        let line = line.trim();
        if line.starts_with('[') {
            in_section = line == "[HitObjects]";
            continue;
        }
        if !in_section || line.is_empty() || line.starts_with("//") {
            continue;
        }

        let mut fields = line.split(',').skip(2);
        let (Some(time), Some(kind)) = (fields.next(), fields.next()) else {
            continue;
        };
        let Ok(kind) = kind.trim().parse::<u32>() else {
            continue;
        };

        if kind & TYPE_CIRCLE != 0 {
            counts.circles = counts.circles.saturating_add(1);
        } else if kind & TYPE_SLIDER != 0 {
            counts.sliders = counts.sliders.saturating_add(1);
        } else if kind & TYPE_SPINNER != 0 {
            counts.spinners = counts.spinners.saturating_add(1);
        }

        if let Ok(time) = time.trim().parse::<f64>() {
            counts.last_start_ms = counts.last_start_ms.max(time.max(0.0) as u32);
        }
    }
    counts
}

fn decode_section<D: DecodeBeatmap>(path: &Path, content: &[u8]) -> Result<D> {
    rosu_map::from_bytes::<D>(content).map_err(|e| Error::BeatmapParse {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

/// Parse the metadata of a single .osu file into a difficulty.
///
/// Only the general, metadata, difficulty and timing sections are decoded.
pub fn parse_osu_file(path: &Path) -> Result<BeatmapDifficulty> {
    let content = fs::read(path)?;
    let timing: TimingPoints = decode_section(path, &content)?;
    let metadata: Metadata = decode_section(path, &content)?;
    let difficulty: Difficulty = decode_section(path, &content)?;
    let objects = count_hit_objects(&String::from_utf8_lossy(&content));

    let mode = match timing.mode {
        rosu_map::section::general::GameMode::Osu => GameMode::Osu,
        rosu_map::section::general::GameMode::Taiko => GameMode::Taiko,
        rosu_map::section::general::GameMode::Catch => GameMode::Catch,
        rosu_map::section::general::GameMode::Mania => GameMode::Mania,
    };

    let timing_points = timing
        .control_points
        .timing_points
        .iter()
        .map(|tp| TimingPoint {
            ms_per_beat: tp.beat_len,
            offset: tp.time,
            uninherited: true,
        })
        .collect();

    let folder = path.parent().map(Path::to_path_buf).unwrap_or_default();
    let osu_file = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    Ok(BeatmapDifficulty {
        md5: Md5Hash::from(format!("{:x}", Md5::digest(&content)).as_str()),
        title: metadata.title.trim().to_string(),
        title_unicode: metadata.title_unicode,
        artist: metadata.artist.trim().to_string(),
        artist_unicode: metadata.artist_unicode,
        creator: metadata.creator.trim().to_string(),
        difficulty_name: metadata.version.trim().to_string(),
        source: metadata.source.trim().to_string(),
        tags: metadata.tags.trim().to_string(),
        audio_file: timing.audio_file,
        osu_file,
        folder,
        beatmap_id: metadata.beatmap_id,
        set_id: metadata.beatmap_set_id,
        mode,
        circles: objects.circles,
        sliders: objects.sliders,
        spinners: objects.spinners,
        last_modified: modified_ticks(path),
        approach_rate: difficulty.approach_rate,
        circle_size: difficulty.circle_size,
        hp_drain: difficulty.hp_drain_rate,
        overall_difficulty: difficulty.overall_difficulty,
        slider_multiplier: difficulty.slider_multiplier,
        stack_leniency: timing.stack_leniency,
        length_ms: objects.last_start_ms,
        preview_time: timing.preview_time,
        timing_points,
        ..Default::default()
    })
}
