//! Beatmap data structures and types

mod bpm;

pub use bpm::BpmInfo;

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::hash::Md5Hash;

/// Represents a game mode in osu!
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum GameMode {
    #[default]
    Osu = 0,
    Taiko = 1,
    Catch = 2,
    Mania = 3,
}

impl GameMode {
    /// Strict conversion, unknown values are rejected
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Osu),
            1 => Some(Self::Taiko),
            2 => Some(Self::Catch),
            3 => Some(Self::Mania),
            _ => None,
        }
    }
}

impl std::fmt::Display for GameMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Osu => write!(f, "osu!"),
            Self::Taiko => write!(f, "osu!taiko"),
            Self::Catch => write!(f, "osu!catch"),
            Self::Mania => write!(f, "osu!mania"),
        }
    }
}

/// A timing point as stored in osu!.db
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct TimingPoint {
    /// Beat length in ms, negative for inherited (slider velocity) points
    pub ms_per_beat: f64,
    pub offset: f64,
    pub uninherited: bool,
}

impl TimingPoint {
    pub fn is_inherited(&self) -> bool {
        self.ms_per_beat < 0.0
    }
}

/// One playable chart
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BeatmapDifficulty {
    pub md5: Md5Hash,
    pub title: String,
    pub title_unicode: String,
    pub artist: String,
    pub artist_unicode: String,
    pub creator: String,
    /// Difficulty name ("Version" in .osu files)
    pub difficulty_name: String,
    pub source: String,
    pub tags: String,
    pub audio_file: String,
    /// .osu file name inside `folder`
    pub osu_file: String,
    /// Absolute beatmap folder
    pub folder: PathBuf,
    pub beatmap_id: i32,
    pub set_id: i32,
    pub mode: GameMode,
    pub ranked_status: u8,
    pub circles: u16,
    pub sliders: u16,
    pub spinners: u16,
    /// Windows ticks of the last .osu modification
    pub last_modified: u64,
    pub approach_rate: f32,
    pub circle_size: f32,
    pub hp_drain: f32,
    pub overall_difficulty: f32,
    pub slider_multiplier: f64,
    pub stack_leniency: f32,
    /// Nomod star rating
    pub stars: f32,
    pub bpm: BpmInfo,
    pub length_ms: u32,
    pub preview_time: i32,
    pub local_offset: i16,
    pub online_offset: i16,
    pub timing_points: Vec<TimingPoint>,
}

impl BeatmapDifficulty {
    /// Full path to the .osu file
    pub fn osu_file_path(&self) -> PathBuf {
        self.folder.join(&self.osu_file)
    }

    /// Full path to the audio file
    pub fn audio_path(&self) -> PathBuf {
        self.folder.join(&self.audio_file)
    }

    pub fn object_count(&self) -> u32 {
        self.circles as u32 + self.sliders as u32 + self.spinners as u32
    }

    /// Key used to group difficulties that have no usable set id
    pub fn grouping_key(&self) -> String {
        format!(
            "{}|{}|{}",
            self.title.trim().to_lowercase(),
            self.artist.trim().to_lowercase(),
            self.creator.trim().to_lowercase()
        )
    }

    /// Entries with no metadata and no hash are leftovers of broken imports
    pub fn is_corrupt(&self) -> bool {
        self.artist.is_empty()
            && self.title.is_empty()
            && self.creator.is_empty()
            && self.difficulty_name.is_empty()
            && self.md5.is_empty()
    }
}

/// Index of a difficulty inside its catalog
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DifficultyId(pub(crate) usize);

impl DifficultyId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// A song with one or more difficulties
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BeatmapSet {
    /// Online set id, -1 when unknown
    pub set_id: i32,
    pub folder: PathBuf,
    /// Never empty for sets owned by a catalog
    pub difficulties: Vec<DifficultyId>,
}

/// Parse the set id from a folder name like `"123456 Artist - Title"`.
///
/// Only the first backslash separated component is considered, since
/// osu!.db stores Windows paths. Returns -1 when there is no leading number.
pub fn set_id_from_folder_name(folder: &str) -> i32 {
    folder
        .split('\\')
        .next()
        .and_then(|component| component.split(' ').next())
        .and_then(|token| token.parse::<i32>().ok())
        .unwrap_or(-1)
}
