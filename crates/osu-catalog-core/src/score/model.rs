//! Score record and mod flags

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::beatmap::GameMode;
use crate::hash::Md5Hash;

/// Legacy mod bit flags as stored in score files
pub mod mods {
    pub const NO_FAIL: u32 = 1;
    pub const EASY: u32 = 1 << 1;
    pub const TOUCH_DEVICE: u32 = 1 << 2;
    pub const HIDDEN: u32 = 1 << 3;
    pub const HARD_ROCK: u32 = 1 << 4;
    pub const SUDDEN_DEATH: u32 = 1 << 5;
    pub const DOUBLE_TIME: u32 = 1 << 6;
    pub const RELAX: u32 = 1 << 7;
    pub const HALF_TIME: u32 = 1 << 8;
    pub const NIGHTCORE: u32 = 1 << 9;
    pub const FLASHLIGHT: u32 = 1 << 10;
    pub const AUTOPLAY: u32 = 1 << 11;
    pub const SPUN_OUT: u32 = 1 << 12;
    pub const AUTOPILOT: u32 = 1 << 13;
    pub const PERFECT: u32 = 1 << 14;
    pub const TARGET: u32 = 1 << 23;
    pub const SCORE_V2: u32 = 1 << 29;

    /// Playback rate implied by the rate-changing mods
    pub fn speed_multiplier(mods: u32) -> f32 {
        if mods & HALF_TIME != 0 {
            0.75
        } else if mods & (DOUBLE_TIME | NIGHTCORE) != 0 {
            1.5
        } else {
            1.0
        }
    }
}

/// Where a score came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ScoreSource {
    /// Set in this client and stored in the custom score file
    #[default]
    Custom,
    /// Copied from the osu!stable score file into the custom one
    ImportedLegacy,
    /// Read from the osu!stable score file, never written back
    Legacy,
}

/// One completed play
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinishedScore {
    pub beatmap_md5: Md5Hash,
    pub mode: GameMode,
    /// Schema version the score was recorded with
    pub version: u32,
    /// Seconds since the Unix epoch
    pub timestamp: u64,
    pub player_name: String,
    pub count_300: u16,
    pub count_100: u16,
    pub count_50: u16,
    pub count_geki: u16,
    pub count_katu: u16,
    pub count_miss: u16,
    pub score: u64,
    pub max_combo: u16,
    pub perfect: bool,
    pub mods: u32,
    pub slider_breaks: u16,
    pub pp: f32,
    pub unstable_rate: f32,
    pub hit_error_avg_min: f32,
    pub hit_error_avg_max: f32,
    pub stars_total: f32,
    pub stars_aim: f32,
    pub stars_speed: f32,
    pub speed_multiplier: f32,
    pub circle_size: f32,
    pub approach_rate: f32,
    pub overall_difficulty: f32,
    pub hp_drain: f32,
    /// -1 when the score predates the field
    pub max_possible_combo: i32,
    pub num_hit_objects: i32,
    pub num_circles: i32,
    pub online_score_id: i64,
    pub server: String,
    pub experimental_mods: String,
    pub source: ScoreSource,
    /// Raw replay timestamp for legacy scores
    pub legacy_replay_timestamp: u64,
    /// Insertion counter, only used to break ties
    #[serde(skip)]
    pub sort_hack: u64,
}

impl Default for FinishedScore {
    fn default() -> Self {
        Self {
            beatmap_md5: Md5Hash::default(),
            mode: GameMode::Osu,
            version: super::custom::SCORES_DB_VERSION,
            timestamp: 0,
            player_name: String::new(),
            count_300: 0,
            count_100: 0,
            count_50: 0,
            count_geki: 0,
            count_katu: 0,
            count_miss: 0,
            score: 0,
            max_combo: 0,
            perfect: false,
            mods: 0,
            slider_breaks: 0,
            pp: 0.0,
            unstable_rate: 0.0,
            hit_error_avg_min: 0.0,
            hit_error_avg_max: 0.0,
            stars_total: 0.0,
            stars_aim: 0.0,
            stars_speed: 0.0,
            speed_multiplier: 1.0,
            circle_size: 0.0,
            approach_rate: 0.0,
            overall_difficulty: 0.0,
            hp_drain: 0.0,
            max_possible_combo: -1,
            num_hit_objects: -1,
            num_circles: -1,
            online_score_id: 0,
            server: String::new(),
            experimental_mods: String::new(),
            source: ScoreSource::Custom,
            legacy_replay_timestamp: 0,
            sort_hack: 0,
        }
    }
}

/// Hit accuracy in `0.0..=1.0`, zero when nothing was hit or missed
pub fn calculate_accuracy(n300: u16, n100: u16, n50: u16, misses: u16) -> f32 {
    let total = n300 as u32 + n100 as u32 + n50 as u32 + misses as u32;
    if total == 0 {
        return 0.0;
    }

    let points = 300 * n300 as u32 + 100 * n100 as u32 + 50 * n50 as u32;
    points as f32 / (300 * total) as f32
}

impl FinishedScore {
    pub fn is_legacy(&self) -> bool {
        self.source == ScoreSource::Legacy
    }

    pub fn accuracy(&self) -> f32 {
        calculate_accuracy(self.count_300, self.count_100, self.count_50, self.count_miss)
    }

    pub fn has_mod(&self, flag: u32) -> bool {
        self.mods & flag != 0
    }

    pub fn played_at(&self) -> Option<DateTime<Utc>> {
        i64::try_from(self.timestamp)
            .ok()
            .and_then(|secs| Utc.timestamp_opt(secs, 0).single())
    }

    /// Whether this legacy score was already imported as `imported`
    pub fn is_same_legacy_play(&self, imported: &FinishedScore) -> bool {
        self.is_legacy()
            && imported.source == ScoreSource::ImportedLegacy
            && self.score == imported.score
            && self.timestamp == imported.timestamp
            && self.max_combo == imported.max_combo
            && self.mods == imported.mods
            && self.count_300 == imported.count_300
            && self.count_100 == imported.count_100
            && self.count_50 == imported.count_50
            && self.count_geki == imported.count_geki
            && self.count_katu == imported.count_katu
            && self.count_miss == imported.count_miss
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accuracy() {
        assert_eq!(calculate_accuracy(0, 0, 0, 0), 0.0);
        assert_eq!(calculate_accuracy(10, 0, 0, 0), 1.0);
        let acc = calculate_accuracy(2, 1, 1, 1);
        assert!((acc - 750.0 / 1500.0).abs() < 1e-6);
    }

    #[test]
    fn test_speed_multiplier() {
        assert_eq!(mods::speed_multiplier(0), 1.0);
        assert_eq!(mods::speed_multiplier(mods::HALF_TIME), 0.75);
        assert_eq!(mods::speed_multiplier(mods::DOUBLE_TIME), 1.5);
        assert_eq!(mods::speed_multiplier(mods::NIGHTCORE | mods::DOUBLE_TIME), 1.5);
    }

    #[test]
    fn test_played_at() {
        let score = FinishedScore {
            timestamp: 1_700_000_000,
            ..Default::default()
        };
        assert_eq!(score.played_at().unwrap().timestamp(), 1_700_000_000);
    }

    #[test]
    fn test_same_legacy_play() {
        let legacy = FinishedScore {
            score: 1000,
            timestamp: 5,
            source: ScoreSource::Legacy,
            ..Default::default()
        };
        let mut imported = FinishedScore {
            source: ScoreSource::ImportedLegacy,
            player_name: "someone else".to_string(),
            ..legacy.clone()
        };
        assert!(legacy.is_same_legacy_play(&imported));

        imported.count_miss = 1;
        assert!(!legacy.is_same_legacy_play(&imported));

        let custom = FinishedScore {
            source: ScoreSource::Custom,
            ..legacy.clone()
        };
        assert!(!legacy.is_same_legacy_play(&custom));
    }
}
