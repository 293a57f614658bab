//! CSV export of stored scores

use std::path::Path;

use serde::Serialize;

use crate::catalog::Catalog;
use crate::error::Result;
use crate::hash::Md5Hash;

use super::model::{FinishedScore, ScoreSource};
use super::store::ScoreStore;

/// One CSV row
#[derive(Serialize)]
struct ScoreRow<'a> {
    beatmap_md5: &'a str,
    beatmap_id: i32,
    beatmap_set_id: i32,
    imported_legacy: bool,
    version: u32,
    timestamp: u64,
    player_name: &'a str,
    count_300: u16,
    count_100: u16,
    count_50: u16,
    count_geki: u16,
    count_katu: u16,
    count_miss: u16,
    score: u64,
    max_combo: u16,
    perfect: bool,
    mods: u32,
    slider_breaks: u16,
    pp: f32,
    unstable_rate: f32,
    hit_error_avg_min: f32,
    hit_error_avg_max: f32,
    stars_total: f32,
    stars_aim: f32,
    stars_speed: f32,
    speed_multiplier: f32,
    circle_size: f32,
    approach_rate: f32,
    overall_difficulty: f32,
    hp_drain: f32,
    max_possible_combo: i32,
    num_hit_objects: i32,
    num_circles: i32,
    experimental_mods: &'a str,
}

impl<'a> ScoreRow<'a> {
    fn new(md5: &'a Md5Hash, ids: (i32, i32), s: &'a FinishedScore) -> Self {
        Self {
            beatmap_md5: md5.as_str(),
            beatmap_id: ids.0,
            beatmap_set_id: ids.1,
            imported_legacy: s.source == ScoreSource::ImportedLegacy,
            version: s.version,
            timestamp: s.timestamp,
            player_name: &s.player_name,
            count_300: s.count_300,
            count_100: s.count_100,
            count_50: s.count_50,
            count_geki: s.count_geki,
            count_katu: s.count_katu,
            count_miss: s.count_miss,
            score: s.score,
            max_combo: s.max_combo,
            perfect: s.perfect,
            mods: s.mods,
            slider_breaks: s.slider_breaks,
            pp: s.pp,
            unstable_rate: s.unstable_rate,
            hit_error_avg_min: s.hit_error_avg_min,
            hit_error_avg_max: s.hit_error_avg_max,
            stars_total: s.stars_total,
            stars_aim: s.stars_aim,
            stars_speed: s.stars_speed,
            speed_multiplier: s.speed_multiplier,
            circle_size: s.circle_size,
            approach_rate: s.approach_rate,
            overall_difficulty: s.overall_difficulty,
            hp_drain: s.hp_drain,
            max_possible_combo: s.max_possible_combo,
            num_hit_objects: s.num_hit_objects,
            num_circles: s.num_circles,
            experimental_mods: &s.experimental_mods,
        }
    }
}

impl ScoreStore {
    /// Write every non-legacy score to a CSV file, overwriting it.
    ///
    /// Beatmap ids are looked up in the catalog, -1 when unknown. Returns the
    /// number of rows written.
    pub fn export_csv(&self, path: &Path, catalog: &Catalog) -> Result<usize> {
        let mut beatmaps: Vec<_> = self.iter().collect();
        beatmaps.sort_by_key(|(md5, _)| **md5);

        let mut writer = csv::Writer::from_path(path)?;
        let mut rows = 0;
        for (md5, scores) in beatmaps {
            let ids = catalog
                .difficulty_by_md5(md5)
                .map(|d| (d.beatmap_id, d.set_id))
                .unwrap_or((-1, -1));

            for score in scores.iter().filter(|s| !s.is_legacy()) {
                writer.serialize(ScoreRow::new(md5, ids, score))?;
                rows += 1;
            }
        }
        writer.flush()?;

        tracing::info!("Exported {} scores to {}", rows, path.display());
        Ok(rows)
    }
}
