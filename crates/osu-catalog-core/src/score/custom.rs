//! Custom score file (`scores.db` in the data folder)
//!
//! Optional trailing fields are gated on the version each score was recorded
//! with, so old rows stay readable as the format grows.

use std::collections::HashMap;
use std::io::Read;
use std::path::Path;

use crate::binary::{DbReader, DbWriter};
use crate::error::Result;
use crate::hash::{Md5Hash, MD5_LEN};

use super::model::{FinishedScore, ScoreSource};

/// Current custom score file version
pub const SCORES_DB_VERSION: u32 = 20241019;

/// Scores newer than this carry max possible combo and object counts
const MAX_COMBO_FIELDS_AFTER: u32 = 20180722;

/// Scores newer than this can carry the imported-legacy marker
const IMPORTED_MARKER_AFTER: u32 = 20190103;

/// The only file version storing the imported-legacy marker as its own byte
const IMPORTED_BYTE_DB_VERSION: u32 = 20210103;

/// First score version with online id and server
const ONLINE_ID_VERSION: u32 = 20240412;

/// First score version storing the online id as 64 bits
const ONLINE_ID_I64_VERSION: u32 = 20241019;

/// Gamemode byte value marking an imported legacy score
const IMPORTED_LEGACY_MARKER: u8 = 0xA9;

/// Scores decoded from a custom score file
#[derive(Debug, Default)]
pub struct CustomScoreFile {
    pub version: u32,
    pub file_size: u64,
    pub scores: Vec<FinishedScore>,
}

fn read_score<R: Read>(reader: &mut DbReader<R>, db_version: u32) -> Option<FinishedScore> {
    let gamemode = reader.read_u8();
    let version = reader.read_u32();
    let marker_in_gamemode = db_version > IMPORTED_BYTE_DB_VERSION && version > IMPORTED_MARKER_AFTER;

    let mut imported = false;
    if db_version == IMPORTED_BYTE_DB_VERSION && version > IMPORTED_MARKER_AFTER {
        imported = reader.read_bool();
    } else if marker_in_gamemode {
        imported = gamemode & IMPORTED_LEGACY_MARKER != 0;
    }

    let mut score = FinishedScore {
        version,
        timestamp: reader.read_u64(),
        player_name: reader.read_string(),
        count_300: reader.read_u16(),
        count_100: reader.read_u16(),
        count_50: reader.read_u16(),
        count_geki: reader.read_u16(),
        count_katu: reader.read_u16(),
        count_miss: reader.read_u16(),
        score: reader.read_i64().max(0) as u64,
        max_combo: reader.read_u16(),
        mods: reader.read_u32(),
        slider_breaks: reader.read_u16(),
        pp: reader.read_f32(),
        unstable_rate: reader.read_f32(),
        hit_error_avg_min: reader.read_f32(),
        hit_error_avg_max: reader.read_f32(),
        stars_total: reader.read_f32(),
        stars_aim: reader.read_f32(),
        stars_speed: reader.read_f32(),
        speed_multiplier: reader.read_f32(),
        circle_size: reader.read_f32(),
        approach_rate: reader.read_f32(),
        overall_difficulty: reader.read_f32(),
        hp_drain: reader.read_f32(),
        source: if imported {
            ScoreSource::ImportedLegacy
        } else {
            ScoreSource::Custom
        },
        ..Default::default()
    };

    if version > MAX_COMBO_FIELDS_AFTER {
        score.max_possible_combo = reader.read_i32();
        score.num_hit_objects = reader.read_i32();
        score.num_circles = reader.read_i32();
        score.perfect =
            score.max_possible_combo > 0 && score.max_combo as i32 >= score.max_possible_combo;
    }

    if version >= ONLINE_ID_I64_VERSION {
        score.online_score_id = reader.read_i64();
        score.server = reader.read_string();
    } else if version >= ONLINE_ID_VERSION {
        score.online_score_id = reader.read_i32() as i64;
        score.server = reader.read_string();
    }

    score.experimental_mods = reader.read_string();

    (gamemode == 0 || marker_in_gamemode).then_some(score)
}

fn write_score(writer: &mut DbWriter, score: &FinishedScore) {
    let gamemode = if score.version > IMPORTED_MARKER_AFTER
        && score.source == ScoreSource::ImportedLegacy
    {
        IMPORTED_LEGACY_MARKER
    } else {
        0
    };

    writer.write_u8(gamemode);
    writer.write_u32(score.version);
    writer.write_u64(score.timestamp);
    writer.write_string(&score.player_name);
    writer.write_u16(score.count_300);
    writer.write_u16(score.count_100);
    writer.write_u16(score.count_50);
    writer.write_u16(score.count_geki);
    writer.write_u16(score.count_katu);
    writer.write_u16(score.count_miss);
    writer.write_i64(score.score.min(i64::MAX as u64) as i64);
    writer.write_u16(score.max_combo);
    writer.write_u32(score.mods);
    writer.write_u16(score.slider_breaks);
    for value in [
        score.pp,
        score.unstable_rate,
        score.hit_error_avg_min,
        score.hit_error_avg_max,
        score.stars_total,
        score.stars_aim,
        score.stars_speed,
        score.speed_multiplier,
        score.circle_size,
        score.approach_rate,
        score.overall_difficulty,
        score.hp_drain,
    ] {
        writer.write_f32(value);
    }

    if score.version > MAX_COMBO_FIELDS_AFTER {
        writer.write_i32(score.max_possible_combo);
        writer.write_i32(score.num_hit_objects);
        writer.write_i32(score.num_circles);
    }

    if score.version >= ONLINE_ID_I64_VERSION {
        writer.write_i64(score.online_score_id);
        writer.write_string(&score.server);
    } else if score.version >= ONLINE_ID_VERSION {
        writer.write_i32(score.online_score_id as i32);
        writer.write_string(&score.server);
    }

    writer.write_string(&score.experimental_mods);
}

/// Load the custom score file. Missing or too new files yield no scores.
pub fn read_custom_scores<P: AsRef<Path>>(path: P) -> CustomScoreFile {
    let path = path.as_ref();
    let mut reader = DbReader::open(path);
    let mut file = CustomScoreFile {
        file_size: reader.total_size(),
        ..Default::default()
    };

    if reader.is_empty() {
        tracing::debug!("No custom scores at {}", path.display());
        return file;
    }

    file.version = reader.read_u32();
    let beatmap_count = reader.read_u32();
    tracing::debug!(
        "Custom scores: version = {}, beatmaps = {}",
        file.version,
        beatmap_count
    );

    if file.version > SCORES_DB_VERSION {
        tracing::warn!(
            "{} has version {}, newer than supported ({}), ignoring it",
            path.display(),
            file.version,
            SCORES_DB_VERSION
        );
        return file;
    }

    for _ in 0..beatmap_count {
        if reader.is_dead() {
            break;
        }

        let (md5, declared) = reader.read_hash_with_len();
        if declared > MD5_LEN {
            tracing::warn!("Corrupt score entry in {}, stopping", path.display());
            break;
        }

        let score_count = reader.read_u32();
        let valid_hash = declared == MD5_LEN;
        if !valid_hash {
            tracing::debug!("Dropping {} scores with hash length {}", score_count, declared);
        }

        for _ in 0..score_count {
            if reader.is_dead() {
                break;
            }
            if let Some(mut score) = read_score(&mut reader, file.version) {
                if valid_hash && !reader.is_dead() {
                    score.beatmap_md5 = md5;
                    file.scores.push(score);
                }
            }
        }
    }

    file
}

/// Rewrite the custom score file with every non-legacy score.
///
/// Beatmaps are written in hash order. Returns the number of beatmaps written.
pub fn write_custom_scores<P: AsRef<Path>>(
    path: P,
    scores: &HashMap<Md5Hash, Vec<FinishedScore>>,
) -> Result<usize> {
    let mut beatmaps: Vec<(&Md5Hash, Vec<&FinishedScore>)> = scores
        .iter()
        .map(|(md5, list)| (md5, list.iter().filter(|s| !s.is_legacy()).collect::<Vec<_>>()))
        .filter(|(_, list)| !list.is_empty())
        .collect();
    beatmaps.sort_by_key(|(md5, _)| **md5);

    let mut writer = DbWriter::create(path.as_ref());
    writer.write_u32(SCORES_DB_VERSION);
    writer.write_u32(beatmaps.len() as u32);
    for (md5, list) in &beatmaps {
        writer.write_hash(md5);
        writer.write_u32(list.len() as u32);
        for score in list {
            write_score(&mut writer, score);
        }
    }
    writer.finish()?;

    Ok(beatmaps.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const HASH: &str = "0123456789abcdef0123456789abcdef";

    fn sample(version: u32, source: ScoreSource) -> FinishedScore {
        FinishedScore {
            beatmap_md5: Md5Hash::from(HASH),
            version,
            timestamp: 1_700_000_000,
            player_name: "peppy".to_string(),
            count_300: 300,
            count_100: 3,
            count_miss: 1,
            score: 1_234_567,
            max_combo: 450,
            mods: 72,
            pp: 321.5,
            max_possible_combo: 500,
            num_hit_objects: 304,
            num_circles: 200,
            online_score_id: 99,
            server: "ppy.sh".to_string(),
            experimental_mods: "fposu".to_string(),
            source,
            ..Default::default()
        }
    }

    fn write_one(dir: &TempDir, score: FinishedScore) -> std::path::PathBuf {
        let path = dir.path().join("scores.db");
        let mut map = HashMap::new();
        map.insert(score.beatmap_md5, vec![score]);
        write_custom_scores(&path, &map).unwrap();
        path
    }

    #[test]
    fn test_current_version_round_trip() {
        let dir = TempDir::new().unwrap();
        let original = sample(SCORES_DB_VERSION, ScoreSource::Custom);
        let path = write_one(&dir, original.clone());

        let file = read_custom_scores(&path);
        assert_eq!(file.version, SCORES_DB_VERSION);
        assert_eq!(file.scores.len(), 1);
        let loaded = &file.scores[0];
        assert_eq!(loaded.score, original.score);
        assert_eq!(loaded.online_score_id, 99);
        assert_eq!(loaded.server, "ppy.sh");
        assert_eq!(loaded.experimental_mods, "fposu");
        assert!(!loaded.perfect);
    }

    #[test]
    fn test_online_id_width_follows_score_version() {
        let dir = TempDir::new().unwrap();
        let wide = FinishedScore {
            online_score_id: 123_456_789_012,
            ..sample(SCORES_DB_VERSION, ScoreSource::Custom)
        };
        let path = write_one(&dir, wide);
        assert_eq!(read_custom_scores(&path).scores[0].online_score_id, 123_456_789_012);

        let narrow = FinishedScore {
            online_score_id: 4321,
            ..sample(20240412, ScoreSource::Custom)
        };
        let path = write_one(&dir, narrow);
        let loaded = &read_custom_scores(&path).scores[0];
        assert_eq!(loaded.version, 20240412);
        assert_eq!(loaded.online_score_id, 4321);
        assert_eq!(loaded.server, "ppy.sh");
        assert_eq!(loaded.experimental_mods, "fposu");
    }

    #[test]
    fn test_old_score_omits_newer_fields() {
        let dir = TempDir::new().unwrap();
        let path = write_one(&dir, sample(20180101, ScoreSource::Custom));

        let file = read_custom_scores(&path);
        let loaded = &file.scores[0];
        assert_eq!(loaded.version, 20180101);
        assert_eq!(loaded.max_possible_combo, -1);
        assert_eq!(loaded.online_score_id, 0);
        assert!(loaded.server.is_empty());
        assert_eq!(loaded.experimental_mods, "fposu");
    }

    #[test]
    fn test_imported_marker_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = write_one(&dir, sample(SCORES_DB_VERSION, ScoreSource::ImportedLegacy));

        let file = read_custom_scores(&path);
        assert_eq!(file.scores[0].source, ScoreSource::ImportedLegacy);
    }

    #[test]
    fn test_legacy_scores_are_not_written() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("scores.db");
        let mut map = HashMap::new();
        map.insert(
            Md5Hash::from(HASH),
            vec![sample(20150101, ScoreSource::Legacy)],
        );

        assert_eq!(write_custom_scores(&path, &map).unwrap(), 0);
        assert!(read_custom_scores(&path).scores.is_empty());
    }

    #[test]
    fn test_newer_file_is_ignored() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("scores.db");
        let mut writer = DbWriter::create(&path);
        writer.write_u32(SCORES_DB_VERSION + 1);
        writer.write_u32(0);
        writer.finish().unwrap();

        let file = read_custom_scores(&path);
        assert!(file.scores.is_empty());
        assert_eq!(file.version, SCORES_DB_VERSION + 1);
    }

    #[test]
    fn test_short_hash_scores_are_consumed_and_dropped() {
        let mut writer = DbWriter::in_memory();
        writer.write_u32(SCORES_DB_VERSION);
        writer.write_u32(2);
        writer.write_string("short");
        writer.write_u32(1);
        write_score(&mut writer, &sample(SCORES_DB_VERSION, ScoreSource::Custom));
        writer.write_hash(&Md5Hash::from(HASH));
        writer.write_u32(1);
        write_score(&mut writer, &sample(SCORES_DB_VERSION, ScoreSource::Custom));

        let dir = TempDir::new().unwrap();
        let path = dir.path().join("scores.db");
        std::fs::write(&path, writer.into_bytes()).unwrap();

        let file = read_custom_scores(&path);
        assert_eq!(file.scores.len(), 1);
        assert_eq!(file.scores[0].beatmap_md5, Md5Hash::from(HASH));
    }

    #[test]
    fn test_oversized_hash_stops_load() {
        let mut writer = DbWriter::in_memory();
        writer.write_u32(SCORES_DB_VERSION);
        writer.write_u32(2);
        writer.write_hash(&Md5Hash::from(HASH));
        writer.write_u32(1);
        write_score(&mut writer, &sample(SCORES_DB_VERSION, ScoreSource::Custom));
        writer.write_string(&format!("{}extra", HASH));
        writer.write_u32(1);
        write_score(&mut writer, &sample(SCORES_DB_VERSION, ScoreSource::Custom));

        let dir = TempDir::new().unwrap();
        let path = dir.path().join("scores.db");
        std::fs::write(&path, writer.into_bytes()).unwrap();

        assert_eq!(read_custom_scores(&path).scores.len(), 1);
    }

    #[test]
    fn test_imported_byte_layout() {
        let mut writer = DbWriter::in_memory();
        writer.write_u32(IMPORTED_BYTE_DB_VERSION);
        writer.write_u32(1);
        writer.write_hash(&Md5Hash::from(HASH));
        writer.write_u32(1);
        // gamemode, version, imported flag byte, then the common fields
        writer.write_u8(0);
        writer.write_u32(20200101);
        writer.write_bool(true);
        writer.write_u64(42);
        writer.write_string("player");
        for _ in 0..6 {
            writer.write_u16(1);
        }
        writer.write_i64(1000);
        writer.write_u16(10);
        writer.write_u32(0);
        writer.write_u16(0);
        for _ in 0..12 {
            writer.write_f32(1.0);
        }
        for _ in 0..3 {
            writer.write_i32(10);
        }
        writer.write_string("");

        let dir = TempDir::new().unwrap();
        let path = dir.path().join("scores.db");
        std::fs::write(&path, writer.into_bytes()).unwrap();

        let file = read_custom_scores(&path);
        assert_eq!(file.scores.len(), 1);
        assert_eq!(file.scores[0].source, ScoreSource::ImportedLegacy);
        assert_eq!(file.scores[0].timestamp, 42);
        assert!(file.scores[0].perfect);
    }
}
