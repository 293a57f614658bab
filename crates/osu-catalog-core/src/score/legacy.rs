//! Read-only decoder for the osu!stable score file (`scores.db`)

use std::io::Read;
use std::path::Path;

use crate::beatmap::GameMode;
use crate::binary::DbReader;
use crate::hash::MD5_LEN;

use super::model::{mods, FinishedScore, ScoreSource};

/// .NET ticks at the Unix epoch
const UNIX_EPOCH_TICKS: u64 = 621_355_968_000_000_000;

/// .NET ticks at the epoch used for replay file names
const REPLAY_EPOCH_TICKS: u64 = 504_911_232_000_000_000;

const TICKS_PER_SECOND: u64 = 10_000_000;

/// First score version with a 64-bit online id
const ONLINE_ID_I64_VERSION: u32 = 20140721;

/// First score version with any online id
const ONLINE_ID_I32_VERSION: u32 = 20121008;

const LEGACY_SERVER: &str = "ppy.sh";

/// Scores decoded from an osu!stable score file
#[derive(Debug, Default)]
pub struct LegacyScoreFile {
    pub version: u32,
    pub file_size: u64,
    /// Submitted standard mode scores only
    pub scores: Vec<FinishedScore>,
}

/// Convert .NET ticks to Unix seconds, saturating at zero
pub fn ticks_to_unix(ticks: u64) -> u64 {
    ticks.saturating_sub(UNIX_EPOCH_TICKS) / TICKS_PER_SECOND
}

/// Returns the score and its raw game mode byte
fn read_score<R: Read>(reader: &mut DbReader<R>) -> (FinishedScore, u8) {
    let mode = reader.read_u8();
    let version = reader.read_u32();
    reader.skip_string(); // beatmap hash
    let player_name = reader.read_string();
    reader.skip_string(); // replay hash

    let mut score = FinishedScore {
        version,
        player_name,
        count_300: reader.read_u16(),
        count_100: reader.read_u16(),
        count_50: reader.read_u16(),
        count_geki: reader.read_u16(),
        count_katu: reader.read_u16(),
        count_miss: reader.read_u16(),
        score: reader.read_i32().max(0) as u64,
        max_combo: reader.read_u16(),
        perfect: reader.read_bool(),
        mods: reader.read_u32(),
        server: LEGACY_SERVER.to_string(),
        source: ScoreSource::Legacy,
        ..Default::default()
    };
    score.speed_multiplier = mods::speed_multiplier(score.mods);

    reader.skip_string(); // life bar graph

    let ticks = reader.read_u64();
    score.timestamp = ticks_to_unix(ticks);
    score.legacy_replay_timestamp = ticks.saturating_sub(REPLAY_EPOCH_TICKS);

    let replay_size = reader.read_i32();
    if replay_size > 0 {
        reader.skip_bytes(replay_size as u64);
    }

    if version >= ONLINE_ID_I64_VERSION {
        score.online_score_id = reader.read_i64();
    } else if version >= ONLINE_ID_I32_VERSION {
        score.online_score_id = reader.read_i32() as i64;
    }

    if score.has_mod(mods::TARGET) {
        reader.read_f64(); // target practice accuracy
    }

    (score, mode)
}

/// Load submitted standard mode scores from an osu!stable score file.
///
/// Scores without an online id were never submitted and are skipped.
pub fn read_legacy_scores<P: AsRef<Path>>(path: P) -> LegacyScoreFile {
    let path = path.as_ref();
    let mut reader = DbReader::open(path);
    let mut file = LegacyScoreFile {
        file_size: reader.total_size(),
        ..Default::default()
    };

    if reader.is_empty() {
        tracing::debug!("No legacy scores at {}", path.display());
        return file;
    }

    file.version = reader.read_u32();
    let beatmap_count = reader.read_u32();
    tracing::debug!(
        "Legacy scores: version = {}, beatmaps = {}",
        file.version,
        beatmap_count
    );

    let mut unsubmitted = 0;
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

        for _ in 0..score_count {
            if reader.is_dead() {
                break;
            }

            let (mut score, mode) = read_score(&mut reader);
            if reader.is_dead() || !valid_hash || mode != GameMode::Osu as u8 {
                continue;
            }
            if score.online_score_id == 0 {
                unsubmitted += 1;
                continue;
            }
            score.beatmap_md5 = md5;
            file.scores.push(score);
        }
    }

    if unsubmitted > 0 {
        tracing::debug!("Skipped {} legacy scores without an online id", unsubmitted);
    }
    file
}
