//! Decoder for the osu!stable beatmap database (`osu!.db`)

use std::io::Read;
use std::path::Path;

use crate::beatmap::{set_id_from_folder_name, BeatmapDifficulty, GameMode, TimingPoint};
use crate::binary::DbReader;
use crate::loader::LoadControl;
use crate::stars::StarsCache;

/// Databases older than this are rejected
pub const MIN_SUPPORTED_VERSION: u32 = 20170222;

/// Databases older than this still load but carry outdated star ratings
pub const OUTDATED_BELOW_VERSION: u32 = 20190207;

/// Newest layout known to decode correctly
pub const DEFAULT_MAX_VERSION: u32 = 20250702;

/// Last version with a per-record size prefix
const ENTRY_SIZE_REMOVED_VERSION: u32 = 20191107;

/// First version with f32 difficulty settings and star rating blocks
const FLOAT_SETTINGS_VERSION: u32 = 20140609;

/// First version storing star ratings as f32
const FLOAT_STARS_VERSION: u32 = 20250108;

/// Progress range covered by record decoding
const RECORD_PROGRESS_START: f32 = 0.24;
const RECORD_PROGRESS_SPAN: f32 = 0.5;

/// Fixed header at the start of `osu!.db`
#[derive(Debug, Clone, Default)]
pub struct OsuDbHeader {
    pub version: u32,
    pub folder_count: u32,
    pub account_unlocked: bool,
    pub unlock_date: u64,
    pub player_name: String,
    pub record_count: u32,
}

impl OsuDbHeader {
    pub fn read<R: Read>(reader: &mut DbReader<R>) -> Self {
        Self {
            version: reader.read_u32(),
            folder_count: reader.read_u32(),
            account_unlocked: reader.read_bool(),
            unlock_date: reader.read_u64(),
            player_name: reader.read_string(),
            record_count: reader.read_u32(),
        }
    }
}

/// How a database version relates to the supported range
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionStatus {
    TooOld,
    Outdated,
    Supported,
    Unknown,
}

impl VersionStatus {
    pub fn classify(version: u32, max_version: u32) -> Self {
        if version < MIN_SUPPORTED_VERSION {
            Self::TooOld
        } else if version > max_version {
            Self::Unknown
        } else if version < OUTDATED_BELOW_VERSION {
            Self::Outdated
        } else {
            Self::Supported
        }
    }
}

/// One decoded record. `mode` is kept raw since unknown values occur.
#[derive(Debug, Clone)]
pub struct OsuDbRecord {
    pub difficulty: BeatmapDifficulty,
    pub mode: u8,
}

impl OsuDbRecord {
    pub fn is_standard(&self) -> bool {
        self.mode == GameMode::Osu as u8
    }
}

fn read_difficulty_setting<R: Read>(reader: &mut DbReader<R>, version: u32) -> f32 {
    if version < FLOAT_SETTINGS_VERSION {
        reader.read_u8() as f32
    } else {
        reader.read_f32()
    }
}

/// Consume one per-mode star rating block, returning the nomod rating
fn read_star_block<R: Read>(reader: &mut DbReader<R>, version: u32) -> f32 {
    let count = reader.read_u32();
    let mut nomod = 0.0;

    for _ in 0..count {
        if reader.is_dead() {
            break;
        }

        reader.read_u8();
        let mods = reader.read_u32();
        reader.read_u8();
        let stars = if version >= FLOAT_STARS_VERSION {
            reader.read_f32()
        } else {
            reader.read_f64() as f32
        };

        if mods == 0 {
            nomod = stars;
        }
    }

    nomod
}

fn read_timing_point<R: Read>(reader: &mut DbReader<R>) -> TimingPoint {
    TimingPoint {
        ms_per_beat: reader.read_f64(),
        offset: reader.read_f64(),
        uninherited: reader.read_bool(),
    }
}

/// Folder names may carry Windows separators
fn normalize_folder_name(name: &str) -> String {
    let trimmed = name.trim();
    if cfg!(windows) {
        trimmed.to_string()
    } else {
        trimmed.replace('\\', "/")
    }
}

/// Decode one record. Every field is consumed regardless of mode so the
/// cursor stays aligned for the next record.
pub fn read_record<R: Read>(
    reader: &mut DbReader<R>,
    version: u32,
    songs_folder: &Path,
) -> OsuDbRecord {
    if version < ENTRY_SIZE_REMOVED_VERSION {
        reader.read_u32();
    }

    let mut diff = BeatmapDifficulty {
        artist: reader.read_string().trim().to_string(),
        artist_unicode: reader.read_string(),
        title: reader.read_string().trim().to_string(),
        title_unicode: reader.read_string(),
        creator: reader.read_string().trim().to_string(),
        difficulty_name: reader.read_string().trim().to_string(),
        audio_file: reader.read_string(),
        md5: reader.read_hash(),
        osu_file: reader.read_string(),
        ranked_status: reader.read_u8(),
        circles: reader.read_u16(),
        sliders: reader.read_u16(),
        spinners: reader.read_u16(),
        last_modified: reader.read_u64(),
        ..Default::default()
    };

    diff.approach_rate = read_difficulty_setting(reader, version);
    diff.circle_size = read_difficulty_setting(reader, version);
    diff.hp_drain = read_difficulty_setting(reader, version);
    diff.overall_difficulty = read_difficulty_setting(reader, version);
    diff.slider_multiplier = reader.read_f64();

    if version >= FLOAT_SETTINGS_VERSION {
        diff.stars = read_star_block(reader, version);
        for _ in 0..3 {
            read_star_block(reader, version);
        }
    }

    reader.read_u32(); // drain time in seconds
    diff.length_ms = reader.read_i32().max(0) as u32;
    diff.preview_time = reader.read_i32();

    let timing_point_count = reader.read_u32();
    let mut timing_points = Vec::new();
    for _ in 0..timing_point_count {
        if reader.is_dead() {
            break;
        }
        timing_points.push(read_timing_point(reader));
    }
    diff.timing_points = timing_points;

    diff.beatmap_id = reader.read_i32();
    diff.set_id = reader.read_i32();
    reader.read_u32(); // thread id
    reader.read_u32(); // grades for all four modes

    diff.local_offset = reader.read_i16();
    diff.stack_leniency = reader.read_f32();
    let mode = reader.read_u8();
    diff.mode = GameMode::from_u8(mode).unwrap_or_default();

    diff.source = reader.read_string().trim().to_string();
    diff.tags = reader.read_string().trim().to_string();
    diff.online_offset = reader.read_i16();
    reader.skip_string(); // title font
    reader.read_bool(); // unplayed
    reader.read_u64(); // last played
    reader.read_bool(); // osz2

    let folder_name = reader.read_string();
    reader.read_u64(); // last online check
    reader.skip_bytes(5); // ignore sounds, ignore skin, storyboard, video, visual override
    if version < FLOAT_SETTINGS_VERSION {
        reader.read_u16();
    }
    reader.read_u32(); // last edit time
    reader.read_u8(); // mania scroll speed

    if diff.set_id < 1 && !folder_name.trim().is_empty() {
        diff.set_id = set_id_from_folder_name(folder_name.trim());
    }
    diff.folder = songs_folder.join(normalize_folder_name(&folder_name));

    OsuDbRecord {
        difficulty: diff,
        mode,
    }
}

/// Decode every record after the header.
///
/// Corrupt entries and non-standard modes are dropped after being consumed.
/// Cached star ratings and BPMs are applied when a cache is given. Stops
/// early when the load is cancelled or the file runs out.
pub fn read_records<R: Read>(
    reader: &mut DbReader<R>,
    header: &OsuDbHeader,
    songs_folder: &Path,
    stars: Option<&StarsCache>,
    control: &LoadControl,
) -> Vec<BeatmapDifficulty> {
    let total = header.record_count;
    let mut difficulties = Vec::new();
    let mut corrupt = 0usize;

    for i in 0..total {
        if control.is_cancelled() {
            tracing::info!("Database load cancelled at record {}/{}", i, total);
            break;
        }
        if reader.is_dead() {
            tracing::warn!("osu!.db ended after {} of {} records", i, total);
            break;
        }

        control.set_progress(
            RECORD_PROGRESS_START + RECORD_PROGRESS_SPAN * ((i + 1) as f32 / total as f32),
        );

        let record = read_record(reader, header.version, songs_folder);
        if record.difficulty.is_corrupt() {
            corrupt += 1;
            continue;
        }
        if !record.is_standard() {
            continue;
        }

        let mut diff = record.difficulty;
        match stars {
            Some(cache) => cache.apply(&mut diff),
            None => diff.bpm = crate::beatmap::BpmInfo::from_timing_points(&diff.timing_points),
        }
        difficulties.push(diff);
    }

    if corrupt > 0 {
        tracing::debug!("Skipped {} corrupt osu!.db entries", corrupt);
    }
    difficulties
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::binary::DbWriter;
    use crate::hash::Md5Hash;
    use std::path::PathBuf;

    pub(crate) struct TestRecord<'a> {
        pub artist: &'a str,
        pub title: &'a str,
        pub creator: &'a str,
        pub difficulty_name: &'a str,
        pub md5: &'a str,
        pub set_id: i32,
        pub mode: u8,
        pub folder: &'a str,
        pub stars: f64,
    }

    impl Default for TestRecord<'_> {
        fn default() -> Self {
            Self {
                artist: "Artist",
                title: "Title",
                creator: "Mapper",
                difficulty_name: "Normal",
                md5: "0123456789abcdef0123456789abcdef",
                set_id: 100,
                mode: 0,
                folder: "100 Artist - Title",
                stars: 4.0,
            }
        }
    }

    pub(crate) fn write_header(w: &mut DbWriter, version: u32, count: u32) {
        w.write_u32(version);
        w.write_u32(1);
        w.write_bool(true);
        w.write_u64(0);
        w.write_string("player");
        w.write_u32(count);
    }

    pub(crate) fn write_record(w: &mut DbWriter, version: u32, r: &TestRecord) {
        if version < ENTRY_SIZE_REMOVED_VERSION {
            w.write_u32(0);
        }
        w.write_string(r.artist);
        w.write_string(r.artist);
        w.write_string(r.title);
        w.write_string(r.title);
        w.write_string(r.creator);
        w.write_string(r.difficulty_name);
        w.write_string("audio.mp3");
        if r.md5.is_empty() {
            w.write_u8(0);
        } else {
            w.write_hash(&Md5Hash::from(r.md5));
        }
        w.write_string("map.osu");
        w.write_u8(4);
        w.write_u16(100);
        w.write_u16(50);
        w.write_u16(2);
        w.write_u64(0);
        for setting in [9.0f32, 4.0, 5.0, 8.0] {
            if version < FLOAT_SETTINGS_VERSION {
                w.write_u8(setting as u8);
            } else {
                w.write_f32(setting);
            }
        }
        w.write_f64(1.4);
        if version >= FLOAT_SETTINGS_VERSION {
            for block in 0..4 {
                w.write_u32(2);
                for (mods, stars) in [(64u32, r.stars * 1.4), (0, r.stars + block as f64)] {
                    w.write_u8(0x08);
                    w.write_u32(mods);
                    if version >= FLOAT_STARS_VERSION {
                        w.write_u8(0x0c);
                        w.write_f32(stars as f32);
                    } else {
                        w.write_u8(0x0d);
                        w.write_f64(stars);
                    }
                }
            }
        }
        w.write_u32(90);
        w.write_i32(95_000);
        w.write_i32(30_000);
        w.write_u32(2);
        w.write_f64(500.0);
        w.write_f64(0.0);
        w.write_bool(true);
        w.write_f64(-50.0);
        w.write_f64(1_000.0);
        w.write_bool(false);
        w.write_i32(7);
        w.write_i32(r.set_id);
        w.write_u32(0);
        w.write_u32(0);
        w.write_i16(0);
        w.write_f32(0.7);
        w.write_u8(r.mode);
        w.write_string("source");
        w.write_string(" tags ");
        w.write_i16(0);
        w.write_string("");
        w.write_bool(false);
        w.write_u64(0);
        w.write_bool(false);
        w.write_string(r.folder);
        w.write_u64(0);
        w.write_bytes(&[0; 5]);
        if version < FLOAT_SETTINGS_VERSION {
            w.write_u16(0);
        }
        w.write_u32(0);
        w.write_u8(0);
    }

    fn decode(version: u32, records: &[TestRecord]) -> Vec<BeatmapDifficulty> {
        let mut w = DbWriter::in_memory();
        write_header(&mut w, version, records.len() as u32);
        for r in records {
            write_record(&mut w, version, r);
        }
        let mut reader = DbReader::from_bytes(w.into_bytes());
        let header = OsuDbHeader::read(&mut reader);
        read_records(
            &mut reader,
            &header,
            Path::new("/songs"),
            None,
            &LoadControl::new(),
        )
    }

    #[test]
    fn test_version_status() {
        assert_eq!(VersionStatus::classify(20160000, DEFAULT_MAX_VERSION), VersionStatus::TooOld);
        assert_eq!(VersionStatus::classify(20180101, DEFAULT_MAX_VERSION), VersionStatus::Outdated);
        assert_eq!(VersionStatus::classify(20240101, DEFAULT_MAX_VERSION), VersionStatus::Supported);
        assert_eq!(VersionStatus::classify(20990101, DEFAULT_MAX_VERSION), VersionStatus::Unknown);
    }

    #[test]
    fn test_read_current_layout() {
        let diffs = decode(20250107, &[TestRecord::default()]);
        assert_eq!(diffs.len(), 1);

        let diff = &diffs[0];
        assert_eq!(diff.artist, "Artist");
        assert_eq!(diff.difficulty_name, "Normal");
        assert_eq!(diff.approach_rate, 9.0);
        assert_eq!(diff.stars, 4.0);
        assert_eq!(diff.length_ms, 95_000);
        assert_eq!(diff.timing_points.len(), 2);
        assert_eq!(diff.bpm.common, 120);
        assert_eq!(diff.tags, "tags");
        assert_eq!(diff.set_id, 100);
        assert_eq!(diff.folder, PathBuf::from("/songs/100 Artist - Title"));
    }

    #[test]
    fn test_read_float_stars_layout() {
        let diffs = decode(20250702, &[TestRecord { stars: 6.5, ..Default::default() }]);
        assert_eq!(diffs.len(), 1);
        assert_eq!(diffs[0].stars, 6.5);
    }

    #[test]
    fn test_read_sized_entries() {
        let records = [
            TestRecord::default(),
            TestRecord {
                md5: "ffffffffffffffffffffffffffffffff",
                difficulty_name: "Hard",
                ..Default::default()
            },
        ];
        let diffs = decode(20190101, &records);
        assert_eq!(diffs.len(), 2);
        assert_eq!(diffs[1].difficulty_name, "Hard");
    }

    #[test]
    fn test_read_pre_float_layout() {
        let diffs = decode(20140101, &[TestRecord::default(), TestRecord::default()]);
        assert_eq!(diffs.len(), 2);
        assert_eq!(diffs[0].approach_rate, 9.0);
        assert_eq!(diffs[0].stars, 0.0);
        assert_eq!(diffs[1].artist, "Artist");
    }

    #[test]
    fn test_other_modes_are_consumed_and_dropped() {
        let records = [
            TestRecord {
                mode: 3,
                difficulty_name: "7K",
                ..Default::default()
            },
            TestRecord {
                md5: "ffffffffffffffffffffffffffffffff",
                ..Default::default()
            },
        ];
        let diffs = decode(20240101, &records);
        assert_eq!(diffs.len(), 1);
        assert_eq!(diffs[0].md5, Md5Hash::from("ffffffffffffffffffffffffffffffff"));
    }

    #[test]
    fn test_corrupt_entries_are_dropped() {
        let records = [
            TestRecord {
                artist: "",
                title: "",
                creator: "",
                difficulty_name: "",
                md5: "",
                ..Default::default()
            },
            TestRecord::default(),
        ];
        let diffs = decode(20240101, &records);
        assert_eq!(diffs.len(), 1);
    }

    #[test]
    fn test_set_id_from_folder_fallback() {
        let diffs = decode(
            20240101,
            &[TestRecord {
                set_id: -1,
                folder: "777 Someone - Something",
                ..Default::default()
            }],
        );
        assert_eq!(diffs[0].set_id, 777);
    }

    #[test]
    fn test_cancelled_load_stops() {
        let mut w = DbWriter::in_memory();
        write_header(&mut w, 20240101, 1);
        write_record(&mut w, 20240101, &TestRecord::default());
        let mut reader = DbReader::from_bytes(w.into_bytes());
        let header = OsuDbHeader::read(&mut reader);

        let control = LoadControl::new();
        control.cancel();
        let diffs = read_records(&mut reader, &header, Path::new("/songs"), None, &control);
        assert!(diffs.is_empty());
    }

    #[test]
    fn test_cache_overrides_embedded_stars() {
        let mut w = DbWriter::in_memory();
        write_header(&mut w, 20240101, 1);
        write_record(&mut w, 20240101, &TestRecord::default());
        let mut reader = DbReader::from_bytes(w.into_bytes());
        let header = OsuDbHeader::read(&mut reader);

        let mut cache = StarsCache::new();
        cache.insert(
            Md5Hash::from(TestRecord::default().md5),
            crate::stars::StarsCacheEntry {
                stars: 7.77,
                bpm: Default::default(),
            },
        );
        let diffs = read_records(
            &mut reader,
            &header,
            Path::new("/songs"),
            Some(&cache),
            &LoadControl::new(),
        );
        assert_eq!(diffs[0].stars, 7.77);
        assert_eq!(diffs[0].bpm.common, 120);
    }
}
