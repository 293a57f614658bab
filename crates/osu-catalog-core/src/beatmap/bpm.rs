//! BPM summary derived from timing points

use serde::{Deserialize, Serialize};

use super::TimingPoint;

/// Minimum, maximum and most common BPM of a difficulty
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BpmInfo {
    pub min: i32,
    pub max: i32,
    pub common: i32,
}

struct BeatLengthSpan {
    /// Beat length in thousandths of a millisecond
    beat_length: i64,
    duration: f64,
    first_index: usize,
}

fn to_bpm(beat_length_ms: f64) -> i32 {
    (60_000.0 / beat_length_ms).round() as i32
}

impl BpmInfo {
    /// Aggregate uninherited timing points into a BPM summary.
    ///
    /// Each uninherited point lasts until the next uninherited one, the first
    /// is treated as starting at 0 and the last one ends at the offset of the
    /// final timing point. The most common BPM is
    /// the beat length covering the longest total duration.
    pub fn from_timing_points(points: &[TimingPoint]) -> Self {
        let Some(last) = points.last() else {
            return Self::default();
        };
        let last_time = last.offset;

        let mut spans: Vec<BeatLengthSpan> = Vec::new();
        for (i, point) in points.iter().enumerate() {
            if point.ms_per_beat <= 0.0 || point.offset > last_time {
                continue;
            }

            let start = if i == 0 { 0.0 } else { point.offset };
            let end = points[i + 1..]
                .iter()
                .find(|next| next.ms_per_beat > 0.0)
                .map_or(last_time, |next| next.offset);
            let duration = (end - start).max(0.0);
            let beat_length = (point.ms_per_beat * 1000.0).round() as i64;

            match spans.iter_mut().find(|s| s.beat_length == beat_length) {
                Some(span) => span.duration += duration,
                None => spans.push(BeatLengthSpan {
                    beat_length,
                    duration,
                    first_index: i,
                }),
            }
        }

        if spans.is_empty() {
            return Self::default();
        }

        let shortest = spans.iter().map(|s| s.beat_length).min().unwrap_or(0);
        let longest = spans.iter().map(|s| s.beat_length).max().unwrap_or(0);

        spans.sort_by(|a, b| {
            b.duration
                .total_cmp(&a.duration)
                .then(a.beat_length.cmp(&b.beat_length))
                .then(a.first_index.cmp(&b.first_index))
        });

        Self {
            min: to_bpm(longest as f64 / 1000.0),
            max: to_bpm(shortest as f64 / 1000.0),
            common: to_bpm(spans[0].beat_length as f64 / 1000.0),
        }
    }
}
