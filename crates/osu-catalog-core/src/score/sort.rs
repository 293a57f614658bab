//! Score ordering
//!
//! Every comparator ends on `sort_hack`, so scores with identical keys still
//! have a deterministic order.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::model::FinishedScore;

/// How score lists are ordered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortMethod {
    Accuracy,
    Combo,
    Date,
    Misses,
    Pp,
    #[default]
    Score,
    /// Lists arrive pre-sorted from the leaderboard, sorting is a no-op
    OnlineLeaderboard,
}

impl SortMethod {
    pub const ALL: [SortMethod; 7] = [
        SortMethod::Accuracy,
        SortMethod::Combo,
        SortMethod::Date,
        SortMethod::Misses,
        SortMethod::Pp,
        SortMethod::Score,
        SortMethod::OnlineLeaderboard,
    ];

    /// Ordering of two scores, best first
    pub fn compare(self, a: &FinishedScore, b: &FinishedScore) -> Ordering {
        let primary = match self {
            Self::Score => b.score.cmp(&a.score),
            Self::Combo => b
                .max_combo
                .cmp(&a.max_combo)
                .then(b.score.cmp(&a.score)),
            Self::Date => Ordering::Equal,
            Self::Misses => a
                .count_miss
                .cmp(&b.count_miss)
                .then(b.score.cmp(&a.score)),
            Self::Accuracy => accuracy_key(b)
                .cmp(&accuracy_key(a))
                .then(b.score.cmp(&a.score)),
            Self::Pp => pp_key(b).cmp(&pp_key(a)).then(b.score.cmp(&a.score)),
            Self::OnlineLeaderboard => return Ordering::Equal,
        };

        primary
            .then(b.timestamp.cmp(&a.timestamp))
            .then(b.sort_hack.cmp(&a.sort_hack))
    }

    /// Sort a score list in place
    pub fn sort(self, scores: &mut [FinishedScore]) {
        if self == Self::OnlineLeaderboard {
            return;
        }
        scores.sort_by(|a, b| self.compare(a, b));
    }
}

fn accuracy_key(score: &FinishedScore) -> u64 {
    (score.accuracy() * 10_000.0) as u64
}

fn pp_key(score: &FinishedScore) -> u64 {
    (score.pp * 100.0).max(0.0) as u64
}

impl fmt::Display for SortMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Accuracy => "accuracy",
            Self::Combo => "combo",
            Self::Date => "date",
            Self::Misses => "misses",
            Self::Pp => "pp",
            Self::Score => "score",
            Self::OnlineLeaderboard => "online",
        };
        f.write_str(name)
    }
}

impl FromStr for SortMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "accuracy" | "acc" => Ok(Self::Accuracy),
            "combo" => Ok(Self::Combo),
            "date" => Ok(Self::Date),
            "misses" => Ok(Self::Misses),
            "pp" => Ok(Self::Pp),
            "score" => Ok(Self::Score),
            "online" | "online_leaderboard" => Ok(Self::OnlineLeaderboard),
            other => Err(format!("Unknown sort method: {}", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn score(sort_hack: u64) -> FinishedScore {
        FinishedScore {
            score: 1000,
            max_combo: 100,
            count_300: 90,
            count_100: 5,
            count_miss: 1,
            pp: 123.45,
            timestamp: 10,
            sort_hack,
            ..Default::default()
        }
    }

    #[test]
    fn test_ties_prefer_larger_sort_hack() {
        for method in SortMethod::ALL {
            if method == SortMethod::OnlineLeaderboard {
                continue;
            }
            let mut scores = vec![score(1), score(3), score(2)];
            method.sort(&mut scores);
            let hacks: Vec<u64> = scores.iter().map(|s| s.sort_hack).collect();
            assert_eq!(hacks, vec![3, 2, 1], "{}", method);
        }
    }

    #[test]
    fn test_score_then_date() {
        let mut a = score(0);
        a.score = 500;
        let mut b = score(1);
        b.timestamp = 5;
        let c = score(2);

        let mut scores = vec![a, b, c];
        SortMethod::Score.sort(&mut scores);
        let hacks: Vec<u64> = scores.iter().map(|s| s.sort_hack).collect();
        assert_eq!(hacks, vec![2, 1, 0]);
    }

    #[test]
    fn test_misses_ascending() {
        let mut few = score(0);
        few.count_miss = 0;
        few.score = 1;
        let many = score(1);

        let mut scores = vec![many, few];
        SortMethod::Misses.sort(&mut scores);
        assert_eq!(scores[0].count_miss, 0);
    }

    #[test]
    fn test_combo_then_score() {
        let mut low = score(0);
        low.max_combo = 50;
        low.score = 99_999;
        let mut high = score(1);
        high.score = 1;

        let mut scores = vec![low, high];
        SortMethod::Combo.sort(&mut scores);
        assert_eq!(scores[0].max_combo, 100);
    }

    #[test]
    fn test_pp_negative_clamped() {
        let mut negative = score(5);
        negative.pp = -10.0;
        let mut zero = score(0);
        zero.pp = 0.0;

        // Both map to key 0, so score/date tie and sort_hack decides
        let mut scores = vec![zero, negative];
        SortMethod::Pp.sort(&mut scores);
        assert_eq!(scores[0].sort_hack, 5);
    }

    #[test]
    fn test_accuracy_order() {
        let mut perfect = score(0);
        perfect.count_100 = 0;
        perfect.count_miss = 0;
        let mut scores = vec![score(1), perfect];
        SortMethod::Accuracy.sort(&mut scores);
        assert_eq!(scores[0].sort_hack, 0);
    }

    #[test]
    fn test_online_leaderboard_is_noop() {
        let mut scores = vec![score(1), score(3), score(2)];
        SortMethod::OnlineLeaderboard.sort(&mut scores);
        let hacks: Vec<u64> = scores.iter().map(|s| s.sort_hack).collect();
        assert_eq!(hacks, vec![1, 3, 2]);
    }

    #[test]
    fn test_parse_round_trip() {
        for method in SortMethod::ALL {
            assert_eq!(method.to_string().parse::<SortMethod>().unwrap(), method);
        }
        assert!("bogus".parse::<SortMethod>().is_err());
    }
}
