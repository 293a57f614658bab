//! Weighted pp, accuracy and level for a player

use crate::score::{mods, FinishedScore, ScoreStore, SortMethod};

use super::level::{level_for_score, percent_to_next_level};
use super::model::{PlayerStats, StatsOptions};

/// Weight of the `index`-th best score
fn weight(index: usize) -> f64 {
    0.95f64.powi(index as i32)
}

/// Bonus pp for having `count` scores
pub fn bonus_pp(count: usize) -> f64 {
    416.6667 * (1.0 - 0.9994f64.powi(count as i32))
}

/// Best scores of a player, one per beatmap, highest pp first
#[derive(Debug, Default)]
pub struct RankedScores<'a> {
    pub scores: Vec<&'a FinishedScore>,
    pub total_score: u64,
}

/// Collect the highest pp non-legacy score of `name` on every beatmap.
pub fn ranked_scores<'a>(
    store: &'a ScoreStore,
    name: &str,
    include_relax_autopilot: bool,
) -> RankedScores<'a> {
    let mut ranked = RankedScores::default();

    for (_, list) in store.iter() {
        let mut best: Option<&FinishedScore> = None;
        for score in list {
            if score.is_legacy() || score.player_name != name {
                continue;
            }
            if !include_relax_autopilot && score.has_mod(mods::RELAX | mods::AUTOPILOT) {
                continue;
            }

            ranked.total_score += score.score;
            if best.map_or(true, |b| score.pp > b.pp) {
                best = Some(score);
            }
        }
        ranked.scores.extend(best);
    }

    ranked
        .scores
        .sort_by(|a, b| SortMethod::Pp.compare(a, b));
    ranked
}

/// Computes [`PlayerStats`], reusing the last result until scores change
#[derive(Debug, Default)]
pub struct PlayerStatsCalculator {
    options: StatsOptions,
    cached: Option<PlayerStats>,
}

impl PlayerStatsCalculator {
    pub fn new(options: StatsOptions) -> Self {
        Self {
            options,
            cached: None,
        }
    }

    pub fn options(&self) -> StatsOptions {
        self.options
    }

    pub fn set_options(&mut self, options: StatsOptions) {
        if options != self.options {
            self.options = options;
            self.cached = None;
        }
    }

    /// Forget the memoized result
    pub fn invalidate(&mut self) {
        self.cached = None;
    }

    /// Statistics for `name`.
    ///
    /// The store's stats flag is only cleared once the player has a counted
    /// score, so stats asked for before scores arrive are recomputed later.
    pub fn calculate(&mut self, store: &mut ScoreStore, name: &str) -> PlayerStats {
        if !store.is_stats_dirty() {
            if let Some(cached) = self.cached.as_ref().filter(|c| c.name == name) {
                return cached.clone();
            }
        }

        let stats = compute(store, name, self.options);
        if stats.num_scores_with_pp > 0 {
            store.mark_stats_clean();
        }

        tracing::debug!(
            "Stats for {:?}: {:.2}pp over {} scores, level {}",
            name,
            stats.pp,
            stats.num_scores_with_pp,
            stats.level
        );
        self.cached = Some(stats.clone());
        stats
    }
}

/// Uncached statistics for `name`
pub fn compute(store: &ScoreStore, name: &str, options: StatsOptions) -> PlayerStats {
    let ranked = ranked_scores(store, name, options.include_relax_autopilot);
    let count = ranked.scores.len();

    let mut pp = 0.0;
    let mut accuracy = 0.0;
    for (index, score) in ranked.scores.iter().enumerate() {
        pp += score.pp as f64 * weight(index);
        accuracy += score.accuracy() as f64 * weight(index);
    }

    if options.bonus_pp {
        pp += bonus_pp(count);
    }
    if count > 0 {
        accuracy /= 20.0 * (1.0 - weight(count));
    }

    let level = level_for_score(ranked.total_score);
    PlayerStats {
        name: name.to_string(),
        pp: pp as f32,
        accuracy: accuracy as f32,
        num_scores_with_pp: count,
        level,
        percent_to_next_level: percent_to_next_level(ranked.total_score, level),
        total_score: ranked.total_score,
    }
}
