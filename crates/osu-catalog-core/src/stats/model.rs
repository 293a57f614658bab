//! Data models for player statistics

use serde::{Deserialize, Serialize};

/// Aggregated statistics for one player
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlayerStats {
    pub name: String,
    /// Weighted performance points, including the bonus when enabled
    pub pp: f32,
    /// Weighted accuracy in `0.0..=1.0`
    pub accuracy: f32,
    /// Beatmaps contributing a best score
    pub num_scores_with_pp: usize,
    pub level: u32,
    /// Progress from `level` to the next one in `0.0..=1.0`
    pub percent_to_next_level: f32,
    /// Sum of every counted score, not only the best per beatmap
    pub total_score: u64,
}

/// Options controlling which scores count and how pp is totalled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsOptions {
    /// Add the bonus pp awarded for the number of ranked plays
    pub bonus_pp: bool,
    /// Count scores set with Relax or Autopilot
    pub include_relax_autopilot: bool,
}

impl Default for StatsOptions {
    fn default() -> Self {
        Self {
            bonus_pp: true,
            include_relax_autopilot: false,
        }
    }
}
