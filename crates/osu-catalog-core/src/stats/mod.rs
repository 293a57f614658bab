//! Player statistics
//!
//! Aggregates a player's scores into weighted performance points, accuracy
//! and a level derived from their total score.

mod calculator;
pub mod level;
mod model;

pub use calculator::{bonus_pp, compute, ranked_scores, PlayerStatsCalculator, RankedScores};
pub use model::{PlayerStats, StatsOptions};
