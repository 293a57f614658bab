//! Score thresholds for player levels

/// Highest level reported
pub const MAX_LEVEL: u32 = 120;

/// Cumulative score needed to reach `level`
pub fn required_score_for_level(level: u32) -> u64 {
    if level <= 1 {
        return 1;
    }

    if level <= 100 {
        let l = level as f64;
        let base = 1666.0 * (4.0 * l.powi(3) - 3.0 * l.powi(2) - l);
        let curve = (1.25 * 1.8f64.powf(l - 60.0)).floor();
        return (base + curve).floor() as u64;
    }

    26_931_190_829 + 100_000_000_000 * (level as u64 - 100)
}

/// Largest level whose threshold `score` reaches, capped at [`MAX_LEVEL`]
pub fn level_for_score(score: u64) -> u32 {
    let mut level = 0;
    while level < MAX_LEVEL && score >= required_score_for_level(level + 1) {
        level += 1;
    }
    level
}

/// Fraction of the way from `level` to `level + 1`
pub fn percent_to_next_level(score: u64, level: u32) -> f32 {
    let current = required_score_for_level(level);
    let next = required_score_for_level(level + 1);
    if next <= current {
        return 0.0;
    }

    let progress = score.saturating_sub(current) as f64 / (next - current) as f64;
    progress.clamp(0.0, 1.0) as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_required_score_thresholds() {
        assert_eq!(required_score_for_level(0), 1);
        assert_eq!(required_score_for_level(1), 1);
        assert_eq!(required_score_for_level(2), 29_988);
        assert_eq!(required_score_for_level(101), 126_931_190_829);
    }

    #[test]
    fn test_thresholds_increase() {
        for level in 1..MAX_LEVEL {
            assert!(required_score_for_level(level + 1) > required_score_for_level(level));
        }
    }

    #[test]
    fn test_level_for_score() {
        assert_eq!(level_for_score(0), 0);
        assert_eq!(level_for_score(1), 1);
        assert_eq!(level_for_score(29_987), 1);
        assert_eq!(level_for_score(29_988), 2);
        assert_eq!(level_for_score(u64::MAX), MAX_LEVEL);
    }

    #[test]
    fn test_percent_to_next_level() {
        let halfway = 1 + (29_988 - 1) / 2;
        let percent = percent_to_next_level(halfway, 1);
        assert!((percent - 0.5).abs() < 0.001);
        assert_eq!(percent_to_next_level(0, 0), 0.0);
    }
}
