//! Shadow-ratio tuner — multiplicative adjustment with clamping.

use serde::{Deserialize, Serialize};
use tracing::debug;

/// Tuning parameters for `adjust_ratio`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatioConfig {
    /// Candidate must beat production by at least this much to grow.
    pub improve_margin: f64,
    /// Growth multiplier on out-performance (1.1–1.2).
    pub grow_factor: f64,
    /// Shrink multiplier on under-performance.
    pub shrink_factor: f64,
    pub min_ratio: f64,
    pub max_ratio: f64,
}

impl Default for RatioConfig {
    fn default() -> Self {
        Self {
            improve_margin: 0.05,
            grow_factor: 1.2,
            shrink_factor: 0.9,
            min_ratio: 0.01,
            max_ratio: 0.5,
        }
    }
}

/// Adjust the shadow traffic ratio from the latest arm performance.
///
/// Grows multiplicatively when the candidate beats production by more
/// than the margin, shrinks on any under-performance, holds otherwise.
/// The result is always clamped to `[min_ratio, max_ratio]`.
pub fn adjust_ratio(current: f64, cand_perf: f64, prod_perf: f64, cfg: &RatioConfig) -> f64 {
    let delta = cand_perf - prod_perf;
    let adjusted = if delta > cfg.improve_margin {
        current * cfg.grow_factor
    } else if delta < 0.0 {
        current * cfg.shrink_factor
    } else {
        current
    };
    let clamped = adjusted.clamp(cfg.min_ratio, cfg.max_ratio);
    debug!(current, cand_perf, prod_perf, new_ratio = clamped, "shadow ratio adjusted");
    clamped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grows_when_candidate_beats_margin() {
        // p@3 0.80 vs 0.70: delta 0.10 > 0.05 margin.
        let new_ratio = adjust_ratio(0.10, 0.80, 0.70, &RatioConfig::default());
        assert!((new_ratio - 0.12).abs() < 1e-9); // 0.10 × 1.2
    }

    #[test]
    fn growth_is_capped_at_max() {
        let cfg = RatioConfig {
            max_ratio: 0.11,
            ..RatioConfig::default()
        };
        let new_ratio = adjust_ratio(0.10, 0.80, 0.70, &cfg);
        assert_eq!(new_ratio, 0.11);
    }

    #[test]
    fn shrinks_on_underperformance() {
        let new_ratio = adjust_ratio(0.10, 0.60, 0.70, &RatioConfig::default());
        assert!((new_ratio - 0.09).abs() < 1e-9); // 0.10 × 0.9
    }

    #[test]
    fn shrink_respects_min() {
        let cfg = RatioConfig {
            min_ratio: 0.095,
            ..RatioConfig::default()
        };
        let new_ratio = adjust_ratio(0.10, 0.60, 0.70, &cfg);
        assert_eq!(new_ratio, 0.095);
    }

    #[test]
    fn holds_inside_the_margin() {
        // Better than production but below the margin: hold.
        let new_ratio = adjust_ratio(0.10, 0.73, 0.70, &RatioConfig::default());
        assert_eq!(new_ratio, 0.10);

        // Exactly equal: hold.
        let new_ratio = adjust_ratio(0.10, 0.70, 0.70, &RatioConfig::default());
        assert_eq!(new_ratio, 0.10);
    }
}
