//! Wilson score upper bound for failure rates.

use serde::{Deserialize, Serialize};

use crate::error::{StatsError, StatsResult};

/// z for a one-sided 97.5% / two-sided 95% interval.
const Z_95: f64 = 1.96;

/// Gate outcome for a rate metric.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateCheck {
    /// Observed point estimate failures/trials.
    pub observed_rate: f64,
    /// Wilson score upper bound at 95% confidence.
    pub upper_bound: f64,
    /// Cap the upper bound was compared against.
    pub max_rate: f64,
    /// True when `upper_bound <= max_rate`.
    pub pass: bool,
}

/// Wilson score upper bound at 95% confidence for `failures` out of
/// `trials`.
///
/// ```text
/// UB = (p̂ + z²/2n + z·√(p̂(1−p̂)/n + z²/4n²)) / (1 + z²/n)
/// ```
///
/// Unlike the normal approximation this is valid near 0: zero observed
/// failures out of n trials still yields a strictly positive bound, so
/// the gate never reports false "zero risk".
pub fn wilson_upper_bound(failures: u64, trials: u64) -> StatsResult<f64> {
    if trials == 0 {
        return Err(StatsError::NoTrials);
    }
    if failures > trials {
        return Err(StatsError::FailuresExceedTrials { failures, trials });
    }

    let n = trials as f64;
    let p = failures as f64 / n;
    let z = Z_95;
    let z2 = z * z;

    let center = p + z2 / (2.0 * n);
    let spread = z * (p * (1.0 - p) / n + z2 / (4.0 * n * n)).sqrt();
    Ok((center + spread) / (1.0 + z2 / n))
}

/// Gate a rate metric against a cap using the Wilson upper bound, not
/// the point estimate.
pub fn rate_gate(failures: u64, trials: u64, max_rate: f64) -> StatsResult<RateCheck> {
    let upper_bound = wilson_upper_bound(failures, trials)?;
    Ok(RateCheck {
        observed_rate: failures as f64 / trials as f64,
        upper_bound,
        max_rate,
        pass: upper_bound <= max_rate,
    })
}
