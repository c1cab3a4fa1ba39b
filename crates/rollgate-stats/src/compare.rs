//! Welch's t-test over two independent samples.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{StatsError, StatsResult};

/// Comparison of two independent samples (candidate vs. production).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleComparison {
    pub mean_candidate: f64,
    pub mean_production: f64,
    /// Signed difference: candidate − production.
    pub delta: f64,
    /// Welch's t-statistic.
    pub t_stat: f64,
    /// Welch–Satterthwaite degrees of freedom.
    pub dof: f64,
    /// True when either sample is below the configured minimum size.
    /// Flagged rather than silently scored.
    pub low_confidence: bool,
}

/// Compare two samples with Welch's unequal-variance t-test.
///
/// `min_samples` comes from policy; samples below it are flagged
/// `low_confidence` but still scored. Degenerate inputs (an empty
/// sample, zero variance in both arms) are errors, never NaN.
pub fn welch_compare(
    candidate: &[f64],
    production: &[f64],
    min_samples: usize,
) -> StatsResult<SampleComparison> {
    if candidate.is_empty() {
        return Err(StatsError::EmptySample("candidate"));
    }
    if production.is_empty() {
        return Err(StatsError::EmptySample("production"));
    }

    let n_c = candidate.len() as f64;
    let n_p = production.len() as f64;
    let mean_c = mean(candidate);
    let mean_p = mean(production);
    let var_c = sample_variance(candidate, mean_c);
    let var_p = sample_variance(production, mean_p);

    // Standard error terms s²/n for each arm.
    let se_c = var_c / n_c;
    let se_p = var_p / n_p;
    let se_sum = se_c + se_p;
    if se_sum == 0.0 {
        return Err(StatsError::ZeroVariance);
    }

    let delta = mean_c - mean_p;
    let t_stat = delta / se_sum.sqrt();

    // Welch–Satterthwaite. Single-observation arms contribute a zero
    // denominator term only when their variance term is zero, which the
    // se_sum check above already excluded for the both-zero case; a
    // per-arm zero term simply drops out.
    let denom_c = if n_c > 1.0 {
        se_c.powi(2) / (n_c - 1.0)
    } else {
        0.0
    };
    let denom_p = if n_p > 1.0 {
        se_p.powi(2) / (n_p - 1.0)
    } else {
        0.0
    };
    let dof = if denom_c + denom_p > 0.0 {
        se_sum.powi(2) / (denom_c + denom_p)
    } else {
        1.0
    };

    let low_confidence = candidate.len() < min_samples || production.len() < min_samples;
    if low_confidence {
        debug!(
            candidate_n = candidate.len(),
            production_n = production.len(),
            min_samples,
            "sample below policy minimum, flagging low confidence"
        );
    }

    Ok(SampleComparison {
        mean_candidate: mean_c,
        mean_production: mean_p,
        delta,
        t_stat,
        dof,
        low_confidence,
    })
}

fn mean(xs: &[f64]) -> f64 {
    xs.iter().sum::<f64>() / xs.len() as f64
}

/// Unbiased sample variance (n-1 denominator); 0 for a single point.
fn sample_variance(xs: &[f64], mean: f64) -> f64 {
    if xs.len() < 2 {
        return 0.0;
    }
    let ss: f64 = xs.iter().map(|x| (x - mean).powi(2)).sum();
    ss / (xs.len() - 1) as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_samples_have_zero_delta() {
        let a = [1.0, 2.0, 3.0, 4.0];
        let cmp = welch_compare(&a, &a, 2).unwrap();
        assert_eq!(cmp.delta, 0.0);
        assert_eq!(cmp.t_stat, 0.0);
        assert!(!cmp.low_confidence);
    }

    #[test]
    fn delta_is_signed_candidate_minus_production() {
        let cand = [2.0, 2.1, 1.9, 2.0];
        let prod = [1.0, 1.1, 0.9, 1.0];
        let cmp = welch_compare(&cand, &prod, 2).unwrap();
        assert!((cmp.delta - 1.0).abs() < 1e-9);
        assert!(cmp.t_stat > 0.0);

        let flipped = welch_compare(&prod, &cand, 2).unwrap();
        assert!((flipped.delta + 1.0).abs() < 1e-9);
        assert!(flipped.t_stat < 0.0);
    }

    #[test]
    fn deterministic_for_identical_inputs() {
        let a = [0.2, 0.5, 0.9, 0.4, 0.6];
        let b = [0.3, 0.4, 0.8, 0.5, 0.7];
        let first = welch_compare(&a, &b, 3).unwrap();
        let second = welch_compare(&a, &b, 3).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn equal_size_equal_variance_dof_matches_pooled() {
        // With equal n and equal variance, Welch dof = 2n - 2.
        let a = [1.0, 2.0, 3.0];
        let b = [4.0, 5.0, 6.0];
        let cmp = welch_compare(&a, &b, 2).unwrap();
        assert!((cmp.dof - 4.0).abs() < 1e-9);
    }

    #[test]
    fn small_samples_are_flagged_low_confidence() {
        let a = [1.0, 2.0];
        let b = [1.0, 2.0, 3.0, 4.0, 5.0];
        let cmp = welch_compare(&a, &b, 5).unwrap();
        assert!(cmp.low_confidence);
    }

    #[test]
    fn empty_sample_is_an_error() {
        assert_eq!(
            welch_compare(&[], &[1.0], 1),
            Err(StatsError::EmptySample("candidate"))
        );
        assert_eq!(
            welch_compare(&[1.0], &[], 1),
            Err(StatsError::EmptySample("production"))
        );
    }

    #[test]
    fn constant_samples_are_an_error_not_nan() {
        let a = [5.0, 5.0, 5.0];
        let b = [5.0, 5.0, 5.0];
        assert_eq!(welch_compare(&a, &b, 2), Err(StatsError::ZeroVariance));
    }

    #[test]
    fn one_constant_arm_still_scores() {
        let constant = [5.0, 5.0, 5.0];
        let varying = [4.0, 5.0, 6.0];
        let cmp = welch_compare(&constant, &varying, 2).unwrap();
        assert!(cmp.t_stat.is_finite());
        assert!(cmp.dof.is_finite() && cmp.dof > 0.0);
    }
}
