//! Drift comparison and the cost-rate cutout.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Default short/long window ratio that triggers a drift alert.
pub const DEFAULT_DRIFT_THRESHOLD: f64 = 1.15;

/// Drift verdict for one statistic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DriftStatus {
    Normal,
    Alert,
}

/// Cost-rate verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CutoutStatus {
    Normal,
    Cutout,
}

/// Combined outcome: the cutout overrides everything else.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuardOutcome {
    pub drift: DriftStatus,
    pub cutout: CutoutStatus,
    /// False whenever the cutout tripped, regardless of drift.
    pub allow: bool,
}

/// Drift and cost guard over a short observation window.
#[derive(Debug, Clone)]
pub struct DriftGuard {
    drift_threshold: f64,
    hourly_cost_cap: f64,
}

impl DriftGuard {
    pub fn new(hourly_cost_cap: f64) -> Self {
        Self {
            drift_threshold: DEFAULT_DRIFT_THRESHOLD,
            hourly_cost_cap,
        }
    }

    pub fn with_drift_threshold(mut self, threshold: f64) -> Self {
        self.drift_threshold = threshold;
        self
    }

    /// Ratio of a short-window statistic (1h p95, cost, ...) to the
    /// long-window median. Ratio over the threshold is an alert; a
    /// corrupt or non-positive baseline is an alert too (guard failed,
    /// never a crash).
    pub fn drift_check(&self, short_window: f64, long_window_median: f64) -> DriftStatus {
        if !short_window.is_finite() || !long_window_median.is_finite() {
            warn!(short_window, long_window_median, "non-finite drift input");
            return DriftStatus::Alert;
        }
        if long_window_median <= 0.0 {
            warn!(long_window_median, "drift baseline not positive");
            return DriftStatus::Alert;
        }
        if short_window / long_window_median > self.drift_threshold {
            DriftStatus::Alert
        } else {
            DriftStatus::Normal
        }
    }

    /// Extrapolate a short-window cost to an hourly rate and compare
    /// against the cap.
    pub fn cost_check(&self, window_cost: f64, window: Duration) -> CutoutStatus {
        let secs = window.as_secs_f64();
        if !window_cost.is_finite() || window_cost < 0.0 || secs <= 0.0 {
            warn!(window_cost, window_secs = secs, "corrupt cost input");
            return CutoutStatus::Cutout;
        }
        let hourly_rate = window_cost * 3600.0 / secs;
        if hourly_rate > self.hourly_cost_cap {
            warn!(
                hourly_rate,
                cap = self.hourly_cost_cap,
                "cost rate over cap, cutting out"
            );
            CutoutStatus::Cutout
        } else {
            CutoutStatus::Normal
        }
    }

    /// Assess both guards; the cutout wins over every other gate.
    pub fn assess(
        &self,
        short_window: f64,
        long_window_median: f64,
        window_cost: f64,
        window: Duration,
    ) -> GuardOutcome {
        let drift = self.drift_check(short_window, long_window_median);
        let cutout = self.cost_check(window_cost, window);
        GuardOutcome {
            drift,
            cutout,
            allow: cutout == CutoutStatus::Normal && drift == DriftStatus::Normal,
        }
    }
}
