//! rollgate-risk — failure severity classification and safety guards.
//!
//! Pure classification with no persistent state. Failures are ranked by
//! type severity; a single System-timeout failure can be downgraded out
//! of the high-severity set, but only when every one of five named
//! guards holds, and the report always carries the per-guard pass/fail
//! list rather than just the verdict.
//!
//! Drift comparison (short window vs. long-window median) and the
//! hourly cost cutout live in `drift`; the cutout overrides every other
//! gate. Missing or corrupt metric inputs fail the corresponding guard
//! conservatively — nothing in this crate panics on bad data.
//!
//! # Components
//!
//! - **`classifier`** — severity lookup, five-guard downgrade, `RiskReport`
//! - **`drift`** — drift ratio, cost cutout, combined guard outcome
//! - **`freeze`** — injected freeze-sentinel probe capability

pub mod classifier;
pub mod drift;
pub mod freeze;

pub use classifier::{
    FailureKind, FailureRecord, GuardCheck, GuardSignals, RiskReport, RiskThresholds, classify,
};
pub use drift::{CutoutStatus, DriftGuard, DriftStatus, GuardOutcome};
pub use freeze::{FreezeFlagProbe, FsFreezeProbe, StaticProbe};
