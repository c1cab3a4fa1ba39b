//! rollgate-stats — statistical comparison of candidate vs. production.
//!
//! Two independent samples are compared with Welch's t-test (unequal
//! variances) and Welch–Satterthwaite degrees of freedom. Rate metrics
//! (success/failure counts) are bounded with the Wilson score upper
//! bound at 95% confidence, which stays valid near 0 where the normal
//! approximation breaks down. Gates compare against that upper bound,
//! not the point estimate, biasing toward caution on small samples.
//!
//! Everything here is deterministic: identical inputs produce identical
//! outputs, with no clock or hidden seed dependence.

pub mod compare;
pub mod error;
pub mod wilson;

pub use compare::{SampleComparison, welch_compare};
pub use error::{StatsError, StatsResult};
pub use wilson::{RateCheck, rate_gate, wilson_upper_bound};
