//! rollgate-shadow — paired candidate-vs-production execution.
//!
//! The shadow runner sends a sampled share of requests to both the
//! candidate and the production artifact, compares per-metric outcomes
//! (candidate − production), and appends every finished run as one JSON
//! line to an append-only audit log. Runs are never mutated after being
//! written; a batch that cannot finish both arms is never recorded, so
//! partial samples are never compared.
//!
//! # Components
//!
//! - **`runner`** — `ShadowBackend` trait, `ShadowRunner`, run log
//! - **`ratio`** — multiplicative shadow-ratio tuner with clamping

pub mod error;
pub mod ratio;
pub mod runner;

pub use error::{ShadowError, ShadowResult};
pub use ratio::{RatioConfig, adjust_ratio};
pub use runner::{ArmMetrics, RUN_LOG_FILE, RequestOutcome, ShadowBackend, ShadowRun, ShadowRunner};
