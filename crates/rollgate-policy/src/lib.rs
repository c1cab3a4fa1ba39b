//! rollgate-policy — declarative threshold policies and the promotion gate.
//!
//! A policy is an ordered mapping of rule name → threshold rule, loaded
//! from YAML. The evaluator is a pure function over a flat set of named
//! numeric results: every rule must pass for the gate to pass, and any
//! malformed rule or missing metric fails closed with a diagnostic
//! reason rather than crashing the caller.
//!
//! Comparisons use exact decimal arithmetic (`rust_decimal`), parsed
//! from the literal text of the YAML/JSON numbers, so thresholds like
//! `gt 0` behave correctly at binary-float boundaries.
//!
//! # Components
//!
//! - **`rule`** — `CmpOp`, `RuleKind`, `Policy` and YAML loading
//! - **`results`** — `MetricResults` with derived metric getters
//! - **`evaluator`** — `evaluate()` producing a `Verdict`

pub mod error;
pub mod evaluator;
pub mod results;
pub mod rule;

pub use error::{PolicyError, PolicyResult};
pub use evaluator::{Verdict, evaluate};
pub use results::MetricResults;
pub use rule::{CmpOp, Policy, PolicyRule, RuleKind};
