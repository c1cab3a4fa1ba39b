//! rollgate-state — embedded decision store for RollGate.
//!
//! Backed by [redb](https://docs.rs/redb), persists evaluation sessions
//! and promotion decisions. Sessions are written twice on every accepted
//! update: the latest version into `sessions` (queryable) and every
//! version into `session_audit` (append-only, for post-hoc
//! traceability). Promotion decisions are idempotent: the
//! `{model_id}:{content_hash}` key plus redb's single-writer
//! transactions guarantee exactly one logical row per distinct decision
//! content, no matter how many concurrent or repeated writers race.
//!
//! The `DecisionStore` is `Clone` + `Send` + `Sync` (backed by
//! `Arc<Database>`) and supports an in-memory backend for testing.

pub mod error;
pub mod store;
pub mod tables;
pub mod types;

pub use error::{StateError, StateResult};
pub use store::DecisionStore;
pub use types::*;
