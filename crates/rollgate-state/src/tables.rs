//! redb table definitions for the RollGate decision store.
//!
//! Each table uses `&str` keys and `&[u8]` values (JSON-serialized
//! domain types). Composite keys follow the pattern
//! `{parent_id}:{suffix}` to enable prefix scans.

use redb::TableDefinition;

/// Latest session version keyed by `{session_id}`.
pub const SESSIONS: TableDefinition<&str, &[u8]> = TableDefinition::new("sessions");

/// Every accepted session version keyed by `{session_id}:{version:08}`.
/// Append-only; rows are never rewritten.
pub const SESSION_AUDIT: TableDefinition<&str, &[u8]> = TableDefinition::new("session_audit");

/// Promotion decisions keyed by `{model_id}:{content_hash}`. The key
/// doubles as the uniqueness constraint for idempotent inserts.
pub const PROMOTION_DECISIONS: TableDefinition<&str, &[u8]> =
    TableDefinition::new("promotion_decisions");

/// Every decision attempt keyed by `{model_id}:{nanos:020}:{seq:06}`,
/// feeding the N-of-M stability gate.
pub const DECISION_LOG: TableDefinition<&str, &[u8]> = TableDefinition::new("decision_log");

/// Known-good rollback points keyed by `{model_id}`.
pub const ROLLBACK_POINTS: TableDefinition<&str, &[u8]> = TableDefinition::new("rollback_points");
