//! DecisionStore — redb-backed persistence for sessions and decisions.
//!
//! Sessions are read-modify-write: every accepted update lands in the
//! append-only `session_audit` table and replaces the `sessions` row.
//! Promotion decisions are inserted if-absent under the
//! `{model_id}:{content_hash}` key inside a single write transaction;
//! redb serializes writers, so concurrent identical calls still yield
//! exactly one logical row.

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use rand::Rng;
use redb::{Database, ReadableDatabase, ReadableTable};
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use crate::error::{StateError, StateResult};
use crate::tables::*;
use crate::types::*;

/// Convert any `Display` error into a `StateError` variant via a closure factory.
macro_rules! map_err {
    ($variant:ident) => {
        |e| StateError::$variant(e.to_string())
    };
}

/// Thread-safe decision store backed by redb.
#[derive(Clone)]
pub struct DecisionStore {
    db: Arc<Database>,
    /// Tie-breaker for decision-log keys landing in the same nanosecond.
    log_seq: Arc<AtomicU64>,
}

impl DecisionStore {
    /// Open (or create) a persistent decision store at the given path.
    pub fn open(path: &Path) -> StateResult<Self> {
        let db = Database::create(path).map_err(map_err!(Open))?;
        let store = Self {
            db: Arc::new(db),
            log_seq: Arc::new(AtomicU64::new(0)),
        };
        store.ensure_tables()?;
        debug!(?path, "decision store opened");
        Ok(store)
    }

    /// Create an ephemeral in-memory decision store (for testing).
    pub fn open_in_memory() -> StateResult<Self> {
        let backend = redb::backends::InMemoryBackend::new();
        let db = Database::builder()
            .create_with_backend(backend)
            .map_err(map_err!(Open))?;
        let store = Self {
            db: Arc::new(db),
            log_seq: Arc::new(AtomicU64::new(0)),
        };
        store.ensure_tables()?;
        debug!("in-memory decision store opened");
        Ok(store)
    }

    /// Create all tables if they don't exist yet.
    fn ensure_tables(&self) -> StateResult<()> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        // Opening a table in a write transaction creates it if absent.
        txn.open_table(SESSIONS).map_err(map_err!(Table))?;
        txn.open_table(SESSION_AUDIT).map_err(map_err!(Table))?;
        txn.open_table(PROMOTION_DECISIONS).map_err(map_err!(Table))?;
        txn.open_table(DECISION_LOG).map_err(map_err!(Table))?;
        txn.open_table(ROLLBACK_POINTS).map_err(map_err!(Table))?;
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }

    // ── Sessions ───────────────────────────────────────────────────

    /// Create a new session in phase `Plan` and persist version 0.
    pub fn create_session(
        &self,
        task_type: &str,
        config: serde_json::Value,
        inputs: serde_json::Value,
    ) -> StateResult<Session> {
        let now = epoch_secs();
        let suffix: u32 = rand::thread_rng().gen_range(0..0x100_0000);
        let session = Session {
            id: format!("{now}-{suffix:06x}"),
            task_type: task_type.to_string(),
            phase: SessionPhase::Plan,
            version: 0,
            created_at: now,
            updated_at: now,
            config,
            inputs,
            candidates: Vec::new(),
            evaluation: None,
            decision: None,
            metrics: None,
            artifacts: Vec::new(),
            tag: None,
            error: None,
        };

        self.write_session(&session)?;
        info!(session = %session.id, task_type, "session created");
        Ok(session)
    }

    /// Get the latest version of a session.
    pub fn get_session(&self, id: &str) -> StateResult<Option<Session>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(SESSIONS).map_err(map_err!(Table))?;
        match table.get(id).map_err(map_err!(Read))? {
            Some(guard) => {
                let session: Session =
                    serde_json::from_slice(guard.value()).map_err(map_err!(Deserialize))?;
                Ok(Some(session))
            }
            None => Ok(None),
        }
    }

    /// Apply a partial update to a session (read-modify-write).
    ///
    /// The phase may only advance along its order; the decision is set
    /// at most once — an identical re-write is accepted, a conflicting
    /// one is an error. An update that changes nothing is a no-op and
    /// does not produce a new version.
    pub fn update_session(&self, id: &str, patch: SessionPatch) -> StateResult<Session> {
        let current = self
            .get_session(id)?
            .ok_or_else(|| StateError::NotFound(id.to_string()))?;

        let mut next = current.clone();
        if let Some(phase) = patch.phase {
            if !current.phase.can_advance_to(phase) {
                return Err(StateError::PhaseRegression {
                    id: id.to_string(),
                    from: current.phase,
                    to: phase,
                });
            }
            next.phase = phase;
        }
        if let Some(decision) = patch.decision {
            match &current.decision {
                Some(existing) if *existing != decision => {
                    return Err(StateError::DecisionConflict { id: id.to_string() });
                }
                _ => next.decision = Some(decision),
            }
        }
        if let Some(candidates) = patch.candidates {
            next.candidates = candidates;
        }
        if let Some(evaluation) = patch.evaluation {
            next.evaluation = Some(evaluation);
        }
        if let Some(metrics) = patch.metrics {
            next.metrics = Some(metrics);
        }
        if let Some(artifacts) = patch.artifacts {
            next.artifacts = artifacts;
        }
        if let Some(tag) = patch.tag {
            next.tag = Some(tag);
        }
        if let Some(error) = patch.error {
            next.error = Some(error);
        }

        if next == current {
            debug!(session = %id, "update changed nothing, skipping write");
            return Ok(current);
        }

        next.version = current.version + 1;
        next.updated_at = epoch_secs();
        self.write_session(&next)?;
        debug!(session = %id, version = next.version, phase = ?next.phase, "session updated");
        Ok(next)
    }

    /// Persist one session version into both the latest-row table and
    /// the append-only audit table, atomically.
    fn write_session(&self, session: &Session) -> StateResult<()> {
        let value = serde_json::to_vec(session).map_err(map_err!(Serialize))?;
        let audit_key = format!("{}:{:08}", session.id, session.version);
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut latest = txn.open_table(SESSIONS).map_err(map_err!(Table))?;
            latest
                .insert(session.id.as_str(), value.as_slice())
                .map_err(map_err!(Write))?;
            let mut audit = txn.open_table(SESSION_AUDIT).map_err(map_err!(Table))?;
            audit
                .insert(audit_key.as_str(), value.as_slice())
                .map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }

    /// List latest session versions, optionally filtered by task type
    /// and/or phase.
    pub fn list_sessions(
        &self,
        task_type: Option<&str>,
        phase: Option<SessionPhase>,
    ) -> StateResult<Vec<Session>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(SESSIONS).map_err(map_err!(Table))?;
        let mut results = Vec::new();
        for entry in table.iter().map_err(map_err!(Read))? {
            let (_, value) = entry.map_err(map_err!(Read))?;
            let session: Session =
                serde_json::from_slice(value.value()).map_err(map_err!(Deserialize))?;
            if let Some(t) = task_type
                && session.task_type != t
            {
                continue;
            }
            if let Some(p) = phase
                && session.phase != p
            {
                continue;
            }
            results.push(session);
        }
        Ok(results)
    }

    /// All audit-log versions of one session, oldest first.
    pub fn session_versions(&self, id: &str) -> StateResult<Vec<Session>> {
        let prefix = format!("{id}:");
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(SESSION_AUDIT).map_err(map_err!(Table))?;
        let mut results = Vec::new();
        for entry in table.iter().map_err(map_err!(Read))? {
            let (key, value) = entry.map_err(map_err!(Read))?;
            if key.value().starts_with(&prefix) {
                let session: Session =
                    serde_json::from_slice(value.value()).map_err(map_err!(Deserialize))?;
                results.push(session);
            }
        }
        Ok(results)
    }

    // ── Promotion decisions ────────────────────────────────────────

    /// Insert a promotion decision exactly once.
    ///
    /// The `{model_id}:{content_hash}` key is the uniqueness
    /// constraint: repeated or concurrent calls with identical content
    /// leave exactly one row. Returns whether a new row was written.
    /// Every attempt is appended to the decision log regardless.
    pub fn insert_promotion_once(
        &self,
        model_id: &str,
        decision: Decision,
        reason: &str,
    ) -> StateResult<bool> {
        self.insert_promotion_at(model_id, decision, reason, epoch_nanos())
    }

    fn insert_promotion_at(
        &self,
        model_id: &str,
        decision: Decision,
        reason: &str,
        nanos: u64,
    ) -> StateResult<bool> {
        let hash = content_hash(decision, reason);
        let key = format!("{model_id}:{hash}");
        let row = PromotionDecision {
            model_id: model_id.to_string(),
            decision,
            reason: reason.to_string(),
            content_hash: hash,
            recorded_at: nanos / 1_000_000_000,
        };
        let row_value = serde_json::to_vec(&row).map_err(map_err!(Serialize))?;

        let event = DecisionEvent {
            model_id: model_id.to_string(),
            decision,
            reason: reason.to_string(),
            recorded_at_nanos: nanos,
        };
        let event_value = serde_json::to_vec(&event).map_err(map_err!(Serialize))?;
        let seq = self.log_seq.fetch_add(1, Ordering::Relaxed);
        let event_key = format!("{model_id}:{nanos:020}:{seq:06}");

        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let inserted;
        {
            let mut decisions = txn
                .open_table(PROMOTION_DECISIONS)
                .map_err(map_err!(Table))?;
            let exists = decisions
                .get(key.as_str())
                .map_err(map_err!(Read))?
                .is_some();
            if !exists {
                decisions
                    .insert(key.as_str(), row_value.as_slice())
                    .map_err(map_err!(Write))?;
            }
            inserted = !exists;

            let mut log = txn.open_table(DECISION_LOG).map_err(map_err!(Table))?;
            log.insert(event_key.as_str(), event_value.as_slice())
                .map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;

        if inserted {
            info!(model = %model_id, ?decision, "promotion decision stored");
        } else {
            debug!(model = %model_id, ?decision, "duplicate promotion decision, no-op");
        }
        Ok(inserted)
    }

    /// All stored promotion decision rows for a model.
    pub fn list_promotions(&self, model_id: &str) -> StateResult<Vec<PromotionDecision>> {
        let prefix = format!("{model_id}:");
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn
            .open_table(PROMOTION_DECISIONS)
            .map_err(map_err!(Table))?;
        let mut results = Vec::new();
        for entry in table.iter().map_err(map_err!(Read))? {
            let (key, value) = entry.map_err(map_err!(Read))?;
            if key.value().starts_with(&prefix) {
                let row: PromotionDecision =
                    serde_json::from_slice(value.value()).map_err(map_err!(Deserialize))?;
                results.push(row);
            }
        }
        Ok(results)
    }

    /// Recent decision events for a model, newest first.
    pub fn decision_events(&self, model_id: &str, limit: usize) -> StateResult<Vec<DecisionEvent>> {
        let prefix = format!("{model_id}:");
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(DECISION_LOG).map_err(map_err!(Table))?;
        let mut results = Vec::new();
        // Keys are zero-padded nanos, so iteration order is chronological.
        for entry in table.iter().map_err(map_err!(Read))? {
            let (key, value) = entry.map_err(map_err!(Read))?;
            if key.value().starts_with(&prefix) {
                let event: DecisionEvent =
                    serde_json::from_slice(value.value()).map_err(map_err!(Deserialize))?;
                results.push(event);
            }
        }
        results.reverse();
        results.truncate(limit);
        Ok(results)
    }

    /// N-of-M stability gate.
    ///
    /// `PromoteStable` only when at least `n` decision events exist for
    /// the model, the most recent `n` are all `Promote`, and the oldest
    /// of those still falls inside the trailing window. Anything else
    /// is `Hold`.
    pub fn stability_verdict(
        &self,
        model_id: &str,
        n: usize,
        window: Duration,
    ) -> StateResult<StableVerdict> {
        self.stability_verdict_at(model_id, n, window, epoch_nanos())
    }

    fn stability_verdict_at(
        &self,
        model_id: &str,
        n: usize,
        window: Duration,
        now_nanos: u64,
    ) -> StateResult<StableVerdict> {
        let recent = self.decision_events(model_id, n)?;
        if recent.len() < n {
            return Ok(StableVerdict::Hold);
        }
        if recent.iter().any(|e| e.decision != Decision::Promote) {
            return Ok(StableVerdict::Hold);
        }
        let window_start = now_nanos.saturating_sub(window.as_nanos() as u64);
        let oldest = recent.last().map(|e| e.recorded_at_nanos).unwrap_or(0);
        if oldest < window_start {
            return Ok(StableVerdict::Hold);
        }
        Ok(StableVerdict::PromoteStable)
    }

    // ── Rollback points ────────────────────────────────────────────

    /// Store the known-good rollback point for a model.
    pub fn put_rollback_point(&self, model_id: &str, point: &RollbackPoint) -> StateResult<()> {
        let value = serde_json::to_vec(point).map_err(map_err!(Serialize))?;
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut table = txn.open_table(ROLLBACK_POINTS).map_err(map_err!(Table))?;
            table
                .insert(model_id, value.as_slice())
                .map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(model = %model_id, artifact = %point.artifact_id, "rollback point stored");
        Ok(())
    }

    /// Get the rollback point for a model.
    pub fn get_rollback_point(&self, model_id: &str) -> StateResult<Option<RollbackPoint>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(ROLLBACK_POINTS).map_err(map_err!(Table))?;
        match table.get(model_id).map_err(map_err!(Read))? {
            Some(guard) => {
                let point: RollbackPoint =
                    serde_json::from_slice(guard.value()).map_err(map_err!(Deserialize))?;
                Ok(Some(point))
            }
            None => Ok(None),
        }
    }
}

/// sha256 over the decision's logical content.
fn content_hash(decision: Decision, reason: &str) -> String {
    let tag = match decision {
        Decision::Promote => "promote",
        Decision::Hold => "hold",
        Decision::Rollback => "rollback",
    };
    let mut hasher = Sha256::new();
    hasher.update(tag.as_bytes());
    hasher.update(b"\n");
    hasher.update(reason.as_bytes());
    hex::encode(hasher.finalize())
}

fn epoch_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

fn epoch_nanos() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos() as u64
}
