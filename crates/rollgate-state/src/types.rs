//! Domain types for the RollGate decision store.
//!
//! These types represent the persisted state of evaluation sessions,
//! promotion decisions, and rollback points. All types are serializable
//! to/from JSON for storage in redb tables.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use rollgate_policy::Verdict;

/// Unique identifier for an evaluation session.
pub type SessionId = String;

/// Unique identifier for a candidate artifact (model, config, rule-set).
pub type ModelId = String;

// ── Session ───────────────────────────────────────────────────────

/// Lifecycle phase of a session. Advances monotonically; `Promote` and
/// `Rollback` are both terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    Plan,
    Execute,
    Evaluate,
    Decide,
    Promote,
    Rollback,
}

impl SessionPhase {
    fn rank(self) -> u8 {
        match self {
            Self::Plan => 0,
            Self::Execute => 1,
            Self::Evaluate => 2,
            Self::Decide => 3,
            Self::Promote | Self::Rollback => 4,
        }
    }

    /// Whether a transition to `next` is allowed: strictly forward, or
    /// staying put. The two terminal phases cannot replace each other.
    pub fn can_advance_to(self, next: SessionPhase) -> bool {
        if self == next {
            return true;
        }
        next.rank() > self.rank()
    }
}

/// A versioned candidate artifact produced by the external pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    pub id: ModelId,
    pub version: String,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

/// The decision recorded for a session or model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Promote,
    Hold,
    Rollback,
}

/// A decision together with its reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecisionRecord {
    pub decision: Decision,
    pub reason: String,
}

/// One evaluation session, mutated in place by the controller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    pub task_type: String,
    pub phase: SessionPhase,
    /// Monotonic version counter; also the audit-log sequence.
    pub version: u64,
    /// Unix timestamp (seconds) when the session was created.
    pub created_at: u64,
    /// Unix timestamp (seconds) of the last accepted update.
    pub updated_at: u64,
    pub config: serde_json::Value,
    pub inputs: serde_json::Value,
    #[serde(default)]
    pub candidates: Vec<Candidate>,
    pub evaluation: Option<serde_json::Value>,
    /// Set at most once; identical re-writes are no-ops.
    pub decision: Option<DecisionRecord>,
    pub metrics: Option<serde_json::Value>,
    #[serde(default)]
    pub artifacts: Vec<String>,
    pub tag: Option<String>,
    pub error: Option<String>,
}

/// Partial update applied by `update_session`. `None` fields are left
/// untouched.
#[derive(Debug, Clone, Default)]
pub struct SessionPatch {
    pub phase: Option<SessionPhase>,
    pub candidates: Option<Vec<Candidate>>,
    pub evaluation: Option<serde_json::Value>,
    pub decision: Option<DecisionRecord>,
    pub metrics: Option<serde_json::Value>,
    pub artifacts: Option<Vec<String>>,
    pub tag: Option<String>,
    pub error: Option<String>,
}

// ── Promotion decisions ───────────────────────────────────────────

/// One stored promotion decision row (idempotent insert target).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromotionDecision {
    pub model_id: ModelId,
    pub decision: Decision,
    pub reason: String,
    /// sha256 over `decision\nreason`; part of the table key.
    pub content_hash: String,
    pub recorded_at: u64,
}

/// One decision attempt in the append-only log (stability gate input).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecisionEvent {
    pub model_id: ModelId,
    pub decision: Decision,
    pub reason: String,
    /// Unix timestamp in nanoseconds.
    pub recorded_at_nanos: u64,
}

/// Outcome of the N-of-M stability gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StableVerdict {
    PromoteStable,
    Hold,
}

// ── Rollback points ───────────────────────────────────────────────

/// A known-good artifact to fall back to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RollbackPoint {
    pub artifact_id: String,
    pub metrics: serde_json::Value,
    /// Pointer to the backed-up artifact (path or URI).
    pub backup_path: String,
    pub recorded_at: u64,
}

// ── Gate combination ──────────────────────────────────────────────

/// Combine the absolute and relative gate verdicts into a decision.
///
/// A `Promote` requires both gates to pass; otherwise the failing
/// reasons are carried into a `Hold`.
pub fn decide_promotion(absolute: &Verdict, relative: &Verdict) -> DecisionRecord {
    if absolute.pass && relative.pass {
        DecisionRecord {
            decision: Decision::Promote,
            reason: "absolute and relative gates passed".to_string(),
        }
    } else {
        let mut reasons = Vec::new();
        if !absolute.pass {
            reasons.push(format!("absolute: {}", absolute.reason_line()));
        }
        if !relative.pass {
            reasons.push(format!("relative: {}", relative.reason_line()));
        }
        DecisionRecord {
            decision: Decision::Hold,
            reason: reasons.join(" ; "),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn verdict(pass: bool) -> Verdict {
        Verdict {
            pass,
            reasons: vec![if pass { "ok".into() } else { "too slow".into() }],
        }
    }

    #[test]
    fn phase_order_is_monotonic() {
        use SessionPhase::*;
        assert!(Plan.can_advance_to(Execute));
        assert!(Plan.can_advance_to(Plan));
        assert!(Evaluate.can_advance_to(Decide));
        assert!(Decide.can_advance_to(Promote));
        assert!(Decide.can_advance_to(Rollback));

        assert!(!Execute.can_advance_to(Plan));
        assert!(!Promote.can_advance_to(Decide));
        // Terminal phases cannot replace each other.
        assert!(!Promote.can_advance_to(Rollback));
        assert!(!Rollback.can_advance_to(Promote));
    }

    #[test]
    fn promote_requires_both_gates() {
        let record = decide_promotion(&verdict(true), &verdict(true));
        assert_eq!(record.decision, Decision::Promote);

        for (abs, rel) in [(true, false), (false, true), (false, false)] {
            let record = decide_promotion(&verdict(abs), &verdict(rel));
            assert_eq!(record.decision, Decision::Hold, "abs={abs} rel={rel}");
        }
    }

    #[test]
    fn hold_reason_names_the_failing_gate() {
        let record = decide_promotion(&verdict(true), &verdict(false));
        assert!(record.reason.starts_with("relative:"));

        let record = decide_promotion(&verdict(false), &verdict(false));
        assert!(record.reason.contains("absolute:"));
        assert!(record.reason.contains("relative:"));
    }
}
