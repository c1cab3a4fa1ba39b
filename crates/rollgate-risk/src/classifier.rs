//! Risk classifier — failure severity and the single-timeout downgrade.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::freeze::FreezeFlagProbe;

/// Severity at or above which a failure counts as new risk.
pub const HIGH_SEVERITY: u8 = 3;

/// Failure type, ranked by severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    System,
    Validation,
    Spec,
    Transient,
}

impl FailureKind {
    /// Severity rank: System=3, Validation=2, Spec=2, Transient=1.
    pub fn severity(self) -> u8 {
        match self {
            Self::System => 3,
            Self::Validation | Self::Spec => 2,
            Self::Transient => 1,
        }
    }
}

/// One observed failure from the evaluation run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureRecord {
    #[serde(rename = "type")]
    pub kind: FailureKind,
    pub msg: String,
}

impl FailureRecord {
    fn is_high_severity(&self) -> bool {
        self.kind.severity() >= HIGH_SEVERITY
    }

    fn is_timeout(&self) -> bool {
        self.msg.to_ascii_lowercase().contains("timeout")
    }
}

/// Live signals consulted by the downgrade guards. Every field is
/// optional: a missing or unparsable value fails its guard, it never
/// crashes the classifier.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GuardSignals {
    #[serde(default)]
    pub pass_rate: Option<f64>,
    /// Relative p95 latency change, candidate vs. baseline (0.03 = +3%).
    #[serde(default)]
    pub p95_delta: Option<f64>,
    #[serde(default)]
    pub p99_latency_ms: Option<f64>,
    #[serde(default)]
    pub canary_traffic_pct: Option<f64>,
}

/// Thresholds for the five downgrade guards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskThresholds {
    pub min_pass_rate: f64,
    pub max_p95_delta: f64,
    pub slo_p99_ms: f64,
    pub slo_multiplier: f64,
    pub max_canary_pct: f64,
}

impl Default for RiskThresholds {
    fn default() -> Self {
        Self {
            min_pass_rate: 0.80,
            max_p95_delta: 0.05,
            slo_p99_ms: 500.0,
            slo_multiplier: 1.10,
            max_canary_pct: 20.0,
        }
    }
}

/// Pass/fail for one named guard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuardCheck {
    pub name: String,
    pub passed: bool,
}

/// Classification output, written verbatim by the risk-check CLI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskReport {
    /// High-severity failures after any downgrade.
    pub new_risk_count: usize,
    /// The per-guard pass/fail list, emitted whether or not the
    /// downgrade applied.
    pub guards: Vec<GuardCheck>,
    pub thresholds: RiskThresholds,
    /// Set when a downgrade fired; a human must acknowledge it.
    pub human_ack: bool,
    /// Begins with `"downgraded:"` when the downgrade fired.
    pub note: Option<String>,
}

/// Classify a failure set against the downgrade guards.
///
/// A single System failure whose message marks a timeout is removed
/// from the high-severity set only when all five guards hold
/// simultaneously; flipping any one blocks the downgrade.
pub fn classify(
    failures: &[FailureRecord],
    signals: &GuardSignals,
    thresholds: &RiskThresholds,
    probe: &dyn FreezeFlagProbe,
) -> RiskReport {
    let high: Vec<&FailureRecord> = failures.iter().filter(|f| f.is_high_severity()).collect();

    let frozen = probe.is_frozen();
    let guards = vec![
        GuardCheck {
            name: "pass_rate".to_string(),
            passed: signals
                .pass_rate
                .is_some_and(|v| v.is_finite() && v >= thresholds.min_pass_rate),
        },
        GuardCheck {
            name: "p95_delta".to_string(),
            passed: signals
                .p95_delta
                .is_some_and(|v| v.is_finite() && v <= thresholds.max_p95_delta),
        },
        GuardCheck {
            name: "p99_slo".to_string(),
            passed: signals.p99_latency_ms.is_some_and(|v| {
                v.is_finite() && v <= thresholds.slo_p99_ms * thresholds.slo_multiplier
            }),
        },
        GuardCheck {
            name: "canary_traffic".to_string(),
            passed: signals
                .canary_traffic_pct
                .is_some_and(|v| v.is_finite() && v < thresholds.max_canary_pct),
        },
        GuardCheck {
            name: "not_frozen".to_string(),
            passed: !frozen,
        },
    ];
    let all_guards_pass = guards.iter().all(|g| g.passed);

    // The downgrade applies only to exactly one high-severity failure,
    // and only a System timeout.
    let downgrade_candidate =
        high.len() == 1 && high[0].kind == FailureKind::System && high[0].is_timeout();

    let downgraded = downgrade_candidate && all_guards_pass;
    let new_risk_count = if downgraded { 0 } else { high.len() };

    let note = if downgraded {
        info!(msg = %high[0].msg, "single System timeout downgraded out of high-severity set");
        Some(format!(
            "downgraded: single System timeout ({}) excluded; all five guards passed",
            high[0].msg
        ))
    } else {
        None
    };

    debug!(
        failures = failures.len(),
        high = high.len(),
        new_risk_count,
        downgraded,
        "failures classified"
    );

    RiskReport {
        new_risk_count,
        guards,
        thresholds: thresholds.clone(),
        human_ack: downgraded,
        note,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::freeze::StaticProbe;

    fn system_timeout() -> FailureRecord {
        FailureRecord {
            kind: FailureKind::System,
            msg: "timeout".to_string(),
        }
    }

    fn healthy_signals() -> GuardSignals {
        GuardSignals {
            pass_rate: Some(0.85),
            p95_delta: Some(0.03),
            p99_latency_ms: Some(500.0 * 1.05),
            canary_traffic_pct: Some(10.0),
        }
    }

    #[test]
    fn severity_ranking() {
        assert_eq!(FailureKind::System.severity(), 3);
        assert_eq!(FailureKind::Validation.severity(), 2);
        assert_eq!(FailureKind::Spec.severity(), 2);
        assert_eq!(FailureKind::Transient.severity(), 1);
    }

    #[test]
    fn downgrade_fires_when_all_guards_hold() {
        let report = classify(
            &[system_timeout()],
            &healthy_signals(),
            &RiskThresholds::default(),
            &StaticProbe(false),
        );

        assert_eq!(report.new_risk_count, 0);
        assert!(report.human_ack);
        assert!(report.note.as_deref().unwrap().starts_with("downgraded:"));
        assert!(report.guards.iter().all(|g| g.passed));
        assert_eq!(report.guards.len(), 5);
    }

    #[test]
    fn flipping_any_guard_blocks_the_downgrade() {
        let thresholds = RiskThresholds::default();
        let cases: Vec<(&str, GuardSignals, bool)> = vec![
            (
                "pass_rate",
                GuardSignals {
                    pass_rate: Some(0.5),
                    ..healthy_signals()
                },
                false,
            ),
            (
                "p95_delta",
                GuardSignals {
                    p95_delta: Some(0.5),
                    ..healthy_signals()
                },
                false,
            ),
            (
                "p99_slo",
                GuardSignals {
                    p99_latency_ms: Some(10_000.0),
                    ..healthy_signals()
                },
                false,
            ),
            (
                "canary_traffic",
                GuardSignals {
                    canary_traffic_pct: Some(50.0),
                    ..healthy_signals()
                },
                false,
            ),
            ("not_frozen", healthy_signals(), true),
        ];

        for (flipped, signals, frozen) in cases {
            let report = classify(
                &[system_timeout()],
                &signals,
                &thresholds,
                &StaticProbe(frozen),
            );
            assert_eq!(report.new_risk_count, 1, "guard {flipped} should block");
            assert!(!report.human_ack);
            assert!(report.note.is_none());
            let check = report.guards.iter().find(|g| g.name == flipped).unwrap();
            assert!(!check.passed, "guard {flipped} should be reported failed");
        }
    }

    #[test]
    fn missing_signal_fails_its_guard() {
        let signals = GuardSignals {
            pass_rate: None,
            ..healthy_signals()
        };
        let report = classify(
            &[system_timeout()],
            &signals,
            &RiskThresholds::default(),
            &StaticProbe(false),
        );
        assert_eq!(report.new_risk_count, 1);
        assert!(!report.guards[0].passed);
    }

    #[test]
    fn nan_signal_fails_its_guard() {
        let signals = GuardSignals {
            p95_delta: Some(f64::NAN),
            ..healthy_signals()
        };
        let report = classify(
            &[system_timeout()],
            &signals,
            &RiskThresholds::default(),
            &StaticProbe(false),
        );
        assert_eq!(report.new_risk_count, 1);
    }

    #[test]
    fn two_system_failures_never_downgrade() {
        let failures = vec![system_timeout(), system_timeout()];
        let report = classify(
            &failures,
            &healthy_signals(),
            &RiskThresholds::default(),
            &StaticProbe(false),
        );
        assert_eq!(report.new_risk_count, 2);
        assert!(report.note.is_none());
    }

    #[test]
    fn non_timeout_system_failure_never_downgrades() {
        let failures = vec![FailureRecord {
            kind: FailureKind::System,
            msg: "segfault".to_string(),
        }];
        let report = classify(
            &failures,
            &healthy_signals(),
            &RiskThresholds::default(),
            &StaticProbe(false),
        );
        assert_eq!(report.new_risk_count, 1);
    }

    #[test]
    fn low_severity_failures_are_not_risk() {
        let failures = vec![
            FailureRecord {
                kind: FailureKind::Validation,
                msg: "schema mismatch".to_string(),
            },
            FailureRecord {
                kind: FailureKind::Transient,
                msg: "retry later".to_string(),
            },
        ];
        let report = classify(
            &failures,
            &GuardSignals::default(),
            &RiskThresholds::default(),
            &StaticProbe(false),
        );
        assert_eq!(report.new_risk_count, 0);
        assert!(!report.human_ack);
    }

    #[test]
    fn failure_record_json_shape() {
        let parsed: Vec<FailureRecord> =
            serde_json::from_str(r#"[{"type": "system", "msg": "timeout"}]"#).unwrap();
        assert_eq!(parsed, vec![system_timeout()]);
    }

    #[test]
    fn guard_list_emitted_even_without_candidate() {
        let report = classify(
            &[],
            &healthy_signals(),
            &RiskThresholds::default(),
            &StaticProbe(false),
        );
        assert_eq!(report.guards.len(), 5);
        assert_eq!(report.new_risk_count, 0);
    }
}
