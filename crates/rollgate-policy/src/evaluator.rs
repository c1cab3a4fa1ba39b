//! Rule evaluator — the pure promotion-gate function.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::results::MetricResults;
use crate::rule::{Policy, RuleKind};

/// Outcome of evaluating a policy against a set of results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verdict {
    pub pass: bool,
    pub reasons: Vec<String>,
}

impl Verdict {
    /// Render the reason list for CLI output.
    pub fn reason_line(&self) -> String {
        self.reasons.join(" ; ")
    }
}

/// Evaluate every rule in the policy against the results.
///
/// Overall pass is the AND over all rules. An empty policy passes with
/// reason `no_policy_rules`. A missing metric or malformed rule fails
/// that rule with a diagnostic reason; this function never errors.
pub fn evaluate(results: &MetricResults, policy: &Policy) -> Verdict {
    if policy.rules.is_empty() {
        return Verdict {
            pass: true,
            reasons: vec!["no_policy_rules".to_string()],
        };
    }

    let mut failures = Vec::new();
    for rule in &policy.rules {
        if let Some(reason) = check_rule(results, &rule.name, &rule.kind) {
            failures.push(reason);
        }
    }

    let pass = failures.is_empty();
    debug!(
        rules = policy.rules.len(),
        failed = failures.len(),
        pass,
        "policy evaluated"
    );

    let reasons = if pass {
        vec![format!("{}_rules_passed", policy.rules.len())]
    } else {
        failures
    };
    Verdict { pass, reasons }
}

/// Check one rule; `None` means pass, `Some(reason)` means fail.
fn check_rule(results: &MetricResults, name: &str, kind: &RuleKind) -> Option<String> {
    match kind {
        RuleKind::Malformed { detail } => Some(format!("{name}: malformed_rule({detail})")),

        RuleKind::Cmp { op, value } => {
            let observed = match results.get(name) {
                Some(v) => v,
                None => return Some(format!("{name}: metric_missing")),
            };
            if op.apply(observed, *value) {
                None
            } else {
                Some(format!("{name}: {observed} !{op} {value}"))
            }
        }

        RuleKind::Range { min, max } => {
            let observed = match results.get(name) {
                Some(v) => v,
                None => return Some(format!("{name}: metric_missing")),
            };
            if let Some(min) = min
                && observed < *min
            {
                return Some(format!("{name}: {observed} < min {min}"));
            }
            if let Some(max) = max
                && observed > *max
            {
                return Some(format!("{name}: {observed} > max {max}"));
            }
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rule::Policy;

    fn results(json: &str) -> MetricResults {
        MetricResults::from_json_str(json).unwrap()
    }

    fn policy(yaml: &str) -> Policy {
        Policy::from_yaml_str(yaml).unwrap()
    }

    #[test]
    fn empty_policy_passes_with_marker_reason() {
        let verdict = evaluate(&results("{}"), &Policy::empty());
        assert!(verdict.pass);
        assert_eq!(verdict.reasons, vec!["no_policy_rules"]);
    }

    #[test]
    fn gt_zero_fails_on_exact_zero() {
        let p = policy("delta:\n  op: gt\n  value: 0\n");
        let verdict = evaluate(&results(r#"{"delta": 0}"#), &p);
        assert!(!verdict.pass);
    }

    #[test]
    fn gt_zero_passes_on_one_nano() {
        let p = policy("delta:\n  op: gt\n  value: 0\n");
        let verdict = evaluate(&results(r#"{"delta": 1e-9}"#), &p);
        assert!(verdict.pass, "reasons: {:?}", verdict.reasons);
    }

    #[test]
    fn float_artifact_boundary_is_exact() {
        // 0.1 + 0.2 in binary floats exceeds 0.3; in decimal 0.3 le 0.3.
        let p = policy("sum:\n  op: le\n  value: 0.3\n");
        let verdict = evaluate(&results(r#"{"sum": 0.3}"#), &p);
        assert!(verdict.pass);
    }

    #[test]
    fn all_rules_must_pass() {
        let p = policy(
            "delta:\n  op: gt\n  value: 0\n\
             p_value:\n  op: le\n  value: 0.05\n",
        );
        // "delta" resolves via the derived alias to objective_delta.
        let verdict = evaluate(
            &results(r#"{"objective_delta": 0.09, "p_value": 0.001}"#),
            &p,
        );
        assert!(verdict.pass);

        let verdict = evaluate(&results(r#"{"delta": 0.09, "p_value": 0.2}"#), &p);
        assert!(!verdict.pass);
        assert_eq!(verdict.reasons.len(), 1);
        assert!(verdict.reasons[0].starts_with("p_value:"));
    }

    #[test]
    fn missing_metric_fails_closed() {
        let p = policy("latency_p95:\n  op: lt\n  value: 200\n");
        let verdict = evaluate(&results("{}"), &p);
        assert!(!verdict.pass);
        assert_eq!(verdict.reasons, vec!["latency_p95: metric_missing"]);
    }

    #[test]
    fn malformed_rule_fails_closed() {
        let p = policy("delta:\n  op: between\n  value: 1\n");
        let verdict = evaluate(&results(r#"{"delta": 5}"#), &p);
        assert!(!verdict.pass);
        assert!(verdict.reasons[0].contains("malformed_rule"));
    }

    #[test]
    fn range_bounds_checked_independently() {
        let p = policy("count:\n  min: 10\n  max: 20\n");
        assert!(evaluate(&results(r#"{"count": 15}"#), &p).pass);
        assert!(evaluate(&results(r#"{"count": 10}"#), &p).pass); // inclusive
        assert!(evaluate(&results(r#"{"count": 20}"#), &p).pass); // inclusive
        assert!(!evaluate(&results(r#"{"count": 9}"#), &p).pass);
        assert!(!evaluate(&results(r#"{"count": 21}"#), &p).pass);

        let min_only = policy("count:\n  min: 10\n");
        assert!(evaluate(&results(r#"{"count": 1000000}"#), &min_only).pass);
    }

    #[test]
    fn derived_metric_in_rule_name() {
        let p = policy("ci_width:\n  op: lt\n  value: 0.2\n");
        let verdict = evaluate(&results(r#"{"ci_low": 0.5, "ci_high": 0.6}"#), &p);
        assert!(verdict.pass);

        let p = policy("mes:\n  op: gt\n  value: 0.05\n");
        let verdict = evaluate(&results(r#"{"objective_delta": -0.09}"#), &p);
        assert!(verdict.pass);
    }

    #[test]
    fn reason_line_joins_with_semicolons() {
        let p = policy(
            "a:\n  op: gt\n  value: 1\n\
             b:\n  op: gt\n  value: 1\n",
        );
        let verdict = evaluate(&results(r#"{"a": 0, "b": 0}"#), &p);
        assert!(verdict.reason_line().contains(" ; "));
    }
}
