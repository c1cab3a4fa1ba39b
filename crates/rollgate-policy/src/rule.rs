//! Threshold rules — comparator and range rules over named metrics.

use std::path::Path;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{PolicyError, PolicyResult};

/// Metadata keys that may appear at the top level of a policy file but
/// are not rules. The evaluator skips them.
pub const RESERVED_KEYS: &[&str] = &["policy_version", "description"];

/// Comparison operator for a threshold rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CmpOp {
    Gt,
    Ge,
    Lt,
    Le,
    Eq,
    Ne,
}

impl CmpOp {
    /// Apply the operator to `(observed, threshold)`.
    pub fn apply(self, observed: Decimal, threshold: Decimal) -> bool {
        match self {
            Self::Gt => observed > threshold,
            Self::Ge => observed >= threshold,
            Self::Lt => observed < threshold,
            Self::Le => observed <= threshold,
            Self::Eq => observed == threshold,
            Self::Ne => observed != threshold,
        }
    }

    fn parse(s: &str) -> Option<Self> {
        match s {
            "gt" => Some(Self::Gt),
            "ge" => Some(Self::Ge),
            "lt" => Some(Self::Lt),
            "le" => Some(Self::Le),
            "eq" => Some(Self::Eq),
            "ne" => Some(Self::Ne),
            _ => None,
        }
    }
}

impl std::fmt::Display for CmpOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Gt => "gt",
            Self::Ge => "ge",
            Self::Lt => "lt",
            Self::Le => "le",
            Self::Eq => "eq",
            Self::Ne => "ne",
        };
        write!(f, "{s}")
    }
}

/// One threshold rule body.
///
/// `Malformed` is kept in the union so a bad rule in an otherwise valid
/// policy fails that rule at evaluation time (fail closed) instead of
/// rejecting the whole file at load time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RuleKind {
    /// `{op, value}` comparator rule.
    Cmp { op: CmpOp, value: Decimal },
    /// `{min, max}` range rule; both bounds optional, checked independently.
    Range {
        min: Option<Decimal>,
        max: Option<Decimal>,
    },
    /// Unparseable rule body; always fails with the stored detail.
    Malformed { detail: String },
}

/// A named rule within a policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyRule {
    pub name: String,
    pub kind: RuleKind,
}

/// An ordered set of threshold rules.
///
/// Loaded once per evaluation and treated as immutable for that
/// evaluation. Rule order follows the YAML document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Policy {
    pub rules: Vec<PolicyRule>,
}

impl Policy {
    /// An empty policy (always passes with reason `no_policy_rules`).
    pub fn empty() -> Self {
        Self::default()
    }

    /// Load a policy from a YAML file.
    pub fn load(path: &Path) -> PolicyResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| PolicyError::Read {
            path: path.display().to_string(),
            source: e,
        })?;
        let policy = Self::from_yaml_str(&text)?;
        debug!(path = %path.display(), rules = policy.rules.len(), "policy loaded");
        Ok(policy)
    }

    /// Parse a policy from YAML text.
    ///
    /// The document must be a mapping (or empty). Each entry becomes a
    /// rule; reserved metadata keys are skipped.
    pub fn from_yaml_str(text: &str) -> PolicyResult<Self> {
        if text.trim().is_empty() {
            return Ok(Self::empty());
        }
        let doc: serde_yaml::Value =
            serde_yaml::from_str(text).map_err(|e| PolicyError::Yaml(e.to_string()))?;
        let mapping = match doc {
            serde_yaml::Value::Null => return Ok(Self::empty()),
            serde_yaml::Value::Mapping(m) => m,
            other => {
                return Err(PolicyError::NotAMapping(format!(
                    "expected mapping, got {other:?}"
                )));
            }
        };

        let mut rules = Vec::new();
        for (key, body) in mapping {
            let name = match key.as_str() {
                Some(s) => s.to_string(),
                None => {
                    rules.push(PolicyRule {
                        name: format!("{key:?}"),
                        kind: RuleKind::Malformed {
                            detail: "non-string rule name".to_string(),
                        },
                    });
                    continue;
                }
            };
            if RESERVED_KEYS.contains(&name.as_str()) {
                continue;
            }
            let kind = parse_rule_body(&body);
            rules.push(PolicyRule { name, kind });
        }
        Ok(Self { rules })
    }
}

/// Parse one rule body into a `RuleKind`, downgrading anything
/// unrecognized to `Malformed`.
fn parse_rule_body(body: &serde_yaml::Value) -> RuleKind {
    let map = match body.as_mapping() {
        Some(m) => m,
        None => {
            return RuleKind::Malformed {
                detail: "rule body is not a mapping".to_string(),
            };
        }
    };

    let field = |name: &str| map.get(serde_yaml::Value::String(name.to_string()));

    if let Some(op_val) = field("op") {
        let op = match op_val.as_str().and_then(CmpOp::parse) {
            Some(op) => op,
            None => {
                return RuleKind::Malformed {
                    detail: format!("unknown op {op_val:?}"),
                };
            }
        };
        let value = match field("value").and_then(yaml_decimal) {
            Some(v) => v,
            None => {
                return RuleKind::Malformed {
                    detail: "missing or non-numeric value".to_string(),
                };
            }
        };
        return RuleKind::Cmp { op, value };
    }

    if field("min").is_some() || field("max").is_some() {
        let min = match field("min") {
            None => None,
            Some(v) => match yaml_decimal(v) {
                Some(d) => Some(d),
                None => {
                    return RuleKind::Malformed {
                        detail: "non-numeric min".to_string(),
                    };
                }
            },
        };
        let max = match field("max") {
            None => None,
            Some(v) => match yaml_decimal(v) {
                Some(d) => Some(d),
                None => {
                    return RuleKind::Malformed {
                        detail: "non-numeric max".to_string(),
                    };
                }
            },
        };
        return RuleKind::Range { min, max };
    }

    RuleKind::Malformed {
        detail: "rule has neither op/value nor min/max".to_string(),
    }
}

/// Convert a YAML scalar to a `Decimal` via its literal text.
fn yaml_decimal(value: &serde_yaml::Value) -> Option<Decimal> {
    match value {
        serde_yaml::Value::Number(n) => parse_decimal(&n.to_string()),
        serde_yaml::Value::String(s) => parse_decimal(s),
        _ => None,
    }
}

/// Parse decimal text, accepting scientific notation (`1e-9`).
pub(crate) fn parse_decimal(text: &str) -> Option<Decimal> {
    Decimal::from_str(text)
        .ok()
        .or_else(|| Decimal::from_scientific(text).ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_comparator_and_range_rules() {
        let policy = Policy::from_yaml_str(
            "policy_version: 3\n\
             delta:\n  op: gt\n  value: 0\n\
             p_value:\n  op: le\n  value: 0.05\n\
             sample_size:\n  min: 30\n  max: 100000\n",
        )
        .unwrap();

        assert_eq!(policy.rules.len(), 3); // policy_version skipped.
        assert_eq!(policy.rules[0].name, "delta");
        assert_eq!(
            policy.rules[0].kind,
            RuleKind::Cmp {
                op: CmpOp::Gt,
                value: Decimal::ZERO
            }
        );
        assert!(matches!(
            policy.rules[2].kind,
            RuleKind::Range {
                min: Some(_),
                max: Some(_)
            }
        ));
    }

    #[test]
    fn preserves_rule_order() {
        let policy = Policy::from_yaml_str(
            "zeta:\n  op: gt\n  value: 1\n\
             alpha:\n  op: lt\n  value: 2\n",
        )
        .unwrap();
        let names: Vec<_> = policy.rules.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["zeta", "alpha"]);
    }

    #[test]
    fn half_open_range() {
        let policy = Policy::from_yaml_str("errors:\n  max: 5\n").unwrap();
        assert_eq!(
            policy.rules[0].kind,
            RuleKind::Range {
                min: None,
                max: Some(Decimal::from(5))
            }
        );
    }

    #[test]
    fn unknown_op_is_malformed_not_fatal() {
        let policy = Policy::from_yaml_str("delta:\n  op: between\n  value: 1\n").unwrap();
        assert!(matches!(
            policy.rules[0].kind,
            RuleKind::Malformed { .. }
        ));
    }

    #[test]
    fn scalar_rule_body_is_malformed() {
        let policy = Policy::from_yaml_str("delta: 7\n").unwrap();
        assert!(matches!(
            policy.rules[0].kind,
            RuleKind::Malformed { .. }
        ));
    }

    #[test]
    fn empty_and_null_documents_are_empty_policies() {
        assert!(Policy::from_yaml_str("").unwrap().rules.is_empty());
        assert!(Policy::from_yaml_str("---\n").unwrap().rules.is_empty());
    }

    #[test]
    fn non_mapping_document_is_an_error() {
        assert!(Policy::from_yaml_str("- a\n- b\n").is_err());
    }

    #[test]
    fn decimal_parsing_accepts_scientific_notation() {
        assert_eq!(parse_decimal("0.05").unwrap().to_string(), "0.05");
        assert!(parse_decimal("1e-9").unwrap() > Decimal::ZERO);
        assert!(parse_decimal("nonsense").is_none());
    }

    #[test]
    fn cmp_op_boundary_semantics() {
        let one = Decimal::ONE;
        assert!(!CmpOp::Gt.apply(one, one));
        assert!(CmpOp::Ge.apply(one, one));
        assert!(!CmpOp::Lt.apply(one, one));
        assert!(CmpOp::Le.apply(one, one));
        assert!(CmpOp::Eq.apply(one, one));
        assert!(!CmpOp::Ne.apply(one, one));
    }
}
