//! Metric results — the flat numeric input the gate evaluates against.

use std::path::Path;

use rust_decimal::Decimal;
use serde_json::{Map, Value};

use crate::error::{PolicyError, PolicyResult};
use crate::rule::parse_decimal;

/// A flat JSON object of named numeric results.
///
/// Rule names may reference derived quantities that are not present
/// verbatim in the object:
///
/// - `ci_width` = `ci_high - ci_low`
/// - `mes`      = `abs(objective_delta)` (minimum effect size)
/// - `delta`    = `objective_delta` (signed alias)
///
/// Lookups go through the JSON number's literal text so thresholds are
/// compared in exact decimal, not binary floats.
#[derive(Debug, Clone, Default)]
pub struct MetricResults {
    fields: Map<String, Value>,
}

impl MetricResults {
    /// Load results from a JSON file.
    pub fn load(path: &Path) -> PolicyResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| PolicyError::Read {
            path: path.display().to_string(),
            source: e,
        })?;
        Self::from_json_str(&text)
    }

    /// Parse results from JSON text. The document must be an object.
    pub fn from_json_str(text: &str) -> PolicyResult<Self> {
        let value: Value =
            serde_json::from_str(text).map_err(|e| PolicyError::Json(e.to_string()))?;
        match value {
            Value::Object(fields) => Ok(Self { fields }),
            other => Err(PolicyError::NotAnObject(format!(
                "expected object, got {other}"
            ))),
        }
    }

    /// Build results from an existing JSON object (for callers that
    /// already hold evaluation output in memory).
    pub fn from_map(fields: Map<String, Value>) -> Self {
        Self { fields }
    }

    /// Look up a metric as an exact decimal, resolving derived names.
    ///
    /// Returns `None` for absent or non-numeric fields; the evaluator
    /// turns that into a failed rule.
    pub fn get(&self, name: &str) -> Option<Decimal> {
        if let Some(d) = self.direct(name) {
            return Some(d);
        }
        match name {
            "ci_width" => {
                let high = self.direct("ci_high")?;
                let low = self.direct("ci_low")?;
                Some(high - low)
            }
            "mes" => Some(self.direct("objective_delta")?.abs()),
            "delta" => self.direct("objective_delta"),
            _ => None,
        }
    }

    fn direct(&self, name: &str) -> Option<Decimal> {
        match self.fields.get(name)? {
            Value::Number(n) => parse_decimal(&n.to_string()),
            _ => None,
        }
    }
}
