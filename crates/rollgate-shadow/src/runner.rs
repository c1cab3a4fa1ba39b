//! Shadow runner — paired execution, comparison, and the audit log.

use std::collections::BTreeMap;
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{ShadowError, ShadowResult};

/// File name of the append-only run log inside the audit directory.
pub const RUN_LOG_FILE: &str = "shadow_runs.jsonl";

/// Outcome of one request against one arm.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestOutcome {
    pub success: bool,
    pub latency_ms: f64,
    /// Task-quality metrics for this request (e.g. `p_at_3`).
    #[serde(default)]
    pub quality: BTreeMap<String, f64>,
}

/// Executes one shadow request against a named arm.
///
/// The runner applies its own bounded timeout around every call, so a
/// hung backend cannot stall the comparison loop.
pub trait ShadowBackend {
    fn execute(
        &self,
        arm_id: &str,
        request_no: u64,
    ) -> impl Future<Output = ShadowResult<RequestOutcome>> + Send;
}

/// Aggregated metrics for one arm of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArmMetrics {
    pub success_count: u64,
    pub failure_count: u64,
    pub p95_latency_ms: f64,
    /// Mean task-quality metrics across the batch.
    pub quality: BTreeMap<String, f64>,
}

impl ArmMetrics {
    fn from_outcomes(outcomes: &[RequestOutcome]) -> Self {
        let success_count = outcomes.iter().filter(|o| o.success).count() as u64;
        let failure_count = outcomes.len() as u64 - success_count;

        let latencies: Vec<f64> = outcomes.iter().map(|o| o.latency_ms).collect();
        let p95_latency_ms = percentile(&latencies, 0.95);

        let mut sums: BTreeMap<String, (f64, u64)> = BTreeMap::new();
        for outcome in outcomes {
            for (name, value) in &outcome.quality {
                let entry = sums.entry(name.clone()).or_insert((0.0, 0));
                entry.0 += value;
                entry.1 += 1;
            }
        }
        let quality = sums
            .into_iter()
            .map(|(name, (sum, count))| (name, sum / count as f64))
            .collect();

        Self {
            success_count,
            failure_count,
            p95_latency_ms,
            quality,
        }
    }

    pub fn success_rate(&self) -> f64 {
        let total = self.success_count + self.failure_count;
        if total == 0 {
            0.0
        } else {
            self.success_count as f64 / total as f64
        }
    }
}

/// One completed shadow comparison. Immutable once appended to the log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShadowRun {
    pub id: String,
    pub candidate_id: String,
    pub production_id: String,
    pub shadow_ratio: f64,
    pub n_requests: u64,
    pub candidate: ArmMetrics,
    pub production: ArmMetrics,
    /// Per-metric delta: candidate − production.
    pub comparison: BTreeMap<String, f64>,
    /// Unix timestamp (seconds) when the run was recorded.
    pub recorded_at: u64,
}

/// Runs shadow comparisons and maintains the append-only run log.
pub struct ShadowRunner {
    audit_dir: PathBuf,
    request_timeout: Duration,
}

impl ShadowRunner {
    pub fn new(audit_dir: impl Into<PathBuf>) -> Self {
        Self {
            audit_dir: audit_dir.into(),
            request_timeout: Duration::from_secs(10),
        }
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Run a paired comparison of `shadow_ratio × n_requests` requests
    /// against both arms.
    ///
    /// Every sampled request executes on both arms before the batch is
    /// aggregated; if either arm fails or times out, the whole run is
    /// an error and nothing is recorded — partial samples are never
    /// compared. A finished run is appended to the audit log before it
    /// is returned.
    pub async fn run_comparison<B: ShadowBackend>(
        &self,
        backend: &B,
        candidate_id: &str,
        production_id: &str,
        shadow_ratio: f64,
        n_requests: u64,
    ) -> ShadowResult<ShadowRun> {
        if !(0.0..=1.0).contains(&shadow_ratio) {
            return Err(ShadowError::InvalidRatio(shadow_ratio));
        }

        let sampled = (shadow_ratio * n_requests as f64).round() as u64;
        debug!(
            candidate = %candidate_id,
            production = %production_id,
            sampled,
            n_requests,
            "starting shadow batch"
        );

        let mut candidate_outcomes = Vec::with_capacity(sampled as usize);
        let mut production_outcomes = Vec::with_capacity(sampled as usize);
        for request_no in 0..sampled {
            let cand = self.execute_bounded(backend, candidate_id, request_no).await?;
            let prod = self.execute_bounded(backend, production_id, request_no).await?;
            candidate_outcomes.push(cand);
            production_outcomes.push(prod);
        }

        let candidate = ArmMetrics::from_outcomes(&candidate_outcomes);
        let production = ArmMetrics::from_outcomes(&production_outcomes);

        let mut comparison = BTreeMap::new();
        comparison.insert(
            "success_rate".to_string(),
            candidate.success_rate() - production.success_rate(),
        );
        comparison.insert(
            "p95_latency_ms".to_string(),
            candidate.p95_latency_ms - production.p95_latency_ms,
        );
        for (name, cand_value) in &candidate.quality {
            if let Some(prod_value) = production.quality.get(name) {
                comparison.insert(name.clone(), cand_value - prod_value);
            }
        }

        let recorded_at = epoch_secs();
        let run = ShadowRun {
            id: format!("{candidate_id}:{production_id}:{recorded_at}"),
            candidate_id: candidate_id.to_string(),
            production_id: production_id.to_string(),
            shadow_ratio,
            n_requests,
            candidate,
            production,
            comparison,
            recorded_at,
        };

        self.append_run(&run)?;
        info!(
            run = %run.id,
            success_delta = run.comparison["success_rate"],
            "shadow run recorded"
        );
        Ok(run)
    }

    async fn execute_bounded<B: ShadowBackend>(
        &self,
        backend: &B,
        arm_id: &str,
        request_no: u64,
    ) -> ShadowResult<RequestOutcome> {
        match tokio::time::timeout(self.request_timeout, backend.execute(arm_id, request_no)).await
        {
            Ok(result) => result,
            Err(_) => Err(ShadowError::Timeout {
                arm: arm_id.to_string(),
                timeout_ms: self.request_timeout.as_millis() as u64,
            }),
        }
    }

    /// Append one run record as a JSON line. Records are never rewritten.
    fn append_run(&self, run: &ShadowRun) -> ShadowResult<()> {
        std::fs::create_dir_all(&self.audit_dir)?;
        let path = self.audit_dir.join(RUN_LOG_FILE);
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)?;
        let line = serde_json::to_string(run)?;
        writeln!(file, "{line}")?;
        file.flush()?;
        Ok(())
    }

    /// Most recent runs for a candidate, newest first.
    ///
    /// Corrupt lines are skipped with a warning; the log is for audit
    /// and replay, so one bad record must not hide the rest.
    pub fn get_runs(&self, candidate_id: &str, limit: usize) -> ShadowResult<Vec<ShadowRun>> {
        let path = self.audit_dir.join(RUN_LOG_FILE);
        if !path.exists() {
            return Ok(Vec::new());
        }

        let file = std::fs::File::open(&path)?;
        let mut runs = Vec::new();
        for line in BufReader::new(file).lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<ShadowRun>(&line) {
                Ok(run) if run.candidate_id == candidate_id => runs.push(run),
                Ok(_) => {}
                Err(e) => warn!(error = %e, "skipping corrupt run record"),
            }
        }
        runs.reverse();
        runs.truncate(limit);
        Ok(runs)
    }
}

/// Nearest-rank percentile; 0 for an empty sample.
fn percentile(values: &[f64], q: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let rank = ((sorted.len() as f64) * q).ceil() as usize;
    sorted[rank.clamp(1, sorted.len()) - 1]
}

fn epoch_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Backend with fixed per-arm behavior.
    struct FixedBackend {
        candidate_success: bool,
        production_latency_ms: f64,
        hang_on: Option<String>,
    }

    impl Default for FixedBackend {
        fn default() -> Self {
            Self {
                candidate_success: true,
                production_latency_ms: 100.0,
                hang_on: None,
            }
        }
    }

    impl ShadowBackend for FixedBackend {
        async fn execute(&self, arm_id: &str, request_no: u64) -> ShadowResult<RequestOutcome> {
            if self.hang_on.as_deref() == Some(arm_id) {
                tokio::time::sleep(Duration::from_secs(3600)).await;
            }
            let is_candidate = arm_id.starts_with("cand");
            let mut quality = BTreeMap::new();
            quality.insert(
                "p_at_3".to_string(),
                if is_candidate { 0.8 } else { 0.7 },
            );
            Ok(RequestOutcome {
                success: !is_candidate || self.candidate_success,
                latency_ms: if is_candidate {
                    50.0 + request_no as f64
                } else {
                    self.production_latency_ms
                },
                quality,
            })
        }
    }

    fn runner(dir: &std::path::Path) -> ShadowRunner {
        ShadowRunner::new(dir).with_request_timeout(Duration::from_millis(100))
    }

    #[tokio::test]
    async fn comparison_deltas_are_candidate_minus_production() {
        let dir = tempfile::tempdir().unwrap();
        let run = runner(dir.path())
            .run_comparison(&FixedBackend::default(), "cand-1", "prod-1", 1.0, 20)
            .await
            .unwrap();

        assert_eq!(run.candidate.success_count, 20);
        assert_eq!(run.production.success_count, 20);
        assert!((run.comparison["p_at_3"] - 0.1).abs() < 1e-9);
        assert!(run.comparison["p95_latency_ms"] < 0.0); // candidate faster
        assert_eq!(run.comparison["success_rate"], 0.0);
    }

    #[tokio::test]
    async fn ratio_scales_the_sampled_count() {
        let dir = tempfile::tempdir().unwrap();
        let run = runner(dir.path())
            .run_comparison(&FixedBackend::default(), "cand-1", "prod-1", 0.5, 20)
            .await
            .unwrap();
        assert_eq!(run.candidate.success_count + run.candidate.failure_count, 10);
    }

    #[tokio::test]
    async fn invalid_ratio_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let err = runner(dir.path())
            .run_comparison(&FixedBackend::default(), "cand-1", "prod-1", 1.5, 10)
            .await
            .unwrap_err();
        assert!(matches!(err, ShadowError::InvalidRatio(_)));
    }

    #[tokio::test]
    async fn hung_backend_times_out_and_records_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FixedBackend {
            hang_on: Some("prod-1".to_string()),
            ..FixedBackend::default()
        };
        let err = runner(dir.path())
            .run_comparison(&backend, "cand-1", "prod-1", 1.0, 5)
            .await
            .unwrap_err();
        assert!(matches!(err, ShadowError::Timeout { .. }));

        // The failed batch must not appear in the log.
        let runs = runner(dir.path()).get_runs("cand-1", 10).unwrap();
        assert!(runs.is_empty());
    }

    #[tokio::test]
    async fn log_is_append_only_and_queryable() {
        let dir = tempfile::tempdir().unwrap();
        let r = runner(dir.path());
        let backend = FixedBackend::default();

        r.run_comparison(&backend, "cand-1", "prod-1", 1.0, 5)
            .await
            .unwrap();
        r.run_comparison(&backend, "cand-2", "prod-1", 1.0, 5)
            .await
            .unwrap();
        r.run_comparison(&backend, "cand-1", "prod-1", 0.5, 8)
            .await
            .unwrap();

        let runs = r.get_runs("cand-1", 10).unwrap();
        assert_eq!(runs.len(), 2);
        // Newest first.
        assert_eq!(runs[0].n_requests, 8);

        let limited = r.get_runs("cand-1", 1).unwrap();
        assert_eq!(limited.len(), 1);
        assert_eq!(limited[0].n_requests, 8);

        assert!(r.get_runs("cand-9", 10).unwrap().is_empty());
    }

    #[tokio::test]
    async fn corrupt_log_lines_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let r = runner(dir.path());
        r.run_comparison(&FixedBackend::default(), "cand-1", "prod-1", 1.0, 3)
            .await
            .unwrap();

        // Damage the log with a garbage line.
        let path = dir.path().join(RUN_LOG_FILE);
        let mut file = std::fs::OpenOptions::new().append(true).open(&path).unwrap();
        writeln!(file, "{{not json").unwrap();

        let runs = r.get_runs("cand-1", 10).unwrap();
        assert_eq!(runs.len(), 1);
    }

    #[test]
    fn get_runs_on_missing_log_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let runs = runner(dir.path()).get_runs("cand-1", 10).unwrap();
        assert!(runs.is_empty());
    }

    #[test]
    fn percentile_nearest_rank() {
        let values: Vec<f64> = (1..=100).map(f64::from).collect();
        assert_eq!(percentile(&values, 0.95), 95.0);
        assert_eq!(percentile(&[42.0], 0.95), 42.0);
        assert_eq!(percentile(&[], 0.95), 0.0);
    }
}
