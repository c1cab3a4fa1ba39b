//! Shadow-ratio governor.
//!
//! Periodically consults the newest shadow run for a candidate and
//! retunes the mirroring ratio, publishing it to an env-style file for
//! the external mirroring workers to pick up.

use std::path::PathBuf;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{info, warn};

use rollgate_shadow::{RatioConfig, ShadowRunner, adjust_ratio};

pub struct ShadowGovernor {
    runner: ShadowRunner,
    candidate_id: String,
    ratio_file: PathBuf,
    config: RatioConfig,
    ratio: f64,
}

impl ShadowGovernor {
    pub fn new(
        audit_dir: impl Into<PathBuf>,
        candidate_id: String,
        ratio_file: PathBuf,
        initial_ratio: f64,
    ) -> Self {
        let config = RatioConfig::default();
        let ratio = initial_ratio.clamp(config.min_ratio, config.max_ratio);
        Self {
            runner: ShadowRunner::new(audit_dir),
            candidate_id,
            ratio_file,
            config,
            ratio,
        }
    }

    pub fn ratio(&self) -> f64 {
        self.ratio
    }

    /// One governor pass: retune from the newest run (if any) and
    /// publish the current ratio.
    pub fn tick(&mut self) -> anyhow::Result<()> {
        let runs = self.runner.get_runs(&self.candidate_id, 1)?;
        if let Some(run) = runs.first() {
            let next = adjust_ratio(
                self.ratio,
                run.candidate.success_rate(),
                run.production.success_rate(),
                &self.config,
            );
            if next != self.ratio {
                info!(
                    candidate = %self.candidate_id,
                    run = %run.id,
                    from = self.ratio,
                    to = next,
                    "shadow ratio retuned"
                );
            }
            self.ratio = next;
        }
        std::fs::write(&self.ratio_file, format!("SHADOW_RATIO={:.4}\n", self.ratio))?;
        Ok(())
    }

    pub async fn run(&mut self, interval: Duration, mut shutdown: watch::Receiver<bool>) {
        info!(
            candidate = %self.candidate_id,
            interval_secs = interval.as_secs(),
            ratio = self.ratio,
            "shadow governor started"
        );

        loop {
            tokio::select! {
                _ = tokio::time::sleep(interval) => {
                    if let Err(e) = self.tick() {
                        warn!(error = %e, ratio = self.ratio, "governor tick failed, retaining ratio");
                    }
                }
                _ = shutdown.changed() => {
                    info!(ratio = self.ratio, "shadow governor shutting down");
                    break;
                }
            }
        }
    }
}
