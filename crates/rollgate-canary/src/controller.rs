//! Canary controller — the PI control law and its tick loop.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::CanaryResult;
use crate::files;

/// PI gains and operating bounds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControllerConfig {
    pub kp: f64,
    pub ki: f64,
    /// Acceptable failure rate (0.0–1.0).
    pub target_fail_rate: f64,
    /// Output bounds, in percent of live traffic.
    pub min_canary: f64,
    pub max_canary: f64,
    /// Starting output when no persisted state exists.
    pub initial_canary: f64,
    pub tick_interval: Duration,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            kp: 100.0,
            ki: 20.0,
            target_fail_rate: 0.01,
            min_canary: 0.0,
            max_canary: 25.0,
            initial_canary: 5.0,
            tick_interval: Duration::from_secs(300),
        }
    }
}

/// The durable part of the controller, persisted every tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControllerState {
    /// Accumulated error, clamped to [-1, 1] to bound windup.
    pub integral: f64,
    /// Output percentage from the previous tick.
    pub last_output: f64,
}

/// Controller phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControllerPhase {
    /// Fresh start, no tick computed yet.
    Init,
    /// Normal operation.
    Steady,
    /// Hard fallback tripped on the last tick.
    Fallback,
}

/// Safety override applied after the control law.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SafetyOverride {
    /// Fail rate over 2× target: output forced to 0, integral reset.
    HardFallback,
    /// Fail rate over target: output damped by 0.8.
    Damped,
}

/// What one tick computed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TickReport {
    pub observed_fail_rate: f64,
    pub output: f64,
    pub phase: ControllerPhase,
    pub safety: Option<SafetyOverride>,
}

/// File locations the controller reads and writes each tick.
#[derive(Debug, Clone)]
pub struct ControllerPaths {
    pub metrics_file: PathBuf,
    pub env_file: PathBuf,
    pub state_file: PathBuf,
}

/// PI feedback controller over the canary traffic percentage.
pub struct CanaryController {
    config: ControllerConfig,
    state: ControllerState,
    phase: ControllerPhase,
    paths: ControllerPaths,
}

impl CanaryController {
    /// Open the controller, resuming persisted state when readable.
    ///
    /// Missing or corrupt state restarts at `initial_canary` with a
    /// zero integral (the documented initial conditions).
    pub fn open(config: ControllerConfig, paths: ControllerPaths) -> Self {
        let (state, phase) = match files::load_state(&paths.state_file) {
            Some(state) => {
                info!(
                    integral = state.integral,
                    last_output = state.last_output,
                    "resuming controller from persisted state"
                );
                (state, ControllerPhase::Steady)
            }
            None => (
                ControllerState {
                    integral: 0.0,
                    last_output: config.initial_canary,
                },
                ControllerPhase::Init,
            ),
        };
        Self {
            config,
            state,
            phase,
            paths,
        }
    }

    /// Current output percentage.
    pub fn output(&self) -> f64 {
        self.state.last_output
    }

    pub fn phase(&self) -> ControllerPhase {
        self.phase
    }

    /// Apply the control law and safety overrides to one observation.
    ///
    /// Pure with respect to the filesystem; `tick()` wraps this with
    /// the metrics read and durable writes.
    pub fn step(&mut self, observed_fail_rate: f64) -> TickReport {
        let cfg = &self.config;
        let error = cfg.target_fail_rate - observed_fail_rate;
        let mut integral = (self.state.integral + error).clamp(-1.0, 1.0);
        let mut output = (self.state.last_output + cfg.kp * error + cfg.ki * integral)
            .clamp(cfg.min_canary, cfg.max_canary);

        // Safety overrides run after the control law, and they win.
        let safety = if observed_fail_rate > 2.0 * cfg.target_fail_rate {
            output = 0.0;
            integral = 0.0;
            Some(SafetyOverride::HardFallback)
        } else if observed_fail_rate > cfg.target_fail_rate {
            output = (output * 0.8).clamp(cfg.min_canary, cfg.max_canary);
            Some(SafetyOverride::Damped)
        } else {
            None
        };

        self.phase = if safety == Some(SafetyOverride::HardFallback) {
            warn!(observed_fail_rate, "hard fallback: canary forced to zero");
            ControllerPhase::Fallback
        } else {
            ControllerPhase::Steady
        };

        self.state.integral = integral;
        self.state.last_output = output;

        debug!(
            observed_fail_rate,
            error,
            integral,
            output,
            ?safety,
            "controller stepped"
        );

        TickReport {
            observed_fail_rate,
            output,
            phase: self.phase,
            safety,
        }
    }

    /// Run one full tick: read metrics, step, persist state, publish
    /// the env file.
    ///
    /// State is written before the env file so a crash between the two
    /// resumes from the computed operating point.
    pub fn tick(&mut self) -> CanaryResult<TickReport> {
        let observed = files::read_fail_rate(&self.paths.metrics_file)?;
        let report = self.step(observed);
        files::store_state(&self.paths.state_file, &self.state)?;
        files::write_env_file(&self.paths.env_file, report.output)?;
        Ok(report)
    }

    /// Run the tick loop at a fixed wall-clock interval until the
    /// shutdown signal fires.
    ///
    /// A tick that errors is logged and the previous output is retained
    /// unchanged. Shutdown is graceful: the last persisted state and
    /// env file survive, so nothing is lost.
    pub async fn run(&mut self, mut shutdown: tokio::sync::watch::Receiver<bool>) {
        info!(
            interval_secs = self.config.tick_interval.as_secs(),
            target_fail_rate = self.config.target_fail_rate,
            "canary controller started"
        );

        loop {
            tokio::select! {
                _ = tokio::time::sleep(self.config.tick_interval) => {
                    match self.tick() {
                        Ok(report) => {
                            info!(
                                output = report.output,
                                fail_rate = report.observed_fail_rate,
                                safety = ?report.safety,
                                "canary tick"
                            );
                        }
                        Err(e) => {
                            warn!(error = %e, output = self.output(), "tick failed, retaining previous output");
                        }
                    }
                }
                _ = shutdown.changed() => {
                    info!(output = self.output(), "canary controller shutting down");
                    break;
                }
            }
        }
    }
}
