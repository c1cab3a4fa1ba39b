//! File plumbing for the canary controller.
//!
//! Three small files connect the controller to its neighbours:
//!
//! - a `key=value` metrics textfile written by the metrics pipeline
//!   (`fail_rate=0.013`), read at tick start;
//! - an env file (`CANARY_PCT=<float>`) consumed by the traffic router,
//!   written at tick end;
//! - a JSON state file holding the PI terms, written atomically
//!   (temp + rename) every tick for crash-safe resume.

use std::path::Path;

use tracing::warn;

use crate::controller::ControllerState;
use crate::error::{CanaryError, CanaryResult};

/// Read the observed failure rate from the metrics textfile.
pub fn read_fail_rate(path: &Path) -> CanaryResult<f64> {
    let text = std::fs::read_to_string(path).map_err(|e| CanaryError::MetricsRead {
        path: path.display().to_string(),
        source: e,
    })?;

    for line in text.lines() {
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        if key.trim() == "fail_rate" {
            let rate: f64 = value
                .trim()
                .parse()
                .map_err(|_| CanaryError::MetricsParse(format!("bad fail_rate {value:?}")))?;
            if !(0.0..=1.0).contains(&rate) {
                return Err(CanaryError::FailRateRange(rate));
            }
            return Ok(rate);
        }
    }
    Err(CanaryError::MetricsParse(format!(
        "no fail_rate entry in {}",
        path.display()
    )))
}

/// Write the env file consumed by the traffic router.
pub fn write_env_file(path: &Path, canary_pct: f64) -> CanaryResult<()> {
    atomic_write(path, format!("CANARY_PCT={canary_pct}\n").as_bytes())
        .map_err(CanaryError::EnvWrite)
}

/// Load persisted controller state.
///
/// Missing or unreadable state is not an error: the controller restarts
/// from its initial conditions, with a warning.
pub fn load_state(path: &Path) -> Option<ControllerState> {
    let text = match std::fs::read_to_string(path) {
        Ok(t) => t,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "unreadable controller state, restarting fresh");
            return None;
        }
    };
    match serde_json::from_str(&text) {
        Ok(state) => Some(state),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "corrupt controller state, restarting fresh");
            None
        }
    }
}

/// Persist controller state durably (temp file + rename).
pub fn store_state(path: &Path, state: &ControllerState) -> CanaryResult<()> {
    let json = serde_json::to_vec_pretty(state)
        .map_err(|e| CanaryError::StateWrite(std::io::Error::other(e)))?;
    atomic_write(path, &json).map_err(CanaryError::StateWrite)
}

fn atomic_write(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }
    let tmp = path.with_extension("tmp");
    std::fs::write(&tmp, bytes)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}
