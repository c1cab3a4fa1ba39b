//! Freeze-flag probe — injected capability, not ambient traversal.

use std::path::PathBuf;

use tracing::debug;

/// Default sentinel file name marking a rollout freeze.
pub const DEFAULT_SENTINEL: &str = ".rollout-freeze";

/// How many ancestor directories the filesystem probe inspects.
pub const DEFAULT_MAX_DEPTH: usize = 5;

/// Capability for checking whether rollouts are frozen.
///
/// Business logic takes this as a parameter so tests can inject a
/// `StaticProbe` instead of touching the filesystem.
pub trait FreezeFlagProbe {
    fn is_frozen(&self) -> bool;
}

/// Probe that looks for a sentinel file in a bounded number of
/// ancestor directories, starting at `start_dir`.
#[derive(Debug, Clone)]
pub struct FsFreezeProbe {
    start_dir: PathBuf,
    sentinel: String,
    max_depth: usize,
}

impl FsFreezeProbe {
    pub fn new(start_dir: impl Into<PathBuf>) -> Self {
        Self {
            start_dir: start_dir.into(),
            sentinel: DEFAULT_SENTINEL.to_string(),
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    pub fn with_sentinel(mut self, sentinel: &str) -> Self {
        self.sentinel = sentinel.to_string();
        self
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }
}

impl FreezeFlagProbe for FsFreezeProbe {
    fn is_frozen(&self) -> bool {
        let mut dir = Some(self.start_dir.as_path());
        for _ in 0..self.max_depth {
            let Some(d) = dir else { break };
            let candidate = d.join(&self.sentinel);
            if candidate.exists() {
                debug!(path = %candidate.display(), "freeze sentinel found");
                return true;
            }
            dir = d.parent();
        }
        false
    }
}

/// Fixed-answer probe for tests.
#[derive(Debug, Clone, Copy)]
pub struct StaticProbe(pub bool);

impl FreezeFlagProbe for StaticProbe {
    fn is_frozen(&self) -> bool {
        self.0
    }
}
