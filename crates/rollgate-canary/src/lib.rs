//! rollgate-canary — PI feedback control of the live canary traffic share.
//!
//! Each tick compares the observed failure rate against the target,
//! updates a clamped integral term (anti-windup), and moves the output
//! percentage by `Kp·error + Ki·integral`. Safety overrides run after
//! the control law and win: a failure rate over twice the target forces
//! the output to zero and resets the integral; anything over the target
//! damps the output by 0.8.
//!
//! Controller state (integral, last output) is persisted durably every
//! tick so a restart resumes the same operating point. Unreadable or
//! missing state falls back to the documented initial conditions with a
//! warning. A tick that errors is logged and the previous output is
//! retained unchanged.
//!
//! # Components
//!
//! - **`controller`** — control law, safety overrides, tick loop
//! - **`files`** — metrics textfile in, env file out, durable state

pub mod controller;
pub mod error;
pub mod files;

pub use controller::{
    CanaryController, ControllerConfig, ControllerPaths, ControllerPhase, ControllerState,
    SafetyOverride, TickReport,
};
pub use error::{CanaryError, CanaryResult};
