//! Diagnostics support.
//!
//! Host failures and cache rejections are never surfaced as errors, so the
//! log line is the only trace they leave. The phase context makes those lines
//! say what the engine was doing at the time.

pub mod context;

pub use context::{current_phase, set_phase, CoveragePhase, PhaseGuard};
