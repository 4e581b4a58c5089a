//! Thread-local phase tracking for diagnostics.
//!
//! Host callbacks arrive on arbitrary threads, so the phase is tracked per
//! thread (via `thread_local!`). Guards restore the previous phase on drop,
//! which makes nesting (resolution inside extraction) work naturally.

use std::cell::Cell;

thread_local! {
    static CURRENT_PHASE: Cell<Option<CoveragePhase>> = const { Cell::new(None) };
}

/// Engine phases used to label host failures and cache problems in logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoveragePhase {
    /// Parsing a file and collecting its candidate groups
    Extraction,
    /// Asking the host where names are defined
    Resolution,
    /// Handling an allocation event
    AllocationTracing,
    /// Loading or saving the durable cache
    Persistence,
}

impl std::fmt::Display for CoveragePhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Extraction => write!(f, "extraction"),
            Self::Resolution => write!(f, "resolution"),
            Self::AllocationTracing => write!(f, "allocation_tracing"),
            Self::Persistence => write!(f, "persistence"),
        }
    }
}

/// RAII guard restoring the previous phase on drop.
pub struct PhaseGuard {
    previous: Option<CoveragePhase>,
}

impl Drop for PhaseGuard {
    fn drop(&mut self) {
        CURRENT_PHASE.with(|phase| phase.set(self.previous));
    }
}

/// Set the current phase for this thread.
///
/// ```ignore
/// let _phase = set_phase(CoveragePhase::Resolution);
/// // host lookups logged here are labelled "resolution"
/// ```
#[must_use]
pub fn set_phase(phase: CoveragePhase) -> PhaseGuard {
    let previous = CURRENT_PHASE.with(|current| current.replace(Some(phase)));
    PhaseGuard { previous }
}

/// Phase of the calling thread, if any.
pub fn current_phase() -> Option<CoveragePhase> {
    CURRENT_PHASE.with(Cell::get)
}
