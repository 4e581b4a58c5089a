//! Trackers: uniform lifecycle over the coverage channels.
//!
//! Every kind shares [`TrackerCore`] for scoping, thread affinity and
//! accumulation. What differs per kind is which host events reach it and
//! what happens at stop.
//!
//! | Kind | Channel |
//! |---|---|
//! | `Coverage` | executed lines, allocations, stop-time reference expansion |
//! | `ConstLookup` | reflective constant lookups |
//! | `FileRead` | files opened for reading |
//! | `Registry` | dynamic-registry lookups |

mod active;
pub mod allocation;
mod core;
pub(crate) mod coverage;
pub(crate) mod file_read;
pub(crate) mod lookup;
pub(crate) mod registry;

pub use self::active::ActiveRegistry;
pub use self::allocation::AllocationTracer;
pub use self::core::{TrackerCore, TrackerOptions};

use crate::errors::Result;
use crate::runtime::CoverageRuntime;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackerKind {
    Coverage,
    ConstLookup,
    FileRead,
    Registry,
}

impl std::fmt::Display for TrackerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            TrackerKind::Coverage => "coverage",
            TrackerKind::ConstLookup => "const_lookup",
            TrackerKind::FileRead => "file_read",
            TrackerKind::Registry => "registry",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TrackerState {
    #[default]
    Uninstalled,
    Installed,
    Armed,
    Idle,
}

/// Which threads' events a session accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThreadAffinity {
    #[default]
    Global,
    OwnerThreadOnly,
}

/// Extra predicate a recorded path must satisfy.
pub type RecordFilter = Arc<dyn Fn(&Path) -> bool + Send + Sync>;

/// A tracker instance bound to a runtime.
///
/// Several instances of one kind may exist, but only the most recently
/// started one receives host events.
pub struct Tracker {
    core: Arc<TrackerCore>,
    runtime: CoverageRuntime,
}

impl Tracker {
    pub fn new(runtime: &CoverageRuntime, kind: TrackerKind, options: TrackerOptions) -> Self {
        Self {
            core: Arc::new(TrackerCore::new(kind, options)),
            runtime: runtime.clone(),
        }
    }

    pub fn kind(&self) -> TrackerKind {
        self.core.kind()
    }

    pub fn state(&self) -> TrackerState {
        self.core.state()
    }

    pub fn options(&self) -> &TrackerOptions {
        self.core.options()
    }

    /// Hook this kind into the runtime. Idempotent.
    pub fn install(&self) {
        self.runtime.install(self.core.kind());
        self.core.mark_installed();
    }

    /// Begin accumulating and take over this kind's active slot.
    pub fn start(&self) -> Result<()> {
        self.core.arm()?;
        if let Some(previous) = self.runtime.active().activate(self.core.clone()) {
            if !Arc::ptr_eq(&previous, &self.core) {
                log::debug!("{} tracker superseded by a newer session", self.core.kind());
            }
        }
        Ok(())
    }

    /// Stop accumulating and return the absolute paths recorded.
    ///
    /// Stopping a tracker that is not armed yields an empty set.
    pub fn stop(&self) -> HashSet<PathBuf> {
        self.runtime.active().deactivate(&self.core);
        let Some(files) = self.core.disarm() else {
            return HashSet::new();
        };
        match self.core.kind() {
            TrackerKind::Coverage => coverage::finish(&self.runtime, &self.core, files),
            _ => files,
        }
    }

    pub fn record(&self, path: &Path) -> bool {
        self.core.record(path)
    }

    pub fn record_with<F>(&self, path: F) -> bool
    where
        F: FnOnce() -> Option<PathBuf>,
    {
        self.core.record_with(path)
    }
}

impl std::fmt::Debug for Tracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tracker")
            .field("kind", &self.core.kind())
            .field("state", &self.core.state())
            .finish()
    }
}
