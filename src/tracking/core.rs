//! Shared recording state behind every tracker kind.

use super::{RecordFilter, ThreadAffinity, TrackerKind, TrackerState};
use crate::errors::{Error, Result};
use crate::extraction::ExtractionMode;
use crate::scope::{normalize, PathScope};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::thread::{self, ThreadId};

/// Per-tracker settings, resolved from the session configuration.
#[derive(Clone)]
pub struct TrackerOptions {
    pub scope: PathScope,
    pub thread_affinity: ThreadAffinity,
    pub constant_resolution: ExtractionMode,
    pub ancestor_resolution: bool,
    pub allocation_tracing: bool,
    pub max_resolution_rounds: usize,
    pub filter: Option<RecordFilter>,
}

impl TrackerOptions {
    pub fn new(scope: PathScope) -> Self {
        Self {
            scope,
            thread_affinity: ThreadAffinity::default(),
            constant_resolution: ExtractionMode::default(),
            ancestor_resolution: true,
            allocation_tracing: true,
            max_resolution_rounds: crate::config::DEFAULT_MAX_RESOLUTION_ROUNDS,
            filter: None,
        }
    }

    pub fn with_thread_affinity(mut self, affinity: ThreadAffinity) -> Self {
        self.thread_affinity = affinity;
        self
    }

    pub fn with_constant_resolution(mut self, mode: ExtractionMode) -> Self {
        self.constant_resolution = mode;
        self
    }

    pub fn with_ancestor_resolution(mut self, enabled: bool) -> Self {
        self.ancestor_resolution = enabled;
        self
    }

    pub fn with_allocation_tracing(mut self, enabled: bool) -> Self {
        self.allocation_tracing = enabled;
        self
    }

    pub fn with_filter<F>(mut self, filter: F) -> Self
    where
        F: Fn(&Path) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(std::sync::Arc::new(filter));
        self
    }
}

impl std::fmt::Debug for TrackerOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrackerOptions")
            .field("scope", &self.scope)
            .field("thread_affinity", &self.thread_affinity)
            .field("constant_resolution", &self.constant_resolution)
            .field("ancestor_resolution", &self.ancestor_resolution)
            .field("allocation_tracing", &self.allocation_tracing)
            .field("max_resolution_rounds", &self.max_resolution_rounds)
            .field("filter", &self.filter.is_some())
            .finish()
    }
}

#[derive(Debug, Default)]
struct CoreState {
    lifecycle: TrackerState,
    owner: Option<ThreadId>,
    files: HashSet<PathBuf>,
}

/// Lifecycle state and accumulated files of one tracker instance.
///
/// `record` may be called from any thread at any time; lifecycle transitions
/// must be serialized by the caller.
#[derive(Debug)]
pub struct TrackerCore {
    kind: TrackerKind,
    options: TrackerOptions,
    state: Mutex<CoreState>,
}

impl TrackerCore {
    pub fn new(kind: TrackerKind, options: TrackerOptions) -> Self {
        Self {
            kind,
            options,
            state: Mutex::new(CoreState::default()),
        }
    }

    pub fn kind(&self) -> TrackerKind {
        self.kind
    }

    pub fn options(&self) -> &TrackerOptions {
        &self.options
    }

    pub fn state(&self) -> TrackerState {
        self.state.lock().lifecycle
    }

    pub(crate) fn mark_installed(&self) {
        let mut state = self.state.lock();
        if state.lifecycle == TrackerState::Uninstalled {
            state.lifecycle = TrackerState::Installed;
        }
    }

    /// Begin a fresh accumulation owned by the calling thread.
    pub(crate) fn arm(&self) -> Result<()> {
        let mut state = self.state.lock();
        if state.lifecycle == TrackerState::Uninstalled {
            return Err(Error::lifecycle(format!(
                "{} tracker must be installed before start",
                self.kind
            )));
        }
        if state.lifecycle == TrackerState::Armed {
            log::debug!(
                "{} tracker restarted, discarding {} unflushed files",
                self.kind,
                state.files.len()
            );
        }
        state.files.clear();
        state.owner = Some(thread::current().id());
        state.lifecycle = TrackerState::Armed;
        Ok(())
    }

    /// End accumulation; `None` if the tracker was not armed.
    pub(crate) fn disarm(&self) -> Option<HashSet<PathBuf>> {
        let mut state = self.state.lock();
        if state.lifecycle != TrackerState::Armed {
            return None;
        }
        state.lifecycle = TrackerState::Idle;
        state.owner = None;
        Some(std::mem::take(&mut state.files))
    }

    /// Armed, and either global or called from the thread that started it.
    pub fn accepts_current_thread(&self) -> bool {
        let state = self.state.lock();
        if state.lifecycle != TrackerState::Armed {
            return false;
        }
        match self.options.thread_affinity {
            ThreadAffinity::Global => true,
            ThreadAffinity::OwnerThreadOnly => state.owner == Some(thread::current().id()),
        }
    }

    /// Scope and filter checks, independent of lifecycle.
    pub fn admits(&self, path: &Path) -> bool {
        self.options.scope.includes(path)
            && self.options.filter.as_ref().map_or(true, |filter| filter(path))
    }

    /// Add `path` if every check passes. Returns true when newly recorded.
    ///
    /// `.` and `..` components are resolved before scoping, so an event path
    /// cannot climb out of the root.
    pub fn record(&self, path: &Path) -> bool {
        if !self.accepts_current_thread() {
            return false;
        }
        let path = normalize(path);
        // filters run unlocked so they may call back into the tracker
        if !self.admits(&path) {
            return false;
        }
        let mut state = self.state.lock();
        state.lifecycle == TrackerState::Armed && state.files.insert(path)
    }

    /// Like [`record`](Self::record), but `path` is only computed when the
    /// tracker would accept an event from this thread.
    pub fn record_with<F>(&self, path: F) -> bool
    where
        F: FnOnce() -> Option<PathBuf>,
    {
        if !self.accepts_current_thread() {
            return false;
        }
        path().is_some_and(|path| self.record(&path))
    }
}
