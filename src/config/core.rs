//! Session configuration and its validating builder.

use crate::errors::{Error, Result};
use crate::extraction::ExtractionMode;
use crate::scope::{expand_path, PathScope};
use crate::tracking::{RecordFilter, ThreadAffinity, TrackerKind, TrackerOptions};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Transitive reference expansion stops after this many rounds.
pub const DEFAULT_MAX_RESOLUTION_ROUNDS: usize = 10;

/// Cache directory, relative to the root unless absolute.
pub const DEFAULT_CACHE_PATH: &str = "tmp/cache/impactcov";

/// Overrides the configured cache directory when set and non-empty.
pub const CACHE_DIR_ENV: &str = "IMPACTCOV_CACHE_DIR";

/// One tracker to install, with optional per-tracker overrides.
#[derive(Clone, Default)]
pub struct TrackerSpec {
    pub kind: Option<TrackerKind>,
    pub root: Option<PathBuf>,
    pub excluded_path: Option<PathBuf>,
    pub thread_affinity: Option<ThreadAffinity>,
    pub filter: Option<RecordFilter>,
}

impl TrackerSpec {
    pub fn new(kind: TrackerKind) -> Self {
        Self {
            kind: Some(kind),
            ..Self::default()
        }
    }

    pub fn root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = Some(root.into());
        self
    }

    pub fn excluded_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.excluded_path = Some(path.into());
        self
    }

    pub fn thread_affinity(mut self, affinity: ThreadAffinity) -> Self {
        self.thread_affinity = Some(affinity);
        self
    }

    pub fn filter<F>(mut self, filter: F) -> Self
    where
        F: Fn(&Path) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Arc::new(filter));
        self
    }
}

/// A tracker kind with fully resolved options.
#[derive(Debug, Clone)]
pub struct TrackerSetup {
    pub kind: TrackerKind,
    pub options: TrackerOptions,
}

/// Validated session configuration.
///
/// Construction goes through [`CoverageConfig::builder`]; an invalid root or
/// excluded path fails there, never at start.
#[derive(Debug, Clone)]
pub struct CoverageConfig {
    scope: PathScope,
    thread_affinity: ThreadAffinity,
    constant_resolution: ExtractionMode,
    ancestor_resolution: bool,
    allocation_tracing: bool,
    cache_path: PathBuf,
    max_resolution_rounds: usize,
    trackers: Vec<TrackerSetup>,
}

impl CoverageConfig {
    pub fn builder(root: impl Into<PathBuf>) -> CoverageConfigBuilder {
        CoverageConfigBuilder {
            root: root.into(),
            excluded_path: None,
            thread_affinity: ThreadAffinity::default(),
            constant_resolution: ExtractionMode::default(),
            ancestor_resolution: true,
            allocation_tracing: true,
            cache_path: None,
            max_resolution_rounds: DEFAULT_MAX_RESOLUTION_ROUNDS,
            trackers: Vec::new(),
        }
    }

    pub fn root(&self) -> &Path {
        self.scope.root()
    }

    pub fn excluded_path(&self) -> Option<&Path> {
        self.scope.excluded()
    }

    pub fn scope(&self) -> &PathScope {
        &self.scope
    }

    pub fn thread_affinity(&self) -> ThreadAffinity {
        self.thread_affinity
    }

    pub fn constant_resolution(&self) -> ExtractionMode {
        self.constant_resolution
    }

    pub fn ancestor_resolution(&self) -> bool {
        self.ancestor_resolution
    }

    pub fn allocation_tracing(&self) -> bool {
        self.allocation_tracing
    }

    /// Absolute cache directory.
    pub fn cache_path(&self) -> &Path {
        &self.cache_path
    }

    pub fn max_resolution_rounds(&self) -> usize {
        self.max_resolution_rounds
    }

    pub fn trackers(&self) -> &[TrackerSetup] {
        &self.trackers
    }
}

#[derive(Clone)]
pub struct CoverageConfigBuilder {
    root: PathBuf,
    excluded_path: Option<PathBuf>,
    thread_affinity: ThreadAffinity,
    constant_resolution: ExtractionMode,
    ancestor_resolution: bool,
    allocation_tracing: bool,
    cache_path: Option<PathBuf>,
    max_resolution_rounds: usize,
    trackers: Vec<TrackerSpec>,
}

impl CoverageConfigBuilder {
    /// Files under this path are never reported. Relative paths are joined to the root.
    pub fn excluded_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.excluded_path = Some(path.into());
        self
    }

    pub fn thread_affinity(mut self, affinity: ThreadAffinity) -> Self {
        self.thread_affinity = affinity;
        self
    }

    pub fn constant_resolution(mut self, mode: ExtractionMode) -> Self {
        self.constant_resolution = mode;
        self
    }

    pub fn ancestor_resolution(mut self, enabled: bool) -> Self {
        self.ancestor_resolution = enabled;
        self
    }

    pub fn allocation_tracing(mut self, enabled: bool) -> Self {
        self.allocation_tracing = enabled;
        self
    }

    pub fn cache_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.cache_path = Some(path.into());
        self
    }

    pub fn max_resolution_rounds(mut self, rounds: usize) -> Self {
        self.max_resolution_rounds = rounds;
        self
    }

    /// Add a tracker. Without any, a single coverage tracker is installed.
    pub fn tracker(mut self, spec: TrackerSpec) -> Self {
        self.trackers.push(spec);
        self
    }

    pub fn build(self) -> Result<CoverageConfig> {
        let scope = PathScope::new(&self.root, self.excluded_path.as_deref())?;
        let cache_path = resolve_cache_path(scope.root(), self.cache_path.as_deref());

        let specs = if self.trackers.is_empty() {
            vec![TrackerSpec::new(TrackerKind::Coverage)]
        } else {
            self.trackers
        };

        let base = TrackerOptions::new(scope.clone())
            .with_thread_affinity(self.thread_affinity)
            .with_constant_resolution(self.constant_resolution)
            .with_ancestor_resolution(self.ancestor_resolution)
            .with_allocation_tracing(self.allocation_tracing);
        let base = TrackerOptions {
            max_resolution_rounds: self.max_resolution_rounds,
            ..base
        };

        let trackers = specs
            .into_iter()
            .map(|spec| tracker_setup(&scope, &base, spec))
            .collect::<Result<Vec<_>>>()?;

        Ok(CoverageConfig {
            scope,
            thread_affinity: self.thread_affinity,
            constant_resolution: self.constant_resolution,
            ancestor_resolution: self.ancestor_resolution,
            allocation_tracing: self.allocation_tracing,
            cache_path,
            max_resolution_rounds: self.max_resolution_rounds,
            trackers,
        })
    }
}

/// Apply per-tracker overrides on top of the session defaults.
///
/// An overridden root keeps the session's excluded path unless the tracker
/// names its own; an inherited excluded path outside the new root is dropped.
fn tracker_setup(scope: &PathScope, base: &TrackerOptions, spec: TrackerSpec) -> Result<TrackerSetup> {
    let kind = spec
        .kind
        .ok_or_else(|| Error::configuration("tracker entry is missing its kind"))?;

    let tracker_scope = match (&spec.root, &spec.excluded_path) {
        (None, None) => scope.clone(),
        (root, excluded) => {
            let root = root.as_deref().unwrap_or_else(|| scope.root());
            let excluded = excluded.as_deref().or_else(|| {
                scope
                    .excluded()
                    .filter(|excluded| crate::scope::path_within(excluded, root))
            });
            PathScope::new(root, excluded)?
        }
    };

    let mut options = base.clone();
    options.scope = tracker_scope;
    if let Some(affinity) = spec.thread_affinity {
        options.thread_affinity = affinity;
    }
    options.filter = spec.filter;
    Ok(TrackerSetup { kind, options })
}

fn resolve_cache_path(root: &Path, configured: Option<&Path>) -> PathBuf {
    let env_override = std::env::var(CACHE_DIR_ENV)
        .ok()
        .filter(|value| !value.is_empty())
        .map(PathBuf::from);
    let path = env_override
        .or_else(|| configured.map(Path::to_path_buf))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CACHE_PATH));
    expand_path(&path, root)
}
