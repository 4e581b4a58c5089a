//! Session coordinator.
//!
//! Owns the configuration, instantiates the configured trackers, fans
//! `start`/`stop` out to them and merges their results into one report of
//! root-relative paths.

use crate::cache::cache_file_path;
use crate::config::CoverageConfig;
use crate::errors::{Error, Result};
use crate::runtime::CoverageRuntime;
use crate::scope::relativize_paths;
use crate::tracking::Tracker;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

/// Files touched by one session. In-root paths are relative to the root;
/// anything outside it is kept absolute.
pub type CoverageReport = BTreeSet<PathBuf>;

pub struct Coordinator {
    runtime: CoverageRuntime,
    config: Option<CoverageConfig>,
    trackers: Vec<Tracker>,
}

impl Coordinator {
    pub fn new(runtime: CoverageRuntime) -> Self {
        Self {
            runtime,
            config: None,
            trackers: Vec::new(),
        }
    }

    pub fn runtime(&self) -> &CoverageRuntime {
        &self.runtime
    }

    pub fn config(&self) -> Option<&CoverageConfig> {
        self.config.as_ref()
    }

    pub fn trackers(&self) -> &[Tracker] {
        &self.trackers
    }

    pub fn is_configured(&self) -> bool {
        self.config.is_some() && !self.trackers.is_empty()
    }

    /// Install the configured trackers, replacing any previous configuration.
    ///
    /// Trackers of a previous configuration are stopped and their results discarded.
    pub fn configure(&mut self, config: CoverageConfig) {
        for tracker in self.trackers.drain(..) {
            tracker.stop();
        }
        self.trackers = config
            .trackers()
            .iter()
            .map(|setup| {
                let tracker = Tracker::new(&self.runtime, setup.kind, setup.options.clone());
                tracker.install();
                tracker
            })
            .collect();
        log::debug!(
            "Configured {} trackers for {}",
            self.trackers.len(),
            config.root().display()
        );
        self.config = Some(config);
    }

    /// Drop the configuration; later `start`/`stop` calls fail until reconfigured.
    pub fn reset(&mut self) {
        for tracker in self.trackers.drain(..) {
            tracker.stop();
        }
        self.config = None;
    }

    fn configured(&self, operation: &str) -> Result<&CoverageConfig> {
        match &self.config {
            Some(config) if !self.trackers.is_empty() => Ok(config),
            _ => Err(Error::lifecycle(format!(
                "configure must be called before {}",
                operation
            ))),
        }
    }

    pub fn start(&self) -> Result<()> {
        self.configured("start")?;
        for tracker in &self.trackers {
            tracker.start()?;
        }
        Ok(())
    }

    /// Stop every tracker and merge their results.
    pub fn stop(&self) -> Result<CoverageReport> {
        let config = self.configured("stop")?;
        let files = self.trackers.iter().flat_map(|tracker| tracker.stop());
        Ok(relativize_paths(files, config.root()))
    }

    /// Start, run `body`, and stop, also when `body` panics.
    pub fn run<F, T>(&self, body: F) -> Result<(T, CoverageReport)>
    where
        F: FnOnce() -> T,
    {
        self.start()?;
        let guard = StopGuard {
            coordinator: self,
            armed: true,
        };
        let value = body();
        let report = guard.finish()?;
        Ok((value, report))
    }

    /// Record `path` into every tracker of this session that accepts it.
    pub fn record(&self, path: &Path) -> bool {
        self.trackers
            .iter()
            .fold(false, |recorded, tracker| tracker.record(path) | recorded)
    }

    pub fn clear_cache(&self) {
        self.runtime.cache().clear();
    }

    /// Persist the resolution cache to `location`.
    pub fn try_save_cache(&self, location: &Path) -> Result<()> {
        self.runtime
            .cache()
            .save(location)
            .map_err(|e| Error::Cache(format!("{:#}", e)))
    }

    pub fn save_cache(&self, location: &Path) -> bool {
        match self.try_save_cache(location) {
            Ok(()) => true,
            Err(err) => {
                log::warn!("{}", err);
                false
            }
        }
    }

    pub fn load_cache(&self, location: &Path) -> bool {
        self.runtime.cache().load(location)
    }

    /// Default cache file inside the configured cache directory.
    pub fn default_cache_file(&self) -> Result<PathBuf> {
        let config = self.configured("using the default cache location")?;
        Ok(cache_file_path(config.cache_path()))
    }

    /// Save to the configured cache directory.
    pub fn save_default_cache(&self) -> bool {
        match self.default_cache_file() {
            Ok(path) => self.save_cache(&path),
            Err(err) => {
                log::warn!("{}", err);
                false
            }
        }
    }

    /// Load from the configured cache directory.
    pub fn load_default_cache(&self) -> bool {
        match self.default_cache_file() {
            Ok(path) => self.load_cache(&path),
            Err(err) => {
                log::warn!("{}", err);
                false
            }
        }
    }
}

impl std::fmt::Debug for Coordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Coordinator")
            .field("config", &self.config)
            .field("trackers", &self.trackers)
            .finish()
    }
}

/// Stops the session on drop unless it was finished normally.
struct StopGuard<'a> {
    coordinator: &'a Coordinator,
    armed: bool,
}

impl StopGuard<'_> {
    fn finish(mut self) -> Result<CoverageReport> {
        self.armed = false;
        self.coordinator.stop()
    }
}

impl Drop for StopGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            let _ = self.coordinator.stop();
        }
    }
}
