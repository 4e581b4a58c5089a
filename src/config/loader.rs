use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use super::core::{CoverageConfig, TrackerSpec};
use crate::errors::{Error, Result};
use crate::extraction::ExtractionMode;
use crate::scope::{expand_path, normalize};
use crate::tracking::{ThreadAffinity, TrackerKind};

/// On-disk shape of the `[coverage]` table.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct RawCoverageConfig {
    pub root: Option<PathBuf>,
    pub excluded_path: Option<PathBuf>,
    pub thread_affinity: Option<ThreadAffinity>,
    pub constant_resolution: Option<ExtractionMode>,
    pub ancestor_resolution: Option<bool>,
    pub allocation_tracing: Option<bool>,
    pub cache_path: Option<PathBuf>,
    pub max_resolution_rounds: Option<usize>,
    #[serde(default)]
    pub trackers: Vec<RawTrackerSpec>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct RawTrackerSpec {
    pub kind: TrackerKind,
    pub root: Option<PathBuf>,
    pub excluded_path: Option<PathBuf>,
    pub thread_affinity: Option<ThreadAffinity>,
}

#[derive(Debug, Deserialize)]
struct RawFile {
    coverage: Option<RawCoverageConfig>,
}

/// Pure function to parse the `[coverage]` table from TOML contents
pub(crate) fn parse_config(contents: &str) -> std::result::Result<RawCoverageConfig, String> {
    let file: RawFile = toml::from_str(contents).map_err(|e| e.to_string())?;
    Ok(file.coverage.unwrap_or_default())
}

impl RawCoverageConfig {
    /// Run the raw values through the same builder validation as code-built configs.
    ///
    /// A missing root falls back to `default_root`.
    pub(crate) fn into_config(self, default_root: &Path) -> Result<CoverageConfig> {
        let root = self.root.unwrap_or_else(|| default_root.to_path_buf());
        let mut builder = CoverageConfig::builder(root);
        if let Some(path) = self.excluded_path {
            builder = builder.excluded_path(path);
        }
        if let Some(affinity) = self.thread_affinity {
            builder = builder.thread_affinity(affinity);
        }
        if let Some(mode) = self.constant_resolution {
            builder = builder.constant_resolution(mode);
        }
        if let Some(enabled) = self.ancestor_resolution {
            builder = builder.ancestor_resolution(enabled);
        }
        if let Some(enabled) = self.allocation_tracing {
            builder = builder.allocation_tracing(enabled);
        }
        if let Some(path) = self.cache_path {
            builder = builder.cache_path(path);
        }
        if let Some(rounds) = self.max_resolution_rounds {
            builder = builder.max_resolution_rounds(rounds);
        }
        for raw in self.trackers {
            let mut spec = TrackerSpec::new(raw.kind);
            spec.root = raw.root;
            spec.excluded_path = raw.excluded_path;
            spec.thread_affinity = raw.thread_affinity;
            builder = builder.tracker(spec);
        }
        builder.build()
    }
}

/// Load a configuration file.
///
/// The root defaults to the directory containing the file. Unreadable or
/// malformed files are configuration errors carrying the file path.
pub fn load_config_from_path(path: &Path) -> Result<CoverageConfig> {
    let contents = fs::read_to_string(path).map_err(|e| {
        Error::configuration_with_path(format!("Failed to read config file: {}", e), path)
    })?;
    let raw = parse_config(&contents).map_err(|e| {
        Error::configuration_with_path(format!("Failed to parse config file: {}", e), path)
    })?;
    log::debug!("Loaded config from {}", path.display());

    raw.into_config(&default_root_for(path)?)
}

/// Absolute directory containing `path`, expanded against the working
/// directory when `path` is relative.
fn default_root_for(path: &Path) -> Result<PathBuf> {
    let parent = path.parent().unwrap_or_else(|| Path::new(""));
    if parent.is_absolute() {
        return Ok(normalize(parent));
    }
    let cwd = std::env::current_dir().map_err(|e| {
        Error::configuration_with_path(format!("Cannot determine working directory: {}", e), path)
    })?;
    Ok(expand_path(parent, &cwd))
}
