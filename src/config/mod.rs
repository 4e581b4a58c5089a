//! Session configuration.
//!
//! Configs are built in code through [`CoverageConfig::builder`] or read from
//! a TOML file with a `[coverage]` table:
//!
//! ```toml
//! [coverage]
//! root = "/srv/app"
//! excluded_path = "vendor"
//! thread_affinity = "owner_thread_only"
//! constant_resolution = "expanded"
//! cache_path = "tmp/cache/impactcov"
//!
//! [[coverage.trackers]]
//! kind = "coverage"
//!
//! [[coverage.trackers]]
//! kind = "file_read"
//! ```
//!
//! Both paths run the same validation.

mod core;
mod loader;

pub use self::core::{
    CoverageConfig, CoverageConfigBuilder, TrackerSetup, TrackerSpec, CACHE_DIR_ENV,
    DEFAULT_CACHE_PATH, DEFAULT_MAX_RESOLUTION_ROUNDS,
};
pub use self::loader::load_config_from_path;
