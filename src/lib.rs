// Export modules for library usage
pub mod cache;
pub mod config;
pub mod errors;
pub mod extraction;
pub mod host;
pub mod observability;
pub mod resolve;
pub mod runtime;
pub mod scope;
pub mod session;
pub mod testkit;
pub mod tracking;

// Re-export commonly used types
pub use crate::cache::{CacheStats, ResolutionCache};
pub use crate::config::{load_config_from_path, CoverageConfig, TrackerSpec};
pub use crate::errors::{Error, Result};
pub use crate::extraction::{CandidateGroup, ExtractionMode, RubyParser, SourceParser};
pub use crate::host::{
    ClassHandle, EventSink, EventSource, HostError, HostLocation, RegistryEntry, RuntimeHost,
};
pub use crate::runtime::CoverageRuntime;
pub use crate::scope::{path_within, relativize_paths, PathScope};
pub use crate::session::{Coordinator, CoverageReport};
pub use crate::tracking::{ThreadAffinity, Tracker, TrackerKind, TrackerState};
