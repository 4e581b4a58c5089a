//! Interfaces to the host runtime being measured.
//!
//! The engine never talks to a concrete interpreter. A host adapter implements
//! [`RuntimeHost`] to answer reflective queries and drives an [`EventSink`]
//! through whatever instrumentation it has; [`EventSource`] is the one-time
//! registration seam between the two.

use crate::observability::current_phase;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

/// Opaque identity of a class or module inside the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClassHandle(pub u64);

/// Where the host says a constant was defined.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostLocation {
    pub file: PathBuf,
    pub line: Option<u32>,
}

impl HostLocation {
    pub fn new(file: impl Into<PathBuf>, line: Option<u32>) -> Self {
        Self {
            file: file.into(),
            line,
        }
    }

    /// A location with an empty file is what hosts return for eval'd or native code.
    pub fn is_usable(&self) -> bool {
        !self.file.as_os_str().is_empty()
    }
}

/// A failed reflective query. Always recovered as "unresolvable".
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum HostError {
    #[error("host lookup failed: {0}")]
    LookupFailed(String),

    #[error("host returned malformed data: {0}")]
    Malformed(String),

    #[error("host lookup panicked")]
    Panicked,
}

pub type HostResult<T> = std::result::Result<T, HostError>;

/// Reflective queries the engine issues against the host.
///
/// Implementations may return errors or even panic; callers go through
/// [`guarded`] so neither escapes the engine.
pub trait RuntimeHost: Send + Sync {
    /// Definition site of a fully-qualified constant name.
    fn const_source_location(&self, name: &str) -> HostResult<Option<HostLocation>>;

    /// Definition site of `name` looked up relative to `scope`, as a
    /// `const_get` on that scope would.
    fn scoped_source_location(
        &self,
        scope: Option<ClassHandle>,
        name: &str,
    ) -> HostResult<Option<HostLocation>> {
        match scope {
            Some(scope) if !name.starts_with("::") => match self.class_name(scope)? {
                Some(scope_name) => {
                    let qualified = format!("{scope_name}::{name}");
                    match self.const_source_location(&qualified)? {
                        Some(location) => Ok(Some(location)),
                        None => self.const_source_location(name),
                    }
                }
                None => self.const_source_location(name),
            },
            _ => self.const_source_location(name.trim_start_matches("::")),
        }
    }

    /// The class or module a constant name refers to, if it is one.
    fn constant_class(&self, name: &str) -> HostResult<Option<ClassHandle>>;

    /// Fully-qualified name of a class; `None` for anonymous classes.
    fn class_name(&self, class: ClassHandle) -> HostResult<Option<String>>;

    /// Ancestor chain of a class, the class itself first.
    fn ancestors(&self, class: ClassHandle) -> HostResult<Vec<ClassHandle>>;
}

/// Callbacks the host fires synchronously on the triggering thread.
pub trait EventSink: Send + Sync {
    fn on_line(&self, file: &Path, line: u32);

    /// `None` when the object's class could not be determined (e.g. during teardown).
    fn on_allocate(&self, class: Option<ClassHandle>);

    fn on_reflective_lookup(&self, name: &str, scope: Option<ClassHandle>);

    fn on_file_open_for_read(&self, path: &Path);
}

/// The host's instrumentation. Registration happens once per process.
pub trait EventSource: Send + Sync {
    fn register(&self, sink: Arc<dyn EventSink>);
}

/// A looked-up entry of a dynamic registry (factory, model registry, ...).
pub trait RegistryEntry {
    /// Source files of every block or declaration that defines the entry.
    fn definition_sites(&self) -> Vec<Option<PathBuf>>;
}

/// Run a host query, turning panics into [`HostError::Panicked`].
pub fn guarded<T, F>(operation: &str, query: F) -> HostResult<T>
where
    F: FnOnce() -> HostResult<T>,
{
    let outcome = catch_unwind(AssertUnwindSafe(query)).unwrap_or(Err(HostError::Panicked));
    if let Err(ref err) = outcome {
        log::debug!(
            "host {} failed during {}: {}",
            operation,
            current_phase().map_or_else(|| "idle".to_string(), |p| p.to_string()),
            err
        );
    }
    outcome
}

/// Location of `name`, collapsing every failure mode to `None`.
pub fn resolve_location(host: &dyn RuntimeHost, name: &str) -> Option<PathBuf> {
    guarded("const_source_location", || host.const_source_location(name))
        .ok()
        .flatten()
        .filter(HostLocation::is_usable)
        .map(|location| location.file)
}
