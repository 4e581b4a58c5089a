//! Synthetic event source and registry entries.

use crate::host::{ClassHandle, EventSink, EventSource, RegistryEntry};
use parking_lot::RwLock;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Event source that fires events on demand, synchronously on the calling
/// thread, to every registered sink.
#[derive(Default)]
pub struct SyntheticEventSource {
    sinks: RwLock<Vec<Arc<dyn EventSink>>>,
}

impl SyntheticEventSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn registrations(&self) -> usize {
        self.sinks.read().len()
    }

    fn each(&self, event: impl Fn(&dyn EventSink)) {
        // clone out so sinks can run without holding the lock
        let sinks: Vec<_> = self.sinks.read().iter().cloned().collect();
        for sink in sinks {
            event(sink.as_ref());
        }
    }

    pub fn line(&self, file: impl AsRef<Path>, line: u32) {
        self.each(|sink| sink.on_line(file.as_ref(), line));
    }

    pub fn allocate(&self, class: Option<ClassHandle>) {
        self.each(|sink| sink.on_allocate(class));
    }

    pub fn reflective_lookup(&self, name: &str, scope: Option<ClassHandle>) {
        self.each(|sink| sink.on_reflective_lookup(name, scope));
    }

    pub fn file_read(&self, path: impl AsRef<Path>) {
        self.each(|sink| sink.on_file_open_for_read(path.as_ref()));
    }
}

impl EventSource for SyntheticEventSource {
    fn register(&self, sink: Arc<dyn EventSink>) {
        self.sinks.write().push(sink);
    }
}

/// Registry entry with fixed definition sites.
#[derive(Debug, Clone, Default)]
pub struct SyntheticEntry {
    sites: Vec<Option<PathBuf>>,
}

impl SyntheticEntry {
    pub fn new(sites: &[Option<&str>]) -> Self {
        Self {
            sites: sites.iter().map(|site| site.map(PathBuf::from)).collect(),
        }
    }
}

impl RegistryEntry for SyntheticEntry {
    fn definition_sites(&self) -> Vec<Option<PathBuf>> {
        self.sites.clone()
    }
}
