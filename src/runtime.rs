//! Process-wide coverage context.
//!
//! A [`CoverageRuntime`] owns everything that outlives a single session: the
//! host handle, the resolution cache, the source parser, the active tracker of
//! each kind and the event dispatcher registered with the host. Tests build a
//! fresh runtime each; an embedding process usually installs one globally.

use crate::cache::ResolutionCache;
use crate::extraction::{RubyParser, SourceParser};
use crate::host::{ClassHandle, EventSink, EventSource, RegistryEntry, RuntimeHost};
use crate::tracking::{
    coverage, file_read, lookup, registry, ActiveRegistry, AllocationTracer, TrackerKind,
};
use once_cell::sync::OnceCell;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};

static GLOBAL: OnceCell<CoverageRuntime> = OnceCell::new();

struct RuntimeInner {
    host: Arc<dyn RuntimeHost>,
    parser: Arc<dyn SourceParser>,
    cache: Arc<ResolutionCache>,
    active: ActiveRegistry,
    installed: Mutex<HashSet<TrackerKind>>,
    source: Option<Arc<dyn EventSource>>,
    registered: OnceCell<()>,
}

#[derive(Clone)]
pub struct CoverageRuntime {
    inner: Arc<RuntimeInner>,
}

pub struct RuntimeBuilder {
    host: Arc<dyn RuntimeHost>,
    parser: Option<Arc<dyn SourceParser>>,
    cache: Option<Arc<ResolutionCache>>,
    source: Option<Arc<dyn EventSource>>,
}

impl RuntimeBuilder {
    /// Parser used for reference extraction; defaults to [`RubyParser`].
    pub fn parser(mut self, parser: Arc<dyn SourceParser>) -> Self {
        self.parser = Some(parser);
        self
    }

    /// Share an existing cache instead of starting empty.
    pub fn cache(mut self, cache: Arc<ResolutionCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Host instrumentation to register the dispatcher with on first install.
    pub fn event_source(mut self, source: Arc<dyn EventSource>) -> Self {
        self.source = Some(source);
        self
    }

    pub fn build(self) -> CoverageRuntime {
        CoverageRuntime {
            inner: Arc::new(RuntimeInner {
                host: self.host,
                parser: self.parser.unwrap_or_else(|| Arc::new(RubyParser)),
                cache: self.cache.unwrap_or_default(),
                active: ActiveRegistry::default(),
                installed: Mutex::new(HashSet::new()),
                source: self.source,
                registered: OnceCell::new(),
            }),
        }
    }
}

impl CoverageRuntime {
    pub fn builder(host: Arc<dyn RuntimeHost>) -> RuntimeBuilder {
        RuntimeBuilder {
            host,
            parser: None,
            cache: None,
            source: None,
        }
    }

    /// Make `self` the process-wide runtime. Returns the installed one, which
    /// is the earlier runtime if one was already installed.
    pub fn install_global(self) -> &'static CoverageRuntime {
        GLOBAL.get_or_init(|| self)
    }

    pub fn global() -> Option<&'static CoverageRuntime> {
        GLOBAL.get()
    }

    pub fn host(&self) -> &dyn RuntimeHost {
        self.inner.host.as_ref()
    }

    pub fn parser(&self) -> &dyn SourceParser {
        self.inner.parser.as_ref()
    }

    pub fn cache(&self) -> &ResolutionCache {
        &self.inner.cache
    }

    pub(crate) fn active(&self) -> &ActiveRegistry {
        &self.inner.active
    }

    /// Hook `kind` into the host. Only the first call per kind has any effect;
    /// the dispatcher is registered with the event source once overall.
    pub fn install(&self, kind: TrackerKind) -> bool {
        if let Some(source) = &self.inner.source {
            self.inner.registered.get_or_init(|| {
                log::debug!("Registering coverage event dispatcher");
                source.register(self.event_sink());
            });
        }
        let newly = self.inner.installed.lock().insert(kind);
        if newly {
            log::debug!("Installed {} tracker", kind);
        }
        newly
    }

    pub fn is_installed(&self, kind: TrackerKind) -> bool {
        self.inner.installed.lock().contains(&kind)
    }

    /// A sink routing host events to the active trackers of this runtime.
    ///
    /// The sink holds the runtime weakly; once the runtime is dropped, events
    /// are ignored.
    pub fn event_sink(&self) -> Arc<dyn EventSink> {
        Arc::new(Dispatcher {
            runtime: Arc::downgrade(&self.inner),
        })
    }

    /// Record into the active tracker of `kind`, if any.
    pub fn record(&self, kind: TrackerKind, path: &Path) -> bool {
        self.inner
            .active
            .active(kind)
            .is_some_and(|core| core.record(path))
    }

    /// Lazy form of [`record`](Self::record): `path` runs only if a tracker of
    /// `kind` is active and accepts this thread.
    pub fn record_with<F>(&self, kind: TrackerKind, path: F) -> bool
    where
        F: FnOnce() -> Option<PathBuf>,
    {
        self.inner
            .active
            .active(kind)
            .is_some_and(|core| core.record_with(path))
    }

    /// A dynamic-registry entry was looked up.
    pub fn on_registry_lookup(&self, entry: &dyn RegistryEntry) {
        if let Some(core) = self.inner.active.active(TrackerKind::Registry) {
            registry::on_registry_lookup(&core, entry);
        }
    }

    fn on_line(&self, file: &Path) {
        if let Some(core) = self.inner.active.active(TrackerKind::Coverage) {
            coverage::on_line(&core, file);
        }
    }

    fn on_allocate(&self, class: Option<ClassHandle>) {
        if let Some(core) = self.inner.active.active(TrackerKind::Coverage) {
            AllocationTracer::new(self.host(), self.cache(), core.options().ancestor_resolution)
                .on_allocate(&core, class);
        }
    }

    fn on_reflective_lookup(&self, name: &str, scope: Option<ClassHandle>) {
        if let Some(core) = self.inner.active.active(TrackerKind::ConstLookup) {
            lookup::on_reflective_lookup(self.host(), &core, name, scope);
        }
    }

    fn on_file_open_for_read(&self, path: &Path) {
        if let Some(core) = self.inner.active.active(TrackerKind::FileRead) {
            file_read::on_file_open_for_read(&core, path);
        }
    }
}

impl std::fmt::Debug for CoverageRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoverageRuntime")
            .field("installed", &*self.inner.installed.lock())
            .field("cache", &self.inner.cache.stats())
            .finish()
    }
}

struct Dispatcher {
    runtime: Weak<RuntimeInner>,
}

impl Dispatcher {
    fn with_runtime(&self, event: impl FnOnce(&CoverageRuntime)) {
        if let Some(inner) = self.runtime.upgrade() {
            event(&CoverageRuntime { inner });
        }
    }
}

impl EventSink for Dispatcher {
    fn on_line(&self, file: &Path, _line: u32) {
        self.with_runtime(|runtime| runtime.on_line(file));
    }

    fn on_allocate(&self, class: Option<ClassHandle>) {
        self.with_runtime(|runtime| runtime.on_allocate(class));
    }

    fn on_reflective_lookup(&self, name: &str, scope: Option<ClassHandle>) {
        self.with_runtime(|runtime| runtime.on_reflective_lookup(name, scope));
    }

    fn on_file_open_for_read(&self, path: &Path) {
        self.with_runtime(|runtime| runtime.on_file_open_for_read(path));
    }
}
