//! Allocation tracing: an instantiated class implicates its defining file and
//! those of its ancestors.
//!
//! Each class is emitted at most once per process. Later allocations of the
//! same class, in this session or any later one, add nothing.

use super::TrackerCore;
use crate::cache::ResolutionCache;
use crate::host::{ClassHandle, RuntimeHost};
use crate::observability::{set_phase, CoveragePhase};
use crate::resolve::ConstantResolver;
use std::collections::BTreeSet;

pub struct AllocationTracer<'a> {
    resolver: ConstantResolver<'a>,
}

impl<'a> AllocationTracer<'a> {
    pub fn new(host: &'a dyn RuntimeHost, cache: &'a ResolutionCache, ancestor_resolution: bool) -> Self {
        Self {
            resolver: ConstantResolver::new(host, cache, ancestor_resolution),
        }
    }

    /// Handle one allocation event. Returns the number of newly recorded files.
    pub fn on_allocate(&self, core: &TrackerCore, class: Option<ClassHandle>) -> usize {
        let Some(class) = class else {
            return 0;
        };
        // affinity is checked before claiming so a foreign thread cannot
        // consume the class's one-time emission
        if !core.options().allocation_tracing || !core.accepts_current_thread() {
            return 0;
        }

        let _phase = set_phase(CoveragePhase::AllocationTracing);
        let mut files = BTreeSet::new();
        if !self.resolver.claim_and_resolve_class(class, &mut files) {
            return 0;
        }
        files.iter().filter(|file| core.record(file)).count()
    }
}
