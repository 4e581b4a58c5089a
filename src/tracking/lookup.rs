//! Reflective constant lookups (`const_get` and friends).
//!
//! Names looked up by string are invisible to static extraction, so the host
//! reports each lookup and the definition site is recorded. The host is only
//! asked for the location while a lookup tracker would accept the event.

use super::TrackerCore;
use crate::host::{guarded, ClassHandle, HostLocation, RuntimeHost};
use crate::observability::{set_phase, CoveragePhase};

pub(crate) fn on_reflective_lookup(
    host: &dyn RuntimeHost,
    core: &TrackerCore,
    name: &str,
    scope: Option<ClassHandle>,
) {
    core.record_with(|| {
        let _phase = set_phase(CoveragePhase::Resolution);
        guarded("scoped_source_location", || {
            host.scoped_source_location(scope, name)
        })
        .ok()
        .flatten()
        .filter(HostLocation::is_usable)
        .map(|location| location.file)
    });
}
