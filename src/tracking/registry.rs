//! Dynamic-registry lookups such as factory definitions.
//!
//! Registries are typically loaded at boot, before any session starts, so the
//! definition files never show up as executed lines. Each lookup instead
//! records every file that contributed to the entry's definition.

use super::TrackerCore;
use crate::host::RegistryEntry;

pub(crate) fn on_registry_lookup(core: &TrackerCore, entry: &dyn RegistryEntry) {
    if !core.accepts_current_thread() {
        return;
    }
    for site in entry.definition_sites().into_iter().flatten() {
        core.record(&site);
    }
}
