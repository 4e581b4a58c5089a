//! One active-instance slot per tracker kind.

use super::{TrackerCore, TrackerKind};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, Default)]
pub struct ActiveRegistry {
    slots: RwLock<HashMap<TrackerKind, Arc<TrackerCore>>>,
}

impl ActiveRegistry {
    /// Make `core` the active instance of its kind, returning whichever it displaced.
    pub fn activate(&self, core: Arc<TrackerCore>) -> Option<Arc<TrackerCore>> {
        self.slots.write().insert(core.kind(), core)
    }

    /// Clear the slot only if `core` still owns it.
    pub fn deactivate(&self, core: &Arc<TrackerCore>) -> bool {
        let mut slots = self.slots.write();
        match slots.get(&core.kind()) {
            Some(active) if Arc::ptr_eq(active, core) => {
                slots.remove(&core.kind());
                true
            }
            _ => false,
        }
    }

    pub fn active(&self, kind: TrackerKind) -> Option<Arc<TrackerCore>> {
        self.slots.read().get(&kind).cloned()
    }
}
