//! Line coverage and stop-time reference expansion for the coverage tracker.

use super::TrackerCore;
use crate::resolve::{ExpansionSettings, ReferenceExpander};
use crate::runtime::CoverageRuntime;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// A line executed in `file`.
pub(crate) fn on_line(core: &TrackerCore, file: &Path) {
    core.record(file);
}

/// Add every in-scope file transitively referenced from `files`.
pub(crate) fn finish(
    runtime: &CoverageRuntime,
    core: &TrackerCore,
    mut files: HashSet<PathBuf>,
) -> HashSet<PathBuf> {
    let options = core.options();
    let expander = ReferenceExpander::new(
        runtime.host(),
        runtime.parser(),
        runtime.cache(),
        ExpansionSettings {
            mode: options.constant_resolution,
            ancestor_resolution: options.ancestor_resolution,
            max_rounds: options.max_resolution_rounds,
        },
    );
    let added = expander.expand(&files, &options.scope);
    files.extend(added.into_iter().filter(|file| core.admits(file)));
    files
}
