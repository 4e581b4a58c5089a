//! Files opened for reading (fixtures, YAML, templates).

use super::TrackerCore;
use crate::scope::expand_path;
use std::path::Path;

/// Relative paths are expanded against the process working directory.
pub(crate) fn on_file_open_for_read(core: &TrackerCore, path: &Path) {
    if path.as_os_str().is_empty() {
        return;
    }
    let absolute = if path.is_absolute() {
        expand_path(path, Path::new("/"))
    } else {
        match std::env::current_dir() {
            Ok(cwd) => expand_path(path, &cwd),
            Err(err) => {
                log::debug!("Cannot expand {}: {}", path.display(), err);
                return;
            }
        }
    };
    core.record(&absolute);
}
