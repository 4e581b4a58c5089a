//! Path scoping shared by every tracking channel.
//!
//! Containment is decided per path component, so `/application` is never
//! treated as lying under `/app` and a trailing separator on the root is
//! irrelevant.

use crate::errors::{Error, Result};
use std::collections::BTreeSet;
use std::path::{Component, Path, PathBuf};

/// True iff `path` equals `root` or lies underneath it.
pub fn path_within(path: &Path, root: &Path) -> bool {
    path.starts_with(root)
}

/// Same rule as [`path_within`]; kept separate so call sites read as intended.
pub fn path_excluded(path: &Path, excluded_root: &Path) -> bool {
    path_within(path, excluded_root)
}

/// Lexically resolve `.` and `..` components without touching the filesystem.
pub fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                // `..` at the root stays at the root
                if !out.pop() && !out.has_root() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Expand a possibly relative path against `base` and normalize it.
pub fn expand_path(path: &Path, base: &Path) -> PathBuf {
    if path.is_absolute() {
        normalize(path)
    } else {
        normalize(&base.join(path))
    }
}

/// Validated root / excluded-path pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathScope {
    root: PathBuf,
    excluded: Option<PathBuf>,
}

impl PathScope {
    /// Build a scope, failing on a relative root or an excluded path outside it.
    ///
    /// A relative `excluded` is joined onto `root` before validation.
    pub fn new(root: impl AsRef<Path>, excluded: Option<&Path>) -> Result<Self> {
        let root = validate_root(root.as_ref())?;
        let excluded = excluded
            .map(|path| validate_excluded(&root, path))
            .transpose()?;
        Ok(Self { root, excluded })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn excluded(&self) -> Option<&Path> {
        self.excluded.as_deref()
    }

    /// Inside the root and not inside the excluded path.
    pub fn includes(&self, path: &Path) -> bool {
        if !path_within(path, &self.root) {
            return false;
        }
        match &self.excluded {
            Some(excluded) => !path_excluded(path, excluded),
            None => true,
        }
    }
}

fn validate_root(root: &Path) -> Result<PathBuf> {
    if root.as_os_str().is_empty() {
        return Err(Error::configuration("root is required"));
    }
    if !root.is_absolute() {
        return Err(Error::configuration_with_path(
            "root must be an absolute path",
            root,
        ));
    }
    Ok(normalize(root))
}

fn validate_excluded(root: &Path, excluded: &Path) -> Result<PathBuf> {
    let candidate = expand_path(excluded, root);
    if !path_within(&candidate, root) {
        return Err(Error::configuration_with_path(
            format!("excluded path must lie within root {}", root.display()),
            candidate,
        ));
    }
    Ok(candidate)
}

/// Strip `root/` from every in-root path; paths outside root pass through.
pub fn relativize_paths<I>(paths: I, root: &Path) -> BTreeSet<PathBuf>
where
    I: IntoIterator<Item = PathBuf>,
{
    paths
        .into_iter()
        .map(|path| match path.strip_prefix(root) {
            Ok(relative) if !relative.as_os_str().is_empty() => relative.to_path_buf(),
            _ => path,
        })
        .collect()
}
