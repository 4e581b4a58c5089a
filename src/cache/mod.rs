//! Process-wide resolution cache.
//!
//! Five structures, all shared by every thread and every session:
//!
//! - file → (digest, candidate groups)
//! - qualified name → defining file
//! - file → (digest, implicated files)
//! - class name → files of the class and its ancestors
//! - dedup registry of class identities already emitted
//!
//! The dedup registry only governs what the allocation tracer emits. Reference
//! resolution always reads the memoized class file set, so a file's implicated
//! set never depends on which classes were emitted earlier.
//!
//! Each structure is a sharded concurrent map. Work delegated by a
//! `get_or_*` call (parsing, host lookups) runs without holding any shard lock
//! and its result is published through the entry API, so the check-then-insert
//! on a key is atomic and a host callback that re-enters the cache cannot
//! deadlock.

mod digest;
mod persist;

pub use digest::{ContentDigest, SourceSnapshot};
pub use persist::{cache_file_path, SCHEMA_VERSION};

use crate::extraction::CandidateGroup;
use dashmap::mapref::entry::Entry;
use dashmap::{DashMap, DashSet};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// Candidate groups extracted from one version of a file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionEntry {
    pub digest: ContentDigest,
    pub groups: Vec<CandidateGroup>,
}

/// Outcome of resolving one file's candidate groups.
///
/// Groups that resolved to nothing are kept so a replay can retry them; a
/// name that fails now may resolve once its file loads.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Implicated {
    pub files: BTreeSet<PathBuf>,
    pub unresolved: Vec<CandidateGroup>,
}

/// Implicated files of one version of a referencing file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImplicatedEntry {
    pub digest: ContentDigest,
    pub implicated: Implicated,
}

#[derive(Debug, Default)]
struct Counters {
    hits: AtomicUsize,
    misses: AtomicUsize,
}

impl Counters {
    fn hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    fn miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    fn reset(&self) {
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
    }
}

#[derive(Debug, Default)]
pub struct ResolutionCache {
    extractions: DashMap<PathBuf, ExtractionEntry>,
    locations: DashMap<String, PathBuf>,
    implicated: DashMap<PathBuf, ImplicatedEntry>,
    classes: DashMap<String, BTreeSet<PathBuf>>,
    dedup: DashSet<String>,
    loaded: AtomicBool,
    counters: Counters,
}

impl ResolutionCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Candidate groups for `file`, re-extracting only when `digest` changed.
    ///
    /// A failed extraction drops any stale entry for the file and is not cached.
    pub fn get_or_extract<F>(
        &self,
        file: &Path,
        digest: &ContentDigest,
        extract: F,
    ) -> Option<Vec<CandidateGroup>>
    where
        F: FnOnce() -> Option<Vec<CandidateGroup>>,
    {
        if let Some(groups) = self.fresh_extraction(file, digest) {
            self.counters.hit();
            return Some(groups);
        }
        self.counters.miss();

        let Some(groups) = extract() else {
            self.extractions.remove(file);
            return None;
        };

        let entry = ExtractionEntry {
            digest: digest.clone(),
            groups,
        };
        match self.extractions.entry(file.to_path_buf()) {
            Entry::Occupied(existing) if existing.get().digest == *digest => {
                Some(existing.get().groups.clone())
            }
            Entry::Occupied(mut existing) => {
                existing.insert(entry.clone());
                Some(entry.groups)
            }
            Entry::Vacant(slot) => {
                slot.insert(entry.clone());
                Some(entry.groups)
            }
        }
    }

    fn fresh_extraction(&self, file: &Path, digest: &ContentDigest) -> Option<Vec<CandidateGroup>> {
        let entry = self.extractions.get(file)?;
        (entry.digest == *digest).then(|| entry.groups.clone())
    }

    /// Defining file of `name`; `resolve` runs on a miss and failures are not cached.
    pub fn get_or_resolve<F>(&self, name: &str, resolve: F) -> Option<PathBuf>
    where
        F: FnOnce() -> Option<PathBuf>,
    {
        if let Some(file) = self.locations.get(name) {
            self.counters.hit();
            return Some(file.value().clone());
        }
        self.counters.miss();

        let file = resolve()?;
        let stored = self.locations.entry(name.to_string()).or_insert(file);
        Some(stored.value().clone())
    }

    /// Cached defining file of `name`, without consulting the host.
    pub fn cached_location(&self, name: &str) -> Option<PathBuf> {
        self.locations.get(name).map(|file| file.value().clone())
    }

    /// Files of the class `name` and its ancestors; `resolve` runs on a miss
    /// and failures are not cached.
    pub fn get_or_resolve_class<F>(&self, name: &str, resolve: F) -> Option<BTreeSet<PathBuf>>
    where
        F: FnOnce() -> Option<BTreeSet<PathBuf>>,
    {
        if let Some(files) = self.classes.get(name) {
            self.counters.hit();
            return Some(files.value().clone());
        }
        self.counters.miss();

        let files = resolve()?;
        let stored = self.classes.entry(name.to_string()).or_insert(files);
        Some(stored.value().clone())
    }

    /// Implicated files of `file`, replayed while `digest` is unchanged.
    pub fn get_or_replay_implicated<F>(
        &self,
        file: &Path,
        digest: &ContentDigest,
        compute: F,
    ) -> Option<Implicated>
    where
        F: FnOnce() -> Option<Implicated>,
    {
        let replay = self
            .implicated
            .get(file)
            .filter(|entry| entry.digest == *digest)
            .map(|entry| entry.implicated.clone());
        if let Some(implicated) = replay {
            self.counters.hit();
            log::debug!("Replaying implicated files for {}", file.display());
            return Some(implicated);
        }
        self.counters.miss();

        let Some(implicated) = compute() else {
            self.implicated.remove(file);
            return None;
        };

        match self.implicated.entry(file.to_path_buf()) {
            Entry::Occupied(existing) if existing.get().digest == *digest => {
                Some(existing.get().implicated.clone())
            }
            Entry::Occupied(mut existing) => {
                existing.insert(ImplicatedEntry {
                    digest: digest.clone(),
                    implicated: implicated.clone(),
                });
                Some(implicated)
            }
            Entry::Vacant(slot) => {
                slot.insert(ImplicatedEntry {
                    digest: digest.clone(),
                    implicated: implicated.clone(),
                });
                Some(implicated)
            }
        }
    }

    /// Replace the implicated entry of `file`, but only if it still belongs to `digest`.
    pub fn update_implicated(&self, file: &Path, digest: &ContentDigest, implicated: Implicated) {
        if let Some(mut entry) = self.implicated.get_mut(file) {
            if entry.digest == *digest {
                entry.implicated = implicated;
            }
        }
    }

    /// Drop cached state derived from a file that can no longer be read.
    pub fn forget_file(&self, file: &Path) {
        self.extractions.remove(file);
        self.implicated.remove(file);
    }

    /// Atomically claim `identity`; true only for the first caller in the process.
    pub fn claim(&self, identity: &str) -> bool {
        self.dedup.insert(identity.to_string())
    }

    pub fn is_claimed(&self, identity: &str) -> bool {
        self.dedup.contains(identity)
    }

    /// True after a successful load, until the next `clear`.
    pub fn is_loaded(&self) -> bool {
        self.loaded.load(Ordering::Acquire)
    }

    pub fn is_empty(&self) -> bool {
        self.extractions.is_empty()
            && self.locations.is_empty()
            && self.implicated.is_empty()
            && self.classes.is_empty()
            && self.dedup.is_empty()
    }

    /// Discard all state, including the dedup registry.
    pub fn clear(&self) {
        self.clear_resolutions();
        self.dedup.clear();
        self.loaded.store(false, Ordering::Release);
        log::debug!("Resolution cache cleared");
    }

    /// Discard everything derived from source and host lookups, keeping the
    /// dedup registry.
    fn clear_resolutions(&self) {
        self.extractions.clear();
        self.locations.clear();
        self.implicated.clear();
        self.classes.clear();
        self.counters.reset();
    }

    pub fn stats(&self) -> CacheStats {
        let hits = self.counters.hits.load(Ordering::Relaxed);
        let misses = self.counters.misses.load(Ordering::Relaxed);
        CacheStats {
            extracted_files: self.extractions.len(),
            resolved_names: self.locations.len(),
            implicated_files: self.implicated.len(),
            resolved_classes: self.classes.len(),
            dedup_entries: self.dedup.len(),
            hits,
            misses,
            hit_rate: if hits + misses > 0 {
                hits as f64 / (hits + misses) as f64
            } else {
                0.0
            },
        }
    }
}

/// Cache statistics
#[derive(Debug, Clone, PartialEq)]
pub struct CacheStats {
    pub extracted_files: usize,
    pub resolved_names: usize,
    pub implicated_files: usize,
    pub resolved_classes: usize,
    pub dedup_entries: usize,
    pub hits: usize,
    pub misses: usize,
    pub hit_rate: f64,
}

impl std::fmt::Display for CacheStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Cache Stats: {} files, {} names, {} implicated, {} classes, {} dedup, {} hits, {} misses, {:.1}% hit rate",
            self.extracted_files,
            self.resolved_names,
            self.implicated_files,
            self.resolved_classes,
            self.dedup_entries,
            self.hits,
            self.misses,
            self.hit_rate * 100.0
        )
    }
}
