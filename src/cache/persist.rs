//! Durable cache envelope.
//!
//! On disk the cache is a postcard-encoded `{schema_version, payload}` pair,
//! where the payload is itself a postcard-encoded [`CacheSnapshot`]. The dedup
//! registry is never written: it only describes what this process has emitted,
//! and a successful load leaves it untouched. The class file memo is not
//! written either; it is rebuilt from host lookups on demand.

use super::{ExtractionEntry, ImplicatedEntry, ResolutionCache};
use crate::observability::{set_phase, CoveragePhase};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Bumped whenever the snapshot layout changes. Loads require an exact match.
pub const SCHEMA_VERSION: u32 = 1;

const CACHE_FILE_NAME: &str = "resolution_cache.bin";

/// Default cache file inside a cache directory.
pub fn cache_file_path(cache_dir: &Path) -> PathBuf {
    cache_dir.join(CACHE_FILE_NAME)
}

#[derive(Debug, Serialize, Deserialize)]
struct Envelope {
    schema_version: u32,
    payload: Vec<u8>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct CacheSnapshot {
    extractions: HashMap<PathBuf, ExtractionEntry>,
    locations: HashMap<String, PathBuf>,
    implicated: HashMap<PathBuf, ImplicatedEntry>,
}

impl ResolutionCache {
    /// Write the cache to `path` atomically.
    pub fn save(&self, path: &Path) -> Result<()> {
        let _phase = set_phase(CoveragePhase::Persistence);
        let payload = postcard::to_allocvec(&self.snapshot())
            .context("Failed to encode resolution cache")?;
        let bytes = postcard::to_allocvec(&Envelope {
            schema_version: SCHEMA_VERSION,
            payload,
        })
        .context("Failed to encode cache envelope")?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create cache directory {:?}", parent))?;
        }
        write_atomically(path, &bytes)?;
        log::debug!("Saved resolution cache to {} ({} bytes)", path.display(), bytes.len());
        Ok(())
    }

    /// Replace the persisted maps with the contents of `path`.
    ///
    /// Anything short of a complete, current-schema snapshot leaves the cache
    /// empty and returns false. A successful load keeps the dedup registry.
    pub fn load(&self, path: &Path) -> bool {
        let _phase = set_phase(CoveragePhase::Persistence);
        match read_snapshot(path) {
            Ok(snapshot) => {
                self.restore(snapshot);
                log::debug!("Loaded resolution cache from {}", path.display());
                true
            }
            Err(err) => {
                self.clear();
                log::warn!("Resolution cache not loaded from {}: {:#}", path.display(), err);
                false
            }
        }
    }

    fn snapshot(&self) -> CacheSnapshot {
        CacheSnapshot {
            extractions: self
                .extractions
                .iter()
                .map(|entry| (entry.key().clone(), entry.value().clone()))
                .collect(),
            locations: self
                .locations
                .iter()
                .map(|entry| (entry.key().clone(), entry.value().clone()))
                .collect(),
            implicated: self
                .implicated
                .iter()
                .map(|entry| (entry.key().clone(), entry.value().clone()))
                .collect(),
        }
    }

    fn restore(&self, snapshot: CacheSnapshot) {
        self.clear_resolutions();
        for (file, entry) in snapshot.extractions {
            self.extractions.insert(file, entry);
        }
        for (name, file) in snapshot.locations {
            self.locations.insert(name, file);
        }
        for (file, entry) in snapshot.implicated {
            self.implicated.insert(file, entry);
        }
        self.loaded.store(true, Ordering::Release);
    }
}

fn read_snapshot(path: &Path) -> Result<CacheSnapshot> {
    let bytes = fs::read(path).with_context(|| format!("Failed to read {:?}", path))?;
    let envelope: Envelope =
        postcard::from_bytes(&bytes).context("Malformed cache envelope")?;
    if envelope.schema_version != SCHEMA_VERSION {
        anyhow::bail!(
            "Schema version {} does not match {}",
            envelope.schema_version,
            SCHEMA_VERSION
        );
    }
    postcard::from_bytes(&envelope.payload).context("Malformed cache payload")
}

/// Unique sibling of `target` so concurrent writers never share a temp file.
fn temp_path_for(target: &Path) -> PathBuf {
    static COUNTER: AtomicU64 = AtomicU64::new(0);

    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos() as u64;
    let counter = COUNTER.fetch_add(1, Ordering::SeqCst);
    let temp_name = format!(
        "{}.tmp.{}.{}.{}",
        target
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("cache"),
        std::process::id(),
        timestamp,
        counter
    );
    target.with_file_name(temp_name)
}

fn write_atomically(target: &Path, data: &[u8]) -> Result<()> {
    let temp = temp_path_for(target);
    let written = (|| -> Result<()> {
        let mut file = fs::File::create(&temp)
            .with_context(|| format!("Failed to create temp file {:?}", temp))?;
        file.write_all(data)
            .with_context(|| format!("Failed to write temp file {:?}", temp))?;
        file.sync_all()
            .with_context(|| format!("Failed to sync temp file {:?}", temp))?;
        fs::rename(&temp, target)
            .with_context(|| format!("Failed to rename {:?} -> {:?}", temp, target))
    })();

    if written.is_err() {
        let _ = fs::remove_file(&temp);
    }
    written
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::ContentDigest;
    use crate::extraction::CandidateGroup;
    use tempfile::TempDir;

    fn populated() -> ResolutionCache {
        let cache = ResolutionCache::new();
        cache.get_or_extract(
            Path::new("/app/runner.rb"),
            &ContentDigest::of_bytes(b"Foo"),
            || Some(vec![CandidateGroup::from(vec!["Foo"])]),
        );
        cache.get_or_resolve("Foo", || Some(PathBuf::from("/app/foo.rb")));
        cache.claim("Foo");
        cache
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = TempDir::new().unwrap();
        let path = cache_file_path(dir.path());
        let cache = populated();
        cache.save(&path).unwrap();

        let restored = ResolutionCache::new();
        assert!(restored.load(&path));
        assert!(restored.is_loaded());
        assert_eq!(restored.cached_location("Foo"), Some(PathBuf::from("/app/foo.rb")));
        assert_eq!(restored.stats().extracted_files, 1);
    }

    #[test]
    fn test_dedup_registry_is_not_persisted() {
        let dir = TempDir::new().unwrap();
        let path = cache_file_path(dir.path());
        populated().save(&path).unwrap();

        let restored = ResolutionCache::new();
        assert!(restored.load(&path));
        assert!(!restored.is_claimed("Foo"));
    }

    #[test]
    fn test_load_keeps_classes_emitted_in_this_process() {
        let dir = TempDir::new().unwrap();
        let path = cache_file_path(dir.path());
        ResolutionCache::new().save(&path).unwrap();

        let cache = populated();
        assert!(cache.load(&path));
        assert!(cache.is_claimed("Foo"));
        assert!(!cache.claim("Foo"));
        assert_eq!(cache.cached_location("Foo"), None);
    }

    #[test]
    fn test_foreign_schema_version_rejected() {
        let dir = TempDir::new().unwrap();
        let path = cache_file_path(dir.path());
        let payload = postcard::to_allocvec(&CacheSnapshot::default()).unwrap();
        let bytes = postcard::to_allocvec(&Envelope {
            schema_version: SCHEMA_VERSION + 1,
            payload,
        })
        .unwrap();
        fs::write(&path, bytes).unwrap();

        let cache = populated();
        assert!(!cache.load(&path));
        assert!(cache.is_empty());
        assert!(!cache.is_loaded());
    }

    #[test]
    fn test_truncated_payload_rejected() {
        let dir = TempDir::new().unwrap();
        let path = cache_file_path(dir.path());
        let bytes = postcard::to_allocvec(&Envelope {
            schema_version: SCHEMA_VERSION,
            payload: vec![0x05, 0x01],
        })
        .unwrap();
        fs::write(&path, bytes).unwrap();

        let cache = ResolutionCache::new();
        assert!(!cache.load(&path));
        assert!(cache.is_empty());
    }

    #[test]
    fn test_missing_file_is_not_loaded() {
        let dir = TempDir::new().unwrap();
        let cache = ResolutionCache::new();
        assert!(!cache.load(&dir.path().join("absent.bin")));
    }

    #[test]
    fn test_save_creates_parent_and_leaves_no_temp_files() {
        let dir = TempDir::new().unwrap();
        let path = cache_file_path(&dir.path().join("tmp/cache/impactcov"));
        populated().save(&path).unwrap();

        let entries: Vec<_> = fs::read_dir(path.parent().unwrap())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(entries, vec![std::ffi::OsString::from(CACHE_FILE_NAME)]);
    }

    #[test]
    fn test_temp_paths_are_unique() {
        let target = Path::new("/tmp/cache.bin");
        assert_ne!(temp_path_for(target), temp_path_for(target));
    }
}
