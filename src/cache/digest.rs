use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::Path;

/// Hex SHA-256 of a file's bytes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentDigest(String);

impl ContentDigest {
    pub fn of_bytes(bytes: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(bytes);
        Self(format!("{:x}", hasher.finalize()))
    }

    /// Digest of this digest plus a settings tag, so entries computed under
    /// different extraction settings never satisfy each other.
    pub fn scoped(&self, tag: &str) -> Self {
        Self::of_bytes(format!("{}:{}", tag, self.0).as_bytes())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// A file's bytes together with their digest, read in one pass.
#[derive(Debug, Clone)]
pub struct SourceSnapshot {
    pub digest: ContentDigest,
    pub bytes: Vec<u8>,
}

impl SourceSnapshot {
    pub fn read(path: &Path) -> std::io::Result<Self> {
        let bytes = std::fs::read(path)?;
        Ok(Self {
            digest: ContentDigest::of_bytes(&bytes),
            bytes,
        })
    }

    pub fn text(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_digest_tracks_content() {
        let a = ContentDigest::of_bytes(b"class A; end");
        let b = ContentDigest::of_bytes(b"class A; end");
        let c = ContentDigest::of_bytes(b"class B; end");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.as_str().len(), 64);
    }

    #[test]
    fn test_snapshot_reads_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let file = dir.path().join("a.rb");
        std::fs::write(&file, "module A; end").unwrap();

        let snapshot = SourceSnapshot::read(&file).unwrap();
        assert_eq!(snapshot.text(), "module A; end");
        assert_eq!(snapshot.digest, ContentDigest::of_bytes(b"module A; end"));
    }
}
