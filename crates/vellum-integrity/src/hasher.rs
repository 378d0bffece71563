//! SHA-256 hashing with a memoizing per-path cache.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;
use std::sync::RwLock;

use sha2::{Digest, Sha256};
use tracing::debug;
use walkdir::WalkDir;

use crate::error::IntegrityError;

/// Hashes resource payloads with SHA-256, hex-encoded lowercase.
///
/// File digests are memoized by path. Entries are never invalidated
/// automatically: container resources are immutable once packaged, so a
/// caller needing freshness clears the cache explicitly.
#[derive(Debug, Default)]
pub struct ResourceHasher {
    cache: RwLock<HashMap<String, String>>,
}

impl ResourceHasher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hashes a byte buffer.
    pub fn hash_data(&self, data: &[u8]) -> String {
        let digest = Sha256::digest(data);
        hex::encode(digest)
    }

    /// Hashes a file, memoized by path.
    pub fn hash_file(&self, path: impl AsRef<Path>) -> Result<String, IntegrityError> {
        let path = path.as_ref();
        let key = path.to_string_lossy().into_owned();

        if let Some(cached) = self.cache.read().unwrap_or_else(|e| e.into_inner()).get(&key) {
            return Ok(cached.clone());
        }

        let data = fs::read(path).map_err(|source| IntegrityError::FileRead {
            path: path.to_path_buf(),
            source,
        })?;
        let digest = self.hash_data(&data);
        debug!(path = %key, digest = %digest, "hashed file");

        self.cache
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(key, digest.clone());
        Ok(digest)
    }

    /// Hashes every file under `root`, returning forward-slash relative
    /// paths mapped to digests.
    pub fn hash_directory(
        &self,
        root: impl AsRef<Path>,
    ) -> Result<BTreeMap<String, String>, IntegrityError> {
        let root = root.as_ref();
        let mut digests = BTreeMap::new();

        for entry in WalkDir::new(root) {
            let entry = entry.map_err(|e| IntegrityError::DirectoryWalk {
                path: root.to_path_buf(),
                reason: e.to_string(),
            })?;
            if !entry.file_type().is_file() {
                continue;
            }
            let relative = entry
                .path()
                .strip_prefix(root)
                .map_err(|e| IntegrityError::DirectoryWalk {
                    path: root.to_path_buf(),
                    reason: e.to_string(),
                })?;
            let relative = relative
                .to_str()
                .ok_or_else(|| IntegrityError::NonUnicodePath(entry.path().to_path_buf()))?
                .replace('\\', "/");
            let digest = self.hash_file(entry.path())?;
            digests.insert(relative, digest);
        }

        Ok(digests)
    }

    /// Verifies a byte buffer against an expected hex digest,
    /// ASCII-case-insensitively.
    pub fn verify_data(&self, data: &[u8], expected: &str) -> bool {
        self.hash_data(data).eq_ignore_ascii_case(expected)
    }

    /// Drops all memoized file digests.
    pub fn clear_cache(&self) {
        self.cache.write().unwrap_or_else(|e| e.into_inner()).clear();
    }

    /// Number of memoized file digests.
    pub fn cache_size(&self) -> usize {
        self.cache.read().unwrap_or_else(|e| e.into_inner()).len()
    }
}
