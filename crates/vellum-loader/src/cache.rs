//! Loaded-document cache with expiry and least-recently-used eviction.

use std::collections::HashMap;
use std::sync::RwLock;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::debug;
use vellum_core::{Document, SecuritySummary};

/// A cached document plus the bookkeeping the eviction policy needs.
/// The security posture computed at load time travels with the entry so
/// a cache hit reports the same findings as the original load.
#[derive(Debug, Clone)]
pub struct CachedDocument {
    pub document: Document,
    pub security: SecuritySummary,
    pub loaded_at: DateTime<Utc>,
    pub accessed_at: DateTime<Utc>,
    pub size: u64,
    /// Hex SHA-256 of the container bytes the document came from.
    pub hash: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub entries: usize,
    pub total_size: u64,
    pub capacity: usize,
}

/// Keyed by filename. Expiry is detected on read; the expired entry is
/// removed outside the read path. Inserting past capacity evicts the
/// least recently accessed entry.
#[derive(Debug)]
pub struct DocumentCache {
    entries: RwLock<HashMap<String, CachedDocument>>,
    capacity: usize,
    expiry: Duration,
}

impl DocumentCache {
    pub fn new(capacity: usize, expiry: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            capacity,
            expiry,
        }
    }

    fn is_expired(&self, entry: &CachedDocument) -> bool {
        let age = Utc::now().signed_duration_since(entry.loaded_at);
        age.to_std().map(|age| age > self.expiry).unwrap_or(false)
    }

    pub fn get(&self, key: &str) -> Option<CachedDocument> {
        let expired = {
            let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
            match entries.get(key) {
                None => return None,
                Some(entry) => self.is_expired(entry),
            }
        };

        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        if expired {
            debug!(key, "evicting expired cache entry");
            entries.remove(key);
            return None;
        }
        let entry = entries.get_mut(key)?;
        entry.accessed_at = Utc::now();
        Some(entry.clone())
    }

    pub fn insert(
        &self,
        key: &str,
        document: Document,
        security: SecuritySummary,
        size: u64,
        hash: &str,
    ) {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        if !entries.contains_key(key) && entries.len() >= self.capacity {
            let oldest = entries
                .iter()
                .min_by_key(|(_, entry)| entry.accessed_at)
                .map(|(k, _)| k.clone());
            if let Some(oldest) = oldest {
                debug!(key = %oldest, "evicting least recently used cache entry");
                entries.remove(&oldest);
            }
        }
        let now = Utc::now();
        entries.insert(
            key.to_string(),
            CachedDocument {
                document,
                security,
                loaded_at: now,
                accessed_at: now,
                size,
                hash: hash.to_string(),
            },
        );
    }

    pub fn remove(&self, key: &str) -> bool {
        self.entries
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(key)
            .is_some()
    }

    pub fn clear(&self) {
        self.entries
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
    }

    pub fn stats(&self) -> CacheStats {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        CacheStats {
            entries: entries.len(),
            total_size: entries.values().map(|e| e.size).sum(),
            capacity: self.capacity,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vellum_core::{DocumentContent, DocumentMetadata};

    fn document(title: &str) -> Document {
        Document::new(
            DocumentMetadata {
                title: title.into(),
                author: "tests".into(),
                created: Utc::now(),
                modified: Utc::now(),
                description: String::new(),
                version: "1.0.0".into(),
                language: "en".into(),
            },
            DocumentContent {
                html: "<html></html>".into(),
                ..Default::default()
            },
        )
    }

    #[test]
    fn get_updates_access_time() {
        let cache = DocumentCache::new(4, Duration::from_secs(60));
        cache.insert("a.lvd", document("a"), SecuritySummary::default(), 10, "aa");
        let first = cache.get("a.lvd").unwrap();
        std::thread::sleep(std::time::Duration::from_millis(5));
        let second = cache.get("a.lvd").unwrap();
        assert!(second.accessed_at > first.accessed_at);
    }

    #[test]
    fn expired_entries_are_removed_on_read() {
        let cache = DocumentCache::new(4, Duration::from_millis(1));
        cache.insert("a.lvd", document("a"), SecuritySummary::default(), 10, "aa");
        std::thread::sleep(std::time::Duration::from_millis(10));
        assert!(cache.get("a.lvd").is_none());
        assert_eq!(cache.stats().entries, 0);
    }

    #[test]
    fn over_capacity_insert_evicts_least_recently_accessed() {
        let cache = DocumentCache::new(2, Duration::from_secs(60));
        cache.insert("a.lvd", document("a"), SecuritySummary::default(), 1, "aa");
        std::thread::sleep(std::time::Duration::from_millis(5));
        cache.insert("b.lvd", document("b"), SecuritySummary::default(), 1, "bb");
        std::thread::sleep(std::time::Duration::from_millis(5));

        // Touch "a" so "b" becomes the LRU entry.
        cache.get("a.lvd").unwrap();
        std::thread::sleep(std::time::Duration::from_millis(5));

        cache.insert("c.lvd", document("c"), SecuritySummary::default(), 1, "cc");
        assert!(cache.get("a.lvd").is_some());
        assert!(cache.get("b.lvd").is_none());
        assert!(cache.get("c.lvd").is_some());
    }

    #[test]
    fn reinserting_existing_key_does_not_evict() {
        let cache = DocumentCache::new(2, Duration::from_secs(60));
        cache.insert("a.lvd", document("a"), SecuritySummary::default(), 1, "aa");
        cache.insert("b.lvd", document("b"), SecuritySummary::default(), 1, "bb");
        cache.insert("a.lvd", document("a2"), SecuritySummary::default(), 2, "aa2");
        assert_eq!(cache.stats().entries, 2);
        assert!(cache.get("b.lvd").is_some());
    }

    #[test]
    fn stats_and_clear() {
        let cache = DocumentCache::new(4, Duration::from_secs(60));
        cache.insert("a.lvd", document("a"), SecuritySummary::default(), 10, "aa");
        cache.insert("b.lvd", document("b"), SecuritySummary::default(), 20, "bb");
        let stats = cache.stats();
        assert_eq!(stats.entries, 2);
        assert_eq!(stats.total_size, 30);
        cache.clear();
        assert_eq!(cache.stats().entries, 0);
    }
}
