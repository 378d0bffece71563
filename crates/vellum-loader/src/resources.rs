//! Per-resource access on top of a loaded document, with its own cache.

use std::collections::HashMap;
use std::sync::RwLock;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::debug;
use vellum_core::{
    Document, ValidationReport, INTERACTIVE_SPEC_PATH, PRIMARY_CONTENT_PATH, STATIC_FALLBACK_PATH,
    STYLESHEET_PATH,
};
use vellum_integrity::{mime_type_for_path, resource_bytes};

use crate::error::LoadError;

const DEFAULT_RESOURCE_CACHE_CAPACITY: usize = 200;
const DEFAULT_RESOURCE_CACHE_EXPIRY: Duration = Duration::from_secs(60 * 60);
const DEFAULT_MAX_RESOURCE_SIZE: u64 = 50 * 1024 * 1024;

/// One resolved resource: its bytes plus what the manifest says about it.
#[derive(Debug, Clone)]
pub struct LoadedResource {
    pub path: String,
    pub data: Vec<u8>,
    pub mime_type: String,
    pub size: u64,
}

#[derive(Debug, Clone)]
struct CachedResource {
    resource: LoadedResource,
    loaded_at: DateTime<Utc>,
    accessed_at: DateTime<Utc>,
    access_count: u64,
}

#[derive(Debug, Clone)]
pub struct ResourceCacheConfig {
    pub capacity: usize,
    pub expiry: Duration,
    pub max_resource_size: u64,
}

impl Default for ResourceCacheConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_RESOURCE_CACHE_CAPACITY,
            expiry: DEFAULT_RESOURCE_CACHE_EXPIRY,
            max_resource_size: DEFAULT_MAX_RESOURCE_SIZE,
        }
    }
}

/// Resource cache keyed by `document_id:path`, same expiry and LRU rules
/// as the document cache.
#[derive(Debug)]
pub struct ResourceCache {
    entries: RwLock<HashMap<String, CachedResource>>,
    config: ResourceCacheConfig,
}

impl ResourceCache {
    pub fn new(config: ResourceCacheConfig) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            config,
        }
    }

    fn get(&self, key: &str) -> Option<LoadedResource> {
        let expired = {
            let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
            let entry = entries.get(key)?;
            let age = Utc::now().signed_duration_since(entry.loaded_at);
            age.to_std()
                .map(|age| age > self.config.expiry)
                .unwrap_or(false)
        };

        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        if expired {
            entries.remove(key);
            return None;
        }
        let entry = entries.get_mut(key)?;
        entry.accessed_at = Utc::now();
        entry.access_count += 1;
        Some(entry.resource.clone())
    }

    fn insert(&self, key: &str, resource: LoadedResource) {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        if !entries.contains_key(key) && entries.len() >= self.config.capacity {
            let oldest = entries
                .iter()
                .min_by_key(|(_, entry)| entry.accessed_at)
                .map(|(k, _)| k.clone());
            if let Some(oldest) = oldest {
                entries.remove(&oldest);
            }
        }
        let now = Utc::now();
        entries.insert(
            key.to_string(),
            CachedResource {
                resource,
                loaded_at: now,
                accessed_at: now,
                access_count: 0,
            },
        );
    }

    pub fn access_count(&self, key: &str) -> u64 {
        self.entries
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(key)
            .map(|e| e.access_count)
            .unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.entries
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
    }
}

/// Resolves declared resources out of a document: path routing, size
/// re-verification against the manifest, MIME determination, and caching.
pub struct ResourceManager {
    cache: ResourceCache,
}

impl Default for ResourceManager {
    fn default() -> Self {
        Self::new(ResourceCacheConfig::default())
    }
}

impl ResourceManager {
    pub fn new(config: ResourceCacheConfig) -> Self {
        Self {
            cache: ResourceCache::new(config),
        }
    }

    pub fn cache(&self) -> &ResourceCache {
        &self.cache
    }

    /// Loads one declared resource. The path must be declared in the
    /// manifest, resolvable in the payload, within the size limit, and
    /// the payload size must match the declaration.
    pub fn get_resource(
        &self,
        document_id: &str,
        document: &Document,
        path: &str,
    ) -> Result<LoadedResource, LoadError> {
        let key = format!("{document_id}:{path}");
        if let Some(cached) = self.cache.get(&key) {
            debug!(key, "resource served from cache");
            return Ok(cached);
        }

        let declared = document
            .resource(path)
            .ok_or_else(|| LoadError::invalid_file(format!("'{path}' is not declared")))?;
        let data = resource_bytes(document, path)
            .ok_or_else(|| LoadError::corrupted(format!("'{path}' has no payload")))?;

        if data.len() as u64 > self.cache.config.max_resource_size {
            return Err(LoadError::resource_limit(format!(
                "'{}' exceeds the {} byte resource limit",
                path, self.cache.config.max_resource_size
            )));
        }
        if declared.size >= 0 && data.len() as i64 != declared.size {
            return Err(LoadError::corrupted(format!(
                "'{}' is {} bytes but the manifest declares {}",
                path,
                data.len(),
                declared.size
            )));
        }

        let mime_type = if declared.mime_type.is_empty() {
            mime_type_for_path(path).to_string()
        } else {
            declared.mime_type.clone()
        };
        let resource = LoadedResource {
            path: path.to_string(),
            size: data.len() as u64,
            data,
            mime_type,
        };
        self.cache.insert(&key, resource.clone());
        Ok(resource)
    }

    /// Warms the cache with the render-critical resources that are
    /// declared, ignoring ones the document does not carry.
    pub fn preload(&self, document_id: &str, document: &Document) -> usize {
        let critical = [
            PRIMARY_CONTENT_PATH,
            STYLESHEET_PATH,
            INTERACTIVE_SPEC_PATH,
            STATIC_FALLBACK_PATH,
        ];
        let mut loaded = 0;
        for path in critical {
            if document.resource(path).is_some()
                && self.get_resource(document_id, document, path).is_ok()
            {
                loaded += 1;
            }
        }
        loaded
    }

    /// Checks every declared resource without caching: present,
    /// size-consistent, and under the limit.
    pub fn validate_all(&self, document: &Document) -> ValidationReport {
        let mut report = ValidationReport::new();
        for (path, declared) in &document.manifest.resources {
            match resource_bytes(document, path) {
                None => report.add_error(format!("resource '{path}' has no payload")),
                Some(data) => {
                    if declared.size >= 0 && data.len() as i64 != declared.size {
                        report.add_error(format!(
                            "resource '{}' size {} does not match declared {}",
                            path,
                            data.len(),
                            declared.size
                        ));
                    }
                    if data.len() as u64 > self.cache.config.max_resource_size {
                        report.add_warning(format!(
                            "resource '{path}' exceeds the configured size limit"
                        ));
                    }
                }
            }
        }
        report
    }
}
