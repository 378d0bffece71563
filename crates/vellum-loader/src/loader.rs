//! The async document loading pipeline.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use rsa::RsaPublicKey;
use sha2::{Digest, Sha256};
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::{debug, info, warn};
use vellum_core::{Document, SecuritySummary};
use vellum_integrity::{IntegrityReport, IntegrityValidator};
use vellum_manifest::ManifestValidator;
use vellum_trust::SignatureEngine;

use crate::cache::DocumentCache;
use crate::error::LoadError;

/// The container file extension this loader accepts.
pub const DOCUMENT_EXTENSION: &str = ".lvd";

const READ_CHUNK_SIZE: usize = 64 * 1024;

/// Boundary to the packaging layer: turns raw container bytes into an
/// extracted [`Document`].
#[async_trait]
pub trait PackageExtractor: Send + Sync {
    async fn extract(&self, data: &[u8]) -> Result<Document, LoadError>;
}

#[derive(Debug, Clone)]
pub struct LoaderConfig {
    pub enable_caching: bool,
    pub cache_capacity: usize,
    pub cache_expiry: Duration,
    pub max_file_size: u64,
    pub verify_signatures: bool,
    /// Strict mode turns validation and verification failures into hard
    /// [`Security`](crate::LoadErrorKind::Security) errors. Non-strict
    /// mode downgrades them to warnings on the outcome.
    pub strict_validation: bool,
    pub load_timeout: Duration,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            enable_caching: true,
            cache_capacity: 50,
            cache_expiry: Duration::from_secs(30 * 60),
            max_file_size: 100 * 1024 * 1024,
            verify_signatures: true,
            strict_validation: true,
            load_timeout: Duration::from_secs(30),
        }
    }
}

/// A successfully loaded document plus how the load went.
#[derive(Debug, Clone)]
pub struct LoadOutcome {
    pub document: Document,
    pub load_time: Duration,
    pub from_cache: bool,
    pub warnings: Vec<String>,
    pub security: SecuritySummary,
}

/// Loads `.lvd` containers: bounded read, extraction, integrity and
/// manifest validation, signature verification, and caching, the whole
/// pipeline under one deadline.
pub struct DocumentLoader {
    config: LoaderConfig,
    extractor: Arc<dyn PackageExtractor>,
    cache: DocumentCache,
    manifest_validator: ManifestValidator,
    integrity_validator: IntegrityValidator,
    engine: SignatureEngine,
    trusted_key: Option<RsaPublicKey>,
}

impl DocumentLoader {
    pub fn new(extractor: Arc<dyn PackageExtractor>, config: LoaderConfig) -> Self {
        let cache = DocumentCache::new(config.cache_capacity, config.cache_expiry);
        Self {
            config,
            extractor,
            cache,
            manifest_validator: ManifestValidator::new(),
            integrity_validator: IntegrityValidator::new(),
            engine: SignatureEngine::new(),
            trusted_key: None,
        }
    }

    /// Installs the public key signatures are verified against. Without
    /// one, signature verification is skipped (with a warning, or a hard
    /// error in strict mode when verification is required).
    pub fn with_trusted_key(mut self, key: RsaPublicKey) -> Self {
        self.trusted_key = Some(key);
        self
    }

    pub fn cache(&self) -> &DocumentCache {
        &self.cache
    }

    pub async fn load<R>(&self, reader: R, filename: &str) -> Result<LoadOutcome, LoadError>
    where
        R: AsyncRead + Unpin + Send,
    {
        let started = Instant::now();

        if !filename.ends_with(DOCUMENT_EXTENSION) {
            return Err(LoadError::invalid_file(format!(
                "'{filename}' does not have the {DOCUMENT_EXTENSION} extension"
            )));
        }

        if self.config.enable_caching {
            if let Some(cached) = self.cache.get(filename) {
                debug!(filename, "document served from cache");
                // The posture computed at load time, not a synthetic one.
                return Ok(LoadOutcome {
                    document: cached.document,
                    load_time: started.elapsed(),
                    from_cache: true,
                    warnings: cached.security.warnings.clone(),
                    security: cached.security,
                });
            }
        }

        let mut outcome = tokio::time::timeout(
            self.config.load_timeout,
            self.load_uncached(reader, filename),
        )
        .await
        .map_err(|_| {
            LoadError::timeout(format!(
                "loading '{}' exceeded {:?}",
                filename, self.config.load_timeout
            ))
        })??;

        outcome.load_time = started.elapsed();
        info!(
            filename,
            load_ms = outcome.load_time.as_millis() as u64,
            warnings = outcome.warnings.len(),
            "document loaded"
        );
        Ok(outcome)
    }

    async fn load_uncached<R>(&self, reader: R, filename: &str) -> Result<LoadOutcome, LoadError>
    where
        R: AsyncRead + Unpin + Send,
    {
        let data = self.read_limited(reader).await?;
        let document = self.extractor.extract(&data).await?;

        let mut warnings = Vec::new();
        let mut security = SecuritySummary::default();

        let integrity = self.integrity_validator.validate_document(&document);
        if integrity.valid {
            security.integrity_checked = true;
        } else if self.config.strict_validation {
            return Err(LoadError::security(format!(
                "integrity check failed: {}",
                integrity_failures(&integrity).join("; ")
            )));
        } else {
            warnings.extend(integrity_failures(&integrity));
        }
        for path in &integrity.orphaned_files {
            warnings.push(format!("undeclared payload '{path}'"));
        }

        let manifest_report = self.manifest_validator.validate(&document.manifest);
        if manifest_report.is_valid {
            security.validation_passed = true;
        } else if self.config.strict_validation {
            return Err(LoadError::security(format!(
                "manifest validation failed: {}",
                manifest_report.errors.join("; ")
            )));
        } else {
            warnings.extend(manifest_report.errors);
        }
        warnings.extend(manifest_report.warnings);

        if self.config.verify_signatures {
            match &self.trusted_key {
                Some(key) => {
                    let verification = self.engine.verify_document(&document, key);
                    if verification.valid {
                        security.signatures_verified = true;
                    } else if self.config.strict_validation {
                        return Err(LoadError::security(format!(
                            "signature verification failed: {}",
                            verification.errors.join("; ")
                        )));
                    } else {
                        warnings.extend(verification.errors);
                    }
                }
                None if self.config.strict_validation => {
                    return Err(LoadError::security(
                        "signature verification required but no trusted key is configured",
                    ));
                }
                None => {
                    warn!(filename, "no trusted key configured, skipping verification");
                    warnings.push("signatures not verified: no trusted key".to_string());
                }
            }
        }

        security.warnings = warnings.clone();

        if self.config.enable_caching {
            let hash = hex::encode(Sha256::digest(&data));
            self.cache.insert(
                filename,
                document.clone(),
                security.clone(),
                data.len() as u64,
                &hash,
            );
        }

        Ok(LoadOutcome {
            document,
            load_time: Duration::ZERO,
            from_cache: false,
            warnings,
            security,
        })
    }

    /// Reads the container, refusing mid-stream once the size limit is
    /// crossed rather than buffering the rest.
    async fn read_limited<R>(&self, mut reader: R) -> Result<Vec<u8>, LoadError>
    where
        R: AsyncRead + Unpin + Send,
    {
        let mut data = Vec::new();
        let mut chunk = vec![0u8; READ_CHUNK_SIZE];
        loop {
            let n = reader.read(&mut chunk).await?;
            if n == 0 {
                break;
            }
            if (data.len() + n) as u64 > self.config.max_file_size {
                return Err(LoadError::resource_limit(format!(
                    "container exceeds the {} byte limit",
                    self.config.max_file_size
                )));
            }
            data.extend_from_slice(&chunk[..n]);
        }
        Ok(data)
    }
}

fn integrity_failures(report: &IntegrityReport) -> Vec<String> {
    let mut failures = Vec::new();
    for path in &report.hash_mismatches {
        failures.push(format!("hash mismatch for '{path}'"));
    }
    for path in &report.size_mismatches {
        failures.push(format!("size mismatch for '{path}'"));
    }
    for path in &report.missing_resources {
        failures.push(format!("missing resource '{path}'"));
    }
    for (name, check) in &report.wasm_checks {
        for error in &check.errors {
            failures.push(format!("module '{name}': {error}"));
        }
    }
    failures
}
