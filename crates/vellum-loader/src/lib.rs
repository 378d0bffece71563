//! # vellum-loader
//!
//! The async loading pipeline for `.lvd` containers:
//!
//! - [`DocumentLoader`] — extension gate, bounded read, extraction
//!   through a [`PackageExtractor`], integrity and manifest validation,
//!   signature verification, all under one deadline. Strict mode turns
//!   failures into [`LoadError`]s; lenient mode surfaces them as
//!   warnings on the [`LoadOutcome`].
//! - [`DocumentCache`] — loaded documents by filename, with expiry and
//!   least-recently-used eviction.
//! - [`ResourceManager`] — per-resource access with path routing, size
//!   re-verification against the manifest, and its own cache.

pub mod cache;
pub mod error;
pub mod loader;
pub mod resources;

pub use cache::{CacheStats, CachedDocument, DocumentCache};
pub use error::{LoadError, LoadErrorKind};
pub use loader::{
    DocumentLoader, LoadOutcome, LoaderConfig, PackageExtractor, DOCUMENT_EXTENSION,
};
pub use resources::{LoadedResource, ResourceCache, ResourceCacheConfig, ResourceManager};
