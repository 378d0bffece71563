//! # vellum-manifest
//!
//! Structural and semantic validation of container manifests.
//!
//! Validation runs in two passes. The structural pass checks that required
//! fields are present and well-formed; any structural failure is fatal.
//! The semantic pass enforces cross-field invariants: metadata date
//! ordering, security policy consistency, per-module sanity, circular
//! import detection, resource table shape, and feature-flag coherence.
//! Semantic findings split into hard errors (inadmissible) and advisory
//! warnings; only hard errors block a load.

pub mod error;
pub mod rules;
pub mod validator;

pub use error::ManifestError;
pub use validator::ManifestValidator;
