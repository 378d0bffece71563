//! # vellum-integrity
//!
//! Content-addressed hashing and integrity verification for container
//! resources.
//!
//! - [`ResourceHasher`] — SHA-256 over bytes, files (memoized), and
//!   directory trees; case-insensitive digest comparison.
//! - [`BatchHasher`] — bounded worker pool hashing many independent files.
//! - [`IntegrityValidator`] — checks a document's actual payloads against
//!   its manifest resource table and produces an [`IntegrityReport`]
//!   (mismatches are errors, orphans are warnings).

pub mod batch;
pub mod error;
pub mod hasher;
pub mod validator;

pub use batch::BatchHasher;
pub use error::IntegrityError;
pub use hasher::ResourceHasher;
pub use validator::{
    mime_type_for_path, resource_bytes, IntegrityReport, IntegrityValidator, WasmCheck,
};
