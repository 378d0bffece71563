//! # vellum-trust
//!
//! Signing, verification, and trust decisions for Vellum containers.
//!
//! Three layers, each building on the previous:
//!
//! - [`SignatureEngine`] — RSA PKCS#1 v1.5 over SHA-256; signs and
//!   verifies the manifest (canonical field subset), the content
//!   (concatenated strings), and each module's raw bytes independently.
//!   Cryptographic mismatch is a normal negative result; malformed
//!   encodings raise [`TrustError`].
//! - [`TrustChain`] — flat multi-signer trust: first trusted key that
//!   validates wins.
//! - [`TrustStore`] + [`EnhancedSigner`] — certificate pools with
//!   revocation and chain validation; module admission requires
//!   signature, certificate, and binary sanity together, with every
//!   attempt audited.
//!
//! Key material is PKCS#8/SPKI PEM on disk; signature bundles persist as
//! JSON through [`SignatureStorage`]; installation-wide requirements are
//! expressed as a [`SignaturePolicy`].

pub mod chain;
pub mod engine;
pub mod enhanced;
pub mod error;
pub mod policy;
pub mod storage;
pub mod store;

pub use chain::TrustChain;
pub use engine::{SignatureEngine, VerificationReport, MIN_KEY_BITS};
pub use enhanced::{
    AuditSink, EnhancedSigner, EnhancedVerification, ModuleAdmission, SignatureAuditEvent,
};
pub use error::TrustError;
pub use policy::{SignatureInfo, SignaturePolicy};
pub use storage::SignatureStorage;
pub use store::{Certificate, TrustStore};
