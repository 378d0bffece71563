//! # vellum-core
//!
//! Shared data model for the Vellum document container.
//!
//! A Vellum container bundles HTML/CSS content, binary assets, and optional
//! WebAssembly modules together with a [`Manifest`] describing permissions,
//! resource integrity hashes, and a [`SignatureBundle`] of cryptographic
//! signatures. This crate holds the types every other layer shares; the
//! behavior (hashing, validation, signing, policy evaluation, loading) lives
//! in the sibling crates.

pub mod document;
pub mod manifest;
pub mod policy;
pub mod report;

pub use document::{AssetBundle, Document, DocumentContent, SignatureBundle};
pub use manifest::{
    DocumentMetadata, FeatureFlags, Manifest, Resource, WasmConfiguration, WasmModule,
    PRIMARY_CONTENT_PATH, STYLESHEET_PATH, INTERACTIVE_SPEC_PATH, STATIC_FALLBACK_PATH,
};
pub use policy::{
    DomAccess, ExecutionMode, JsPermissions, NetworkPolicy, SecurityPolicy, StoragePolicy,
    WasmPermissions,
};
pub use report::{SecuritySummary, ValidationReport};
