//! In-memory representation of a fully extracted container.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::manifest::{DocumentMetadata, Manifest, Resource};
use crate::report::ValidationReport;

/// A complete, extracted document: manifest, rendered content, binary
/// assets, signatures, and raw WebAssembly module bytes keyed by module
/// name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub manifest: Manifest,
    pub content: DocumentContent,
    #[serde(default)]
    pub assets: AssetBundle,
    #[serde(default)]
    pub signatures: SignatureBundle,
    #[serde(default)]
    pub wasm_modules: HashMap<String, Vec<u8>>,
}

/// The renderable content of a document. `interactive_spec` carries the
/// module wiring consumed by the runtime; `static_fallback` is shown when
/// interactive execution is unavailable or denied.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DocumentContent {
    #[serde(default)]
    pub html: String,
    #[serde(default)]
    pub css: String,
    #[serde(default)]
    pub interactive_spec: String,
    #[serde(default)]
    pub static_fallback: String,
}

/// Binary assets, keyed by file name within their category directory.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AssetBundle {
    #[serde(default)]
    pub images: HashMap<String, Vec<u8>>,
    #[serde(default)]
    pub fonts: HashMap<String, Vec<u8>>,
    #[serde(default)]
    pub data: HashMap<String, Vec<u8>>,
}

/// Signatures over the three independently signed granularities:
/// manifest, content, and each WebAssembly module's raw bytes.
/// All values are base64-encoded.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SignatureBundle {
    #[serde(default)]
    pub content_signature: String,
    #[serde(default)]
    pub manifest_signature: String,
    #[serde(default)]
    pub wasm_signatures: HashMap<String, String>,
}

impl Document {
    /// Creates a document with a minimal valid manifest around the given
    /// metadata and content.
    pub fn new(metadata: DocumentMetadata, content: DocumentContent) -> Self {
        Self {
            manifest: Manifest::new(metadata),
            content,
            assets: AssetBundle::default(),
            signatures: SignatureBundle::default(),
            wasm_modules: HashMap::new(),
        }
    }

    pub fn metadata(&self) -> &DocumentMetadata {
        &self.manifest.metadata
    }

    /// Looks up a manifest resource entry by path.
    pub fn resource(&self, path: &str) -> Option<&Resource> {
        self.manifest.resources.get(path)
    }

    /// Total byte size of content strings, assets, and module binaries.
    pub fn total_size(&self) -> u64 {
        let content = self.content.html.len()
            + self.content.css.len()
            + self.content.interactive_spec.len()
            + self.content.static_fallback.len();
        let assets: usize = self
            .assets
            .images
            .values()
            .chain(self.assets.fonts.values())
            .chain(self.assets.data.values())
            .map(Vec::len)
            .sum();
        let modules: usize = self.wasm_modules.values().map(Vec::len).sum();
        (content + assets + modules) as u64
    }

    /// Structural sanity check: the pieces every document must carry,
    /// independent of the deeper manifest validation.
    pub fn validate(&self) -> ValidationReport {
        let mut report = ValidationReport::new();
        if self.manifest.version.is_empty() {
            report.add_error("manifest version is required");
        }
        if self.manifest.metadata.title.is_empty() {
            report.add_error("document title is required");
        }
        if self.manifest.metadata.author.is_empty() {
            report.add_error("document author is required");
        }
        if self.content.html.is_empty() && self.content.static_fallback.is_empty() {
            report.add_error("document has neither html content nor a static fallback");
        }
        report
    }
}

impl SignatureBundle {
    pub fn is_empty(&self) -> bool {
        self.content_signature.is_empty()
            && self.manifest_signature.is_empty()
            && self.wasm_signatures.is_empty()
    }
}
