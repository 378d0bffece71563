//! Document-level integrity validation against the manifest resource
//! table.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::warn;
use vellum_core::{
    Document, INTERACTIVE_SPEC_PATH, PRIMARY_CONTENT_PATH, STATIC_FALLBACK_PATH, STYLESHEET_PATH,
};

use crate::hasher::ResourceHasher;

const WASM_MAGIC: [u8; 4] = [0x00, 0x61, 0x73, 0x6d];
const WASM_SUPPORTED_VERSION: u32 = 1;
const MAX_WASM_MODULE_SIZE: usize = 10 * 1024 * 1024;

/// Outcome of checking a document's payloads against its manifest.
///
/// Hash mismatches, size mismatches, and missing resources are hard
/// failures; orphaned payloads (present but undeclared) are warnings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntegrityReport {
    pub valid: bool,
    pub total_resources: usize,
    pub validated_resources: usize,
    pub hash_mismatches: Vec<String>,
    pub size_mismatches: Vec<String>,
    pub missing_resources: Vec<String>,
    pub orphaned_files: Vec<String>,
    pub wasm_checks: HashMap<String, WasmCheck>,
}

/// Sanity checks over one embedded WebAssembly module binary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WasmCheck {
    pub valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

#[derive(Debug, Default)]
pub struct IntegrityValidator {
    hasher: ResourceHasher,
}

impl IntegrityValidator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Verifies every declared resource's bytes and size, flags orphaned
    /// payloads, and sanity-checks embedded module binaries.
    pub fn validate_document(&self, document: &Document) -> IntegrityReport {
        let mut report = IntegrityReport {
            valid: true,
            total_resources: document.manifest.resources.len(),
            validated_resources: 0,
            hash_mismatches: Vec::new(),
            size_mismatches: Vec::new(),
            missing_resources: Vec::new(),
            orphaned_files: Vec::new(),
            wasm_checks: HashMap::new(),
        };

        for (path, resource) in &document.manifest.resources {
            let Some(bytes) = resource_bytes(document, path) else {
                report.missing_resources.push(path.clone());
                report.valid = false;
                continue;
            };

            if !self.hasher.verify_data(&bytes, &resource.hash) {
                report.hash_mismatches.push(path.clone());
                report.valid = false;
            }
            if resource.size >= 0 && bytes.len() as i64 != resource.size {
                report.size_mismatches.push(path.clone());
                report.valid = false;
            }
            report.validated_resources += 1;
        }

        for path in present_paths(document) {
            if !document.manifest.resources.contains_key(&path) {
                warn!(path = %path, "payload present but not declared in manifest");
                report.orphaned_files.push(path);
            }
        }

        for (name, bytes) in &document.wasm_modules {
            let mut check = self.check_wasm_module(bytes);
            let declared = document
                .manifest
                .wasm_config
                .as_ref()
                .and_then(|c| c.modules.get(name));
            match declared {
                Some(module) if module.name != *name => {
                    check.valid = false;
                    check.errors.push(format!(
                        "module key '{}' does not match declared name '{}'",
                        name, module.name
                    ));
                }
                None => {
                    check
                        .warnings
                        .push(format!("module '{name}' is not declared in the manifest"));
                }
                _ => {}
            }
            if !check.valid {
                report.valid = false;
            }
            report.wasm_checks.insert(name.clone(), check);
        }

        report
    }

    fn check_wasm_module(&self, bytes: &[u8]) -> WasmCheck {
        let mut check = WasmCheck {
            valid: true,
            errors: Vec::new(),
            warnings: Vec::new(),
        };

        if bytes.len() < 8 {
            check.valid = false;
            check.errors.push("module binary is truncated".to_string());
            return check;
        }
        if bytes[..4] != WASM_MAGIC {
            check.valid = false;
            check.errors.push("invalid module magic number".to_string());
        }
        let version = u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);
        if version != WASM_SUPPORTED_VERSION {
            check
                .warnings
                .push(format!("unsupported module version: {version}"));
        }
        if bytes.len() > MAX_WASM_MODULE_SIZE {
            check.warnings.push(format!(
                "module size {} exceeds recommended maximum {}",
                bytes.len(),
                MAX_WASM_MODULE_SIZE
            ));
        }

        check
    }
}

/// Resolves a manifest resource path to the document bytes it addresses.
pub fn resource_bytes(document: &Document, path: &str) -> Option<Vec<u8>> {
    match path {
        PRIMARY_CONTENT_PATH => Some(document.content.html.as_bytes().to_vec()),
        STYLESHEET_PATH => Some(document.content.css.as_bytes().to_vec()),
        INTERACTIVE_SPEC_PATH => Some(document.content.interactive_spec.as_bytes().to_vec()),
        STATIC_FALLBACK_PATH => Some(document.content.static_fallback.as_bytes().to_vec()),
        _ => {
            if let Some(name) = path.strip_prefix("assets/images/") {
                document.assets.images.get(name).cloned()
            } else if let Some(name) = path.strip_prefix("assets/fonts/") {
                document.assets.fonts.get(name).cloned()
            } else if let Some(name) = path.strip_prefix("assets/data/") {
                document.assets.data.get(name).cloned()
            } else if let Some(name) = path.strip_prefix("wasm/") {
                let name = name.strip_suffix(".wasm").unwrap_or(name);
                document.wasm_modules.get(name).cloned()
            } else {
                None
            }
        }
    }
}

/// All payload paths actually present in the document, in manifest
/// resource-table notation.
fn present_paths(document: &Document) -> Vec<String> {
    let mut paths = Vec::new();
    if !document.content.html.is_empty() {
        paths.push(PRIMARY_CONTENT_PATH.to_string());
    }
    if !document.content.css.is_empty() {
        paths.push(STYLESHEET_PATH.to_string());
    }
    if !document.content.interactive_spec.is_empty() {
        paths.push(INTERACTIVE_SPEC_PATH.to_string());
    }
    if !document.content.static_fallback.is_empty() {
        paths.push(STATIC_FALLBACK_PATH.to_string());
    }
    for name in document.assets.images.keys() {
        paths.push(format!("assets/images/{name}"));
    }
    for name in document.assets.fonts.keys() {
        paths.push(format!("assets/fonts/{name}"));
    }
    for name in document.assets.data.keys() {
        paths.push(format!("assets/data/{name}"));
    }
    paths
}

/// MIME type by file extension, used when a manifest entry omits one.
pub fn mime_type_for_path(path: &str) -> &'static str {
    let extension = path.rsplit('.').next().unwrap_or_default();
    let table: &[(&str, &str)] = &[
        ("html", "text/html"),
        ("css", "text/css"),
        ("js", "application/javascript"),
        ("json", "application/json"),
        ("png", "image/png"),
        ("jpg", "image/jpeg"),
        ("jpeg", "image/jpeg"),
        ("gif", "image/gif"),
        ("svg", "image/svg+xml"),
        ("woff", "font/woff"),
        ("woff2", "font/woff2"),
        ("ttf", "font/ttf"),
        ("wasm", "application/wasm"),
    ];
    table
        .iter()
        .find(|(ext, _)| extension.eq_ignore_ascii_case(ext))
        .map(|(_, mime)| *mime)
        .unwrap_or("application/octet-stream")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use vellum_core::{DocumentContent, DocumentMetadata, Resource};

    fn document_with_html(html: &str) -> Document {
        Document::new(
            DocumentMetadata {
                title: "t".into(),
                author: "a".into(),
                created: Utc::now(),
                modified: Utc::now(),
                description: String::new(),
                version: "1.0.0".into(),
                language: "en".into(),
            },
            DocumentContent {
                html: html.into(),
                ..Default::default()
            },
        )
    }

    fn declare(document: &mut Document, path: &str, bytes: &[u8]) {
        let hasher = ResourceHasher::new();
        document.manifest.resources.insert(
            path.to_string(),
            Resource {
                hash: hasher.hash_data(bytes),
                size: bytes.len() as i64,
                mime_type: mime_type_for_path(path).to_string(),
                path: path.to_string(),
            },
        );
    }

    #[test]
    fn matching_document_is_valid() {
        let mut doc = document_with_html("<html></html>");
        declare(&mut doc, PRIMARY_CONTENT_PATH, b"<html></html>");
        let report = IntegrityValidator::new().validate_document(&doc);
        assert!(report.valid);
        assert_eq!(report.validated_resources, 1);
    }

    #[test]
    fn hash_mismatch_is_fatal() {
        let mut doc = document_with_html("<html>tampered</html>");
        declare(&mut doc, PRIMARY_CONTENT_PATH, b"<html>original</html>");
        let report = IntegrityValidator::new().validate_document(&doc);
        assert!(!report.valid);
        assert_eq!(report.hash_mismatches, vec![PRIMARY_CONTENT_PATH.to_string()]);
    }

    #[test]
    fn missing_resource_is_fatal_orphan_is_warning() {
        let mut doc = document_with_html("<html></html>");
        declare(&mut doc, PRIMARY_CONTENT_PATH, b"<html></html>");
        // Declared but absent payload.
        declare(&mut doc, "assets/images/missing.png", b"pixels");
        // Present but undeclared payload.
        doc.assets.fonts.insert("body.woff2".into(), vec![1, 2, 3]);

        let report = IntegrityValidator::new().validate_document(&doc);
        assert!(!report.valid);
        assert_eq!(
            report.missing_resources,
            vec!["assets/images/missing.png".to_string()]
        );
        assert_eq!(report.orphaned_files, vec!["assets/fonts/body.woff2".to_string()]);
    }

    #[test]
    fn wasm_magic_and_version_are_checked() {
        let mut doc = document_with_html("<html></html>");
        declare(&mut doc, PRIMARY_CONTENT_PATH, b"<html></html>");
        doc.wasm_modules
            .insert("good".into(), vec![0x00, 0x61, 0x73, 0x6d, 1, 0, 0, 0]);
        doc.wasm_modules
            .insert("bad".into(), vec![0xde, 0xad, 0xbe, 0xef, 1, 0, 0, 0]);
        doc.wasm_modules
            .insert("odd_version".into(), vec![0x00, 0x61, 0x73, 0x6d, 2, 0, 0, 0]);

        let report = IntegrityValidator::new().validate_document(&doc);
        assert!(!report.valid);
        assert!(report.wasm_checks["good"].valid);
        assert!(!report.wasm_checks["bad"].valid);
        assert!(report.wasm_checks["odd_version"].valid);
        assert!(!report.wasm_checks["odd_version"].warnings.is_empty());
    }

    #[test]
    fn mime_lookup_falls_back_to_octet_stream() {
        assert_eq!(mime_type_for_path("a/b/c.css"), "text/css");
        assert_eq!(mime_type_for_path("module.wasm"), "application/wasm");
        assert_eq!(mime_type_for_path("blob.unknown"), "application/octet-stream");
    }
}
