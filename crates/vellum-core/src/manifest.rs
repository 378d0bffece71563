//! Manifest wire contract: metadata, resource table, module configuration,
//! and feature flags.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::policy::{SecurityPolicy, WasmPermissions};

/// The primary content entry every container must declare.
pub const PRIMARY_CONTENT_PATH: &str = "content/index.html";
/// Well-known path of the main stylesheet.
pub const STYLESHEET_PATH: &str = "content/styles/main.css";
/// Well-known path of the interactive module wiring.
pub const INTERACTIVE_SPEC_PATH: &str = "content/scripts/interactive.js";
/// Well-known path of the static fallback rendering.
pub const STATIC_FALLBACK_PATH: &str = "content/static/fallback.html";

/// Declarative description of a container: metadata, security policy,
/// resource integrity table, optional module configuration, and feature
/// flags. Immutable once packaged; re-validated on every load.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manifest {
    pub version: String,
    pub metadata: DocumentMetadata,
    pub security: SecurityPolicy,
    #[serde(default)]
    pub resources: HashMap<String, Resource>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wasm_config: Option<WasmConfiguration>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub features: Option<FeatureFlags>,
}

/// Schema version this implementation fully supports.
pub const MANIFEST_VERSION: &str = "1.0";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentMetadata {
    pub title: String,
    pub author: String,
    pub created: DateTime<Utc>,
    pub modified: DateTime<Utc>,
    #[serde(default)]
    pub description: String,
    pub version: String,
    pub language: String,
}

/// One addressable payload inside the container. The map key in
/// [`Manifest::resources`] must equal `path`, and `hash` must match the
/// SHA-256 of the payload bytes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Resource {
    pub hash: String,
    pub size: i64,
    #[serde(rename = "type")]
    pub mime_type: String,
    pub path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WasmConfiguration {
    #[serde(default)]
    pub modules: HashMap<String, WasmModule>,
    pub permissions: WasmPermissions,
    #[serde(default)]
    pub memory_limit: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WasmModule {
    pub name: String,
    pub version: String,
    pub entry_point: String,
    #[serde(default)]
    pub exports: Vec<String>,
    #[serde(default)]
    pub imports: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permissions: Option<WasmPermissions>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct FeatureFlags {
    #[serde(default)]
    pub animations: bool,
    #[serde(default)]
    pub interactivity: bool,
    #[serde(default)]
    pub charts: bool,
    #[serde(default)]
    pub forms: bool,
    #[serde(default)]
    pub audio: bool,
    #[serde(default)]
    pub video: bool,
    #[serde(default)]
    pub webgl: bool,
    #[serde(default)]
    pub webassembly: bool,
}

impl Manifest {
    /// Minimal valid manifest: current schema version, restrictive security
    /// policy, empty resource table.
    pub fn new(metadata: DocumentMetadata) -> Self {
        Self {
            version: MANIFEST_VERSION.to_string(),
            metadata,
            security: SecurityPolicy::restrictive(),
            resources: HashMap::new(),
            wasm_config: None,
            features: None,
        }
    }

    /// Whether the manifest declares any WebAssembly modules.
    pub fn has_wasm_modules(&self) -> bool {
        self.wasm_config
            .as_ref()
            .map(|c| !c.modules.is_empty())
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn manifest_json_uses_wire_field_names() {
        let manifest = Manifest::new(DocumentMetadata {
            title: "t".into(),
            author: "a".into(),
            created: Utc::now(),
            modified: Utc::now(),
            description: String::new(),
            version: "0.1.0".into(),
            language: "en".into(),
        });
        let json = serde_json::to_value(&manifest).unwrap();
        assert_eq!(json["version"], "1.0");
        assert!(json.get("metadata").is_some());
        assert!(json.get("security").is_some());
        // Optional sections are omitted entirely when absent.
        assert!(json.get("wasm_config").is_none());
    }

    #[test]
    fn resource_type_field_serializes_as_type() {
        let resource = Resource {
            hash: "0".repeat(64),
            size: 10,
            mime_type: "text/html".into(),
            path: PRIMARY_CONTENT_PATH.into(),
        };
        let json = serde_json::to_value(&resource).unwrap();
        assert_eq!(json["type"], "text/html");
    }
}
