//! The two-pass manifest validator.

use std::collections::{HashMap, HashSet};

use chrono::{Duration, Utc};
use tracing::debug;
use vellum_core::{
    ExecutionMode, Manifest, ValidationReport, WasmConfiguration, PRIMARY_CONTENT_PATH,
};

use crate::rules;

const MAX_TITLE_LEN: usize = 200;
const MAX_AUTHOR_LEN: usize = 100;
const MAX_DESCRIPTION_LEN: usize = 1000;
const HIGH_MEMORY_LIMIT: u64 = 256 * 1024 * 1024;
const HIGH_CPU_TIME_MS: u64 = 30_000;
const LARGE_RESOURCE_SIZE: i64 = 10 * 1024 * 1024;

/// Validates manifests: structure first, then semantics. The returned
/// [`ValidationReport`] carries hard errors (inadmissible) and advisory
/// warnings; validation never partially applies.
#[derive(Debug)]
pub struct ManifestValidator {
    /// How far in the future a `modified` timestamp may sit before it is
    /// flagged (clock skew allowance).
    max_clock_skew: Duration,
}

impl Default for ManifestValidator {
    fn default() -> Self {
        Self {
            max_clock_skew: Duration::hours(1),
        }
    }
}

impl ManifestValidator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses the wire-format JSON and validates the result. Parse
    /// failures are structural by definition and surface as an error.
    pub fn parse_and_validate(
        &self,
        json: &str,
    ) -> Result<(Manifest, ValidationReport), crate::ManifestError> {
        let manifest: Manifest = serde_json::from_str(json)?;
        let report = self.validate(&manifest);
        Ok((manifest, report))
    }

    pub fn validate(&self, manifest: &Manifest) -> ValidationReport {
        let mut report = ValidationReport::new();

        self.check_structure(manifest, &mut report);
        self.check_metadata(manifest, &mut report);
        self.check_security(manifest, &mut report);
        if let Some(config) = &manifest.wasm_config {
            self.check_wasm_config(manifest, config, &mut report);
        }
        self.check_resources(manifest, &mut report);
        self.check_features(manifest, &mut report);

        debug!(
            valid = report.is_valid,
            errors = report.errors.len(),
            warnings = report.warnings.len(),
            "manifest validated"
        );
        report
    }

    fn check_structure(&self, manifest: &Manifest, report: &mut ValidationReport) {
        if manifest.version.is_empty() {
            report.add_error("manifest version is required");
        } else if manifest.version != vellum_core::manifest::MANIFEST_VERSION {
            report.add_warning(format!(
                "manifest version '{}' is not fully supported",
                manifest.version
            ));
        }

        let metadata = &manifest.metadata;
        if metadata.title.is_empty() {
            report.add_error("metadata title is required");
        } else if metadata.title.chars().count() > MAX_TITLE_LEN {
            report.add_error(format!("metadata title exceeds {MAX_TITLE_LEN} characters"));
        }
        if metadata.author.is_empty() {
            report.add_error("metadata author is required");
        } else if metadata.author.chars().count() > MAX_AUTHOR_LEN {
            report.add_error(format!("metadata author exceeds {MAX_AUTHOR_LEN} characters"));
        }
        if metadata.description.chars().count() > MAX_DESCRIPTION_LEN {
            report.add_warning(format!(
                "metadata description exceeds {MAX_DESCRIPTION_LEN} characters"
            ));
        }
        if semver::Version::parse(&metadata.version).is_err() {
            report.add_error(format!(
                "metadata version '{}' is not a valid semantic version",
                metadata.version
            ));
        }
        if !rules::language().is_match(&metadata.language) {
            report.add_error(format!(
                "metadata language '{}' is not a two-letter code",
                metadata.language
            ));
        }
    }

    fn check_metadata(&self, manifest: &Manifest, report: &mut ValidationReport) {
        let metadata = &manifest.metadata;
        if metadata.created > metadata.modified {
            report.add_error("created timestamp is after modified timestamp");
        }
        if metadata.modified > Utc::now() + self.max_clock_skew {
            report.add_warning("modified timestamp is in the future");
        }
    }

    fn check_security(&self, manifest: &Manifest, report: &mut ValidationReport) {
        let security = &manifest.security;
        let wasm = &security.wasm_permissions;

        if wasm.allow_networking && security.network_policy.allow_outbound {
            report.add_warning(
                "both module networking and outbound network access are enabled",
            );
        }
        if security.js_permissions.execution_mode == ExecutionMode::Trusted {
            report.add_warning("trusted JavaScript execution bypasses the sandbox");
        }
        if wasm.memory_limit > HIGH_MEMORY_LIMIT {
            report.add_warning(format!(
                "module memory limit {} exceeds {} bytes",
                wasm.memory_limit, HIGH_MEMORY_LIMIT
            ));
        }
        if wasm.cpu_time_limit > HIGH_CPU_TIME_MS {
            report.add_warning(format!(
                "module CPU time limit {}ms exceeds {}ms",
                wasm.cpu_time_limit, HIGH_CPU_TIME_MS
            ));
        }

        // Zero limits are the first-class "disabled" state; they are only
        // coherent when the feature flag agrees.
        let webassembly_enabled = manifest.features.map(|f| f.webassembly).unwrap_or(false);
        if webassembly_enabled && wasm.is_disabled() {
            report.add_error(
                "webassembly feature is enabled but permissions disable execution",
            );
        }

        if security.content_security_policy.is_empty() {
            report.add_warning("content security policy is empty");
        }
        for domain in &security.trusted_domains {
            if !rules::domain().is_match(domain) {
                report.add_warning(format!("trusted domain '{domain}' is not a valid hostname"));
            }
        }
    }

    fn check_wasm_config(
        &self,
        _manifest: &Manifest,
        config: &WasmConfiguration,
        report: &mut ValidationReport,
    ) {
        for (key, module) in &config.modules {
            if key != &module.name {
                report.add_error(format!(
                    "module map key '{}' does not match module name '{}'",
                    key, module.name
                ));
            }
            if !rules::module_name().is_match(&module.name) {
                report.add_error(format!("module name '{}' is not valid", module.name));
            }
            if module.entry_point.is_empty() {
                report.add_error(format!("module '{}' has no entry point", module.name));
            }
            if semver::Version::parse(&module.version).is_err() {
                report.add_error(format!(
                    "module '{}' version '{}' is not a valid semantic version",
                    module.name, module.version
                ));
            }
        }

        for cycle in find_import_cycles(&config.modules) {
            report.add_error(format!("circular module dependency involving '{cycle}'"));
        }
    }

    fn check_resources(&self, manifest: &Manifest, report: &mut ValidationReport) {
        if !manifest.resources.contains_key(PRIMARY_CONTENT_PATH) {
            report.add_error(format!(
                "required resource '{PRIMARY_CONTENT_PATH}' is not declared"
            ));
        }

        for (key, resource) in &manifest.resources {
            if key != &resource.path {
                report.add_error(format!(
                    "resource key '{}' does not match its path '{}'",
                    key, resource.path
                ));
            }
            if resource.size < 0 {
                report.add_error(format!("resource '{key}' has a negative size"));
            }
            if resource.hash.is_empty() {
                report.add_error(format!("resource '{key}' has no hash"));
            } else if !rules::sha256_hex().is_match(&resource.hash) {
                report.add_error(format!("resource '{key}' hash is not a SHA-256 digest"));
            }
            if !rules::mime_type().is_match(&resource.mime_type) {
                report.add_warning(format!(
                    "resource '{}' has an unrecognized MIME type '{}'",
                    key, resource.mime_type
                ));
            }
            if resource.size > LARGE_RESOURCE_SIZE {
                report.add_warning(format!(
                    "resource '{}' is larger than {} bytes",
                    key, LARGE_RESOURCE_SIZE
                ));
            }
        }
    }

    fn check_features(&self, manifest: &Manifest, report: &mut ValidationReport) {
        let Some(features) = manifest.features else {
            return;
        };
        if features.webassembly && !manifest.has_wasm_modules() {
            report.add_warning("webassembly feature is enabled but no modules are declared");
        }
        if features.charts && !features.interactivity {
            report.add_warning("charts feature requires interactivity");
        }
        if features.webgl && !features.interactivity {
            report.add_warning("webgl feature requires interactivity");
        }
        if features.audio && features.video && features.webgl {
            report.add_warning("audio, video, and webgl together may strain renderers");
        }
    }
}

/// Detects cycles in the module import graph with a depth-first walk.
///
/// Only imports that name another declared module form edges; host imports
/// are ignored. A node already on the current path means a cycle; the
/// path marker is cleared on backtrack so sibling branches are not
/// falsely flagged.
fn find_import_cycles(modules: &HashMap<String, vellum_core::WasmModule>) -> Vec<String> {
    let mut cycles = Vec::new();
    let mut on_path = HashSet::new();

    fn visit(
        name: &str,
        modules: &HashMap<String, vellum_core::WasmModule>,
        on_path: &mut HashSet<String>,
        cycles: &mut Vec<String>,
    ) -> bool {
        if on_path.contains(name) {
            return true;
        }
        on_path.insert(name.to_string());
        if let Some(module) = modules.get(name) {
            for import in &module.imports {
                if modules.contains_key(import) && visit(import, modules, on_path, cycles) {
                    on_path.remove(name);
                    return true;
                }
            }
        }
        on_path.remove(name);
        false
    }

    let mut names: Vec<&String> = modules.keys().collect();
    names.sort();
    for name in names {
        if visit(name, modules, &mut on_path, &mut cycles) && !cycles.contains(name) {
            cycles.push(name.clone());
        }
    }
    cycles
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use vellum_core::{
        DocumentMetadata, FeatureFlags, Resource, SecurityPolicy, WasmModule, WasmPermissions,
    };

    fn base_manifest() -> Manifest {
        let mut manifest = Manifest::new(DocumentMetadata {
            title: "Sample".into(),
            author: "Author".into(),
            created: Utc::now() - Duration::hours(2),
            modified: Utc::now() - Duration::hours(1),
            description: String::new(),
            version: "1.0.0".into(),
            language: "en".into(),
        });
        manifest.resources.insert(
            PRIMARY_CONTENT_PATH.to_string(),
            Resource {
                hash: "a".repeat(64),
                size: 128,
                mime_type: "text/html".into(),
                path: PRIMARY_CONTENT_PATH.to_string(),
            },
        );
        manifest
    }

    fn module(name: &str, imports: &[&str]) -> WasmModule {
        WasmModule {
            name: name.into(),
            version: "1.0.0".into(),
            entry_point: "main".into(),
            exports: vec![],
            imports: imports.iter().map(|s| s.to_string()).collect(),
            permissions: None,
            metadata: Default::default(),
        }
    }

    fn with_modules(manifest: &mut Manifest, modules: Vec<WasmModule>) {
        let map = modules.into_iter().map(|m| (m.name.clone(), m)).collect();
        manifest.wasm_config = Some(WasmConfiguration {
            modules: map,
            permissions: WasmPermissions::sandboxed(),
            memory_limit: 4 * 1024 * 1024,
        });
    }

    #[test]
    fn valid_manifest_passes() {
        let report = ManifestValidator::new().validate(&base_manifest());
        assert!(report.is_valid, "errors: {:?}", report.errors);
    }

    #[test]
    fn created_after_modified_is_fatal() {
        let mut manifest = base_manifest();
        manifest.metadata.created = Utc::now();
        manifest.metadata.modified = Utc::now() - Duration::hours(5);
        let report = ManifestValidator::new().validate(&manifest);
        assert!(!report.is_valid);
        assert!(report.errors.iter().any(|e| e.contains("created")));
    }

    #[test]
    fn future_modified_is_a_warning_only() {
        let mut manifest = base_manifest();
        manifest.metadata.modified = Utc::now() + Duration::hours(3);
        let report = ManifestValidator::new().validate(&manifest);
        assert!(report.is_valid);
        assert!(report.warnings.iter().any(|w| w.contains("future")));
    }

    #[test]
    fn missing_primary_content_is_fatal() {
        let mut manifest = base_manifest();
        manifest.resources.clear();
        let report = ManifestValidator::new().validate(&manifest);
        assert!(!report.is_valid);
        assert!(report
            .errors
            .iter()
            .any(|e| e.contains(PRIMARY_CONTENT_PATH)));
    }

    #[test]
    fn resource_key_path_mismatch_is_fatal() {
        let mut manifest = base_manifest();
        manifest.resources.insert(
            "assets/images/a.png".to_string(),
            Resource {
                hash: "b".repeat(64),
                size: 1,
                mime_type: "image/png".into(),
                path: "assets/images/other.png".into(),
            },
        );
        let report = ManifestValidator::new().validate(&manifest);
        assert!(!report.is_valid);
    }

    #[test]
    fn bad_mime_type_is_a_warning() {
        let mut manifest = base_manifest();
        manifest
            .resources
            .get_mut(PRIMARY_CONTENT_PATH)
            .unwrap()
            .mime_type = "nonsense".into();
        let report = ManifestValidator::new().validate(&manifest);
        assert!(report.is_valid);
        assert!(report.warnings.iter().any(|w| w.contains("MIME")));
    }

    #[test]
    fn import_cycle_is_detected_and_edge_removal_clears_it() {
        let mut manifest = base_manifest();
        with_modules(
            &mut manifest,
            vec![
                module("a", &["b"]),
                module("b", &["c"]),
                module("c", &["a"]),
            ],
        );
        let report = ManifestValidator::new().validate(&manifest);
        assert!(!report.is_valid);
        assert!(report.errors.iter().any(|e| e.contains("circular")));

        let mut manifest = base_manifest();
        with_modules(
            &mut manifest,
            vec![module("a", &["b"]), module("b", &["c"]), module("c", &[])],
        );
        let report = ManifestValidator::new().validate(&manifest);
        assert!(report.is_valid, "errors: {:?}", report.errors);
    }

    #[test]
    fn sibling_branches_are_not_falsely_flagged() {
        // Diamond: a → b, a → c, b → d, c → d. No cycle.
        let mut manifest = base_manifest();
        with_modules(
            &mut manifest,
            vec![
                module("a", &["b", "c"]),
                module("b", &["d"]),
                module("c", &["d"]),
                module("d", &[]),
            ],
        );
        let report = ManifestValidator::new().validate(&manifest);
        assert!(report.is_valid, "errors: {:?}", report.errors);
    }

    #[test]
    fn module_key_must_match_name() {
        let mut manifest = base_manifest();
        let mut map = HashMap::new();
        map.insert("renamed".to_string(), module("chart", &[]));
        manifest.wasm_config = Some(WasmConfiguration {
            modules: map,
            permissions: WasmPermissions::sandboxed(),
            memory_limit: 0,
        });
        let report = ManifestValidator::new().validate(&manifest);
        assert!(!report.is_valid);
    }

    #[test]
    fn webassembly_flag_with_disabled_permissions_is_incoherent() {
        let mut manifest = base_manifest();
        manifest.features = Some(FeatureFlags {
            webassembly: true,
            ..Default::default()
        });
        manifest.security.wasm_permissions = WasmPermissions::disabled();
        let report = ManifestValidator::new().validate(&manifest);
        assert!(!report.is_valid);
    }

    #[test]
    fn parse_and_validate_round_trips_wire_json() {
        let validator = ManifestValidator::new();
        let json = serde_json::to_string(&base_manifest()).unwrap();
        let (manifest, report) = validator.parse_and_validate(&json).unwrap();
        assert!(report.is_valid);
        assert_eq!(manifest.metadata.title, "Sample");

        assert!(validator.parse_and_validate("{not json").is_err());
    }

    #[test]
    fn permissive_security_settings_warn_without_failing() {
        let mut manifest = base_manifest();
        manifest.security = SecurityPolicy::sandboxed();
        manifest.security.wasm_permissions.memory_limit = 512 * 1024 * 1024;
        manifest.security.wasm_permissions.cpu_time_limit = 60_000;
        manifest.security.wasm_permissions.allow_networking = true;
        manifest.security.network_policy.allow_outbound = true;
        manifest.security.js_permissions.execution_mode = ExecutionMode::Trusted;
        let report = ManifestValidator::new().validate(&manifest);
        assert!(report.is_valid);
        assert!(report.warnings.len() >= 4);
    }
}
