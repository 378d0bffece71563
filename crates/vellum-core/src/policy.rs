//! Per-document security policy: the permission envelope embedded in a
//! manifest.

use serde::{Deserialize, Serialize};

/// Permission envelope for one document. Embedded in the manifest and
/// validated for internal consistency by the manifest validator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityPolicy {
    pub wasm_permissions: WasmPermissions,
    pub js_permissions: JsPermissions,
    pub network_policy: NetworkPolicy,
    pub storage_policy: StoragePolicy,
    #[serde(default)]
    pub content_security_policy: String,
    #[serde(default)]
    pub trusted_domains: Vec<String>,
}

/// Execution constraints for WebAssembly modules. Memory in bytes, CPU
/// time in milliseconds. `disabled()` is the first-class "no WASM at all"
/// state; zero limits are valid only in that state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WasmPermissions {
    pub memory_limit: u64,
    #[serde(default)]
    pub allowed_imports: Vec<String>,
    pub cpu_time_limit: u64,
    #[serde(default)]
    pub allow_networking: bool,
    #[serde(default)]
    pub allow_file_system: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsPermissions {
    pub execution_mode: ExecutionMode,
    #[serde(default)]
    pub allowed_apis: Vec<String>,
    pub dom_access: DomAccess,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    None,
    Sandboxed,
    Trusted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DomAccess {
    None,
    Read,
    Write,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NetworkPolicy {
    #[serde(default)]
    pub allow_outbound: bool,
    #[serde(default)]
    pub allowed_hosts: Vec<String>,
    #[serde(default)]
    pub allowed_ports: Vec<u16>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoragePolicy {
    #[serde(default)]
    pub allow_local_storage: bool,
    #[serde(default)]
    pub allow_session_storage: bool,
    #[serde(default)]
    pub allow_indexed_db: bool,
    #[serde(default)]
    pub allow_cookies: bool,
}

impl WasmPermissions {
    /// WebAssembly execution fully disabled: zero limits, no capabilities.
    pub fn disabled() -> Self {
        Self::default()
    }

    /// Whether this permission set disables WASM execution entirely.
    pub fn is_disabled(&self) -> bool {
        self.memory_limit == 0 && self.cpu_time_limit == 0
    }

    /// Conservative sandboxed defaults: 4MB memory, 1s CPU, no imports,
    /// no networking, no filesystem.
    pub fn sandboxed() -> Self {
        Self {
            memory_limit: 4 * 1024 * 1024,
            allowed_imports: Vec::new(),
            cpu_time_limit: 1_000,
            allow_networking: false,
            allow_file_system: false,
        }
    }
}

impl SecurityPolicy {
    /// The deny-by-default policy: WASM disabled, sandboxed read-only JS,
    /// no network, no storage.
    pub fn restrictive() -> Self {
        Self {
            wasm_permissions: WasmPermissions::disabled(),
            js_permissions: JsPermissions {
                execution_mode: ExecutionMode::Sandboxed,
                allowed_apis: Vec::new(),
                dom_access: DomAccess::Read,
            },
            network_policy: NetworkPolicy::default(),
            storage_policy: StoragePolicy::default(),
            content_security_policy: "default-src 'none'; script-src 'self'".to_string(),
            trusted_domains: Vec::new(),
        }
    }

    /// Restrictive policy that still permits sandboxed WASM execution.
    pub fn sandboxed() -> Self {
        Self {
            wasm_permissions: WasmPermissions::sandboxed(),
            ..Self::restrictive()
        }
    }
}
