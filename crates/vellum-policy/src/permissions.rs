//! WASM permission evaluation against named policies with inheritance.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use vellum_core::WasmPermissions;

use crate::error::PolicyError;
use crate::events::AuditTrail;
use crate::types::AuditEvent;

const DIRECT_GRANT_TTL_MINUTES: i64 = 60;
const INHERITED_GRANT_TTL_MINUTES: i64 = 30;

const HIGH_MEMORY_THRESHOLD: u64 = 32 * 1024 * 1024;
const LONG_CPU_THRESHOLD_MS: u64 = 10_000;

/// A document asking for execution rights for one WASM module under a
/// named policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PermissionRequest {
    pub document_id: String,
    pub module: String,
    pub policy_id: String,
    pub requested: WasmPermissions,
    pub user_id: String,
    #[serde(default)]
    pub justification: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PermissionWarning {
    pub kind: String,
    pub message: String,
}

impl PermissionWarning {
    fn new(kind: &str, message: impl Into<String>) -> Self {
        Self {
            kind: kind.to_string(),
            message: message.into(),
        }
    }
}

/// Outcome of evaluating a [`PermissionRequest`]. A denial at the target
/// policy may still be granted by an ancestor; that grant carries
/// `inherited_from` and a shorter expiry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PermissionEvaluation {
    pub granted: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inherited_from: Option<String>,
    pub restrictions: Vec<String>,
    pub warnings: Vec<PermissionWarning>,
    pub evaluated_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl PermissionEvaluation {
    pub fn is_expired(&self) -> bool {
        Utc::now() > self.expires_at
    }
}

/// Evaluates permission requests against the policy tree. Results are
/// cached per (document, policy, module) until their expiry and every
/// evaluation is audited.
pub struct PermissionEngine {
    manager: Arc<crate::PolicyManager>,
    audit: Arc<dyn AuditTrail>,
    cache: RwLock<HashMap<String, PermissionEvaluation>>,
}

impl PermissionEngine {
    pub fn new(manager: Arc<crate::PolicyManager>, audit: Arc<dyn AuditTrail>) -> Self {
        Self {
            manager,
            audit,
            cache: RwLock::new(HashMap::new()),
        }
    }

    pub fn evaluate(
        &self,
        request: &PermissionRequest,
    ) -> Result<PermissionEvaluation, PolicyError> {
        let cache_key = format!(
            "{}:{}:{}",
            request.document_id, request.policy_id, request.module
        );
        {
            let cache = self.cache.read().unwrap_or_else(|e| e.into_inner());
            if let Some(cached) = cache.get(&cache_key) {
                if !cached.is_expired() {
                    debug!(key = %cache_key, "permission evaluation served from cache");
                    return Ok(cached.clone());
                }
            }
        }

        let chain = self.manager.resolve_chain(&request.policy_id)?;
        let now = Utc::now();

        let mut evaluation = None;
        for (level, policy) in chain.iter().enumerate() {
            let ceiling = &policy.security.wasm_permissions;
            if permits(ceiling, &request.requested) {
                let inherited = level > 0;
                let ttl = if inherited {
                    INHERITED_GRANT_TTL_MINUTES
                } else {
                    DIRECT_GRANT_TTL_MINUTES
                };
                let mut warnings = advisory_warnings(&request.requested);
                if inherited {
                    warnings.insert(
                        0,
                        PermissionWarning::new(
                            "inherited_permissions",
                            format!("granted by ancestor policy '{}'", policy.id),
                        ),
                    );
                }
                evaluation = Some(PermissionEvaluation {
                    granted: true,
                    inherited_from: inherited.then(|| policy.id.clone()),
                    restrictions: Vec::new(),
                    warnings,
                    evaluated_at: now,
                    expires_at: now + Duration::minutes(ttl),
                });
                break;
            }
        }

        let evaluation = evaluation.unwrap_or_else(|| {
            let target = &chain[0].security.wasm_permissions;
            PermissionEvaluation {
                granted: false,
                inherited_from: None,
                restrictions: restrictions_against(target, &request.requested),
                warnings: Vec::new(),
                evaluated_at: now,
                expires_at: now + Duration::minutes(DIRECT_GRANT_TTL_MINUTES),
            }
        });

        let audit_event = AuditEvent::new(
            "evaluate_permissions",
            &format!("documents/{}/modules/{}", request.document_id, request.module),
            &request.user_id,
            evaluation.granted,
        )
        .with_policy(&request.policy_id);
        if let Err(e) = self.audit.record(audit_event) {
            warn!(error = %e, "failed to record permission audit event");
        }

        self.cache
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(cache_key, evaluation.clone());
        Ok(evaluation)
    }

    pub fn clear_cache(&self) {
        self.cache
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
    }

    pub fn cache_size(&self) -> usize {
        self.cache.read().unwrap_or_else(|e| e.into_inner()).len()
    }
}

/// Whether `ceiling` allows everything `requested` asks for. A disabled
/// ceiling permits only a disabled request.
fn permits(ceiling: &WasmPermissions, requested: &WasmPermissions) -> bool {
    if ceiling.is_disabled() {
        return requested.is_disabled();
    }
    requested.memory_limit <= ceiling.memory_limit
        && requested.cpu_time_limit <= ceiling.cpu_time_limit
        && (!requested.allow_networking || ceiling.allow_networking)
        && (!requested.allow_file_system || ceiling.allow_file_system)
        && imports_allowed(ceiling, requested)
}

fn imports_allowed(ceiling: &WasmPermissions, requested: &WasmPermissions) -> bool {
    if ceiling.allowed_imports.iter().any(|i| i == "*") {
        return true;
    }
    requested
        .allowed_imports
        .iter()
        .all(|i| ceiling.allowed_imports.contains(i))
}

fn restrictions_against(ceiling: &WasmPermissions, requested: &WasmPermissions) -> Vec<String> {
    let mut restrictions = Vec::new();
    if ceiling.is_disabled() {
        restrictions.push("wasm execution is disabled by this policy".to_string());
        return restrictions;
    }
    if requested.memory_limit > ceiling.memory_limit {
        restrictions.push(format!(
            "memory capped at {} bytes (requested {})",
            ceiling.memory_limit, requested.memory_limit
        ));
    }
    if requested.cpu_time_limit > ceiling.cpu_time_limit {
        restrictions.push(format!(
            "cpu time capped at {}ms (requested {}ms)",
            ceiling.cpu_time_limit, requested.cpu_time_limit
        ));
    }
    if requested.allow_networking && !ceiling.allow_networking {
        restrictions.push("networking is not permitted".to_string());
    }
    if requested.allow_file_system && !ceiling.allow_file_system {
        restrictions.push("filesystem access is not permitted".to_string());
    }
    if !ceiling.allowed_imports.iter().any(|i| i == "*") {
        for import in &requested.allowed_imports {
            if !ceiling.allowed_imports.contains(import) {
                restrictions.push(format!("import '{import}' is outside the allowed set"));
            }
        }
    }
    restrictions
}

fn advisory_warnings(requested: &WasmPermissions) -> Vec<PermissionWarning> {
    let mut warnings = Vec::new();
    if requested.memory_limit > HIGH_MEMORY_THRESHOLD {
        warnings.push(PermissionWarning::new(
            "high_memory_usage",
            format!("{} bytes of memory requested", requested.memory_limit),
        ));
    }
    if requested.cpu_time_limit > LONG_CPU_THRESHOLD_MS {
        warnings.push(PermissionWarning::new(
            "long_cpu_time",
            format!("{}ms of cpu time requested", requested.cpu_time_limit),
        ));
    }
    if requested.allow_networking {
        warnings.push(PermissionWarning::new(
            "network_access_requested",
            "module requests outbound network access",
        ));
    }
    if requested.allow_file_system {
        warnings.push(PermissionWarning::new(
            "filesystem_access_requested",
            "module requests filesystem access",
        ));
    }
    warnings
}

/// Named preset permission envelopes for common document classes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PermissionTemplate {
    pub name: String,
    pub description: String,
    pub permissions: WasmPermissions,
}

impl PermissionTemplate {
    pub fn basic_document() -> Self {
        Self {
            name: "basic-document".to_string(),
            description: "Static content with minimal interactivity".to_string(),
            permissions: WasmPermissions {
                memory_limit: 4 * 1024 * 1024,
                allowed_imports: Vec::new(),
                cpu_time_limit: 2_000,
                allow_networking: false,
                allow_file_system: false,
            },
        }
    }

    pub fn interactive_content() -> Self {
        Self {
            name: "interactive-content".to_string(),
            description: "Interactive widgets and simulations".to_string(),
            permissions: WasmPermissions {
                memory_limit: 16 * 1024 * 1024,
                allowed_imports: vec!["env.math".to_string()],
                cpu_time_limit: 10_000,
                allow_networking: false,
                allow_file_system: false,
            },
        }
    }

    pub fn data_visualization() -> Self {
        Self {
            name: "data-visualization".to_string(),
            description: "Chart rendering over embedded datasets".to_string(),
            permissions: WasmPermissions {
                memory_limit: 32 * 1024 * 1024,
                allowed_imports: vec!["env.math".to_string(), "env.canvas".to_string()],
                cpu_time_limit: 15_000,
                allow_networking: false,
                allow_file_system: false,
            },
        }
    }

    pub fn network_enabled() -> Self {
        Self {
            name: "network-enabled".to_string(),
            description: "Documents that fetch remote data at view time".to_string(),
            permissions: WasmPermissions {
                memory_limit: 16 * 1024 * 1024,
                allowed_imports: vec!["env.fetch".to_string()],
                cpu_time_limit: 10_000,
                allow_networking: true,
                allow_file_system: false,
            },
        }
    }

    pub fn all() -> Vec<Self> {
        vec![
            Self::basic_document(),
            Self::interactive_content(),
            Self::data_visualization(),
            Self::network_enabled(),
        ]
    }
}
