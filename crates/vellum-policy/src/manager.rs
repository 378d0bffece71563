//! Policy storage, inheritance resolution, and resource monitoring.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use chrono::Utc;
use tracing::{info, warn};
use vellum_core::SecurityPolicy;

use crate::error::PolicyError;
use crate::events::{AuditTrail, SecurityEventLog};
use crate::types::{
    AuditEvent, MonitoringReport, MonitoringStatus, ResourceMetrics, ResourceViolation,
    SecurityEvent, SecurityEventType, Severity, SystemPolicy,
};

pub const DEFAULT_POLICY_ID: &str = "default";

#[derive(Debug, Clone)]
pub struct PolicyManagerConfig {
    pub default_policy_id: String,
    pub enable_inheritance: bool,
    pub max_inheritance_depth: usize,
}

impl Default for PolicyManagerConfig {
    fn default() -> Self {
        Self {
            default_policy_id: DEFAULT_POLICY_ID.to_string(),
            enable_inheritance: true,
            max_inheritance_depth: 5,
        }
    }
}

/// Stores named policies behind a reader/writer lock and seeds a
/// restrictive default. Inheritance forms a tree: cycles are refused at
/// write time, and resolution at evaluation time is depth-capped.
/// Every mutation lands in the audit trail.
pub struct PolicyManager {
    policies: RwLock<HashMap<String, SystemPolicy>>,
    config: PolicyManagerConfig,
    security_log: Arc<dyn SecurityEventLog>,
    audit: Arc<dyn AuditTrail>,
}

impl PolicyManager {
    pub fn new(
        config: PolicyManagerConfig,
        security_log: Arc<dyn SecurityEventLog>,
        audit: Arc<dyn AuditTrail>,
    ) -> Self {
        let mut policies = HashMap::new();
        let default = SystemPolicy::new(
            &config.default_policy_id,
            "Default",
            SecurityPolicy::restrictive(),
            "system",
        );
        policies.insert(default.id.clone(), default);
        Self {
            policies: RwLock::new(policies),
            config,
            security_log,
            audit,
        }
    }

    pub fn config(&self) -> &PolicyManagerConfig {
        &self.config
    }

    fn record_audit(&self, action: &str, policy_id: &str, actor: &str, success: bool) {
        let event = AuditEvent::new(action, &format!("policies/{policy_id}"), actor, success)
            .with_policy(policy_id);
        if let Err(e) = self.audit.record(event) {
            warn!(error = %e, "failed to record audit event");
        }
    }

    /// Validates invariants that must hold before a policy is stored:
    /// identifiers present, the parent exists, and no inheritance cycle.
    fn validate_policy(
        &self,
        policy: &SystemPolicy,
        policies: &HashMap<String, SystemPolicy>,
    ) -> Result<(), PolicyError> {
        if policy.id.is_empty() || policy.name.is_empty() {
            return Err(PolicyError::ValidationFailed {
                policy_id: policy.id.clone(),
                reason: "id and name are required".to_string(),
            });
        }
        if let Some(parent) = &policy.parent {
            if !policies.contains_key(parent) {
                return Err(PolicyError::ValidationFailed {
                    policy_id: policy.id.clone(),
                    reason: format!("parent policy '{parent}' does not exist"),
                });
            }
            // A policy may not be its own ancestor.
            let mut current = Some(parent.clone());
            let mut depth = 0;
            while let Some(ancestor_id) = current {
                if ancestor_id == policy.id {
                    return Err(PolicyError::InheritanceCycle(policy.id.clone()));
                }
                depth += 1;
                if depth > self.config.max_inheritance_depth {
                    return Err(PolicyError::DepthExceeded {
                        policy_id: policy.id.clone(),
                        max_depth: self.config.max_inheritance_depth,
                    });
                }
                current = policies.get(&ancestor_id).and_then(|p| p.parent.clone());
            }
        }
        Ok(())
    }

    pub fn create_policy(&self, policy: SystemPolicy, actor: &str) -> Result<(), PolicyError> {
        let mut policies = self.policies.write().unwrap_or_else(|e| e.into_inner());
        if policies.contains_key(&policy.id) {
            self.record_audit("create_policy", &policy.id, actor, false);
            return Err(PolicyError::PolicyExists(policy.id));
        }
        if let Err(e) = self.validate_policy(&policy, &policies) {
            self.record_audit("create_policy", &policy.id, actor, false);
            return Err(e);
        }
        info!(policy_id = %policy.id, actor = %actor, "policy created");
        self.record_audit("create_policy", &policy.id, actor, true);
        policies.insert(policy.id.clone(), policy);
        Ok(())
    }

    pub fn get_policy(&self, policy_id: &str) -> Result<SystemPolicy, PolicyError> {
        self.policies
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(policy_id)
            .cloned()
            .ok_or_else(|| PolicyError::PolicyNotFound(policy_id.to_string()))
    }

    pub fn update_policy(&self, mut policy: SystemPolicy, actor: &str) -> Result<(), PolicyError> {
        let mut policies = self.policies.write().unwrap_or_else(|e| e.into_inner());
        if !policies.contains_key(&policy.id) {
            self.record_audit("update_policy", &policy.id, actor, false);
            return Err(PolicyError::PolicyNotFound(policy.id));
        }
        if let Err(e) = self.validate_policy(&policy, &policies) {
            self.record_audit("update_policy", &policy.id, actor, false);
            return Err(e);
        }
        policy.updated_at = Utc::now();
        info!(policy_id = %policy.id, actor = %actor, "policy updated");
        self.record_audit("update_policy", &policy.id, actor, true);
        policies.insert(policy.id.clone(), policy);
        Ok(())
    }

    /// Deletion is refused for the default policy and for any policy
    /// other policies inherit from.
    pub fn delete_policy(&self, policy_id: &str, actor: &str) -> Result<(), PolicyError> {
        let mut policies = self.policies.write().unwrap_or_else(|e| e.into_inner());
        if policy_id == self.config.default_policy_id {
            self.record_audit("delete_policy", policy_id, actor, false);
            return Err(PolicyError::DefaultPolicyProtected);
        }
        if !policies.contains_key(policy_id) {
            self.record_audit("delete_policy", policy_id, actor, false);
            return Err(PolicyError::PolicyNotFound(policy_id.to_string()));
        }
        let has_children = policies
            .values()
            .any(|p| p.parent.as_deref() == Some(policy_id));
        if has_children {
            self.record_audit("delete_policy", policy_id, actor, false);
            return Err(PolicyError::PolicyHasChildren(policy_id.to_string()));
        }
        policies.remove(policy_id);
        info!(policy_id = %policy_id, actor = %actor, "policy deleted");
        self.record_audit("delete_policy", policy_id, actor, true);
        Ok(())
    }

    pub fn list_policies(&self) -> Vec<SystemPolicy> {
        let mut policies: Vec<_> = self
            .policies
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .values()
            .cloned()
            .collect();
        policies.sort_by(|a, b| a.id.cmp(&b.id));
        policies
    }

    /// The policy itself followed by its ancestors, nearest first,
    /// depth-capped. Disabled inheritance yields just the policy.
    pub fn resolve_chain(&self, policy_id: &str) -> Result<Vec<SystemPolicy>, PolicyError> {
        let policies = self.policies.read().unwrap_or_else(|e| e.into_inner());
        let mut chain = Vec::new();
        let mut current = Some(policy_id.to_string());

        while let Some(id) = current {
            let policy = policies
                .get(&id)
                .ok_or_else(|| PolicyError::PolicyNotFound(id.clone()))?;
            chain.push(policy.clone());
            if !self.config.enable_inheritance {
                break;
            }
            if chain.len() > self.config.max_inheritance_depth {
                return Err(PolicyError::DepthExceeded {
                    policy_id: policy_id.to_string(),
                    max_depth: self.config.max_inheritance_depth,
                });
            }
            current = policy.parent.clone();
        }
        Ok(chain)
    }

    /// Compares live metrics against the named policy's ceilings. Each
    /// discrete violation also lands on the security event stream.
    pub fn monitor_resources(
        &self,
        policy_id: &str,
        metrics: &ResourceMetrics,
    ) -> Result<MonitoringReport, PolicyError> {
        let policy = self.get_policy(policy_id)?;
        let ceilings = &policy.ceilings;
        let mut violations = Vec::new();

        if metrics.memory_usage > ceilings.max_memory_per_document {
            violations.push(ResourceViolation {
                kind: "memory_exceeded".to_string(),
                observed: metrics.memory_usage,
                limit: ceilings.max_memory_per_document,
            });
        }
        if metrics.cpu_time_ms > ceilings.max_cpu_time_per_document {
            violations.push(ResourceViolation {
                kind: "cpu_time_exceeded".to_string(),
                observed: metrics.cpu_time_ms,
                limit: ceilings.max_cpu_time_per_document,
            });
        }
        if metrics.concurrent_documents > ceilings.max_concurrent_documents {
            violations.push(ResourceViolation {
                kind: "concurrent_documents_exceeded".to_string(),
                observed: metrics.concurrent_documents as u64,
                limit: ceilings.max_concurrent_documents as u64,
            });
        }

        for violation in &violations {
            warn!(policy_id = %policy_id, kind = %violation.kind, "resource ceiling exceeded");
            let event = SecurityEvent::new(
                SecurityEventType::ResourceExceeded,
                Severity::High,
                "resource-monitor",
            )
            .with_policy(policy_id)
            .with_detail("kind", violation.kind.clone())
            .with_detail("observed", violation.observed.to_string())
            .with_detail("limit", violation.limit.to_string());
            self.security_log.record(event)?;
        }

        let status = if violations.is_empty() {
            MonitoringStatus::Healthy
        } else {
            MonitoringStatus::ViolationsDetected
        };
        Ok(MonitoringReport {
            policy_id: policy_id.to_string(),
            status,
            violations,
            checked_at: Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::MemoryEventLog;
    use crate::types::{AuditFilter, EventFilter};

    fn manager() -> (Arc<MemoryEventLog>, PolicyManager) {
        let log = Arc::new(MemoryEventLog::new());
        let manager = PolicyManager::new(
            PolicyManagerConfig::default(),
            log.clone(),
            log.clone(),
        );
        (log, manager)
    }

    fn policy(id: &str) -> SystemPolicy {
        SystemPolicy::new(id, id, SecurityPolicy::sandboxed(), "admin")
    }

    #[test]
    fn default_policy_is_seeded() {
        let (_, manager) = manager();
        let default = manager.get_policy(DEFAULT_POLICY_ID).unwrap();
        assert!(default.security.wasm_permissions.is_disabled());
    }

    #[test]
    fn crud_is_audited() {
        let (log, manager) = manager();
        manager.create_policy(policy("team"), "admin").unwrap();
        let mut updated = manager.get_policy("team").unwrap();
        updated.description = "team sandbox".into();
        manager.update_policy(updated, "admin").unwrap();
        manager.delete_policy("team", "admin").unwrap();

        let trail = AuditTrail::query(log.as_ref(), &AuditFilter::default()).unwrap();
        let actions: Vec<_> = trail.iter().map(|e| e.action.as_str()).collect();
        assert_eq!(actions, vec!["create_policy", "update_policy", "delete_policy"]);
        assert!(trail.iter().all(|e| e.success));
    }

    #[test]
    fn default_policy_cannot_be_deleted() {
        let (_, manager) = manager();
        assert!(matches!(
            manager.delete_policy(DEFAULT_POLICY_ID, "admin"),
            Err(PolicyError::DefaultPolicyProtected)
        ));
    }

    #[test]
    fn policy_with_children_cannot_be_deleted() {
        let (_, manager) = manager();
        manager.create_policy(policy("parent"), "admin").unwrap();
        manager
            .create_policy(policy("child").with_parent("parent"), "admin")
            .unwrap();
        assert!(matches!(
            manager.delete_policy("parent", "admin"),
            Err(PolicyError::PolicyHasChildren(_))
        ));
        manager.delete_policy("child", "admin").unwrap();
        manager.delete_policy("parent", "admin").unwrap();
    }

    #[test]
    fn self_parent_and_cycles_are_refused() {
        let (_, manager) = manager();
        manager.create_policy(policy("a"), "admin").unwrap();
        manager
            .create_policy(policy("b").with_parent("a"), "admin")
            .unwrap();

        // a → b would close the loop a → b → a.
        let mut a = manager.get_policy("a").unwrap();
        a.parent = Some("b".to_string());
        assert!(matches!(
            manager.update_policy(a, "admin"),
            Err(PolicyError::InheritanceCycle(_))
        ));

        let mut selfish = policy("c");
        selfish.parent = Some("c".to_string());
        assert!(manager.create_policy(selfish, "admin").is_err());
    }

    #[test]
    fn chain_resolution_is_nearest_first() {
        let (_, manager) = manager();
        manager.create_policy(policy("org"), "admin").unwrap();
        manager
            .create_policy(policy("team").with_parent("org"), "admin")
            .unwrap();
        let chain = manager.resolve_chain("team").unwrap();
        let ids: Vec<_> = chain.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["team", "org"]);
    }

    #[test]
    fn monitoring_reports_violations_and_emits_events() {
        let (log, manager) = manager();
        let metrics = ResourceMetrics {
            memory_usage: 512 * 1024 * 1024,
            cpu_time_ms: 60_000,
            concurrent_documents: 100,
        };
        let report = manager
            .monitor_resources(DEFAULT_POLICY_ID, &metrics)
            .unwrap();
        assert_eq!(report.status, MonitoringStatus::ViolationsDetected);
        assert_eq!(report.violations.len(), 3);

        let events = SecurityEventLog::query(
            log.as_ref(),
            &EventFilter {
                event_types: vec![SecurityEventType::ResourceExceeded],
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(events.len(), 3);
        assert!(events.iter().all(|e| e.severity == Severity::High));
    }

    #[test]
    fn healthy_metrics_are_healthy() {
        let (_, manager) = manager();
        let report = manager
            .monitor_resources(DEFAULT_POLICY_ID, &ResourceMetrics::default())
            .unwrap();
        assert_eq!(report.status, MonitoringStatus::Healthy);
        assert!(report.violations.is_empty());
    }

    #[test]
    fn concurrent_updates_to_same_policy_do_not_corrupt_it() {
        let (_, manager) = manager();
        manager.create_policy(policy("shared"), "admin").unwrap();
        let manager = Arc::new(manager);

        std::thread::scope(|scope| {
            for i in 0..8 {
                let manager = Arc::clone(&manager);
                scope.spawn(move || {
                    let mut p = manager.get_policy("shared").unwrap();
                    p.description = format!("writer {i}");
                    manager.update_policy(p, &format!("writer-{i}")).unwrap();
                });
            }
        });

        let stored = manager.get_policy("shared").unwrap();
        assert!(stored.description.starts_with("writer "));
        assert_eq!(stored.id, "shared");
    }
}
