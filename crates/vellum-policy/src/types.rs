//! Policy objects, events, filters, and monitoring types.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use vellum_core::SecurityPolicy;

/// Administrative, reusable policy object — distinct from the
/// per-document [`SecurityPolicy`] it embeds. Inheritance is resolved at
/// evaluation time through `parent`, never materialized at storage time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemPolicy {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
    pub security: SecurityPolicy,
    #[serde(default)]
    pub admin: AdminControls,
    #[serde(default)]
    pub ceilings: ResourceCeilings,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub created_by: String,
}

impl SystemPolicy {
    pub fn new(id: &str, name: &str, security: SecurityPolicy, created_by: &str) -> Self {
        let now = Utc::now();
        Self {
            id: id.to_string(),
            name: name.to_string(),
            description: String::new(),
            version: "1".to_string(),
            parent: None,
            security,
            admin: AdminControls::default(),
            ceilings: ResourceCeilings::default(),
            created_at: now,
            updated_at: now,
            created_by: created_by.to_string(),
        }
    }

    pub fn with_parent(mut self, parent: &str) -> Self {
        self.parent = Some(parent.to_string());
        self
    }
}

/// Installation-wide controls an administrator layers on top of the
/// embedded security policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminControls {
    pub require_approval: bool,
    pub max_document_size: u64,
    pub max_wasm_modules: usize,
    pub allowed_file_types: Vec<String>,
    pub blocked_domains: Vec<String>,
    pub require_signature: bool,
    pub trusted_signers: Vec<String>,
    pub enforce_quarantine: bool,
    /// Seconds a quarantined document is held before review.
    pub quarantine_duration: u64,
}

impl Default for AdminControls {
    fn default() -> Self {
        Self {
            require_approval: false,
            max_document_size: 100 * 1024 * 1024,
            max_wasm_modules: 16,
            allowed_file_types: vec![".lvd".to_string()],
            blocked_domains: Vec::new(),
            require_signature: true,
            trusted_signers: Vec::new(),
            enforce_quarantine: false,
            quarantine_duration: 24 * 60 * 60,
        }
    }
}

/// Aggregate ceilings the monitoring check compares live metrics against.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceCeilings {
    pub max_concurrent_documents: u32,
    pub max_memory_per_document: u64,
    pub max_cpu_time_per_document: u64,
}

impl Default for ResourceCeilings {
    fn default() -> Self {
        Self {
            max_concurrent_documents: 10,
            max_memory_per_document: 64 * 1024 * 1024,
            max_cpu_time_per_document: 30_000,
        }
    }
}

/// What was detected (as opposed to the audit trail's "who did what").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityEvent {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub event_type: SecurityEventType,
    pub severity: Severity,
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub policy_id: Option<String>,
    #[serde(default)]
    pub details: HashMap<String, String>,
}

impl SecurityEvent {
    pub fn new(event_type: SecurityEventType, severity: Severity, source: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            event_type,
            severity,
            source: source.to_string(),
            user_id: None,
            policy_id: None,
            details: HashMap::new(),
        }
    }

    pub fn with_policy(mut self, policy_id: &str) -> Self {
        self.policy_id = Some(policy_id.to_string());
        self
    }

    pub fn with_user(mut self, user_id: &str) -> Self {
        self.user_id = Some(user_id.to_string());
        self
    }

    pub fn with_detail(mut self, key: &str, value: impl Into<String>) -> Self {
        self.details.insert(key.to_string(), value.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SecurityEventType {
    PolicyViolation,
    UnauthorizedAccess,
    MaliciousContent,
    SignatureFailure,
    ResourceExceeded,
    SuspiciousActivity,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

/// Who did what, when, and whether it succeeded. Append-only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub action: String,
    pub resource: String,
    pub user_id: String,
    pub success: bool,
    #[serde(default)]
    pub details: HashMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub policy_id: Option<String>,
}

impl AuditEvent {
    pub fn new(action: &str, resource: &str, user_id: &str, success: bool) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            action: action.to_string(),
            resource: resource.to_string(),
            user_id: user_id.to_string(),
            success,
            details: HashMap::new(),
            policy_id: None,
        }
    }

    pub fn with_policy(mut self, policy_id: &str) -> Self {
        self.policy_id = Some(policy_id.to_string());
        self
    }
}

#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub event_types: Vec<SecurityEventType>,
    pub severities: Vec<Severity>,
    pub user_id: Option<String>,
    pub policy_id: Option<String>,
    pub source: Option<String>,
    /// Zero means unlimited.
    pub limit: usize,
    pub offset: usize,
}

impl EventFilter {
    pub fn matches(&self, event: &SecurityEvent) -> bool {
        if let Some(start) = self.start {
            if event.timestamp < start {
                return false;
            }
        }
        if let Some(end) = self.end {
            if event.timestamp > end {
                return false;
            }
        }
        if !self.event_types.is_empty() && !self.event_types.contains(&event.event_type) {
            return false;
        }
        if !self.severities.is_empty() && !self.severities.contains(&event.severity) {
            return false;
        }
        if let Some(user_id) = &self.user_id {
            if event.user_id.as_deref() != Some(user_id.as_str()) {
                return false;
            }
        }
        if let Some(policy_id) = &self.policy_id {
            if event.policy_id.as_deref() != Some(policy_id.as_str()) {
                return false;
            }
        }
        if let Some(source) = &self.source {
            if &event.source != source {
                return false;
            }
        }
        true
    }
}

#[derive(Debug, Clone, Default)]
pub struct AuditFilter {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub actions: Vec<String>,
    pub user_id: Option<String>,
    pub resource: Option<String>,
    pub success: Option<bool>,
    pub limit: usize,
    pub offset: usize,
}

impl AuditFilter {
    pub fn matches(&self, event: &AuditEvent) -> bool {
        if let Some(start) = self.start {
            if event.timestamp < start {
                return false;
            }
        }
        if let Some(end) = self.end {
            if event.timestamp > end {
                return false;
            }
        }
        if !self.actions.is_empty() && !self.actions.contains(&event.action) {
            return false;
        }
        if let Some(user_id) = &self.user_id {
            if &event.user_id != user_id {
                return false;
            }
        }
        if let Some(resource) = &self.resource {
            if &event.resource != resource {
                return false;
            }
        }
        if let Some(success) = self.success {
            if event.success != success {
                return false;
            }
        }
        true
    }
}

/// Live metrics the caller feeds into [`monitor`](crate::PolicyManager::monitor_resources)
/// at a cadence it controls.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ResourceMetrics {
    pub memory_usage: u64,
    pub cpu_time_ms: u64,
    pub concurrent_documents: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MonitoringStatus {
    Healthy,
    ViolationsDetected,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceViolation {
    pub kind: String,
    pub observed: u64,
    pub limit: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitoringReport {
    pub policy_id: String,
    pub status: MonitoringStatus,
    pub violations: Vec<ResourceViolation>,
    pub checked_at: DateTime<Utc>,
}
