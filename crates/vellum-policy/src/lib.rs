//! Administrative security policies for Vellum documents.
//!
//! This crate layers a named, inheritable policy system on top of the
//! per-document [`SecurityPolicy`](vellum_core::SecurityPolicy):
//!
//! - **Policy management**: [`PolicyManager`] stores named
//!   [`SystemPolicy`] objects, seeds a restrictive default, refuses
//!   inheritance cycles, and audits every mutation.
//! - **Permission evaluation**: [`PermissionEngine`] decides whether a
//!   WASM module's requested permissions fit under a policy's ceilings,
//!   walking the parent chain when the target policy denies.
//! - **Resource monitoring**: live [`ResourceMetrics`] compared against
//!   a policy's [`ResourceCeilings`], with violations emitted as
//!   security events.
//! - **Event stores**: [`SecurityEventLog`] ("what was detected") and
//!   [`AuditTrail`] ("who did what") with in-memory and append-only
//!   file backends, statistics, and JSON/CSV export.

pub mod error;
pub mod events;
pub mod manager;
pub mod permissions;
pub mod types;

pub use error::PolicyError;
pub use events::{
    AuditTrail, EventStatistics, ExportFormat, FileEventLog, MemoryEventLog, SecurityEventLog,
};
pub use manager::{PolicyManager, PolicyManagerConfig, DEFAULT_POLICY_ID};
pub use permissions::{
    PermissionEngine, PermissionEvaluation, PermissionRequest, PermissionTemplate,
    PermissionWarning,
};
pub use types::{
    AdminControls, AuditEvent, AuditFilter, EventFilter, MonitoringReport, MonitoringStatus,
    ResourceCeilings, ResourceMetrics, ResourceViolation, SecurityEvent, SecurityEventType,
    Severity, SystemPolicy,
};
