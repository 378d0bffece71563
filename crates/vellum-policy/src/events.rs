//! Append-only event stores: security events and the audit trail.
//!
//! Two separate streams by design — the audit trail records who did
//! what, the security event stream records what was detected. Both are
//! append-only, filterable, and exportable from the same store.

use std::collections::{BTreeMap, HashMap};
use std::fs::OpenOptions;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, RwLock};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::PolicyError;
use crate::types::{
    AuditEvent, AuditFilter, EventFilter, SecurityEvent, SecurityEventType, Severity,
};

pub trait SecurityEventLog: Send + Sync {
    fn record(&self, event: SecurityEvent) -> Result<(), PolicyError>;
    fn query(&self, filter: &EventFilter) -> Result<Vec<SecurityEvent>, PolicyError>;

    fn statistics(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<EventStatistics, PolicyError> {
        let events = self.query(&EventFilter {
            start: Some(start),
            end: Some(end),
            ..Default::default()
        })?;
        Ok(EventStatistics::from_events(&events))
    }
}

pub trait AuditTrail: Send + Sync {
    fn record(&self, event: AuditEvent) -> Result<(), PolicyError>;
    fn query(&self, filter: &AuditFilter) -> Result<Vec<AuditEvent>, PolicyError>;

    /// Exports the trail for a time range as structured JSON or flat CSV.
    fn export(
        &self,
        format: ExportFormat,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<u8>, PolicyError> {
        let events = self.query(&AuditFilter {
            start: Some(start),
            end: Some(end),
            ..Default::default()
        })?;
        match format {
            ExportFormat::Json => Ok(serde_json::to_vec_pretty(&events)?),
            ExportFormat::Csv => Ok(audit_csv(&events)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Json,
    Csv,
}

/// Aggregate view over a queried window of security events.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventStatistics {
    pub total_events: usize,
    pub by_type: HashMap<SecurityEventType, usize>,
    pub by_severity: HashMap<Severity, usize>,
    /// Counts bucketed by `YYYY-MM-DD HH` in UTC.
    pub by_hour: BTreeMap<String, usize>,
    pub top_sources: Vec<(String, usize)>,
    pub top_users: Vec<(String, usize)>,
}

impl EventStatistics {
    pub fn from_events(events: &[SecurityEvent]) -> Self {
        let mut by_type = HashMap::new();
        let mut by_severity = HashMap::new();
        let mut by_hour = BTreeMap::new();
        let mut sources: HashMap<String, usize> = HashMap::new();
        let mut users: HashMap<String, usize> = HashMap::new();

        for event in events {
            *by_type.entry(event.event_type).or_default() += 1;
            *by_severity.entry(event.severity).or_default() += 1;
            *by_hour
                .entry(event.timestamp.format("%Y-%m-%d %H").to_string())
                .or_default() += 1;
            *sources.entry(event.source.clone()).or_default() += 1;
            if let Some(user) = &event.user_id {
                *users.entry(user.clone()).or_default() += 1;
            }
        }

        let mut top_sources: Vec<_> = sources.into_iter().collect();
        top_sources.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
        let mut top_users: Vec<_> = users.into_iter().collect();
        top_users.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));

        Self {
            total_events: events.len(),
            by_type,
            by_severity,
            by_hour,
            top_sources,
            top_users,
        }
    }
}

fn audit_csv(events: &[AuditEvent]) -> Vec<u8> {
    let mut csv = String::from("timestamp,action,resource,user_id,success,details\n");
    for event in events {
        let details = serde_json::to_string(&event.details).unwrap_or_default();
        csv.push_str(&format!(
            "{},{},{},{},{},\"{}\"\n",
            event.timestamp.to_rfc3339(),
            event.action,
            event.resource,
            event.user_id,
            event.success,
            details.replace('"', "\"\""),
        ));
    }
    csv.into_bytes()
}

fn paginate<T>(mut items: Vec<T>, offset: usize, limit: usize) -> Vec<T> {
    if offset > 0 {
        if offset >= items.len() {
            return Vec::new();
        }
        items.drain(..offset);
    }
    if limit > 0 && items.len() > limit {
        items.truncate(limit);
    }
    items
}

/// In-memory append-only store; the default for embedded use and tests.
#[derive(Debug, Default)]
pub struct MemoryEventLog {
    security: RwLock<Vec<SecurityEvent>>,
    audit: RwLock<Vec<AuditEvent>>,
}

impl MemoryEventLog {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SecurityEventLog for MemoryEventLog {
    fn record(&self, event: SecurityEvent) -> Result<(), PolicyError> {
        self.security
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .push(event);
        Ok(())
    }

    fn query(&self, filter: &EventFilter) -> Result<Vec<SecurityEvent>, PolicyError> {
        let events = self.security.read().unwrap_or_else(|e| e.into_inner());
        let matched: Vec<_> = events.iter().filter(|e| filter.matches(e)).cloned().collect();
        Ok(paginate(matched, filter.offset, filter.limit))
    }
}

impl AuditTrail for MemoryEventLog {
    fn record(&self, event: AuditEvent) -> Result<(), PolicyError> {
        self.audit
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .push(event);
        Ok(())
    }

    fn query(&self, filter: &AuditFilter) -> Result<Vec<AuditEvent>, PolicyError> {
        let events = self.audit.read().unwrap_or_else(|e| e.into_inner());
        let matched: Vec<_> = events.iter().filter(|e| filter.matches(e)).cloned().collect();
        Ok(paginate(matched, filter.offset, filter.limit))
    }
}

/// JSON-lines file store, one event per line, opened in append mode on
/// every write. Malformed lines are skipped on read rather than
/// poisoning the whole log.
#[derive(Debug)]
pub struct FileEventLog {
    security_path: PathBuf,
    audit_path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileEventLog {
    pub fn new(
        security_path: impl AsRef<Path>,
        audit_path: impl AsRef<Path>,
    ) -> Result<Self, PolicyError> {
        let security_path = security_path.as_ref().to_path_buf();
        let audit_path = audit_path.as_ref().to_path_buf();
        for path in [&security_path, &audit_path] {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
        }
        Ok(Self {
            security_path,
            audit_path,
            write_lock: Mutex::new(()),
        })
    }

    fn append_line(&self, path: &Path, line: &str) -> Result<(), PolicyError> {
        let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());
        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        writeln!(file, "{line}")?;
        Ok(())
    }

    fn read_lines<T: for<'de> Deserialize<'de>>(&self, path: &Path) -> Result<Vec<T>, PolicyError> {
        if !path.exists() {
            return Ok(Vec::new());
        }
        let file = std::fs::File::open(path)?;
        let reader = BufReader::new(file);
        let mut items = Vec::new();
        for line in reader.lines() {
            let line = line?;
            if let Ok(item) = serde_json::from_str(&line) {
                items.push(item);
            }
        }
        Ok(items)
    }
}

impl SecurityEventLog for FileEventLog {
    fn record(&self, event: SecurityEvent) -> Result<(), PolicyError> {
        self.append_line(&self.security_path, &serde_json::to_string(&event)?)
    }

    fn query(&self, filter: &EventFilter) -> Result<Vec<SecurityEvent>, PolicyError> {
        let events: Vec<SecurityEvent> = self.read_lines(&self.security_path)?;
        let matched: Vec<_> = events.into_iter().filter(|e| filter.matches(e)).collect();
        Ok(paginate(matched, filter.offset, filter.limit))
    }
}

impl AuditTrail for FileEventLog {
    fn record(&self, event: AuditEvent) -> Result<(), PolicyError> {
        self.append_line(&self.audit_path, &serde_json::to_string(&event)?)
    }

    fn query(&self, filter: &AuditFilter) -> Result<Vec<AuditEvent>, PolicyError> {
        let events: Vec<AuditEvent> = self.read_lines(&self.audit_path)?;
        let matched: Vec<_> = events.into_iter().filter(|e| filter.matches(e)).collect();
        Ok(paginate(matched, filter.offset, filter.limit))
    }
}
