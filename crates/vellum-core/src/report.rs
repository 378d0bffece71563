//! Uniform mixed success/failure signaling.
//!
//! Validators, verifiers, and evaluators report expected negative outcomes
//! as values: a report with hard errors (inadmissible) and advisory
//! warnings (returned alongside success, never blocking on their own).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationReport {
    pub is_valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationReport {
    pub fn new() -> Self {
        Self {
            is_valid: true,
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    /// Records a hard error. Hard errors and only hard errors make a
    /// document inadmissible.
    pub fn add_error(&mut self, error: impl Into<String>) {
        self.is_valid = false;
        self.errors.push(error.into());
    }

    pub fn add_warning(&mut self, warning: impl Into<String>) {
        self.warnings.push(warning.into());
    }

    /// Folds another report into this one.
    pub fn merge(&mut self, other: ValidationReport) {
        self.is_valid = self.is_valid && other.is_valid;
        self.errors.extend(other.errors);
        self.warnings.extend(other.warnings);
    }
}

impl Default for ValidationReport {
    fn default() -> Self {
        Self::new()
    }
}

/// Security posture of a successfully loaded document, surfaced to
/// callers alongside the document itself.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SecuritySummary {
    pub signatures_verified: bool,
    pub integrity_checked: bool,
    pub validation_passed: bool,
    #[serde(default)]
    pub warnings: Vec<String>,
}
