//! Certificate-aware signing and module admission.
//!
//! Composes the base [`SignatureEngine`] with the [`TrustStore`]: a
//! module is admitted only when its signature is valid, the signer's
//! certificate chains to trust, and the binary itself is sane. Every
//! attempt — success or failure — is reported to the audit sink.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rsa::RsaPrivateKey;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use vellum_core::{Document, SignatureBundle};

use crate::engine::{SignatureEngine, VerificationReport};
use crate::error::TrustError;
use crate::store::{Certificate, TrustStore};

const MAX_WASM_MODULE_SIZE: usize = 10 * 1024 * 1024;
const WASM_MAGIC: [u8; 4] = [0x00, 0x61, 0x73, 0x6d];
const WASM_SUPPORTED_VERSION: u32 = 1;

/// Where signing/verification audit records go. Callers supply the
/// implementation: an in-memory recorder in tests, or an adapter onto
/// whatever audit store the embedding application keeps.
pub trait AuditSink: Send + Sync {
    fn record(&self, event: SignatureAuditEvent);
}

/// One signing or verification attempt, tied to the certificate used.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignatureAuditEvent {
    pub action: String,
    pub certificate_subject: String,
    pub certificate_serial: String,
    pub success: bool,
    pub detail: String,
    pub timestamp: DateTime<Utc>,
}

/// Aggregate result of certificate-aware document verification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnhancedVerification {
    pub report: VerificationReport,
    pub certificate_valid: bool,
    pub certificate_error: Option<String>,
}

/// Decision on one WebAssembly module. `valid` requires the signature,
/// the certificate, and every named security check to pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModuleAdmission {
    pub module: String,
    pub valid: bool,
    pub signature_valid: bool,
    pub certificate_valid: bool,
    pub security_checks: HashMap<String, bool>,
}

pub struct EnhancedSigner<'a> {
    engine: SignatureEngine,
    store: &'a TrustStore,
    audit: &'a dyn AuditSink,
}

impl<'a> EnhancedSigner<'a> {
    pub fn new(store: &'a TrustStore, audit: &'a dyn AuditSink) -> Self {
        Self {
            engine: SignatureEngine::new(),
            store,
            audit,
        }
    }

    fn audit_event(&self, action: &str, certificate: &Certificate, success: bool, detail: &str) {
        self.audit.record(SignatureAuditEvent {
            action: action.to_string(),
            certificate_subject: certificate.subject.clone(),
            certificate_serial: certificate.serial_number.clone(),
            success,
            detail: detail.to_string(),
            timestamp: Utc::now(),
        });
    }

    /// Signs a document after confirming the signer's certificate chains
    /// to trust.
    pub fn sign_document(
        &self,
        document: &Document,
        private: &RsaPrivateKey,
        certificate: &Certificate,
    ) -> Result<SignatureBundle, TrustError> {
        if let Err(e) = self
            .store
            .validate_chain(&self.engine, certificate, Utc::now())
        {
            self.audit_event("document_signed", certificate, false, &e.to_string());
            return Err(e);
        }
        let bundle = self.engine.sign_document(document, private)?;
        self.audit_event("document_signed", certificate, true, "");
        info!(subject = %certificate.subject, "document signed with certificate");
        Ok(bundle)
    }

    /// Verifies a document with the public key carried by the signer's
    /// certificate, reporting certificate problems alongside signature
    /// results rather than aborting on them.
    pub fn verify_document(
        &self,
        document: &Document,
        certificate: &Certificate,
    ) -> Result<EnhancedVerification, TrustError> {
        let (certificate_valid, certificate_error) = match self
            .store
            .validate_chain(&self.engine, certificate, Utc::now())
        {
            Ok(()) => (true, None),
            Err(e) => (false, Some(e.to_string())),
        };

        let public = certificate.public_key()?;
        let mut report = self.engine.verify_document(document, &public);
        if let Some(error) = &certificate_error {
            report.valid = false;
            report.errors.push(format!("certificate: {error}"));
        }

        self.audit_event(
            "document_verified",
            certificate,
            report.valid,
            &report.errors.join("; "),
        );
        Ok(EnhancedVerification {
            report,
            certificate_valid,
            certificate_error,
        })
    }

    /// Admission decision for one module: signature ∧ certificate ∧
    /// binary sanity (magic, version, size, signer not revoked).
    pub fn admit_module(
        &self,
        name: &str,
        bytes: &[u8],
        signature_b64: &str,
        certificate: &Certificate,
    ) -> Result<ModuleAdmission, TrustError> {
        let mut checks = HashMap::new();

        let magic_valid = bytes.len() >= 8 && bytes[..4] == WASM_MAGIC;
        checks.insert("wasm_magic_valid".to_string(), magic_valid);

        let version_supported = bytes.len() >= 8
            && u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]])
                == WASM_SUPPORTED_VERSION;
        checks.insert("wasm_version_supported".to_string(), version_supported);

        let size_acceptable = bytes.len() <= MAX_WASM_MODULE_SIZE;
        checks.insert("module_size_acceptable".to_string(), size_acceptable);

        let not_revoked = !self.store.is_revoked(&certificate.serial_number);
        checks.insert("certificate_not_revoked".to_string(), not_revoked);

        let certificate_valid = self
            .store
            .validate_chain(&self.engine, certificate, Utc::now())
            .is_ok();

        let public = certificate.public_key()?;
        let signature_valid = self.engine.verify_data(bytes, signature_b64, &public)?;

        let valid = signature_valid && certificate_valid && checks.values().all(|v| *v);
        if !valid {
            warn!(module = %name, signature_valid, certificate_valid, "module admission denied");
        }
        self.audit_event(
            "module_admission",
            certificate,
            valid,
            &format!("module={name}"),
        );

        Ok(ModuleAdmission {
            module: name.to_string(),
            valid,
            signature_valid,
            certificate_valid,
            security_checks: checks,
        })
    }
}
