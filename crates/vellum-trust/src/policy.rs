//! Installation-level requirements on signatures and certificates.

use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use vellum_core::{SignatureBundle, ValidationReport};

use crate::store::Certificate;

/// What an installation demands of incoming signatures, checked after
/// the cryptographic verification itself.
#[derive(Debug, Clone)]
pub struct SignaturePolicy {
    pub require_certificates: bool,
    pub allow_self_signed: bool,
    /// Maximum age of a certificate, measured from `not_before`.
    pub max_certificate_age: Duration,
    /// When non-empty, the certificate's issuer must be listed here.
    pub trusted_issuers: Vec<String>,
}

impl Default for SignaturePolicy {
    fn default() -> Self {
        Self {
            require_certificates: true,
            allow_self_signed: false,
            max_certificate_age: Duration::days(365),
            trusted_issuers: Vec::new(),
        }
    }
}

impl SignaturePolicy {
    /// Checks a bundle and its (optional) certificate against this
    /// policy. Returns findings as a report; cryptographic validity is
    /// out of scope here.
    pub fn check(
        &self,
        bundle: &SignatureBundle,
        certificate: Option<&Certificate>,
    ) -> ValidationReport {
        let mut report = ValidationReport::new();

        if bundle.manifest_signature.is_empty() {
            report.add_error("bundle has no manifest signature");
        }
        if bundle.content_signature.is_empty() {
            report.add_error("bundle has no content signature");
        }

        match certificate {
            None if self.require_certificates => {
                report.add_error("policy requires a signing certificate");
            }
            None => {}
            Some(certificate) => {
                if certificate.is_self_signed() && !self.allow_self_signed {
                    report.add_error(format!(
                        "self-signed certificate '{}' is not allowed",
                        certificate.subject
                    ));
                }
                if Utc::now() - certificate.not_before > self.max_certificate_age {
                    report.add_error(format!(
                        "certificate '{}' exceeds the maximum age",
                        certificate.serial_number
                    ));
                }
                if !self.trusted_issuers.is_empty()
                    && !self.trusted_issuers.contains(&certificate.issuer)
                {
                    report.add_error(format!(
                        "issuer '{}' is not in the trusted issuer list",
                        certificate.issuer
                    ));
                }
            }
        }

        report
    }
}

/// Display-oriented description of a signing key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignatureInfo {
    pub algorithm: String,
    pub key_fingerprint: String,
}

impl SignatureInfo {
    /// Fingerprint is the first 16 hex characters of the SPKI PEM hash.
    pub fn for_public_key_pem(public_key_pem: &str) -> Self {
        let digest = hex::encode(Sha256::digest(public_key_pem.as_bytes()));
        Self {
            algorithm: "RSA-SHA256".to_string(),
            key_fingerprint: digest[..16].to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::SignatureEngine;

    fn bundle() -> SignatureBundle {
        SignatureBundle {
            content_signature: "Y29udGVudA==".into(),
            manifest_signature: "bWFuaWZlc3Q=".into(),
            wasm_signatures: Default::default(),
        }
    }

    fn self_signed() -> Certificate {
        let engine = SignatureEngine::new();
        let (key, _) = engine.generate_key_pair(2048).unwrap();
        Certificate::self_signed(
            &engine,
            "s-1",
            "Self Signer",
            Utc::now() - Duration::days(10),
            Utc::now() + Duration::days(10),
            &key,
        )
        .unwrap()
    }

    #[test]
    fn default_policy_rejects_missing_certificate() {
        let report = SignaturePolicy::default().check(&bundle(), None);
        assert!(!report.is_valid);
    }

    #[test]
    fn self_signed_rejected_unless_allowed() {
        let certificate = self_signed();
        let strict = SignaturePolicy::default().check(&bundle(), Some(&certificate));
        assert!(!strict.is_valid);

        let lenient = SignaturePolicy {
            allow_self_signed: true,
            ..Default::default()
        }
        .check(&bundle(), Some(&certificate));
        assert!(lenient.is_valid, "errors: {:?}", lenient.errors);
    }

    #[test]
    fn old_certificate_is_rejected() {
        let mut certificate = self_signed();
        certificate.not_before = Utc::now() - Duration::days(800);
        let policy = SignaturePolicy {
            allow_self_signed: true,
            ..Default::default()
        };
        let report = policy.check(&bundle(), Some(&certificate));
        assert!(!report.is_valid);
        assert!(report.errors.iter().any(|e| e.contains("maximum age")));
    }

    #[test]
    fn issuer_allowlist_is_enforced() {
        let certificate = self_signed();
        let policy = SignaturePolicy {
            allow_self_signed: true,
            trusted_issuers: vec!["Some Other CA".to_string()],
            ..Default::default()
        };
        let report = policy.check(&bundle(), Some(&certificate));
        assert!(!report.is_valid);
    }

    #[test]
    fn fingerprint_is_stable_and_short() {
        let info = SignatureInfo::for_public_key_pem("-----BEGIN PUBLIC KEY-----");
        assert_eq!(info.algorithm, "RSA-SHA256");
        assert_eq!(info.key_fingerprint.len(), 16);
        let again = SignatureInfo::for_public_key_pem("-----BEGIN PUBLIC KEY-----");
        assert_eq!(info.key_fingerprint, again.key_fingerprint);
    }
}
