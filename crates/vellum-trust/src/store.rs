//! Certificate trust store: root/intermediate pools, revocation, and
//! chain validation.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use rsa::pkcs8::{DecodePublicKey, EncodePublicKey, LineEnding};
use rsa::{RsaPrivateKey, RsaPublicKey};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::engine::SignatureEngine;
use crate::error::TrustError;

const MAX_CHAIN_DEPTH: usize = 8;

/// An X.509-style certificate: identity, validity window, SPKI public
/// key, and an issuer signature over the canonical signing input.
/// Self-signed roots carry `issuer == subject`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Certificate {
    pub serial_number: String,
    pub subject: String,
    pub issuer: String,
    pub not_before: DateTime<Utc>,
    pub not_after: DateTime<Utc>,
    pub public_key_pem: String,
    pub signature: String,
}

impl Certificate {
    /// The byte form the issuer signs.
    pub fn signing_input(&self) -> Vec<u8> {
        format!(
            "serial:{}|subject:{}|issuer:{}|not_before:{}|not_after:{}|key:{}",
            self.serial_number,
            self.subject,
            self.issuer,
            self.not_before.to_rfc3339(),
            self.not_after.to_rfc3339(),
            self.public_key_pem,
        )
        .into_bytes()
    }

    /// Issues a certificate for `subject_key`, signed by `issuer_key`.
    #[allow(clippy::too_many_arguments)]
    pub fn issue(
        engine: &SignatureEngine,
        serial_number: &str,
        subject: &str,
        issuer: &str,
        not_before: DateTime<Utc>,
        not_after: DateTime<Utc>,
        subject_key: &RsaPublicKey,
        issuer_key: &RsaPrivateKey,
    ) -> Result<Self, TrustError> {
        let mut certificate = Self {
            serial_number: serial_number.to_string(),
            subject: subject.to_string(),
            issuer: issuer.to_string(),
            not_before,
            not_after,
            public_key_pem: subject_key.to_public_key_pem(LineEnding::LF)?,
            signature: String::new(),
        };
        certificate.signature = engine.sign_data(&certificate.signing_input(), issuer_key)?;
        Ok(certificate)
    }

    /// Issues a self-signed root certificate.
    pub fn self_signed(
        engine: &SignatureEngine,
        serial_number: &str,
        subject: &str,
        not_before: DateTime<Utc>,
        not_after: DateTime<Utc>,
        key: &RsaPrivateKey,
    ) -> Result<Self, TrustError> {
        let public = RsaPublicKey::from(key);
        Self::issue(
            engine,
            serial_number,
            subject,
            subject,
            not_before,
            not_after,
            &public,
            key,
        )
    }

    pub fn public_key(&self) -> Result<RsaPublicKey, TrustError> {
        Ok(RsaPublicKey::from_public_key_pem(&self.public_key_pem)?)
    }

    pub fn is_within_validity(&self, at: DateTime<Utc>) -> bool {
        self.not_before <= at && at <= self.not_after
    }

    pub fn is_self_signed(&self) -> bool {
        self.subject == self.issuer
    }
}

/// Process-wide set of trusted signers, constructed explicitly and
/// threaded through by callers. Mutation is additive: certificates are
/// added or revoked, never silently cleared.
#[derive(Debug, Default)]
pub struct TrustStore {
    roots: HashMap<String, Certificate>,
    intermediates: HashMap<String, Certificate>,
    trusted_leaves: HashMap<String, Certificate>,
    revoked: HashSet<String>,
}

impl TrustStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_root(&mut self, certificate: Certificate) {
        info!(subject = %certificate.subject, serial = %certificate.serial_number, "added root certificate");
        self.roots.insert(certificate.subject.clone(), certificate);
    }

    pub fn add_intermediate(&mut self, certificate: Certificate) {
        self.intermediates
            .insert(certificate.subject.clone(), certificate);
    }

    /// Trusts a leaf certificate directly, bypassing path construction.
    pub fn add_trusted_certificate(&mut self, certificate: Certificate) {
        self.trusted_leaves
            .insert(certificate.serial_number.clone(), certificate);
    }

    pub fn revoke(&mut self, serial_number: &str) {
        info!(serial = %serial_number, "certificate revoked");
        self.revoked.insert(serial_number.to_string());
    }

    pub fn is_revoked(&self, serial_number: &str) -> bool {
        self.revoked.contains(serial_number)
    }

    /// Validates a certificate: revocation, validity window, then a path
    /// to a trusted root (or direct leaf trust). Order matters — a
    /// revoked certificate is rejected even when otherwise perfect.
    pub fn validate_chain(
        &self,
        engine: &SignatureEngine,
        certificate: &Certificate,
        at: DateTime<Utc>,
    ) -> Result<(), TrustError> {
        if self.is_revoked(&certificate.serial_number) {
            return Err(TrustError::CertificateRevoked {
                serial: certificate.serial_number.clone(),
            });
        }
        if !certificate.is_within_validity(at) {
            return Err(TrustError::CertificateExpired {
                serial: certificate.serial_number.clone(),
            });
        }
        if self.trusted_leaves.contains_key(&certificate.serial_number) {
            return Ok(());
        }

        let mut current = certificate.clone();
        for _ in 0..MAX_CHAIN_DEPTH {
            let issuer = if let Some(root) = self.roots.get(&current.issuer) {
                root
            } else if let Some(intermediate) = self.intermediates.get(&current.issuer) {
                intermediate
            } else {
                return Err(TrustError::UntrustedCertificate {
                    serial: certificate.serial_number.clone(),
                });
            };

            if self.is_revoked(&issuer.serial_number) {
                return Err(TrustError::CertificateRevoked {
                    serial: issuer.serial_number.clone(),
                });
            }
            if !issuer.is_within_validity(at) {
                return Err(TrustError::CertificateExpired {
                    serial: issuer.serial_number.clone(),
                });
            }

            let issuer_key = issuer.public_key()?;
            let signed = engine.verify_data(
                &current.signing_input(),
                &current.signature,
                &issuer_key,
            )?;
            if !signed {
                return Err(TrustError::UntrustedCertificate {
                    serial: certificate.serial_number.clone(),
                });
            }

            if issuer.is_self_signed() && self.roots.contains_key(&issuer.subject) {
                return Ok(());
            }
            current = issuer.clone();
        }

        Err(TrustError::UntrustedCertificate {
            serial: certificate.serial_number.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    struct Pki {
        engine: SignatureEngine,
        store: TrustStore,
        leaf: Certificate,
        leaf_key: RsaPrivateKey,
    }

    fn build_pki() -> Pki {
        let engine = SignatureEngine::new();
        let now = Utc::now();
        let (root_key, _) = engine.generate_key_pair(2048).unwrap();
        let root = Certificate::self_signed(
            &engine,
            "root-1",
            "Vellum Root CA",
            now - Duration::days(1),
            now + Duration::days(365),
            &root_key,
        )
        .unwrap();

        let (leaf_key, leaf_public) = engine.generate_key_pair(2048).unwrap();
        let leaf = Certificate::issue(
            &engine,
            "leaf-1",
            "Publisher",
            "Vellum Root CA",
            now - Duration::days(1),
            now + Duration::days(30),
            &leaf_public,
            &root_key,
        )
        .unwrap();

        let mut store = TrustStore::new();
        store.add_root(root);
        Pki {
            engine,
            store,
            leaf,
            leaf_key,
        }
    }

    #[test]
    fn valid_chain_passes() {
        let pki = build_pki();
        pki.store
            .validate_chain(&pki.engine, &pki.leaf, Utc::now())
            .unwrap();
    }

    #[test]
    fn revocation_beats_everything_else() {
        let mut pki = build_pki();
        pki.store.revoke("leaf-1");
        assert!(matches!(
            pki.store.validate_chain(&pki.engine, &pki.leaf, Utc::now()),
            Err(TrustError::CertificateRevoked { .. })
        ));
    }

    #[test]
    fn expired_certificate_is_rejected() {
        let pki = build_pki();
        let future = Utc::now() + Duration::days(60);
        assert!(matches!(
            pki.store.validate_chain(&pki.engine, &pki.leaf, future),
            Err(TrustError::CertificateExpired { .. })
        ));
    }

    #[test]
    fn certificate_without_a_known_issuer_is_untrusted() {
        let pki = build_pki();
        let engine = SignatureEngine::new();
        let (rogue_key, rogue_public) = engine.generate_key_pair(2048).unwrap();
        let now = Utc::now();
        let rogue = Certificate::issue(
            &engine,
            "rogue-1",
            "Rogue",
            "Unknown CA",
            now - Duration::days(1),
            now + Duration::days(1),
            &rogue_public,
            &rogue_key,
        )
        .unwrap();
        assert!(matches!(
            pki.store.validate_chain(&pki.engine, &rogue, now),
            Err(TrustError::UntrustedCertificate { .. })
        ));
    }

    #[test]
    fn forged_issuer_signature_is_untrusted() {
        let pki = build_pki();
        let mut forged = pki.leaf.clone();
        forged.subject = "Impostor".into();
        assert!(matches!(
            pki.store.validate_chain(&pki.engine, &forged, Utc::now()),
            Err(TrustError::UntrustedCertificate { .. })
        ));
    }

    #[test]
    fn directly_trusted_leaf_needs_no_path() {
        let engine = SignatureEngine::new();
        let now = Utc::now();
        let (key, _) = engine.generate_key_pair(2048).unwrap();
        let cert = Certificate::self_signed(
            &engine,
            "standalone-1",
            "Standalone Publisher",
            now - Duration::days(1),
            now + Duration::days(1),
            &key,
        )
        .unwrap();

        let mut store = TrustStore::new();
        store.add_trusted_certificate(cert.clone());
        store.validate_chain(&engine, &cert, now).unwrap();
    }

    #[test]
    fn leaf_signing_still_works() {
        // The leaf key issued by the PKI can sign payloads end to end.
        let pki = build_pki();
        let signature = pki.engine.sign_data(b"module", &pki.leaf_key).unwrap();
        let public = pki.leaf.public_key().unwrap();
        assert!(pki.engine.verify_data(b"module", &signature, &public).unwrap());
    }
}
