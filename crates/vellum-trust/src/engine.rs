//! RSA PKCS#1 v1.5 signing and verification over SHA-256 digests.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use chrono::{DateTime, Utc};
use rsa::pkcs1v15::{Signature, SigningKey, VerifyingKey};
use rsa::pkcs8::{
    DecodePrivateKey, DecodePublicKey, EncodePrivateKey, EncodePublicKey, LineEnding,
};
use rsa::signature::{SignatureEncoding, Signer, Verifier};
use rsa::{RsaPrivateKey, RsaPublicKey};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use tracing::{debug, info};
use vellum_core::{Document, Manifest, SignatureBundle};

use crate::error::TrustError;

/// Smallest modulus the engine will generate. Requests below it are
/// silently upgraded.
pub const MIN_KEY_BITS: usize = 2048;

/// Signs and verifies the three granularities of a container: manifest,
/// content, and each embedded module's raw bytes. Signatures travel
/// base64-encoded.
///
/// A failed cryptographic check is `Ok(false)`; malformed encodings
/// (bad base64, wrong key format) raise [`TrustError`].
#[derive(Debug, Default)]
pub struct SignatureEngine;

/// Aggregated result of verifying a whole document. Missing signatures
/// are reported distinctly from invalid ones, and either makes the
/// corresponding granularity (and the whole report) invalid.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationReport {
    pub valid: bool,
    pub manifest_valid: bool,
    pub content_valid: bool,
    pub wasm_modules_valid: HashMap<String, bool>,
    pub errors: Vec<String>,
    pub verified_at: DateTime<Utc>,
}

impl SignatureEngine {
    pub fn new() -> Self {
        Self
    }

    /// Generates an RSA key pair. `bits` below [`MIN_KEY_BITS`] is
    /// upgraded without error.
    pub fn generate_key_pair(
        &self,
        bits: usize,
    ) -> Result<(RsaPrivateKey, RsaPublicKey), TrustError> {
        let bits = bits.max(MIN_KEY_BITS);
        let mut rng = rand::thread_rng();
        let private = RsaPrivateKey::new(&mut rng, bits)?;
        let public = RsaPublicKey::from(&private);
        info!(bits, "generated signing key pair");
        Ok((private, public))
    }

    /// Persists a key pair as PKCS#8 (private) and SPKI (public) PEM.
    pub fn save_key_pair(
        &self,
        private: &RsaPrivateKey,
        public: &RsaPublicKey,
        private_path: impl AsRef<Path>,
        public_path: impl AsRef<Path>,
    ) -> Result<(), TrustError> {
        let private_pem = private.to_pkcs8_pem(LineEnding::LF)?;
        let public_pem = public.to_public_key_pem(LineEnding::LF)?;
        fs::write(private_path, private_pem.as_bytes())?;
        fs::write(public_path, public_pem.as_bytes())?;
        Ok(())
    }

    pub fn load_private_key(&self, path: impl AsRef<Path>) -> Result<RsaPrivateKey, TrustError> {
        let pem = fs::read_to_string(path)?;
        Ok(RsaPrivateKey::from_pkcs8_pem(&pem)?)
    }

    pub fn load_public_key(&self, path: impl AsRef<Path>) -> Result<RsaPublicKey, TrustError> {
        let pem = fs::read_to_string(path)?;
        Ok(RsaPublicKey::from_public_key_pem(&pem)?)
    }

    /// Signs raw bytes, returning a base64-encoded signature.
    pub fn sign_data(&self, data: &[u8], private: &RsaPrivateKey) -> Result<String, TrustError> {
        let signing_key = SigningKey::<Sha256>::new(private.clone());
        let signature = signing_key
            .try_sign(data)
            .map_err(|e| TrustError::MalformedSignature(e.to_string()))?;
        Ok(BASE64.encode(signature.to_bytes()))
    }

    /// Verifies a base64-encoded signature over raw bytes.
    ///
    /// Crypto mismatch is `Ok(false)`; undecodable input is an error.
    pub fn verify_data(
        &self,
        data: &[u8],
        signature_b64: &str,
        public: &RsaPublicKey,
    ) -> Result<bool, TrustError> {
        let raw = BASE64
            .decode(signature_b64)
            .map_err(|e| TrustError::MalformedSignature(e.to_string()))?;
        let signature = Signature::try_from(raw.as_slice())
            .map_err(|e| TrustError::MalformedSignature(e.to_string()))?;
        let verifying_key = VerifyingKey::<Sha256>::new(public.clone());
        Ok(verifying_key.verify(data, &signature).is_ok())
    }

    /// Canonical byte form of the signed manifest field subset. Content is
    /// deliberately excluded; it is signed separately.
    pub fn canonical_manifest_bytes(manifest: &Manifest) -> Vec<u8> {
        format!(
            "version:{}|title:{}|author:{}|created:{}|modified:{}",
            manifest.version,
            manifest.metadata.title,
            manifest.metadata.author,
            manifest.metadata.created.to_rfc3339(),
            manifest.metadata.modified.to_rfc3339(),
        )
        .into_bytes()
    }

    /// Canonical byte form of the signed document content.
    pub fn canonical_content_bytes(document: &Document) -> Vec<u8> {
        let content = &document.content;
        let mut bytes = Vec::with_capacity(
            content.html.len()
                + content.css.len()
                + content.interactive_spec.len()
                + content.static_fallback.len(),
        );
        bytes.extend_from_slice(content.html.as_bytes());
        bytes.extend_from_slice(content.css.as_bytes());
        bytes.extend_from_slice(content.interactive_spec.as_bytes());
        bytes.extend_from_slice(content.static_fallback.as_bytes());
        bytes
    }

    /// Signs manifest, content, and every embedded module.
    pub fn sign_document(
        &self,
        document: &Document,
        private: &RsaPrivateKey,
    ) -> Result<SignatureBundle, TrustError> {
        let manifest_signature =
            self.sign_data(&Self::canonical_manifest_bytes(&document.manifest), private)?;
        let content_signature =
            self.sign_data(&Self::canonical_content_bytes(document), private)?;

        let mut wasm_signatures = HashMap::new();
        for (name, bytes) in &document.wasm_modules {
            wasm_signatures.insert(name.clone(), self.sign_data(bytes, private)?);
        }
        debug!(modules = wasm_signatures.len(), "document signed");

        Ok(SignatureBundle {
            content_signature,
            manifest_signature,
            wasm_signatures,
        })
    }

    /// Verifies all three granularities against the bundle the document
    /// carries. Any missing signature is reported as such and counts as
    /// invalid; malformed encodings are also folded into the report so a
    /// tampered bundle cannot abort verification of the rest.
    pub fn verify_document(&self, document: &Document, public: &RsaPublicKey) -> VerificationReport {
        let mut report = VerificationReport {
            valid: true,
            manifest_valid: false,
            content_valid: false,
            wasm_modules_valid: HashMap::new(),
            errors: Vec::new(),
            verified_at: Utc::now(),
        };
        let bundle = &document.signatures;

        if bundle.manifest_signature.is_empty() {
            report.errors.push("manifest signature is missing".to_string());
        } else {
            match self.verify_data(
                &Self::canonical_manifest_bytes(&document.manifest),
                &bundle.manifest_signature,
                public,
            ) {
                Ok(true) => report.manifest_valid = true,
                Ok(false) => report.errors.push("manifest signature is invalid".to_string()),
                Err(e) => report
                    .errors
                    .push(format!("manifest signature is malformed: {e}")),
            }
        }

        if bundle.content_signature.is_empty() {
            report.errors.push("content signature is missing".to_string());
        } else {
            match self.verify_data(
                &Self::canonical_content_bytes(document),
                &bundle.content_signature,
                public,
            ) {
                Ok(true) => report.content_valid = true,
                Ok(false) => report.errors.push("content signature is invalid".to_string()),
                Err(e) => report
                    .errors
                    .push(format!("content signature is malformed: {e}")),
            }
        }

        for (name, bytes) in &document.wasm_modules {
            let valid = match bundle.wasm_signatures.get(name) {
                None => {
                    report
                        .errors
                        .push(format!("signature for WASM module '{name}' is missing"));
                    false
                }
                Some(signature) => match self.verify_data(bytes, signature, public) {
                    Ok(true) => true,
                    Ok(false) => {
                        report
                            .errors
                            .push(format!("signature for WASM module '{name}' is invalid"));
                        false
                    }
                    Err(e) => {
                        report.errors.push(format!(
                            "signature for WASM module '{name}' is malformed: {e}"
                        ));
                        false
                    }
                },
            };
            report.wasm_modules_valid.insert(name.clone(), valid);
        }

        report.valid = report.manifest_valid
            && report.content_valid
            && report.wasm_modules_valid.values().all(|v| *v);
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rsa::traits::PublicKeyParts;
    use vellum_core::{DocumentContent, DocumentMetadata};

    fn key_pair() -> (RsaPrivateKey, RsaPublicKey) {
        SignatureEngine::new().generate_key_pair(2048).unwrap()
    }

    fn document(title: &str) -> Document {
        Document::new(
            DocumentMetadata {
                title: title.into(),
                author: "author".into(),
                created: Utc::now(),
                modified: Utc::now(),
                description: String::new(),
                version: "1.0.0".into(),
                language: "en".into(),
            },
            DocumentContent {
                html: "<html><body>hello</body></html>".into(),
                css: "body { margin: 0 }".into(),
                ..Default::default()
            },
        )
    }

    #[test]
    fn sign_verify_round_trip() {
        let engine = SignatureEngine::new();
        let (private, public) = key_pair();
        let signature = engine.sign_data(b"payload", &private).unwrap();
        assert!(engine.verify_data(b"payload", &signature, &public).unwrap());
        assert!(!engine.verify_data(b"other", &signature, &public).unwrap());

        let (_, unrelated) = key_pair();
        assert!(!engine.verify_data(b"payload", &signature, &unrelated).unwrap());
    }

    #[test]
    fn malformed_base64_is_an_error_not_a_negative_result() {
        let engine = SignatureEngine::new();
        let (_, public) = key_pair();
        let result = engine.verify_data(b"payload", "@@not-base64@@", &public);
        assert!(matches!(result, Err(TrustError::MalformedSignature(_))));
    }

    #[test]
    fn small_key_request_is_upgraded() {
        let engine = SignatureEngine::new();
        let (private, _) = engine.generate_key_pair(1024).unwrap();
        assert!(private.size() * 8 >= MIN_KEY_BITS);
    }

    #[test]
    fn pem_round_trip() {
        let engine = SignatureEngine::new();
        let (private, public) = key_pair();
        let dir = tempfile::tempdir().unwrap();
        let priv_path = dir.path().join("signer.pem");
        let pub_path = dir.path().join("signer.pub.pem");

        engine
            .save_key_pair(&private, &public, &priv_path, &pub_path)
            .unwrap();
        let loaded_private = engine.load_private_key(&priv_path).unwrap();
        let loaded_public = engine.load_public_key(&pub_path).unwrap();

        let signature = engine.sign_data(b"data", &loaded_private).unwrap();
        assert!(engine.verify_data(b"data", &signature, &loaded_public).unwrap());
    }

    #[test]
    fn document_verification_aggregates_all_granularities() {
        let engine = SignatureEngine::new();
        let (private, public) = key_pair();
        let mut doc = document("Title");
        doc.wasm_modules
            .insert("chart".into(), vec![0x00, 0x61, 0x73, 0x6d, 1, 0, 0, 0]);

        doc.signatures = engine.sign_document(&doc, &private).unwrap();
        let report = engine.verify_document(&doc, &public);
        assert!(report.valid);
        assert!(report.manifest_valid);
        assert!(report.content_valid);
        assert_eq!(report.wasm_modules_valid.get("chart"), Some(&true));
    }

    #[test]
    fn tampered_title_invalidates_manifest_without_erroring() {
        let engine = SignatureEngine::new();
        let (private, public) = key_pair();
        let mut doc = document("T1");
        doc.signatures = engine.sign_document(&doc, &private).unwrap();

        doc.manifest.metadata.title = "T2".into();
        let report = engine.verify_document(&doc, &public);
        assert!(!report.valid);
        assert!(!report.manifest_valid);
        // Content was untouched.
        assert!(report.content_valid);
    }

    #[test]
    fn missing_module_signature_names_exactly_that_module() {
        let engine = SignatureEngine::new();
        let (private, public) = key_pair();
        let mut doc = document("Title");
        doc.wasm_modules
            .insert("signed".into(), vec![0x00, 0x61, 0x73, 0x6d, 1, 0, 0, 0]);
        doc.wasm_modules
            .insert("unsigned".into(), vec![0x00, 0x61, 0x73, 0x6d, 1, 0, 0, 0]);

        doc.signatures = engine.sign_document(&doc, &private).unwrap();
        doc.signatures.wasm_signatures.remove("unsigned");

        let report = engine.verify_document(&doc, &public);
        assert!(!report.valid);
        assert_eq!(report.wasm_modules_valid.get("signed"), Some(&true));
        assert_eq!(report.wasm_modules_valid.get("unsigned"), Some(&false));
        assert!(report
            .errors
            .iter()
            .any(|e| e.contains("'unsigned'") && e.contains("missing")));
        assert!(!report.errors.iter().any(|e| e.contains("'signed'")));
    }
}
