//! Flat multi-signer trust: a named set of trusted public keys.

use rsa::pkcs8::DecodePublicKey;
use rsa::RsaPublicKey;
use tracing::debug;

use crate::engine::SignatureEngine;
use crate::error::TrustError;

/// A simple multi-signer trust model without hierarchical CA semantics:
/// verification tries each trusted key in insertion order and succeeds on
/// the first match.
#[derive(Debug, Default)]
pub struct TrustChain {
    keys: Vec<(String, RsaPublicKey)>,
}

impl TrustChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a trusted signer by SPKI PEM. Replaces an existing entry with
    /// the same name.
    pub fn add_trusted_key(&mut self, name: &str, public_key_pem: &str) -> Result<(), TrustError> {
        let key = RsaPublicKey::from_public_key_pem(public_key_pem)?;
        self.keys.retain(|(n, _)| n != name);
        self.keys.push((name.to_string(), key));
        Ok(())
    }

    pub fn remove_trusted_key(&mut self, name: &str) {
        self.keys.retain(|(n, _)| n != name);
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Returns the name of the first trusted key that validates the
    /// signature, or [`TrustError::NoTrustedSignature`] if none does.
    /// Malformed signatures raise before any key is tried.
    pub fn verify(
        &self,
        engine: &SignatureEngine,
        data: &[u8],
        signature_b64: &str,
    ) -> Result<String, TrustError> {
        for (name, key) in &self.keys {
            match engine.verify_data(data, signature_b64, key) {
                Ok(true) => {
                    debug!(signer = %name, "signature matched trusted key");
                    return Ok(name.clone());
                }
                Ok(false) => continue,
                Err(e) => return Err(e),
            }
        }
        Err(TrustError::NoTrustedSignature)
    }
}
