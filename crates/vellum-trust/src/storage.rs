//! Filesystem persistence for signature bundles.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;
use vellum_core::SignatureBundle;

use crate::error::TrustError;

/// Stores each document's bundle as `<document_id>_signatures.json`
/// under a fixed directory.
#[derive(Debug)]
pub struct SignatureStorage {
    dir: PathBuf,
}

impl SignatureStorage {
    pub fn new(dir: impl AsRef<Path>) -> Result<Self, TrustError> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    fn bundle_path(&self, document_id: &str) -> PathBuf {
        self.dir.join(format!("{document_id}_signatures.json"))
    }

    pub fn save(&self, document_id: &str, bundle: &SignatureBundle) -> Result<(), TrustError> {
        let json = serde_json::to_string_pretty(bundle)?;
        fs::write(self.bundle_path(document_id), json)?;
        debug!(document_id = %document_id, "signature bundle saved");
        Ok(())
    }

    pub fn load(&self, document_id: &str) -> Result<SignatureBundle, TrustError> {
        let path = self.bundle_path(document_id);
        if !path.exists() {
            return Err(TrustError::BundleNotFound(document_id.to_string()));
        }
        let json = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&json)?)
    }

    pub fn delete(&self, document_id: &str) -> Result<(), TrustError> {
        let path = self.bundle_path(document_id);
        if path.exists() {
            fs::remove_file(path)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn bundle() -> SignatureBundle {
        let mut wasm_signatures = HashMap::new();
        wasm_signatures.insert("chart".to_string(), "c2ln".to_string());
        SignatureBundle {
            content_signature: "Y29udGVudA==".to_string(),
            manifest_signature: "bWFuaWZlc3Q=".to_string(),
            wasm_signatures,
        }
    }

    #[test]
    fn save_load_delete_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let storage = SignatureStorage::new(dir.path()).unwrap();

        storage.save("report-2026", &bundle()).unwrap();
        let loaded = storage.load("report-2026").unwrap();
        assert_eq!(loaded.manifest_signature, "bWFuaWZlc3Q=");
        assert_eq!(loaded.wasm_signatures.len(), 1);

        storage.delete("report-2026").unwrap();
        assert!(matches!(
            storage.load("report-2026"),
            Err(TrustError::BundleNotFound(_))
        ));
    }

    #[test]
    fn missing_bundle_is_a_distinct_error() {
        let dir = tempfile::tempdir().unwrap();
        let storage = SignatureStorage::new(dir.path()).unwrap();
        assert!(matches!(
            storage.load("never-saved"),
            Err(TrustError::BundleNotFound(_))
        ));
    }
}
