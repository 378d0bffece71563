use thiserror::Error;

/// Failure modes of the trust layer.
///
/// A cryptographically invalid signature is a normal negative result and
/// never appears here; these variants cover malformed input, missing
/// trust anchors, and I/O.
#[derive(Error, Debug)]
pub enum TrustError {
    #[error("key generation failed: {0}")]
    KeyGeneration(#[from] rsa::Error),

    #[error("private key encoding error: {0}")]
    PrivateKeyEncoding(#[from] rsa::pkcs8::Error),

    #[error("public key encoding error: {0}")]
    PublicKeyEncoding(#[from] rsa::pkcs8::spki::Error),

    #[error("malformed signature: {0}")]
    MalformedSignature(String),

    #[error("no trusted signature found")]
    NoTrustedSignature,

    #[error("certificate {serial} is revoked")]
    CertificateRevoked { serial: String },

    #[error("certificate {serial} is outside its validity window")]
    CertificateExpired { serial: String },

    #[error("certificate {serial} does not chain to a trusted root")]
    UntrustedCertificate { serial: String },

    #[error("signature bundle for '{0}' not found")]
    BundleNotFound(String),

    #[error("signature bundle is malformed: {0}")]
    BundleFormat(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
