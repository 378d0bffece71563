use std::fmt;

use thiserror::Error;

/// Why a load was refused. The kind is the stable, matchable part; the
/// message carries the specifics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadErrorKind {
    /// Wrong extension or unreadable input.
    InvalidFile,
    /// The container could not be extracted into a document.
    Corrupted,
    /// A format or feature this loader does not handle.
    Unsupported,
    /// Validation or signature verification failed under strict mode.
    Security,
    /// The load pipeline exceeded the configured deadline.
    Timeout,
    /// A configured size limit was exceeded.
    ResourceLimit,
}

impl fmt::Display for LoadErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::InvalidFile => "invalid file",
            Self::Corrupted => "corrupted",
            Self::Unsupported => "unsupported",
            Self::Security => "security",
            Self::Timeout => "timeout",
            Self::ResourceLimit => "resource limit",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Error)]
#[error("{kind}: {message}")]
pub struct LoadError {
    pub kind: LoadErrorKind,
    pub message: String,
}

impl LoadError {
    pub fn new(kind: LoadErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn invalid_file(message: impl Into<String>) -> Self {
        Self::new(LoadErrorKind::InvalidFile, message)
    }

    pub fn corrupted(message: impl Into<String>) -> Self {
        Self::new(LoadErrorKind::Corrupted, message)
    }

    pub fn unsupported(message: impl Into<String>) -> Self {
        Self::new(LoadErrorKind::Unsupported, message)
    }

    pub fn security(message: impl Into<String>) -> Self {
        Self::new(LoadErrorKind::Security, message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(LoadErrorKind::Timeout, message)
    }

    pub fn resource_limit(message: impl Into<String>) -> Self {
        Self::new(LoadErrorKind::ResourceLimit, message)
    }
}

impl From<std::io::Error> for LoadError {
    fn from(e: std::io::Error) -> Self {
        Self::invalid_file(e.to_string())
    }
}
