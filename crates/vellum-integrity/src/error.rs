use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum IntegrityError {
    #[error("failed to read {path}: {source}")]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to walk directory {path}: {reason}")]
    DirectoryWalk { path: PathBuf, reason: String },

    #[error("path {0} is not valid unicode")]
    NonUnicodePath(PathBuf),
}
