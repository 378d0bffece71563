use thiserror::Error;

#[derive(Error, Debug)]
pub enum ManifestError {
    #[error("manifest could not be parsed: {0}")]
    Parse(#[from] serde_json::Error),
}
