use thiserror::Error;

#[derive(Error, Debug)]
pub enum PolicyError {
    #[error("policy '{0}' not found")]
    PolicyNotFound(String),

    #[error("policy '{0}' already exists")]
    PolicyExists(String),

    #[error("policy '{policy_id}' failed validation: {reason}")]
    ValidationFailed { policy_id: String, reason: String },

    #[error("policy '{0}' would become its own ancestor")]
    InheritanceCycle(String),

    #[error("inheritance chain for '{policy_id}' exceeds maximum depth {max_depth}")]
    DepthExceeded { policy_id: String, max_depth: usize },

    #[error("the default policy cannot be deleted")]
    DefaultPolicyProtected,

    #[error("policy '{0}' still has child policies")]
    PolicyHasChildren(String),

    #[error("unsupported export format '{0}'")]
    UnsupportedExportFormat(String),

    #[error("event store error: {0}")]
    EventStore(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
