//! Error types for the host services.

use scriptbridge_rpc::BridgeError;
use scriptbridge_sandbox::SandboxError;
use scriptbridge_storage::StorageError;
use scriptbridge_types::{ErrorInfo, ExecTarget, Identity};
use thiserror::Error;

/// Result type for host operations.
pub type HostResult<T> = Result<T, HostError>;

#[derive(Debug, Error)]
pub enum HostError {
    #[error("config error: {0}")]
    Config(String),

    #[error("access denied: {identity} may not run code on {target}")]
    AccessDenied {
        identity: Identity,
        target: ExecTarget,
    },

    #[error("file not found: {0}")]
    FileNotFound(String),

    #[error("no {0} endpoint attached")]
    NotAttached(&'static str),

    #[error(transparent)]
    Bridge(#[from] BridgeError),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("eval failed: {0}")]
    Sandbox(#[from] SandboxError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<HostError> for ErrorInfo {
    fn from(err: HostError) -> Self {
        match err {
            HostError::Bridge(inner) => ErrorInfo::from(inner),
            HostError::AccessDenied { .. } => ErrorInfo::access_denied(err.to_string()),
            HostError::Sandbox(inner) => ErrorInfo::eval(inner.to_string()),
            other => ErrorInfo::handler(other.to_string()),
        }
    }
}
