//! Error types for the bridge.

use scriptbridge_types::{ErrorCode, ErrorInfo};
use thiserror::Error;

/// Result type for bridge operations.
pub type BridgeResult<T> = Result<T, BridgeError>;

/// Errors a caller can observe on a call.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// The target has no handler registered under the method.
    #[error("method not found: {0}")]
    MethodNotFound(String),

    /// The handler ran on the target and failed.
    #[error("remote error: {}", .0.message)]
    Remote(ErrorInfo),

    /// No response arrived within the configured window.
    #[error("call to '{method}' timed out after {timeout_ms}ms")]
    Timeout { method: String, timeout_ms: u64 },

    /// The endpoint disconnected before the call completed.
    #[error("endpoint unreachable")]
    Unreachable,

    /// The local access gate refused to issue the call.
    #[error("access denied: {0}")]
    AccessDenied(String),

    /// A call to one endpoint of a fan-out failed.
    #[error("{endpoint}: {source}")]
    Endpoint {
        endpoint: String,
        #[source]
        source: Box<BridgeError>,
    },

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error (sockets).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl BridgeError {
    /// Maps a failed response to the caller-side error.
    pub fn from_remote(info: ErrorInfo, method: &str) -> Self {
        match info.code {
            ErrorCode::MethodNotFound => Self::MethodNotFound(method.to_string()),
            _ => Self::Remote(info),
        }
    }

    /// The innermost error, skipping fan-out context.
    pub fn root(&self) -> &BridgeError {
        match self {
            Self::Endpoint { source, .. } => source.root(),
            other => other,
        }
    }

    /// Error code of the innermost remote failure, if any.
    pub fn remote_code(&self) -> Option<ErrorCode> {
        match self.root() {
            Self::Remote(info) => Some(info.code),
            Self::MethodNotFound(_) => Some(ErrorCode::MethodNotFound),
            _ => None,
        }
    }
}

impl From<BridgeError> for ErrorInfo {
    fn from(err: BridgeError) -> Self {
        match err {
            BridgeError::Remote(info) => info,
            BridgeError::MethodNotFound(method) => ErrorInfo::method_not_found(&method),
            BridgeError::AccessDenied(reason) => ErrorInfo::access_denied(reason),
            BridgeError::Endpoint { endpoint, source } => {
                let inner = ErrorInfo::from(*source);
                ErrorInfo::new(inner.code, format!("{endpoint}: {}", inner.message))
            }
            other => ErrorInfo::handler(other.to_string()),
        }
    }
}
