//! Core type definitions for the script editor bridge.
//!
//! This crate defines the transport-agnostic types shared by every context
//! taking part in the bridge:
//! - Call and endpoint identifiers (UUID v7)
//! - Endpoint identities and roles (server, client, ui-surface)
//! - The message envelope exchanged between endpoints
//! - Access grants for remote code execution
//! - The method names each role exposes

mod access;
mod identity;
mod ids;
mod message;
pub mod methods;

pub use access::{Access, ExecTarget};
pub use identity::{Identity, Role};
pub use ids::{CallId, EndpointId};
pub use message::{Envelope, ErrorCode, ErrorInfo, Message, Response, DEFAULT_NAMESPACE};

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in type operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("invalid UUID: {0}")]
    InvalidUuid(#[from] uuid::Error),

    #[error("unknown role: {0}")]
    UnknownRole(String),
}
