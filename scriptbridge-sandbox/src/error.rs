//! Error types for the sandbox.

use thiserror::Error;

/// Result type for sandbox evaluation.
pub type SandboxResult<T> = Result<T, SandboxError>;

/// Why a script did not produce a value.
#[derive(Debug, Error)]
pub enum SandboxError {
    /// The script did not compile.
    #[error("compile error: {0}")]
    Syntax(String),

    /// The script raised an error, exceeded a limit, or a host function
    /// failed.
    #[error("{0}")]
    Eval(String),

    /// A binding or the completion value could not cross the boundary.
    #[error("conversion error: {0}")]
    Conversion(String),
}

impl SandboxError {
    pub(crate) fn from_lua(err: &mlua::Error) -> Self {
        match err {
            mlua::Error::SyntaxError { message, .. } => Self::Syntax(message.clone()),
            mlua::Error::RuntimeError(msg) => Self::Eval(msg.clone()),
            mlua::Error::CallbackError { cause, .. } => Self::from_lua(cause),
            mlua::Error::MemoryError(msg) => Self::Eval(format!("memory limit exceeded: {msg}")),
            mlua::Error::SerializeError(msg) | mlua::Error::DeserializeError(msg) => {
                Self::Conversion(msg.clone())
            }
            other => Self::Eval(other.to_string()),
        }
    }
}
