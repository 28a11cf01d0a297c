//! Bridge wire messages.
//!
//! Every frame on a connection is an [`Envelope`]: a namespace plus one
//! [`Message`]. The namespace lets unrelated bridges share one transport.

use crate::ids::CallId;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Namespace used when none is configured.
pub const DEFAULT_NAMESPACE: &str = "script-editor";

/// A namespaced message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub ns: String,
    pub msg: Message,
}

impl Envelope {
    pub fn new(ns: impl Into<String>, msg: Message) -> Self {
        Self { ns: ns.into(), msg }
    }

    /// Whether this envelope belongs to the bridge scoped under `ns`.
    pub fn is_for(&self, ns: &str) -> bool {
        self.ns == ns
    }

    /// Serializes to JSON bytes.
    pub fn to_json(&self) -> crate::Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Deserializes from JSON bytes.
    pub fn from_json(bytes: &[u8]) -> crate::Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

/// The three kinds of bridge traffic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Message {
    /// A request expecting exactly one correlated response.
    Call {
        id: CallId,
        method: String,
        #[serde(default)]
        args: Value,
    },

    /// The answer to a call.
    Response(Response),

    /// A one-way, unacknowledged event.
    Trigger {
        method: String,
        #[serde(default)]
        args: Value,
    },
}

impl Message {
    pub fn call(id: CallId, method: impl Into<String>, args: Value) -> Self {
        Self::Call {
            id,
            method: method.into(),
            args,
        }
    }

    pub fn trigger(method: impl Into<String>, args: Value) -> Self {
        Self::Trigger {
            method: method.into(),
            args,
        }
    }

    /// Short name for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Call { .. } => "call",
            Self::Response(_) => "response",
            Self::Trigger { .. } => "trigger",
        }
    }
}

/// Outcome of a call as it travels back to the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub id: CallId,
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorInfo>,
}

impl Response {
    /// A successful response.
    pub fn success(id: CallId, value: Value) -> Self {
        Self {
            id,
            ok: true,
            value: Some(value),
            error: None,
        }
    }

    /// A failed response.
    pub fn failure(id: CallId, error: ErrorInfo) -> Self {
        Self {
            id,
            ok: false,
            value: None,
            error: Some(error),
        }
    }

    /// Builds a response from a handler outcome.
    pub fn from_result(id: CallId, result: Result<Value, ErrorInfo>) -> Self {
        match result {
            Ok(value) => Self::success(id, value),
            Err(error) => Self::failure(id, error),
        }
    }

    /// Splits the response back into a handler outcome.
    ///
    /// A success without a value means the handler returned nothing.
    pub fn into_result(self) -> Result<Value, ErrorInfo> {
        if self.ok {
            Ok(self.value.unwrap_or(Value::Null))
        } else {
            Err(self
                .error
                .unwrap_or_else(|| ErrorInfo::handler("remote call failed without details")))
        }
    }
}

/// Machine-readable failure category carried in a failed response.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// No handler is registered under the called method.
    MethodNotFound,
    /// The handler ran and failed.
    #[default]
    HandlerFailed,
    /// Sandboxed code raised an error.
    EvalFailed,
    /// The arguments could not be interpreted by the handler.
    InvalidArgs,
    /// The receiving side refused the caller.
    AccessDenied,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MethodNotFound => "method_not_found",
            Self::HandlerFailed => "handler_failed",
            Self::EvalFailed => "eval_failed",
            Self::InvalidArgs => "invalid_args",
            Self::AccessDenied => "access_denied",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error details shipped in a failed response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorInfo {
    pub message: String,
    #[serde(default)]
    pub code: ErrorCode,
}

impl ErrorInfo {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code,
        }
    }

    pub fn method_not_found(method: &str) -> Self {
        Self::new(ErrorCode::MethodNotFound, format!("method not found: {method}"))
    }

    pub fn handler(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::HandlerFailed, message)
    }

    pub fn eval(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::EvalFailed, message)
    }

    pub fn invalid_args(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidArgs, message)
    }

    pub fn access_denied(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::AccessDenied, message)
    }
}

impl fmt::Display for ErrorInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.message, self.code)
    }
}

impl std::error::Error for ErrorInfo {}
