//! Call handlers keyed by method name.
//!
//! A registry holds at most one handler per method. Registering a method
//! that already has a handler replaces it.

use futures::future::BoxFuture;
use futures::FutureExt;
use scriptbridge_types::{EndpointId, ErrorInfo, Identity};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, RwLock};
use tracing::debug;

/// Outcome of a handler: a value for the caller, or the error shipped back.
pub type HandlerResult = Result<Value, ErrorInfo>;

/// A type-erased handler.
pub type HandlerFn = Arc<dyn Fn(CallContext, Value) -> BoxFuture<'static, HandlerResult> + Send + Sync>;

/// Who sent an inbound call or trigger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallContext {
    /// The local endpoint the message arrived on.
    pub endpoint_id: EndpointId,
    /// The identity of the peer behind that endpoint.
    pub caller: Identity,
}

/// Maps method names to handlers.
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: RwLock<HashMap<String, HandlerFn>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs `handler` under `method`, replacing any previous handler.
    pub fn register<F, Fut>(&self, method: impl Into<String>, handler: F)
    where
        F: Fn(CallContext, Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        let method = method.into();
        let erased: HandlerFn = Arc::new(move |ctx, args| handler(ctx, args).boxed());
        let replaced = self
            .handlers
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(method.clone(), erased)
            .is_some();
        if replaced {
            debug!("Replaced handler for '{}'", method);
        }
    }

    /// Removes the handler for `method`. Returns whether one was installed.
    pub fn unregister(&self, method: &str) -> bool {
        self.handlers
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .remove(method)
            .is_some()
    }

    /// Looks up the handler for `method`.
    pub fn get(&self, method: &str) -> Option<HandlerFn> {
        self.handlers
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(method)
            .cloned()
    }

    pub fn contains(&self, method: &str) -> bool {
        self.handlers
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .contains_key(method)
    }

    /// Registered method names, sorted.
    pub fn methods(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .handlers
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .keys()
            .cloned()
            .collect();
        names.sort();
        names
    }
}

/// Decodes call arguments, reporting a malformed payload as `invalid_args`.
pub fn parse_args<T: DeserializeOwned>(args: Value) -> Result<T, ErrorInfo> {
    serde_json::from_value(args).map_err(|e| ErrorInfo::invalid_args(e.to_string()))
}

/// Encodes a handler return value.
pub fn reply<T: Serialize>(value: T) -> HandlerResult {
    serde_json::to_value(value).map_err(|e| ErrorInfo::handler(format!("cannot encode reply: {e}")))
}
