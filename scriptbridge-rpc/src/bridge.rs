//! The bridge instance owned by one execution context.
//!
//! A [`Bridge`] holds the context's handlers and listeners and the set of
//! attached peers. Each attached connection gets its own receive loop; calls
//! arriving on it are dispatched to spawned tasks so a slow handler never
//! stalls the loop.

use crate::endpoint::Endpoint;
use crate::events::{EventBus, ListenerId};
use crate::handler::{CallContext, HandlerRegistry, HandlerResult};
use crate::router::MessageRouter;
use crate::transport::Connection;
use futures::FutureExt;
use scriptbridge_types::{
    CallId, EndpointId, Envelope, ErrorInfo, Identity, Message, Response, Role, DEFAULT_NAMESPACE,
};
use serde_json::Value;
use std::collections::BTreeMap;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Configuration for a bridge.
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// Application namespace; traffic under any other namespace is ignored.
    pub namespace: String,
    /// Deadline for outbound calls. `None` waits until response or
    /// disconnect.
    pub call_timeout: Option<Duration>,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            namespace: DEFAULT_NAMESPACE.to_string(),
            call_timeout: None,
        }
    }
}

impl BridgeConfig {
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = Some(timeout);
        self
    }
}

/// One context's view of the bridge.
#[derive(Clone)]
pub struct Bridge {
    inner: Arc<BridgeInner>,
}

struct BridgeInner {
    config: BridgeConfig,
    namespace: Arc<str>,
    handlers: HandlerRegistry,
    events: EventBus,
    endpoints: RwLock<BTreeMap<EndpointId, Endpoint>>,
}

impl Bridge {
    pub fn new(config: BridgeConfig) -> Self {
        let namespace: Arc<str> = Arc::from(config.namespace.as_str());
        Self {
            inner: Arc::new(BridgeInner {
                config,
                namespace,
                handlers: HandlerRegistry::new(),
                events: EventBus::new(),
                endpoints: RwLock::new(BTreeMap::new()),
            }),
        }
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.inner.config
    }

    pub fn namespace(&self) -> &str {
        &self.inner.namespace
    }

    pub fn handlers(&self) -> &HandlerRegistry {
        &self.inner.handlers
    }

    pub fn events(&self) -> &EventBus {
        &self.inner.events
    }

    // ── Handlers and listeners ───────────────────────────────────

    /// Serves `method` with `handler`. Replaces any existing handler.
    pub fn register<F, Fut>(&self, method: impl Into<String>, handler: F)
    where
        F: Fn(CallContext, Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        self.inner.handlers.register(method, handler);
    }

    pub fn unregister(&self, method: &str) -> bool {
        self.inner.handlers.unregister(method)
    }

    /// Listens for triggers named `method`.
    pub fn on<F>(&self, method: impl Into<String>, listener: F) -> ListenerId
    where
        F: Fn(&CallContext, Value) + Send + Sync + 'static,
    {
        self.inner.events.on(method, listener)
    }

    pub fn off(&self, method: &str, id: ListenerId) -> bool {
        self.inner.events.off(method, id)
    }

    // ── Endpoints ────────────────────────────────────────────────

    /// Attaches a connection to the peer described by `identity` and starts
    /// its receive loop. Must be called from within a Tokio runtime.
    pub fn attach(&self, identity: Identity, connection: Connection) -> Endpoint {
        let (outbound, inbound) = connection.into_parts();
        let router = MessageRouter::new(
            Arc::clone(&self.inner.namespace),
            outbound,
            self.inner.config.call_timeout,
        );
        let endpoint = Endpoint::new(identity, router);

        self.inner
            .endpoints
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(endpoint.id(), endpoint.clone());
        info!("Attached {} ({})", endpoint.identity(), endpoint.id());

        tokio::spawn(receive_loop(
            Arc::clone(&self.inner),
            endpoint.clone(),
            inbound,
        ));
        endpoint
    }

    pub fn endpoint(&self, id: EndpointId) -> Option<Endpoint> {
        self.inner
            .endpoints
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(&id)
            .cloned()
    }

    /// All attached endpoints.
    pub fn endpoints(&self) -> Vec<Endpoint> {
        self.inner
            .endpoints
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .values()
            .cloned()
            .collect()
    }

    /// Attached endpoints whose peer has `role`.
    pub fn endpoints_with_role(&self, role: Role) -> Vec<Endpoint> {
        self.endpoints()
            .into_iter()
            .filter(|endpoint| endpoint.role() == role)
            .collect()
    }

    /// The first attached endpoint whose peer has `role`.
    pub fn first_with_role(&self, role: Role) -> Option<Endpoint> {
        self.endpoints()
            .into_iter()
            .find(|endpoint| endpoint.role() == role)
    }

    pub fn endpoint_count(&self) -> usize {
        self.inner
            .endpoints
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    /// Closes every attached endpoint.
    pub fn shutdown(&self) {
        for endpoint in self.endpoints() {
            endpoint.close();
        }
    }
}

impl Default for Bridge {
    fn default() -> Self {
        Self::new(BridgeConfig::default())
    }
}

async fn receive_loop(
    bridge: Arc<BridgeInner>,
    endpoint: Endpoint,
    mut inbound: mpsc::UnboundedReceiver<Envelope>,
) {
    loop {
        let envelope = tokio::select! {
            biased;
            _ = endpoint.shutdown_requested() => break,
            next = inbound.recv() => match next {
                Some(envelope) => envelope,
                None => break,
            },
        };
        bridge.dispatch(&endpoint, envelope);
    }

    let failed = endpoint.disconnect();
    bridge
        .endpoints
        .write()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
        .remove(&endpoint.id());
    info!(
        "Detached {} ({}), {} pending calls failed",
        endpoint.identity(),
        endpoint.id(),
        failed
    );
}

impl BridgeInner {
    fn dispatch(&self, endpoint: &Endpoint, envelope: Envelope) {
        if !envelope.is_for(&self.namespace) {
            debug!(
                "Ignoring {} from {} in foreign namespace '{}'",
                envelope.msg.kind(),
                endpoint.identity(),
                envelope.ns
            );
            return;
        }

        match envelope.msg {
            Message::Call { id, method, args } => self.dispatch_call(endpoint, id, method, args),
            Message::Response(response) => {
                endpoint.router().resolve(response);
            }
            Message::Trigger { method, args } => {
                let ctx = endpoint.context();
                if self.events.emit(&ctx, &method, args) == 0 {
                    debug!("No listener for trigger '{}' from {}", method, ctx.caller);
                }
            }
        }
    }

    fn dispatch_call(&self, endpoint: &Endpoint, id: CallId, method: String, args: Value) {
        let Some(handler) = self.handlers.get(&method) else {
            debug!("{} called unknown method '{}'", endpoint.identity(), method);
            endpoint
                .router()
                .respond(Response::failure(id, ErrorInfo::method_not_found(&method)));
            return;
        };

        let ctx = endpoint.context();
        let endpoint = endpoint.clone();
        tokio::spawn(async move {
            let result = match AssertUnwindSafe(handler(ctx, args)).catch_unwind().await {
                Ok(result) => result,
                Err(_) => {
                    warn!("Handler for '{}' panicked", method);
                    Err(ErrorInfo::handler(format!("handler for '{method}' panicked")))
                }
            };
            endpoint.router().respond(Response::from_result(id, result));
        });
    }
}
