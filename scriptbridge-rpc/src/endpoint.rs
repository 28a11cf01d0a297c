//! Handles to attached peers.

use crate::error::BridgeResult;
use crate::handler::CallContext;
use crate::router::{MessageRouter, ResponseFuture};
use scriptbridge_types::{EndpointId, Identity, Role};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Notify;
use tracing::debug;

/// A connected peer as seen from the local bridge.
///
/// Cloning is cheap; all clones refer to the same connection and share one
/// pending-call table.
#[derive(Clone)]
pub struct Endpoint {
    inner: Arc<EndpointInner>,
}

struct EndpointInner {
    id: EndpointId,
    identity: Identity,
    router: Arc<MessageRouter>,
    connected: AtomicBool,
    shutdown: Notify,
}

impl Endpoint {
    pub(crate) fn new(identity: Identity, router: MessageRouter) -> Self {
        Self {
            inner: Arc::new(EndpointInner {
                id: EndpointId::new(),
                identity,
                router: Arc::new(router),
                connected: AtomicBool::new(true),
                shutdown: Notify::new(),
            }),
        }
    }

    pub fn id(&self) -> EndpointId {
        self.inner.id
    }

    /// The peer's identity.
    pub fn identity(&self) -> &Identity {
        &self.inner.identity
    }

    pub fn role(&self) -> Role {
        self.inner.identity.role
    }

    /// Calls `method` on the peer.
    pub fn call(&self, method: &str, args: Value) -> ResponseFuture {
        self.inner.router.call(method, args)
    }

    /// Calls `method` with typed arguments and decodes the result.
    pub async fn call_as<A, T>(&self, method: &str, args: A) -> BridgeResult<T>
    where
        A: Serialize,
        T: DeserializeOwned,
    {
        let args = serde_json::to_value(args)?;
        let value = self.call(method, args).await?;
        Ok(serde_json::from_value(value)?)
    }

    /// Sends a one-way trigger. Delivery failures are not reported.
    pub fn trigger(&self, method: &str, args: Value) {
        if !self.inner.router.trigger(method, args) {
            debug!("Trigger '{}' to {} dropped: endpoint closed", method, self.identity());
        }
    }

    /// Tears the endpoint down: every pending call fails with `Unreachable`
    /// before this returns, and the receive loop stops.
    pub fn close(&self) {
        let failed = self.disconnect();
        if failed > 0 {
            debug!("Closed {} with {} pending calls", self.identity(), failed);
        }
        self.inner.shutdown.notify_one();
    }

    pub fn is_connected(&self) -> bool {
        self.inner.connected.load(Ordering::Acquire)
    }

    /// Number of calls still awaiting a response.
    pub fn pending_calls(&self) -> usize {
        self.inner.router.pending_count()
    }

    pub(crate) fn router(&self) -> &MessageRouter {
        &self.inner.router
    }

    pub(crate) fn context(&self) -> CallContext {
        CallContext {
            endpoint_id: self.inner.id,
            caller: self.inner.identity.clone(),
        }
    }

    pub(crate) async fn shutdown_requested(&self) {
        self.inner.shutdown.notified().await;
    }

    pub(crate) fn disconnect(&self) -> usize {
        self.inner.connected.store(false, Ordering::Release);
        self.inner.router.fail_all()
    }
}

impl fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Endpoint")
            .field("id", &self.inner.id)
            .field("identity", &self.inner.identity)
            .field("connected", &self.is_connected())
            .finish()
    }
}
