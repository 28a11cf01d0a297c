//! Call correlation.
//!
//! The router owns the pending-call table of one endpoint. Every outbound
//! call gets a fresh id and an entry in the table; the entry leaves the table
//! exactly once, on the matching response, on timeout, or when the endpoint
//! disconnects. A response whose id is not in the table is dropped.

use crate::error::{BridgeError, BridgeResult};
use futures::future::{self, BoxFuture};
use futures::FutureExt;
use scriptbridge_types::{CallId, Envelope, Message, Response};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, oneshot};
use tracing::debug;

/// Future returned by [`MessageRouter::call`].
pub type ResponseFuture = BoxFuture<'static, BridgeResult<Value>>;

struct PendingCall {
    method: String,
    created_at: Instant,
    resolver: oneshot::Sender<BridgeResult<Value>>,
}

#[derive(Default)]
struct PendingTable {
    calls: HashMap<CallId, PendingCall>,
    closed: bool,
}

/// Issues calls on one endpoint and matches their responses.
pub struct MessageRouter {
    namespace: Arc<str>,
    /// Dropped on close, which ends the peer's inbound stream.
    outbound: Mutex<Option<mpsc::UnboundedSender<Envelope>>>,
    pending: Mutex<PendingTable>,
    timeout: Option<Duration>,
}

impl MessageRouter {
    pub(crate) fn new(
        namespace: Arc<str>,
        outbound: mpsc::UnboundedSender<Envelope>,
        timeout: Option<Duration>,
    ) -> Self {
        Self {
            namespace,
            outbound: Mutex::new(Some(outbound)),
            pending: Mutex::new(PendingTable::default()),
            timeout,
        }
    }

    /// Sends a `Call` and returns a future for its outcome.
    ///
    /// The call is on the wire by the time this returns; the future only
    /// waits. On a closed endpoint the future fails with `Unreachable`.
    pub fn call(self: &Arc<Self>, method: &str, args: Value) -> ResponseFuture {
        let id = CallId::new();
        let (resolver, outcome) = oneshot::channel();

        {
            let mut table = self.table();
            if table.closed {
                return future::ready(Err(BridgeError::Unreachable)).boxed();
            }
            table.calls.insert(
                id,
                PendingCall {
                    method: method.to_string(),
                    created_at: Instant::now(),
                    resolver,
                },
            );
        }

        if !self.send(Message::call(id, method, args)) {
            self.take(&id);
            return future::ready(Err(BridgeError::Unreachable)).boxed();
        }

        let router = Arc::clone(self);
        let method = method.to_string();
        async move {
            let mut outcome = outcome;
            let received = match router.timeout {
                None => outcome.await,
                Some(limit) => match tokio::time::timeout(limit, &mut outcome).await {
                    Ok(received) => received,
                    Err(_) => {
                        if router.take(&id).is_some() {
                            return Err(BridgeError::Timeout {
                                method,
                                timeout_ms: limit.as_millis() as u64,
                            });
                        }
                        // The response won the race against the deadline.
                        outcome.await
                    }
                },
            };
            received.unwrap_or(Err(BridgeError::Unreachable))
        }
        .boxed()
    }

    /// Resolves the pending call matching `response`.
    ///
    /// Returns `false` when no call is waiting for that id (late or
    /// duplicate delivery).
    pub(crate) fn resolve(&self, response: Response) -> bool {
        let Some(pending) = self.take(&response.id) else {
            debug!("Discarding response for unknown call {}", response.id);
            return false;
        };
        debug!(
            "Call {} ('{}') completed in {:?}",
            response.id,
            pending.method,
            pending.created_at.elapsed()
        );
        let result = response
            .into_result()
            .map_err(|info| BridgeError::from_remote(info, &pending.method));
        // The caller may have dropped its future; nothing to do then.
        let _ = pending.resolver.send(result);
        true
    }

    /// Rejects every pending call with `Unreachable`, refuses new ones and
    /// hangs up on the peer. Returns how many calls were rejected.
    pub(crate) fn fail_all(&self) -> usize {
        self.outbound
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        let drained: Vec<PendingCall> = {
            let mut table = self.table();
            table.closed = true;
            table.calls.drain().map(|(_, call)| call).collect()
        };
        let count = drained.len();
        for call in drained {
            let _ = call.resolver.send(Err(BridgeError::Unreachable));
        }
        count
    }

    /// Ships a response back to the peer.
    pub(crate) fn respond(&self, response: Response) {
        let id = response.id;
        if !self.send(Message::Response(response)) {
            debug!("Dropping response for call {}: endpoint closed", id);
        }
    }

    /// Ships a trigger. Returns whether it was handed to the transport.
    pub(crate) fn trigger(&self, method: &str, args: Value) -> bool {
        self.send(Message::trigger(method, args))
    }

    /// Number of calls awaiting a response.
    pub fn pending_count(&self) -> usize {
        self.table().calls.len()
    }

    /// Whether the endpoint has been torn down.
    pub fn is_closed(&self) -> bool {
        self.table().closed
    }

    fn send(&self, msg: Message) -> bool {
        let outbound = self
            .outbound
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        match outbound.as_ref() {
            Some(sender) => sender.send(Envelope::new(&*self.namespace, msg)).is_ok(),
            None => false,
        }
    }

    fn take(&self, id: &CallId) -> Option<PendingCall> {
        self.table().calls.remove(id)
    }

    fn table(&self) -> MutexGuard<'_, PendingTable> {
        self.pending.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
