//! Fire-and-forget event delivery.
//!
//! Unlike call handlers, a method may have any number of listeners. Nothing
//! travels back to the sender of a trigger, whatever the listeners do.

use crate::handler::CallContext;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use tracing::warn;

/// A trigger listener.
pub type Listener = Arc<dyn Fn(&CallContext, Value) + Send + Sync>;

/// Handle returned by [`EventBus::on`], used to remove the listener again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "listener#{}", self.0)
    }
}

/// Per-bridge trigger listeners.
#[derive(Default)]
pub struct EventBus {
    listeners: RwLock<HashMap<String, Vec<(ListenerId, Listener)>>>,
    next_id: AtomicU64,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a listener for `method`.
    pub fn on<F>(&self, method: impl Into<String>, listener: F) -> ListenerId
    where
        F: Fn(&CallContext, Value) + Send + Sync + 'static,
    {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.listeners
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .entry(method.into())
            .or_default()
            .push((id, Arc::new(listener)));
        id
    }

    /// Removes one listener. Returns whether it was registered under `method`.
    pub fn off(&self, method: &str, id: ListenerId) -> bool {
        let mut listeners = self
            .listeners
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let Some(list) = listeners.get_mut(method) else {
            return false;
        };
        let before = list.len();
        list.retain(|(existing, _)| *existing != id);
        let removed = list.len() != before;
        if list.is_empty() {
            listeners.remove(method);
        }
        removed
    }

    pub fn listener_count(&self, method: &str) -> usize {
        self.listeners
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(method)
            .map_or(0, Vec::len)
    }

    /// Delivers a trigger to every listener of `method` and returns how many
    /// ran to completion.
    ///
    /// Listeners are invoked outside the lock, so they may add or remove
    /// listeners. A panicking listener is logged and skipped.
    pub fn emit(&self, ctx: &CallContext, method: &str, args: Value) -> usize {
        let snapshot: Vec<Listener> = self
            .listeners
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(method)
            .map(|list| list.iter().map(|(_, l)| Arc::clone(l)).collect())
            .unwrap_or_default();

        let mut delivered = 0;
        for listener in snapshot {
            let args = args.clone();
            match panic::catch_unwind(AssertUnwindSafe(|| listener(ctx, args))) {
                Ok(()) => delivered += 1,
                Err(_) => warn!("Listener for '{}' panicked (from {})", method, ctx.caller),
            }
        }
        delivered
    }
}
