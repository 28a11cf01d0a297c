//! Who may run code where.
//!
//! A policy maps a requester's identity to an [`Access`] grant. The gate
//! consults it on every request; nothing is cached. Execution requests are
//! checked where they are issued and checked again where they are received.

use crate::error::{HostError, HostResult};
use scriptbridge_types::{Access, ExecTarget, Identity, Role};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::debug;

/// Resolves the grant for one identity.
pub trait AccessPolicy: Send + Sync {
    fn resolve(&self, identity: &Identity) -> Access;
}

/// Grants full access to everyone.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAllPolicy;

impl AccessPolicy for AllowAllPolicy {
    fn resolve(&self, _identity: &Identity) -> Access {
        Access::Full
    }
}

/// Address-based policy for client identities.
///
/// An explicit per-address grant wins. Otherwise, without an allow-list
/// everyone gets full access; with one, listed addresses get full access and
/// everyone else none. The server itself always has full access.
#[derive(Debug, Clone, Default)]
pub struct AddressPolicy {
    allowed: Option<HashSet<String>>,
    grants: HashMap<String, Access>,
}

impl AddressPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restricts full access to `addresses`.
    pub fn with_allow_list<I, S>(mut self, addresses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed = Some(addresses.into_iter().map(Into::into).collect());
        self
    }

    /// Sets an explicit grant for one address.
    pub fn with_grant(mut self, address: impl Into<String>, access: Access) -> Self {
        self.grants.insert(address.into(), access);
        self
    }
}

impl AccessPolicy for AddressPolicy {
    fn resolve(&self, identity: &Identity) -> Access {
        if identity.role == Role::Server {
            return Access::Full;
        }
        let Some(address) = identity.address.as_deref() else {
            return if self.allowed.is_none() { Access::Full } else { Access::None };
        };
        if let Some(grant) = self.grants.get(address) {
            return *grant;
        }
        match &self.allowed {
            None => Access::Full,
            Some(allowed) => Access::from(allowed.contains(address)),
        }
    }
}

/// Fails unless `grant` permits `target`.
pub fn check_grant(identity: &Identity, grant: Access, target: ExecTarget) -> HostResult<()> {
    if grant.allows(target) {
        Ok(())
    } else {
        debug!("Denied {} for {} (grant {:?})", target, identity, grant);
        Err(HostError::AccessDenied {
            identity: identity.clone(),
            target,
        })
    }
}

/// Policy front used by the services.
#[derive(Clone)]
pub struct AccessGate {
    policy: Arc<dyn AccessPolicy>,
}

impl AccessGate {
    pub fn new(policy: Arc<dyn AccessPolicy>) -> Self {
        Self { policy }
    }

    pub fn allow_all() -> Self {
        Self::new(Arc::new(AllowAllPolicy))
    }

    /// The grant for `identity`, computed now.
    pub fn resolve_access(&self, identity: &Identity) -> Access {
        self.policy.resolve(identity)
    }

    /// Fails with [`HostError::AccessDenied`] unless `identity` may run code
    /// on `target`.
    pub fn check(&self, identity: &Identity, target: ExecTarget) -> HostResult<()> {
        check_grant(identity, self.resolve_access(identity), target)
    }
}

impl Default for AccessGate {
    fn default() -> Self {
        Self::allow_all()
    }
}
