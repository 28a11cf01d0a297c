//! Endpoint identities.

use crate::Error;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;

/// The execution context an endpoint represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Role {
    /// The authoritative server process.
    Server,
    /// A game-client process.
    Client,
    /// The in-process browser surface rendering the editor.
    UiSurface,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Server => "server",
            Self::Client => "client",
            Self::UiSurface => "ui-surface",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "server" => Ok(Self::Server),
            "client" => Ok(Self::Client),
            "ui-surface" | "ui" => Ok(Self::UiSurface),
            other => Err(Error::UnknownRole(other.to_string())),
        }
    }
}

/// Who is on the other side of a connection.
///
/// Clients are told apart by their network address, which is also what the
/// access policy keys on.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Identity {
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
}

impl Identity {
    /// Creates an identity without an address.
    pub fn new(role: Role) -> Self {
        Self {
            role,
            address: None,
        }
    }

    /// Creates an identity for a peer reachable at `address`.
    pub fn with_address(role: Role, address: impl Into<String>) -> Self {
        Self {
            role,
            address: Some(address.into()),
        }
    }

    pub fn server() -> Self {
        Self::new(Role::Server)
    }

    pub fn client(address: impl Into<String>) -> Self {
        Self::with_address(Role::Client, address)
    }

    pub fn ui_surface() -> Self {
        Self::new(Role::UiSurface)
    }

    /// Whether the address is a loopback address (`127.0.0.1`, `::1`,
    /// `localhost`).
    pub fn is_loopback(&self) -> bool {
        match self.address.as_deref() {
            Some("localhost") => true,
            Some(addr) => addr.parse::<IpAddr>().is_ok_and(|ip| ip.is_loopback()),
            None => false,
        }
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.address {
            Some(addr) => write!(f, "{}@{}", self.role, addr),
            None => write!(f, "{}", self.role),
        }
    }
}
