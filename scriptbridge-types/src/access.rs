//! Access grants for remote code execution.
//!
//! A grant is computed per request from the requester's identity. On the
//! wire it is either a boolean (full or no access) or a structured object
//! `{ "local": bool, "server": bool, "clients": bool }`.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Where a piece of code is asked to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExecTarget {
    /// The requester's own client process.
    Local,
    /// The server process.
    Server,
    /// Every connected client.
    AllClients,
}

impl ExecTarget {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Server => "server",
            Self::AllClients => "all-clients",
        }
    }
}

impl fmt::Display for ExecTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resolved permission set for one requester.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "AccessRepr", into = "AccessRepr")]
pub enum Access {
    /// Every target is permitted.
    Full,
    /// Nothing is permitted.
    #[default]
    None,
    /// Per-target permissions.
    Partial {
        local: bool,
        server: bool,
        clients: bool,
    },
}

impl Access {
    /// Whether code may run on `target`.
    pub fn allows(&self, target: ExecTarget) -> bool {
        match self {
            Self::Full => true,
            Self::None => false,
            Self::Partial {
                local,
                server,
                clients,
            } => match target {
                ExecTarget::Local => *local,
                ExecTarget::Server => *server,
                ExecTarget::AllClients => *clients,
            },
        }
    }

    /// Whether at least one target is permitted.
    pub fn any(&self) -> bool {
        [ExecTarget::Local, ExecTarget::Server, ExecTarget::AllClients]
            .into_iter()
            .any(|target| self.allows(target))
    }
}

impl From<bool> for Access {
    fn from(full: bool) -> Self {
        if full { Self::Full } else { Self::None }
    }
}

#[derive(Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum AccessRepr {
    Flag(bool),
    Grant {
        #[serde(default, alias = "l")]
        local: bool,
        #[serde(default, alias = "s")]
        server: bool,
        #[serde(default, alias = "c")]
        clients: bool,
    },
}

impl From<AccessRepr> for Access {
    fn from(repr: AccessRepr) -> Self {
        match repr {
            AccessRepr::Flag(full) => Access::from(full),
            AccessRepr::Grant {
                local,
                server,
                clients,
            } => Access::Partial {
                local,
                server,
                clients,
            },
        }
    }
}

impl From<Access> for AccessRepr {
    fn from(access: Access) -> Self {
        match access {
            Access::Full => AccessRepr::Flag(true),
            Access::None => AccessRepr::Flag(false),
            Access::Partial {
                local,
                server,
                clients,
            } => AccessRepr::Grant {
                local,
                server,
                clients,
            },
        }
    }
}
