//! Server configuration, read from a TOML file.
//!
//! ```toml
//! port = 7788
//! bind_address = "0.0.0.0"
//! public_address = "203.0.113.7"
//! activation_key = 113
//! call_timeout_ms = 30000
//! whitelist_ips = ["127.0.0.1", "10.0.0.5"]
//!
//! [grants."10.0.0.9"]
//! local = true
//! server = false
//! clients = false
//! ```

use crate::access::{AccessGate, AddressPolicy};
use crate::error::{HostError, HostResult};
use scriptbridge_rpc::BridgeConfig;
use scriptbridge_types::{Access, Identity, DEFAULT_NAMESPACE};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

pub const DEFAULT_PORT: u16 = 7788;

/// Key code of F2.
pub const DEFAULT_ACTIVATION_KEY: u32 = 113;

/// Server settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub port: u16,
    pub bind_address: String,
    /// Host name or address clients outside this machine use. Falls back to
    /// `bind_address`.
    pub public_address: Option<String>,
    /// Key code that toggles the editor on clients.
    pub activation_key: u32,
    /// Addresses allowed to use the editor; absent means everyone.
    pub whitelist_ips: Option<Vec<String>>,
    /// Per-address grants, overriding the allow-list.
    pub grants: HashMap<String, Access>,
    /// Deadline for outbound calls; absent waits indefinitely.
    pub call_timeout_ms: Option<u64>,
    pub namespace: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            bind_address: "0.0.0.0".to_string(),
            public_address: None,
            activation_key: DEFAULT_ACTIVATION_KEY,
            whitelist_ips: None,
            grants: HashMap::new(),
            call_timeout_ms: None,
            namespace: DEFAULT_NAMESPACE.to_string(),
        }
    }
}

impl ServerConfig {
    /// Loads the config at `path`. A missing file yields the defaults.
    pub fn load_from(path: impl AsRef<Path>) -> HostResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            info!("No config file at {:?}, using defaults", path);
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path)?;
        let config = Self::from_toml(&contents)
            .map_err(|e| HostError::Config(format!("{}: {e}", path.display())))?;
        info!("Loaded server config from {:?}", path);
        Ok(config)
    }

    /// Parses a config document.
    pub fn from_toml(contents: &str) -> HostResult<Self> {
        toml::from_str(contents).map_err(|e| HostError::Config(e.to_string()))
    }

    /// Address the listener binds to.
    pub fn listen_address(&self) -> String {
        format!("{}:{}", self.bind_address, self.port)
    }

    /// Editor URL handed to a client: loopback callers get `localhost`,
    /// everyone else the public address.
    pub fn endpoint_url_for(&self, identity: &Identity) -> String {
        if identity.is_loopback() {
            format!("http://localhost:{}", self.port)
        } else {
            let host = self.public_address.as_deref().unwrap_or(&self.bind_address);
            format!("http://{}:{}", host, self.port)
        }
    }

    pub fn access_gate(&self) -> AccessGate {
        let mut policy = AddressPolicy::new();
        if let Some(allowed) = &self.whitelist_ips {
            policy = policy.with_allow_list(allowed.iter().cloned());
        }
        for (address, grant) in &self.grants {
            policy = policy.with_grant(address.clone(), *grant);
        }
        AccessGate::new(Arc::new(policy))
    }

    pub fn bridge_config(&self) -> BridgeConfig {
        let config = BridgeConfig::default().with_namespace(self.namespace.clone());
        match self.call_timeout_ms {
            Some(ms) => config.with_timeout(Duration::from_millis(ms)),
            None => config,
        }
    }
}
