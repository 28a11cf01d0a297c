//! TCP front for the script editor server, and a headless client.

use scriptbridge_host::{ClientHost, HostResult, ServerConfig, ServerHost};
use scriptbridge_rpc::transport::tcp;
use scriptbridge_rpc::{Bridge, BridgeConfig};
use scriptbridge_storage::ScriptLibrary;
use scriptbridge_types::methods::{EVAL, EVAL_ALL_CLIENTS};
use scriptbridge_types::Identity;
use serde_json::{json, Value};
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, ToSocketAddrs};
use tracing::{info, warn};

/// A bound server, ready to accept clients.
pub struct Server {
    bridge: Bridge,
    host: Arc<ServerHost>,
    listener: TcpListener,
}

impl Server {
    /// Binds the listener from `config` and installs the server services.
    pub async fn bind(config: ServerConfig) -> HostResult<Self> {
        let listener = TcpListener::bind(config.listen_address()).await?;
        let bridge = Bridge::new(config.bridge_config());
        let host = ServerHost::install(&bridge, config);
        Ok(Self {
            bridge,
            host,
            listener,
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn bridge(&self) -> &Bridge {
        &self.bridge
    }

    pub fn host(&self) -> &Arc<ServerHost> {
        &self.host
    }

    /// Accepts clients until the listener fails. Each client is known by
    /// its IP address.
    pub async fn run(self) -> io::Result<()> {
        loop {
            match tcp::accept(&self.listener).await {
                Ok((connection, addr)) => {
                    let endpoint = self
                        .bridge
                        .attach(Identity::client(addr.ip().to_string()), connection);
                    info!(
                        "Client {} connected ({} attached)",
                        endpoint.identity(),
                        self.bridge.endpoint_count()
                    );
                }
                Err(scriptbridge_rpc::BridgeError::Io(e)) if is_fatal(&e) => return Err(e),
                Err(e) => warn!("Accept failed: {}", e),
            }
        }
    }
}

fn is_fatal(err: &io::Error) -> bool {
    !matches!(
        err.kind(),
        io::ErrorKind::ConnectionAborted
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::Interrupted
            | io::ErrorKind::WouldBlock
    )
}

/// A client without a UI: serves `eval` and an in-memory library.
pub struct HeadlessClient {
    pub bridge: Bridge,
    pub host: Arc<ClientHost>,
}

impl HeadlessClient {
    pub async fn connect(addr: impl ToSocketAddrs, config: BridgeConfig) -> HostResult<Self> {
        let bridge = Bridge::new(config);
        let host = ClientHost::install(&bridge, Arc::new(ScriptLibrary::open_in_memory()));
        let connection = tcp::connect(addr).await?;
        bridge.attach(Identity::server(), connection);
        Ok(Self { bridge, host })
    }

    /// Runs `code` on the server, or on every client when `all_clients`.
    pub async fn run(&self, code: &str, all_clients: bool) -> HostResult<Value> {
        let method = if all_clients { EVAL_ALL_CLIENTS } else { EVAL };
        let server = self.host.server()?;
        Ok(server.call(method, json!(code)).await?)
    }

    pub fn close(&self) {
        self.bridge.shutdown();
    }
}
